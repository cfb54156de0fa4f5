//! Storage façade for the launcher pipeline.

use chrono::{DateTime, Utc};

use edalaunch_kernel::{
    ArtifactId, ArtifactRecord, LauncherError, NewArtifact, NewPresentation, NewSlideItem,
    NewTool, PresentationId, PresentationRecord, RunCompletion, RunId, RunRecord, RunStatus,
    SlideId, SlideItemRecord, SlideRecord, TemplateRecord, ThemeRecord, ToolRecord,
};

/// Launcher repository contract used by the orchestrator, registry, assembler
/// and renderers.
///
/// Implementations are responsible for keeping the pipeline invariants in
/// storage rather than in callers:
/// - `finish_run` must only move a run out of `running`; a second terminal
///   update is a conflict.
/// - `register_artifact` is idempotent on `(run_id, file_path)` and returns the
///   existing record on repeat.
/// - `get_or_create_run_presentation` must check and create inside one
///   transaction, together with the initial slides.
/// - `add_slide_item` is idempotent on `(slide_id, artifact_id)` and rejects an
///   artifact from a different run than the slide's presentation.
pub trait LauncherRepository: Send + Sync {
    /// Insert a tool unless its slug already exists; returns the stored row.
    fn seed_tool(&self, tool: &NewTool) -> Result<ToolRecord, LauncherError>;

    fn list_tools(&self, include_hidden: bool) -> Result<Vec<ToolRecord>, LauncherError>;

    fn get_tool_by_slug(&self, slug: &str) -> Result<Option<ToolRecord>, LauncherError>;

    /// Insert a template unless its key exists. Returns true when inserted.
    fn seed_template(&self, template: &TemplateRecord) -> Result<bool, LauncherError>;

    /// Insert a theme unless its key exists. Returns true when inserted.
    fn seed_theme(&self, theme: &ThemeRecord) -> Result<bool, LauncherError>;

    fn get_template(&self, key: &str) -> Result<Option<TemplateRecord>, LauncherError>;

    fn get_theme(&self, key: &str) -> Result<Option<ThemeRecord>, LauncherError>;

    fn list_templates(&self) -> Result<Vec<TemplateRecord>, LauncherError>;

    fn list_themes(&self) -> Result<Vec<ThemeRecord>, LauncherError>;

    fn insert_run(&self, run: &RunRecord) -> Result<(), LauncherError>;

    /// Single terminal transition of a `running` run.
    fn finish_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        completion: &RunCompletion,
        completed_at: DateTime<Utc>,
    ) -> Result<RunRecord, LauncherError>;

    fn get_run(&self, run_id: &RunId) -> Result<Option<RunRecord>, LauncherError>;

    /// Newest first.
    fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<RunRecord>, LauncherError>;

    fn register_artifact(&self, artifact: &NewArtifact) -> Result<ArtifactRecord, LauncherError>;

    /// Artifacts of a run in registration order.
    fn list_artifacts(&self, run_id: &RunId) -> Result<Vec<ArtifactRecord>, LauncherError>;

    fn get_artifact(&self, artifact_id: ArtifactId)
        -> Result<Option<ArtifactRecord>, LauncherError>;

    /// Returns the run's presentation, creating it and `initial_slides`
    /// (title, order) when absent. The flag is true when this call created it.
    fn get_or_create_run_presentation(
        &self,
        presentation: &NewPresentation,
        initial_slides: &[(&str, i64)],
    ) -> Result<(PresentationRecord, bool), LauncherError>;

    /// Stand-alone presentation, optionally linked to a run without one.
    fn create_presentation(
        &self,
        presentation: &NewPresentation,
    ) -> Result<PresentationRecord, LauncherError>;

    fn get_presentation(
        &self,
        presentation_id: PresentationId,
    ) -> Result<Option<PresentationRecord>, LauncherError>;

    fn get_presentation_for_run(
        &self,
        run_id: &RunId,
    ) -> Result<Option<PresentationRecord>, LauncherError>;

    fn update_presentation_style(
        &self,
        presentation_id: PresentationId,
        template_key: &str,
        theme_key: &str,
    ) -> Result<PresentationRecord, LauncherError>;

    /// Slides ordered by `(order, slide_id)`.
    fn list_slides(&self, presentation_id: PresentationId)
        -> Result<Vec<SlideRecord>, LauncherError>;

    fn get_slide(&self, slide_id: SlideId) -> Result<Option<SlideRecord>, LauncherError>;

    /// Get-or-create a slide by title; `order` is used only on creation.
    fn ensure_slide(
        &self,
        presentation_id: PresentationId,
        title: &str,
        order: i64,
    ) -> Result<SlideRecord, LauncherError>;

    /// Appends a slide after the current last one without renumbering.
    fn append_slide(
        &self,
        presentation_id: PresentationId,
        title: &str,
    ) -> Result<SlideRecord, LauncherError>;

    /// Places an artifact on a slide. The flag is true when a new item was stored.
    fn add_slide_item(
        &self,
        item: &NewSlideItem,
    ) -> Result<(SlideItemRecord, bool), LauncherError>;

    /// Items of a slide in placement order.
    fn list_slide_items(&self, slide_id: SlideId) -> Result<Vec<SlideItemRecord>, LauncherError>;
}
