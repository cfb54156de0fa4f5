//! Presentation assembly: one presentation per run with the fixed
//! Layout View / Metadata / Logs slides, filled from the run's artifacts.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use edalaunch_kernel::{
    ArtifactId, FixedSlide, LauncherConfig, LauncherError, NewPresentation, NewSlideItem,
    PresentationId, PresentationRecord, RunRecord, SlideId, SlideItemKind, SlideItemRecord,
    SlideRecord,
};

use super::repository::LauncherRepository;

/// Result of placing a run's artifacts.
#[derive(Clone, Debug, Default)]
pub struct AttachSummary {
    pub items: Vec<SlideItemRecord>,
    /// Items stored by this call; repeats of earlier placements are not counted.
    pub inserted: usize,
}

pub struct PresentationAssembler {
    repo: Arc<dyn LauncherRepository>,
    config: Arc<LauncherConfig>,
}

impl PresentationAssembler {
    pub fn new(repo: Arc<dyn LauncherRepository>, config: Arc<LauncherConfig>) -> Self {
        Self { repo, config }
    }

    /// Returns the run's presentation, creating it with the fixed slides on
    /// first call. Requires the configured template and theme to be seeded.
    pub fn get_or_create_presentation(
        &self,
        run: &RunRecord,
    ) -> Result<PresentationRecord, LauncherError> {
        if !run.status.is_terminal() {
            return Err(LauncherError::Conflict(format!(
                "run {} has not finished",
                run.run_id
            )));
        }
        let new = NewPresentation {
            title: presentation_title(run),
            description: Some(format!(
                "Artifacts of {} run on {}",
                run.tool_slug, run.input_name
            )),
            creator: run.user.clone(),
            run_id: Some(run.run_id.clone()),
            template_key: self.config.template_key.clone(),
            theme_key: self.config.theme_key.clone(),
        };
        let slides: Vec<(&str, i64)> = FixedSlide::ALL
            .iter()
            .map(|slide| (slide.title(), slide.order()))
            .collect();
        let (presentation, created) = self.repo.get_or_create_run_presentation(&new, &slides)?;
        if created {
            tracing::info!(
                "presentation_created presentation_id={} run_id={}",
                presentation.presentation_id,
                run.run_id
            );
        }
        Ok(presentation)
    }

    /// Places each displayable artifact of `run` on its fixed slide.
    pub fn attach_artifacts(
        &self,
        presentation: &PresentationRecord,
        run: &RunRecord,
    ) -> Result<AttachSummary, LauncherError> {
        if presentation.run_id.as_deref() != Some(run.run_id.as_str()) {
            return Err(LauncherError::Conflict(format!(
                "presentation {} does not summarize run {}",
                presentation.presentation_id, run.run_id
            )));
        }
        let mut slides: HashMap<FixedSlide, SlideRecord> = HashMap::new();
        for fixed in FixedSlide::ALL {
            let slide =
                self.repo
                    .ensure_slide(presentation.presentation_id, fixed.title(), fixed.order())?;
            slides.insert(fixed, slide);
        }
        let mut summary = AttachSummary::default();
        for artifact in self.repo.list_artifacts(&run.run_id)? {
            let Some((fixed, kind)) = FixedSlide::placement(artifact.kind) else {
                continue;
            };
            let Some(slide) = slides.get(&fixed) else {
                continue;
            };
            let (item, inserted) = self.repo.add_slide_item(&NewSlideItem {
                slide_id: slide.slide_id,
                artifact_id: artifact.artifact_id,
                kind,
                display_config: None,
                added_by: None,
            })?;
            if inserted {
                summary.inserted += 1;
            }
            summary.items.push(item);
        }
        tracing::info!(
            "artifacts_attached presentation_id={} run_id={} items={} inserted={}",
            presentation.presentation_id,
            run.run_id,
            summary.items.len(),
            summary.inserted
        );
        Ok(summary)
    }

    /// `get_or_create_presentation` followed by `attach_artifacts`.
    pub fn assemble(&self, run: &RunRecord) -> Result<PresentationRecord, LauncherError> {
        let presentation = self.get_or_create_presentation(run)?;
        self.attach_artifacts(&presentation, run)?;
        Ok(presentation)
    }

    pub fn create_presentation(
        &self,
        mut new: NewPresentation,
    ) -> Result<PresentationRecord, LauncherError> {
        new.title = new.title.trim().to_string();
        if new.title.is_empty() {
            return Err(LauncherError::InvalidInput(
                "presentation title must not be empty".to_string(),
            ));
        }
        self.repo.create_presentation(&new)
    }

    /// Appends a manual slide after the existing ones.
    pub fn add_slide(
        &self,
        presentation_id: PresentationId,
        title: &str,
    ) -> Result<SlideRecord, LauncherError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LauncherError::InvalidInput(
                "slide title must not be empty".to_string(),
            ));
        }
        self.repo.append_slide(presentation_id, title)
    }

    /// Places an artifact on a slide by hand. Without an explicit kind the
    /// item kind follows the artifact kind as in auto-assembly.
    pub fn add_slide_item(
        &self,
        slide_id: SlideId,
        artifact_id: ArtifactId,
        kind: Option<SlideItemKind>,
        display_config: Option<Value>,
        added_by: Option<String>,
    ) -> Result<SlideItemRecord, LauncherError> {
        let kind = match kind {
            Some(kind) => kind,
            None => {
                let artifact = self
                    .repo
                    .get_artifact(artifact_id)?
                    .ok_or_else(|| LauncherError::NotFound(format!("artifact {}", artifact_id)))?;
                FixedSlide::placement(artifact.kind)
                    .map(|(_, kind)| kind)
                    .unwrap_or(SlideItemKind::Attachment)
            }
        };
        let (item, _) = self.repo.add_slide_item(&NewSlideItem {
            slide_id,
            artifact_id,
            kind,
            display_config,
            added_by,
        })?;
        Ok(item)
    }
}

fn presentation_title(run: &RunRecord) -> String {
    let short: String = run.run_id.chars().take(8).collect();
    format!("Design Review: {} run {}", run.tool_slug, short)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use edalaunch_kernel::{
        ArtifactKind, LauncherConfig, LauncherError, NewArtifact, RunRecord, RunStatus,
        SlideItemKind,
    };

    use super::PresentationAssembler;
    use crate::repository::LauncherRepository;
    use crate::seed::seed_reference_data;
    use crate::sqlite_repository::SqliteLauncherRepository;

    fn setup() -> (Arc<SqliteLauncherRepository>, PresentationAssembler, RunRecord) {
        let repo = Arc::new(SqliteLauncherRepository::new(":memory:").unwrap());
        seed_reference_data(repo.as_ref()).unwrap();
        let tool = repo.get_tool_by_slug("klayout").unwrap().unwrap();
        let run = RunRecord {
            run_id: "0f1e2d3c-aaaa-bbbb-cccc-000000000001".into(),
            tool_id: tool.tool_id,
            tool_slug: tool.slug,
            user: Some("alice".into()),
            input_name: "chip.gds".into(),
            run_dir: "runs/0f1e2d3c-aaaa-bbbb-cccc-000000000001".into(),
            status: RunStatus::Success,
            created_at: Utc::now(),
            completed_at: Some(Utc::now()),
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            timed_out: false,
        };
        repo.insert_run(&run).unwrap();
        for (kind, file) in [
            (ArtifactKind::Image, "preview.png"),
            (ArtifactKind::Report, "metadata.json"),
            (ArtifactKind::Log, "klayout.log"),
            (ArtifactKind::Gds, "generated_design.gds"),
        ] {
            repo.register_artifact(&NewArtifact {
                run_id: run.run_id.clone(),
                kind,
                name: file.into(),
                file_path: format!("{}/{}", run.run_dir, file),
                size_bytes: 1,
                sha256: "00".into(),
            })
            .unwrap();
        }
        let assembler = PresentationAssembler::new(
            repo.clone(),
            Arc::new(LauncherConfig::with_media_root("/tmp/unused")),
        );
        (repo, assembler, run)
    }

    #[test]
    fn repeated_creation_returns_same_presentation() {
        let (repo, assembler, run) = setup();
        let ids: Vec<i64> = (0..3)
            .map(|_| {
                assembler
                    .get_or_create_presentation(&run)
                    .unwrap()
                    .presentation_id
            })
            .collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        let p = repo.get_presentation_for_run(&run.run_id).unwrap().unwrap();
        assert_eq!(p.template_key, "standard");
        assert_eq!(p.theme_key, "dark");
        assert_eq!(p.creator.as_deref(), Some("alice"));
        assert!(p.title.contains("0f1e2d3c"));
    }

    #[test]
    fn attach_places_each_kind_on_its_slide_once() {
        let (repo, assembler, run) = setup();
        let p = assembler.get_or_create_presentation(&run).unwrap();
        let first = assembler.attach_artifacts(&p, &run).unwrap();
        assert_eq!(first.inserted, 3);
        let second = assembler.attach_artifacts(&p, &run).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.items.len(), 3);

        let slides = repo.list_slides(p.presentation_id).unwrap();
        let expected = [
            ("Layout View", SlideItemKind::Image),
            ("Metadata", SlideItemKind::Attachment),
            ("Logs", SlideItemKind::LogSnippet),
        ];
        for (slide, (title, kind)) in slides.iter().zip(expected) {
            assert_eq!(slide.title, title);
            let items = repo.list_slide_items(slide.slide_id).unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].kind, kind);
        }
    }

    #[test]
    fn missing_reference_style_is_configuration_error() {
        let repo = Arc::new(SqliteLauncherRepository::new(":memory:").unwrap());
        seed_reference_data(repo.as_ref()).unwrap();
        let tool = repo.get_tool_by_slug("klayout").unwrap().unwrap();
        let mut config = LauncherConfig::with_media_root("/tmp/unused");
        config.theme_key = "neon".into();
        let run = RunRecord {
            run_id: "r-style".into(),
            tool_id: tool.tool_id,
            tool_slug: tool.slug,
            user: None,
            input_name: "a.gds".into(),
            run_dir: "runs/r-style".into(),
            status: RunStatus::Success,
            created_at: Utc::now(),
            completed_at: None,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            timed_out: false,
        };
        repo.insert_run(&run).unwrap();
        let assembler = PresentationAssembler::new(repo, Arc::new(config));
        assert!(matches!(
            assembler.get_or_create_presentation(&run),
            Err(LauncherError::Configuration(_))
        ));
    }

    #[test]
    fn manual_slides_follow_fixed_ones() {
        let (repo, assembler, run) = setup();
        let p = assembler.assemble(&run).unwrap();
        let extra = assembler.add_slide(p.presentation_id, " Timing ").unwrap();
        assert_eq!(extra.order, 4);
        assert_eq!(extra.title, "Timing");
        let log = repo
            .list_artifacts(&run.run_id)
            .unwrap()
            .into_iter()
            .find(|a| a.kind == ArtifactKind::Log)
            .unwrap();
        let item = assembler
            .add_slide_item(extra.slide_id, log.artifact_id, None, None, Some("bob".into()))
            .unwrap();
        assert_eq!(item.kind, SlideItemKind::LogSnippet);
        assert_eq!(item.added_by.as_deref(), Some("bob"));
        assert!(matches!(
            assembler.add_slide(p.presentation_id, "   "),
            Err(LauncherError::InvalidInput(_))
        ));
    }
}
