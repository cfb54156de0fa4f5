//! Domain models for runs, artifacts and presentations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::{
    ArtifactId, PresentationId, RunId, SlideId, SlideItemId, ToolId,
};

/// Lifecycle status of a run.
///
/// `Running` holds only between creation and the single terminal update.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    /// Tool ran but reported diagnostics; only produced under the `partial` policy.
    Partial,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(RunStatus::Running),
            "success" => Some(RunStatus::Success),
            "partial" => Some(RunStatus::Partial),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Desktop,
    Web,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Desktop => "desktop",
            ToolType::Web => "web",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "web" => ToolType::Web,
            _ => ToolType::Desktop,
        }
    }
}

/// Catalog entry for an EDA tool. Read-only while runs execute.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolRecord {
    pub tool_id: ToolId,
    pub name: String,
    pub slug: String,
    pub category: String,
    pub description: String,
    pub tool_type: ToolType,
    pub linux_executable_path: String,
    pub windows_executable_path: String,
    pub web_url: Option<String>,
    /// Extra environment variables passed to every invocation of the tool.
    pub env_template: Value,
    pub visible: bool,
}

/// Catalog entry used when seeding tools.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewTool {
    pub name: String,
    pub slug: String,
    pub category: String,
    pub description: String,
    pub tool_type: ToolType,
    pub linux_executable_path: String,
    pub windows_executable_path: String,
    pub web_url: Option<String>,
    pub env_template: Value,
}

/// One invocation of one tool against one uploaded input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub tool_id: ToolId,
    pub tool_slug: String,
    pub user: Option<String>,
    pub input_name: String,
    /// Run directory relative to the media root (`runs/<run_id>`).
    pub run_dir: String,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// Values written by the single terminal update of a run.
#[derive(Clone, Debug, Default)]
pub struct RunCompletion {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Metadata,
    Log,
    Gds,
    Report,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Metadata => "metadata",
            ArtifactKind::Log => "log",
            ArtifactKind::Gds => "gds",
            ArtifactKind::Report => "report",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(ArtifactKind::Image),
            "metadata" => Some(ArtifactKind::Metadata),
            "log" => Some(ArtifactKind::Log),
            "gds" => Some(ArtifactKind::Gds),
            "report" => Some(ArtifactKind::Report),
            _ => None,
        }
    }
}

/// A file produced by a run. Never mutated after registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub artifact_id: ArtifactId,
    pub run_id: RunId,
    pub kind: ArtifactKind,
    pub name: String,
    /// Path relative to the shared media root; never absolute.
    pub file_path: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Input to artifact registration.
#[derive(Clone, Debug)]
pub struct NewArtifact {
    pub run_id: RunId,
    pub kind: ArtifactKind,
    pub name: String,
    pub file_path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateRecord {
    pub key: String,
    pub name: String,
    pub description: String,
    /// Layout variant the renderers switch on.
    pub base_layout: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThemeRecord {
    pub key: String,
    pub name: String,
    pub css_class: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresentationRecord {
    pub presentation_id: PresentationId,
    pub title: String,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub run_id: Option<RunId>,
    pub template_key: String,
    pub theme_key: String,
    pub created_at: DateTime<Utc>,
}

/// Input to presentation creation.
#[derive(Clone, Debug)]
pub struct NewPresentation {
    pub title: String,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub run_id: Option<RunId>,
    pub template_key: String,
    pub theme_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlideRecord {
    pub slide_id: SlideId,
    pub presentation_id: PresentationId,
    pub title: String,
    pub order: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SlideItemKind {
    Image,
    LogSnippet,
    Attachment,
}

impl SlideItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlideItemKind::Image => "image",
            SlideItemKind::LogSnippet => "log_snippet",
            SlideItemKind::Attachment => "attachment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(SlideItemKind::Image),
            "log_snippet" => Some(SlideItemKind::LogSnippet),
            "attachment" => Some(SlideItemKind::Attachment),
            _ => None,
        }
    }

    /// Items whose artifact content is inlined as text by the renderers.
    pub fn is_textual(&self) -> bool {
        matches!(self, SlideItemKind::LogSnippet | SlideItemKind::Attachment)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlideItemRecord {
    pub item_id: SlideItemId,
    pub slide_id: SlideId,
    pub artifact_id: ArtifactId,
    pub kind: SlideItemKind,
    /// Free-form display options (crop, zoom, annotation).
    pub display_config: Option<Value>,
    pub added_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input to slide item placement.
#[derive(Clone, Debug)]
pub struct NewSlideItem {
    pub slide_id: SlideId,
    pub artifact_id: ArtifactId,
    pub kind: SlideItemKind,
    pub display_config: Option<Value>,
    pub added_by: Option<String>,
}

/// The slide taxonomy created for every auto-assembled presentation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FixedSlide {
    LayoutView,
    Metadata,
    Logs,
}

impl FixedSlide {
    pub const ALL: [FixedSlide; 3] = [FixedSlide::LayoutView, FixedSlide::Metadata, FixedSlide::Logs];

    pub fn title(&self) -> &'static str {
        match self {
            FixedSlide::LayoutView => "Layout View",
            FixedSlide::Metadata => "Metadata",
            FixedSlide::Logs => "Logs",
        }
    }

    pub fn order(&self) -> i64 {
        match self {
            FixedSlide::LayoutView => 1,
            FixedSlide::Metadata => 2,
            FixedSlide::Logs => 3,
        }
    }

    /// Where an artifact of `kind` is placed during auto-assembly.
    ///
    /// Kinds without a placement (gds inputs, raw metadata) stay registered on
    /// the run but are not put on a slide.
    pub fn placement(kind: ArtifactKind) -> Option<(FixedSlide, SlideItemKind)> {
        match kind {
            ArtifactKind::Image => Some((FixedSlide::LayoutView, SlideItemKind::Image)),
            ArtifactKind::Report => Some((FixedSlide::Metadata, SlideItemKind::Attachment)),
            ArtifactKind::Log => Some((FixedSlide::Logs, SlideItemKind::LogSnippet)),
            ArtifactKind::Gds | ArtifactKind::Metadata => None,
        }
    }
}
