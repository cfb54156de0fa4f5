//! Core types for the EDA launcher run pipeline.
//!
//! Runs, artifacts and presentations are plain records; the runtime crate owns
//! their persistence and the orchestration that produces them.

pub mod config;
pub mod error;
pub mod identity;
pub mod models;

pub use config::{BridgeMode, DiagnosticsPolicy, LauncherConfig, RUNS_DIR};
pub use error::LauncherError;
pub use identity::{ArtifactId, PresentationId, RunId, SlideId, SlideItemId, ToolId};
pub use models::{
    ArtifactKind, ArtifactRecord, FixedSlide, NewArtifact, NewPresentation, NewSlideItem, NewTool,
    PresentationRecord, RunCompletion, RunRecord, RunStatus, SlideItemKind, SlideItemRecord,
    SlideRecord, TemplateRecord, ThemeRecord, ToolRecord, ToolType,
};
