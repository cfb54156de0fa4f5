//! EDA launcher run pipeline.
//!
//! Upload → [`orchestrator::RunOrchestrator`] (run record, tool invocation
//! through the process bridge) → [`registry::ArtifactRegistry`] (conventional
//! outputs become typed artifacts) → [`assembler::PresentationAssembler`]
//! (presentation, fixed slides, slide items) → [`export`] renderers.
//! [`launcher::ToolLauncher`] starts desktop GUIs detached. The [`api`]
//! module exposes both over HTTP.

pub mod api;
pub mod assembler;
mod blocking;
pub mod export;
pub mod health;
pub mod launcher;
pub mod orchestrator;
pub mod profiles;
pub mod registry;
pub mod repository;
pub mod seed;
pub mod sqlite_repository;

pub use api::{build_router, ApiError, LauncherApiState};
pub use assembler::{AttachSummary, PresentationAssembler};
pub use export::{load_document, PresentationDocument};
pub use health::startup_health_check;
pub use launcher::{DesktopLaunch, OpenedLayout, ToolLauncher, WebLaunch};
pub use orchestrator::{RunOrchestrator, RunOutcome, UploadedFile};
pub use registry::ArtifactRegistry;
pub use repository::LauncherRepository;
pub use seed::{seed_reference_data, SeedSummary};
pub use sqlite_repository::SqliteLauncherRepository;
