//! HTTP surface of the launcher: JSON API under `/v1`, the interactive
//! presentation view, exports and media serving.

pub mod errors;
pub mod handlers;
pub mod models;

pub use errors::ApiError;
pub use handlers::{build_router, LauncherApiState, PPTX_CONTENT_TYPE, UPLOAD_LIMIT_BYTES};
pub use models::{ApiEnvelope, ApiMeta};
