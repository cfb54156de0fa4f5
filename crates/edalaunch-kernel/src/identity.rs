//! Identity types for launcher records.
//!
//! Runs are keyed by a uuid string so the run directory name and the record id
//! are the same value; everything created after a run uses SQLite row ids.

/// Identifies one tool invocation (uuid v4, also the run directory name).
pub type RunId = String;

/// Catalog row id of a tool.
pub type ToolId = i64;

/// Row id of a registered artifact.
pub type ArtifactId = i64;

/// Row id of a presentation.
pub type PresentationId = i64;

/// Row id of a slide.
pub type SlideId = i64;

/// Row id of a slide item.
pub type SlideItemId = i64;
