//! API DTOs for the launcher server.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use edalaunch_kernel::{
    ArtifactId, ArtifactRecord, PresentationRecord, RunRecord, SlideItemKind, SlideItemRecord,
    SlideRecord, TemplateRecord, ThemeRecord, ToolRecord,
};

#[derive(Clone, Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub meta: ApiMeta,
    pub request_id: String,
    pub data: T,
}

#[derive(Clone, Debug, Serialize)]
pub struct ApiMeta {
    pub status: &'static str,
    pub api_version: &'static str,
}

impl ApiMeta {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            api_version: "v1",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub templates: usize,
    pub themes: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolRecord>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListRunsQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<RunRecord>,
}

/// An artifact with its browser-facing URL.
#[derive(Clone, Debug, Serialize)]
pub struct ArtifactView {
    #[serde(flatten)]
    pub artifact: ArtifactRecord,
    pub url: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunResponse {
    pub run: RunRecord,
    pub artifacts: Vec<ArtifactView>,
    pub presentation_id: Option<i64>,
    pub presentation_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatePresentationRequest {
    pub title: String,
    pub description: Option<String>,
    pub creator: Option<String>,
    pub template_key: Option<String>,
    pub theme_key: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssembleResponse {
    pub presentation: PresentationRecord,
    /// Items placed by this call.
    pub items_attached: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct SlideItemView {
    #[serde(flatten)]
    pub item: SlideItemRecord,
    pub artifact: Option<ArtifactView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SlideView {
    #[serde(flatten)]
    pub slide: SlideRecord,
    pub items: Vec<SlideItemView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PresentationDetailResponse {
    pub presentation: PresentationRecord,
    pub template: Option<TemplateRecord>,
    pub theme: Option<ThemeRecord>,
    pub slides: Vec<SlideView>,
    pub html_url: String,
    pub pdf_url: String,
    pub pptx_url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateSlideRequest {
    pub title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AddSlideItemRequest {
    pub artifact_id: ArtifactId,
    pub kind: Option<SlideItemKind>,
    pub display_config: Option<Value>,
    pub added_by: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SlideQuery {
    pub slide: Option<i64>,
}

/// Body of the style selector form.
#[derive(Clone, Debug, Deserialize)]
pub struct StyleForm {
    pub template_key: Option<String>,
    pub theme_key: Option<String>,
}
