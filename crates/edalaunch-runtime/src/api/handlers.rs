//! Axum handlers for the launcher server.

use std::path::{Component, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::middleware::{from_fn, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use tokio_util::io::ReaderStream;

use edalaunch_bridge::ProcessBridge;
use edalaunch_kernel::{
    ArtifactRecord, LauncherConfig, LauncherError, NewPresentation, PresentationId,
    PresentationRecord, RunRecord, SlideId,
};

use super::errors::ApiError;
use super::models::{
    AddSlideItemRequest, ApiEnvelope, ApiMeta, ArtifactView, AssembleResponse,
    CreatePresentationRequest, CreateSlideRequest, HealthResponse, ListRunsQuery,
    ListRunsResponse, PresentationDetailResponse, RunResponse, SlideItemView, SlideQuery,
    SlideView, StyleForm, ToolListResponse,
};
use crate::assembler::PresentationAssembler;
use crate::export::{self, html, pdf, pptx, PresentationDocument};
use crate::launcher::{DesktopLaunch, OpenedLayout, ToolLauncher, WebLaunch};
use crate::orchestrator::{RunOrchestrator, UploadedFile};
use crate::repository::LauncherRepository;

/// Largest accepted multipart upload.
pub const UPLOAD_LIMIT_BYTES: usize = 256 * 1024 * 1024;
const DEFAULT_RUN_PAGE: usize = 50;
const MAX_RUN_PAGE: usize = 500;

pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

#[derive(Clone)]
pub struct LauncherApiState {
    pub repo: Arc<dyn LauncherRepository>,
    pub orchestrator: Arc<RunOrchestrator>,
    pub assembler: Arc<PresentationAssembler>,
    pub launcher: Arc<ToolLauncher>,
    pub config: Arc<LauncherConfig>,
}

impl LauncherApiState {
    pub fn new(
        repo: Arc<dyn LauncherRepository>,
        bridge: Arc<dyn ProcessBridge>,
        config: Arc<LauncherConfig>,
    ) -> Self {
        let assembler = Arc::new(PresentationAssembler::new(repo.clone(), config.clone()));
        let orchestrator = Arc::new(RunOrchestrator::new(
            repo.clone(),
            bridge.clone(),
            assembler.clone(),
            config.clone(),
        ));
        let launcher = Arc::new(ToolLauncher::new(repo.clone(), bridge, config.clone()));
        Self {
            repo,
            orchestrator,
            assembler,
            launcher,
            config,
        }
    }
}

pub fn build_router(state: LauncherApiState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/tools", get(list_tools))
        .route(
            "/v1/tools/:slug/runs",
            post(start_run).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/v1/tools/:slug/launch-desktop", post(launch_desktop))
        .route("/v1/tools/:slug/launch-web", get(launch_web))
        .route(
            "/v1/klayout/open",
            post(open_layout).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/tools/:slug", get(tool_workspace))
        .route("/v1/runs", get(list_runs))
        .route("/v1/runs/:run_id", get(get_run))
        .route("/v1/runs/:run_id/presentation", post(assemble_run))
        .route("/v1/presentations", post(create_presentation))
        .route("/v1/presentations/:id", get(presentation_detail))
        .route("/v1/presentations/:id/slides", post(add_slide))
        .route("/v1/slides/:slide_id/items", post(add_slide_item))
        .route("/presentations/:id", get(presentation_page))
        .route("/presentations/:id/style", post(update_style))
        .route("/presentations/:id/export/pdf", get(export_pdf))
        .route("/presentations/:id/export/pptx", get(export_pptx))
        .route("/media/*path", get(serve_media))
        .layer(from_fn(request_log_middleware))
        .with_state(state)
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

async fn request_log_middleware(
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    let rid = request_id(&headers);
    tracing::info!(
        "launcher_api_request request_id={} method={} path={}",
        rid,
        request.method(),
        request.uri().path()
    );
    next.run(request).await
}

/// Turns an extractor rejection into the JSON error envelope.
fn accepted<T, R: std::fmt::Display>(extracted: Result<T, R>, rid: &str) -> Result<T, ApiError> {
    extracted.map_err(|rejection| {
        ApiError::bad_request(rejection.to_string()).with_request_id(rid.to_string())
    })
}

fn envelope<T>(rid: String, data: T) -> Json<ApiEnvelope<T>> {
    Json(ApiEnvelope {
        meta: ApiMeta::ok(),
        request_id: rid,
        data,
    })
}

fn artifact_view(config: &LauncherConfig, artifact: ArtifactRecord) -> ArtifactView {
    ArtifactView {
        url: config.media_url(&artifact.file_path),
        artifact,
    }
}

fn run_response(
    config: &LauncherConfig,
    run: RunRecord,
    artifacts: Vec<ArtifactRecord>,
    presentation: Option<&PresentationRecord>,
) -> RunResponse {
    RunResponse {
        run,
        artifacts: artifacts
            .into_iter()
            .map(|a| artifact_view(config, a))
            .collect(),
        presentation_id: presentation.map(|p| p.presentation_id),
        presentation_url: presentation.map(|p| format!("/presentations/{}", p.presentation_id)),
    }
}

pub async fn healthz(
    State(state): State<LauncherApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<HealthResponse>>, ApiError> {
    let rid = request_id(&headers);
    let templates = state
        .repo
        .list_templates()
        .map_err(|e| ApiError::launcher(e, &rid))?;
    let themes = state
        .repo
        .list_themes()
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(
        rid,
        HealthResponse {
            status: "ok",
            templates: templates.len(),
            themes: themes.len(),
        },
    ))
}

pub async fn list_tools(
    State(state): State<LauncherApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<ToolListResponse>>, ApiError> {
    let rid = request_id(&headers);
    let tools = state
        .repo
        .list_tools(false)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, ToolListResponse { tools }))
}

pub async fn start_run(
    State(state): State<LauncherApiState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ApiEnvelope<RunResponse>>, ApiError> {
    let rid = request_id(&headers);
    let (upload, user) = read_upload(&mut multipart, &rid).await?;
    tracing::info!(
        "launcher_run_request request_id={} tool={} has_upload={}",
        rid,
        slug,
        upload.is_some()
    );
    let outcome = state
        .orchestrator
        .start_run_for_slug(&slug, user, upload)
        .await
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(
        rid,
        run_response(
            &state.config,
            outcome.run,
            outcome.artifacts,
            outcome.presentation.as_ref(),
        ),
    ))
}

pub async fn list_runs(
    State(state): State<LauncherApiState>,
    headers: HeaderMap,
    query: Result<Query<ListRunsQuery>, QueryRejection>,
) -> Result<Json<ApiEnvelope<ListRunsResponse>>, ApiError> {
    let rid = request_id(&headers);
    let Query(query) = accepted(query, &rid)?;
    let limit = query.limit.unwrap_or(DEFAULT_RUN_PAGE).clamp(1, MAX_RUN_PAGE);
    let runs = state
        .repo
        .list_runs(limit, query.offset.unwrap_or(0))
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, ListRunsResponse { runs }))
}

fn load_run(state: &LauncherApiState, run_id: &str, rid: &str) -> Result<RunRecord, ApiError> {
    state
        .repo
        .get_run(&run_id.to_string())
        .map_err(|e| ApiError::launcher(e, rid))?
        .ok_or_else(|| {
            ApiError::not_found(format!("run {} not found", run_id)).with_request_id(rid.to_string())
        })
}

pub async fn get_run(
    State(state): State<LauncherApiState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<RunResponse>>, ApiError> {
    let rid = request_id(&headers);
    let run = load_run(&state, &run_id, &rid)?;
    let artifacts = state
        .repo
        .list_artifacts(&run.run_id)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    let presentation = state
        .repo
        .get_presentation_for_run(&run.run_id)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(
        rid,
        run_response(&state.config, run, artifacts, presentation.as_ref()),
    ))
}

/// Creates (or returns) the run's presentation and places its artifacts.
pub async fn assemble_run(
    State(state): State<LauncherApiState>,
    Path(run_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<AssembleResponse>>, ApiError> {
    let rid = request_id(&headers);
    let run = load_run(&state, &run_id, &rid)?;
    let presentation = state
        .assembler
        .get_or_create_presentation(&run)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    let summary = state
        .assembler
        .attach_artifacts(&presentation, &run)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(
        rid,
        AssembleResponse {
            presentation,
            items_attached: summary.inserted,
        },
    ))
}

pub async fn create_presentation(
    State(state): State<LauncherApiState>,
    headers: HeaderMap,
    req: Result<Json<CreatePresentationRequest>, JsonRejection>,
) -> Result<Json<ApiEnvelope<PresentationRecord>>, ApiError> {
    let rid = request_id(&headers);
    let Json(req) = accepted(req, &rid)?;
    let presentation = state
        .assembler
        .create_presentation(NewPresentation {
            title: req.title,
            description: req.description,
            creator: req.creator,
            run_id: None,
            template_key: req
                .template_key
                .unwrap_or_else(|| state.config.template_key.clone()),
            theme_key: req
                .theme_key
                .unwrap_or_else(|| state.config.theme_key.clone()),
        })
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, presentation))
}

pub async fn presentation_detail(
    State(state): State<LauncherApiState>,
    Path(presentation_id): Path<PresentationId>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<PresentationDetailResponse>>, ApiError> {
    let rid = request_id(&headers);
    let repo = state.repo.as_ref();
    let presentation = repo
        .get_presentation(presentation_id)
        .map_err(|e| ApiError::launcher(e, &rid))?
        .ok_or_else(|| {
            ApiError::not_found(format!("presentation {} not found", presentation_id))
                .with_request_id(rid.clone())
        })?;
    let template = repo
        .get_template(&presentation.template_key)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    let theme = repo
        .get_theme(&presentation.theme_key)
        .map_err(|e| ApiError::launcher(e, &rid))?;

    let mut slides = Vec::new();
    for slide in repo
        .list_slides(presentation_id)
        .map_err(|e| ApiError::launcher(e, &rid))?
    {
        let mut items = Vec::new();
        for item in repo
            .list_slide_items(slide.slide_id)
            .map_err(|e| ApiError::launcher(e, &rid))?
        {
            let artifact = repo
                .get_artifact(item.artifact_id)
                .map_err(|e| ApiError::launcher(e, &rid))?
                .map(|a| artifact_view(&state.config, a));
            items.push(SlideItemView { item, artifact });
        }
        slides.push(SlideView { slide, items });
    }

    Ok(envelope(
        rid,
        PresentationDetailResponse {
            html_url: format!("/presentations/{}", presentation_id),
            pdf_url: format!("/presentations/{}/export/pdf", presentation_id),
            pptx_url: format!("/presentations/{}/export/pptx", presentation_id),
            presentation,
            template,
            theme,
            slides,
        },
    ))
}

pub async fn add_slide(
    State(state): State<LauncherApiState>,
    Path(presentation_id): Path<PresentationId>,
    headers: HeaderMap,
    req: Result<Json<CreateSlideRequest>, JsonRejection>,
) -> Result<Json<ApiEnvelope<edalaunch_kernel::SlideRecord>>, ApiError> {
    let rid = request_id(&headers);
    let Json(req) = accepted(req, &rid)?;
    let slide = state
        .assembler
        .add_slide(presentation_id, &req.title)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, slide))
}

pub async fn add_slide_item(
    State(state): State<LauncherApiState>,
    Path(slide_id): Path<SlideId>,
    headers: HeaderMap,
    req: Result<Json<AddSlideItemRequest>, JsonRejection>,
) -> Result<Json<ApiEnvelope<edalaunch_kernel::SlideItemRecord>>, ApiError> {
    let rid = request_id(&headers);
    let Json(req) = accepted(req, &rid)?;
    let item = state
        .assembler
        .add_slide_item(
            slide_id,
            req.artifact_id,
            req.kind,
            req.display_config,
            req.added_by,
        )
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, item))
}

fn load_document(
    state: &LauncherApiState,
    presentation_id: PresentationId,
    rid: &str,
) -> Result<PresentationDocument, ApiError> {
    export::load_document(state.repo.as_ref(), &state.config, presentation_id)
        .map_err(|e| ApiError::launcher(e, rid))
}

pub async fn presentation_page(
    State(state): State<LauncherApiState>,
    Path(presentation_id): Path<PresentationId>,
    headers: HeaderMap,
    query: Result<Query<SlideQuery>, QueryRejection>,
) -> Result<Html<String>, ApiError> {
    let rid = request_id(&headers);
    let Query(query) = accepted(query, &rid)?;
    let doc = load_document(&state, presentation_id, &rid)?;
    let templates = state
        .repo
        .list_templates()
        .map_err(|e| ApiError::launcher(e, &rid))?;
    let themes = state
        .repo
        .list_themes()
        .map_err(|e| ApiError::launcher(e, &rid))?;
    let page = html::render_presentation_page(&doc, query.slide, &templates, &themes)
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(Html(page))
}

/// Applies the selected template/theme and returns to the presentation view.
pub async fn update_style(
    State(state): State<LauncherApiState>,
    Path(presentation_id): Path<PresentationId>,
    headers: HeaderMap,
    form: Result<Form<StyleForm>, FormRejection>,
) -> Result<Redirect, ApiError> {
    let rid = request_id(&headers);
    let Form(form) = accepted(form, &rid)?;
    let current = state
        .repo
        .get_presentation(presentation_id)
        .map_err(|e| ApiError::launcher(e, &rid))?
        .ok_or_else(|| {
            ApiError::not_found(format!("presentation {} not found", presentation_id))
                .with_request_id(rid.clone())
        })?;
    let template_key = form
        .template_key
        .filter(|k| !k.trim().is_empty())
        .unwrap_or(current.template_key);
    let theme_key = form
        .theme_key
        .filter(|k| !k.trim().is_empty())
        .unwrap_or(current.theme_key);
    let updated = state
        .repo
        .update_presentation_style(presentation_id, template_key.trim(), theme_key.trim())
        .map_err(|e| ApiError::launcher(e, &rid))?;
    tracing::info!(
        "presentation_style_updated request_id={} presentation_id={} template={} theme={}",
        rid,
        presentation_id,
        updated.template_key,
        updated.theme_key
    );
    Ok(Redirect::to(&format!("/presentations/{}", presentation_id)))
}

/// Reads the `file` and `user` fields of an upload form.
async fn read_upload(
    multipart: &mut Multipart,
    rid: &str,
) -> Result<(Option<UploadedFile>, Option<String>), ApiError> {
    let mut upload = None;
    let mut user = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::bad_request(format!("invalid multipart body: {}", e)).with_request_id(rid)
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("read upload: {}", e)).with_request_id(rid)
                })?;
                upload = Some(UploadedFile {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            Some("user") => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("read user field: {}", e)).with_request_id(rid)
                })?;
                let text = text.trim();
                if !text.is_empty() {
                    user = Some(text.to_string());
                }
            }
            _ => {}
        }
    }
    Ok((upload, user))
}

pub async fn launch_desktop(
    State(state): State<LauncherApiState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<DesktopLaunch>>, ApiError> {
    let rid = request_id(&headers);
    let launch = state
        .launcher
        .launch_desktop(&slug)
        .await
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, launch))
}

pub async fn launch_web(
    State(state): State<LauncherApiState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiEnvelope<WebLaunch>>, ApiError> {
    let rid = request_id(&headers);
    let launch = state
        .launcher
        .launch_web(&slug)
        .await
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, launch))
}

/// Stores an uploaded GDS and opens it in the desktop layout viewer.
pub async fn open_layout(
    State(state): State<LauncherApiState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ApiEnvelope<OpenedLayout>>, ApiError> {
    let rid = request_id(&headers);
    let (upload, _) = read_upload(&mut multipart, &rid).await?;
    let opened = state
        .launcher
        .open_layout(upload)
        .await
        .map_err(|e| ApiError::launcher(e, &rid))?;
    Ok(envelope(rid, opened))
}

pub async fn tool_workspace(
    State(state): State<LauncherApiState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    let rid = request_id(&headers);
    let tool = state
        .repo
        .get_tool_by_slug(&slug)
        .map_err(|e| ApiError::launcher(e, &rid))?
        .ok_or_else(|| {
            ApiError::not_found(format!("tool {} not found", slug)).with_request_id(rid.clone())
        })?;
    Ok(Html(html::render_tool_workspace(&tool)))
}

async fn render_blocking<F>(
    doc: PresentationDocument,
    rid: &str,
    render: F,
) -> Result<Vec<u8>, ApiError>
where
    F: FnOnce(&PresentationDocument) -> Result<Vec<u8>, LauncherError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || render(&doc))
        .await
        .map_err(|e| {
            ApiError::internal(format!("render task failed: {}", e)).with_request_id(rid.to_string())
        })?
        .map_err(|e| ApiError::launcher(e, rid))
}

fn download(content_type: &str, file_name: String, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub async fn export_pdf(
    State(state): State<LauncherApiState>,
    Path(presentation_id): Path<PresentationId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let doc = load_document(&state, presentation_id, &rid)?;
    let bytes = render_blocking(doc, &rid, pdf::render_pdf).await?;
    Ok(download(
        "application/pdf",
        format!("presentation-{}.pdf", presentation_id),
        bytes,
    ))
}

pub async fn export_pptx(
    State(state): State<LauncherApiState>,
    Path(presentation_id): Path<PresentationId>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let doc = load_document(&state, presentation_id, &rid)?;
    let bytes = render_blocking(doc, &rid, pptx::render_pptx).await?;
    Ok(download(
        PPTX_CONTENT_TYPE,
        format!("presentation-{}.pptx", presentation_id),
        bytes,
    ))
}

/// Serves a file under the media root. Only plain path segments are accepted.
pub async fn serve_media(
    State(state): State<LauncherApiState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let rid = request_id(&headers);
    let relative = media_relative_path(&path).ok_or_else(|| {
        ApiError::bad_request(format!("invalid media path: {}", path)).with_request_id(rid.clone())
    })?;
    let full = state.config.media_root.join(&relative);
    let not_found = || {
        ApiError::not_found(format!("media file {} not found", path)).with_request_id(rid.clone())
    };
    let file = match tokio::fs::File::open(&full).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => {
            return Err(
                ApiError::internal(format!("open media file: {}", e)).with_request_id(rid.clone())
            );
        }
    };
    let meta = file.metadata().await.map_err(|e| {
        ApiError::internal(format!("stat media file: {}", e)).with_request_id(rid.clone())
    })?;
    if !meta.is_file() {
        return Err(not_found());
    }
    Ok((
        [
            (header::CONTENT_TYPE, media_content_type(&relative).to_string()),
            (header::CONTENT_LENGTH, meta.len().to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

fn media_relative_path(raw: &str) -> Option<PathBuf> {
    let path = std::path::Path::new(raw);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            _ => return None,
        }
    }
    if out.as_os_str().is_empty() || raw.contains('\\') {
        return None;
    }
    Some(out)
}

fn media_content_type(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("json") => "application/json",
        Some("log") | Some("txt") | Some("v") | Some("vcd") | Some("py") | Some("cpp") => {
            "text/plain; charset=utf-8"
        }
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::util::ServiceExt;

    use edalaunch_bridge::{
        BridgeCommand, BridgeError, BridgeExecution, DetachedProcess, ProcessBridge,
    };
    use edalaunch_kernel::LauncherConfig;

    use super::{build_router, media_relative_path, LauncherApiState, PPTX_CONTENT_TYPE};
    use crate::seed::seed_reference_data;
    use crate::sqlite_repository::SqliteLauncherRepository;

    /// Writes the KLayout outputs into the working directory instead of running a tool.
    struct KlayoutStub;

    #[async_trait]
    impl ProcessBridge for KlayoutStub {
        async fn run(&self, command: &BridgeCommand) -> Result<BridgeExecution, BridgeError> {
            let dir = std::path::PathBuf::from(command.working_dir.clone().unwrap_or_default());
            image::RgbImage::from_pixel(6, 3, image::Rgb([200, 10, 10]))
                .save(dir.join("preview.png"))
                .map_err(|e| BridgeError::Io(e.to_string()))?;
            std::fs::write(
                dir.join("metadata.json"),
                r#"{"top_cell": "TOP", "cell_count": 2, "layers": [{"layer": 1, "datatype": 0, "name": "met1"}]}"#,
            )
            .map_err(|e| BridgeError::Io(e.to_string()))?;
            Ok(BridgeExecution {
                success: true,
                exit_code: Some(0),
                stdout: "done\n".into(),
                stderr: String::new(),
                duration_ms: 1,
                timed_out: false,
            })
        }

        async fn spawn_detached(
            &self,
            command: &BridgeCommand,
        ) -> Result<DetachedProcess, BridgeError> {
            Ok(DetachedProcess {
                pid: Some(7),
                command_line: command.command_line.clone(),
            })
        }
    }

    fn test_state() -> (LauncherApiState, std::path::PathBuf) {
        let root = std::env::temp_dir().join(format!("edalaunch-api-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        let repo = Arc::new(SqliteLauncherRepository::new(":memory:").unwrap());
        seed_reference_data(repo.as_ref()).unwrap();
        let state = LauncherApiState::new(
            repo,
            Arc::new(KlayoutStub),
            Arc::new(LauncherConfig::with_media_root(&root)),
        );
        (state, root)
    }

    fn upload_request(slug: &str, file: Option<&[u8]>) -> Request<Body> {
        let boundary = "edalaunch-boundary";
        let mut body = Vec::new();
        if let Some(bytes) = file {
            body.extend_from_slice(
                format!(
                    "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"chip.gds\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    b = boundary
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"user\"\r\n\r\nalice\r\n--{b}--\r\n",
                b = boundary
            )
            .as_bytes(),
        );
        Request::builder()
            .method(Method::POST)
            .uri(format!("/v1/tools/{}/runs", slug))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&body).expect("json")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn upload_run_and_export_path_works() {
        let (state, root) = test_state();
        let router = build_router(state);

        let resp = router
            .clone()
            .oneshot(upload_request("klayout", Some(b"GDSII")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["meta"]["status"], "ok");
        assert_eq!(json["data"]["run"]["status"], "success");
        assert_eq!(json["data"]["run"]["user"], "alice");
        let presentation_id = json["data"]["presentation_id"].as_i64().unwrap();
        let artifacts = json["data"]["artifacts"].as_array().unwrap();
        let preview = artifacts
            .iter()
            .find(|a| a["kind"] == "image")
            .expect("image artifact");
        assert!(preview["url"].as_str().unwrap().starts_with("/media/runs/"));

        let detail = json_body(
            router
                .clone()
                .oneshot(get(&format!("/v1/presentations/{}", presentation_id)))
                .await
                .unwrap(),
        )
        .await;
        let titles: Vec<&str> = detail["data"]["slides"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Layout View", "Metadata", "Logs"]);

        let pdf = router
            .clone()
            .oneshot(get(&format!("/presentations/{}/export/pdf", presentation_id)))
            .await
            .unwrap();
        assert_eq!(pdf.status(), StatusCode::OK);
        assert_eq!(pdf.headers()["content-type"], "application/pdf");
        let bytes = axum::body::to_bytes(pdf.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let pptx = router
            .clone()
            .oneshot(get(&format!("/presentations/{}/export/pptx", presentation_id)))
            .await
            .unwrap();
        assert_eq!(pptx.headers()["content-type"], PPTX_CONTENT_TYPE);

        let page = router
            .clone()
            .oneshot(get(&format!("/presentations/{}", presentation_id)))
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::OK);
        let html = axum::body::to_bytes(page.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&html).contains(preview["url"].as_str().unwrap()));

        let media = router
            .oneshot(get(preview["url"].as_str().unwrap()))
            .await
            .unwrap();
        assert_eq!(media.status(), StatusCode::OK);
        assert_eq!(media.headers()["content-type"], "image/png");
        let on_disk = std::fs::read(root.join(preview["file_path"].as_str().unwrap())).unwrap();
        assert_eq!(
            media.headers()["content-length"],
            on_disk.len().to_string().as_str()
        );
        let streamed = axum::body::to_bytes(media.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(streamed.as_ref(), on_disk.as_slice());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn missing_upload_is_bad_request_with_request_id() {
        let (state, root) = test_state();
        let router = build_router(state);
        let mut req = upload_request("klayout", None);
        req.headers_mut()
            .insert("x-request-id", "req-42".parse().unwrap());
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert_eq!(json["request_id"], "req-42");
        assert_eq!(json["error"]["code"], "invalid_argument");

        let runs = json_body(router.oneshot(get("/v1/runs")).await.unwrap()).await;
        assert!(runs["data"]["runs"].as_array().unwrap().is_empty());
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn unknown_tool_and_presentation_are_rejected() {
        let (state, root) = test_state();
        let router = build_router(state);
        let resp = router
            .clone()
            .oneshot(upload_request("spice", Some(b"x")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = router
            .clone()
            .oneshot(get("/presentations/999/export/pdf"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = router.oneshot(get("/v1/runs/nope")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn style_form_updates_and_redirects() {
        let (state, root) = test_state();
        let router = build_router(state);
        let create = Request::builder()
            .method(Method::POST)
            .uri("/v1/presentations")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({ "title": "Tapeout review" }).to_string(),
            ))
            .unwrap();
        let created = json_body(router.clone().oneshot(create).await.unwrap()).await;
        let id = created["data"]["presentation_id"].as_i64().unwrap();

        for _ in 0..2 {
            let req = Request::builder()
                .method(Method::POST)
                .uri(format!("/presentations/{}/style", id))
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("template_key=executive&theme_key=light"))
                .unwrap();
            let resp = router.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        }
        let detail = json_body(
            router
                .clone()
                .oneshot(get(&format!("/v1/presentations/{}", id)))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(detail["data"]["presentation"]["template_key"], "executive");
        assert_eq!(detail["data"]["presentation"]["theme_key"], "light");

        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/presentations/{}/style", id))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("theme_key=neon"))
            .unwrap();
        assert_eq!(
            router.oneshot(req).await.unwrap().status(),
            StatusCode::BAD_REQUEST
        );
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn healthz_reports_reference_data() {
        let (state, root) = test_state();
        let json = json_body(build_router(state).oneshot(get("/healthz")).await.unwrap()).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["templates"], 4);
        assert_eq!(json["data"]["themes"], 3);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn media_paths_reject_traversal() {
        assert!(media_relative_path("runs/a/preview.png").is_some());
        assert!(media_relative_path("../secret").is_none());
        assert!(media_relative_path("runs/../../etc/passwd").is_none());
        assert!(media_relative_path("/etc/passwd").is_none());
        assert!(media_relative_path("runs\\..\\x").is_none());
        assert!(media_relative_path("").is_none());
    }

    #[tokio::test]
    async fn media_directories_and_missing_files_are_not_found() {
        let (state, root) = test_state();
        std::fs::create_dir_all(root.join("runs/empty")).unwrap();
        let router = build_router(state);
        let resp = router.clone().oneshot(get("/media/runs/empty")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = router.oneshot(get("/media/runs/nope.png")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(resp).await["error"]["code"], "not_found");
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn malformed_query_and_body_use_error_envelope() {
        let (state, root) = test_state();
        let router = build_router(state);
        let create = Request::builder()
            .method(Method::POST)
            .uri("/v1/presentations")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"title": "Review"}"#))
            .unwrap();
        let created = json_body(router.clone().oneshot(create).await.unwrap()).await;
        let id = created["data"]["presentation_id"].as_i64().unwrap();

        let mut req = get(&format!("/presentations/{}?slide=abc", id));
        req.headers_mut()
            .insert("x-request-id", "req-slide".parse().unwrap());
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert_eq!(json["request_id"], "req-slide");
        assert_eq!(json["error"]["code"], "invalid_argument");

        let resp = router.clone().oneshot(get("/v1/runs?limit=many")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "invalid_argument");

        let broken = Request::builder()
            .method(Method::POST)
            .uri("/v1/presentations")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = router.oneshot(broken).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"]["code"], "invalid_argument");
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn desktop_and_web_launch_routes() {
        let (state, root) = test_state();
        let router = build_router(state);
        let launch = Request::builder()
            .method(Method::POST)
            .uri("/v1/tools/klayout/launch-desktop")
            .body(Body::empty())
            .unwrap();
        let resp = router.clone().oneshot(launch).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["data"]["process"]["command_line"], "/usr/bin/klayout -e");
        assert_eq!(json["data"]["process"]["pid"], 7);

        let web = json_body(
            router
                .clone()
                .oneshot(get("/v1/tools/verilator/launch-web"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(web["data"]["url"], "/tools/verilator?mode=web");

        let resp = router
            .clone()
            .oneshot(get("/v1/tools/magic/launch-web"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = json_body(resp).await;
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("No web mode"));

        let page = router
            .clone()
            .oneshot(get("/tools/klayout?mode=web"))
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::OK);
        let resp = router.oneshot(get("/tools/spice")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        std::fs::remove_dir_all(&root).ok();
    }

    #[tokio::test]
    async fn open_layout_route_stores_and_launches() {
        let (state, root) = test_state();
        let router = build_router(state);
        let mut req = upload_request("klayout", Some(b"GDSII"));
        *req.uri_mut() = "/v1/klayout/open".parse().unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        let file_path = json["data"]["file_path"].as_str().unwrap();
        assert!(file_path.starts_with("uploads/klayout/"));
        assert!(root.join(file_path).is_file());
        assert!(json["data"]["process"]["command_line"]
            .as_str()
            .unwrap()
            .starts_with("/usr/bin/klayout "));

        let mut req = upload_request("klayout", None);
        *req.uri_mut() = "/v1/klayout/open".parse().unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        std::fs::remove_dir_all(&root).ok();
    }
}
