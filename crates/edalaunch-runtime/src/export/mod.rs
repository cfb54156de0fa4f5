//! Export renderers and the read path they share.
//!
//! Every renderer works from a [`PresentationDocument`]: the presentation, its
//! slides in `(order, id)` order, and each slide item with its artifact content
//! already resolved against the media root. Missing files turn into visible
//! placeholders here, so no renderer fails on them.

pub mod html;
pub mod metadata;
pub mod pdf;
pub mod pptx;

use std::path::PathBuf;

use edalaunch_kernel::{
    ArtifactRecord, LauncherConfig, LauncherError, PresentationId, PresentationRecord, RunRecord,
    SlideItemKind, SlideItemRecord, SlideRecord, TemplateRecord, ThemeRecord,
};

use self::metadata::LayoutMetadata;
use super::repository::LauncherRepository;

/// Bytes of a text artifact inlined into a rendered document.
pub const TEXT_INLINE_LIMIT: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub enum ItemContent {
    Image {
        path: PathBuf,
        url: String,
    },
    Text {
        text: String,
        /// Summary lines when the text is a layout metadata report.
        summary: Vec<String>,
    },
    Missing {
        placeholder: String,
    },
}

#[derive(Clone, Debug)]
pub struct DocumentItem {
    pub item: SlideItemRecord,
    pub artifact: ArtifactRecord,
    pub content: ItemContent,
}

#[derive(Clone, Debug)]
pub struct DocumentSlide {
    pub slide: SlideRecord,
    pub items: Vec<DocumentItem>,
}

#[derive(Clone, Debug)]
pub struct PresentationDocument {
    pub presentation: PresentationRecord,
    pub run: Option<RunRecord>,
    pub template: Option<TemplateRecord>,
    pub theme: Option<ThemeRecord>,
    pub slides: Vec<DocumentSlide>,
}

impl PresentationDocument {
    /// Layout variant, falling back to the template key.
    pub fn layout(&self) -> &str {
        self.template
            .as_ref()
            .map(|t| t.base_layout.as_str())
            .unwrap_or(self.presentation.template_key.as_str())
    }

    /// One-line description of the source run, if the presentation has one.
    pub fn source_line(&self) -> Option<String> {
        self.run.as_ref().map(|run| {
            format!(
                "{} run {} ({}), status {}",
                run.tool_slug,
                run.run_id,
                run.input_name,
                run.status.as_str()
            )
        })
    }
}

/// Loads a presentation with all slide content resolved.
pub fn load_document(
    repo: &dyn LauncherRepository,
    config: &LauncherConfig,
    presentation_id: PresentationId,
) -> Result<PresentationDocument, LauncherError> {
    let presentation = repo
        .get_presentation(presentation_id)?
        .ok_or_else(|| LauncherError::NotFound(format!("presentation {}", presentation_id)))?;
    let run = match &presentation.run_id {
        Some(run_id) => repo.get_run(run_id)?,
        None => None,
    };
    let template = repo.get_template(&presentation.template_key)?;
    let theme = repo.get_theme(&presentation.theme_key)?;

    let mut slides = Vec::new();
    for slide in repo.list_slides(presentation_id)? {
        let mut items = Vec::new();
        for item in repo.list_slide_items(slide.slide_id)? {
            let Some(artifact) = repo.get_artifact(item.artifact_id)? else {
                continue;
            };
            let content = resolve_content(config, &item, &artifact);
            items.push(DocumentItem {
                item,
                artifact,
                content,
            });
        }
        slides.push(DocumentSlide { slide, items });
    }
    Ok(PresentationDocument {
        presentation,
        run,
        template,
        theme,
        slides,
    })
}

fn resolve_content(
    config: &LauncherConfig,
    item: &SlideItemRecord,
    artifact: &ArtifactRecord,
) -> ItemContent {
    let path = config.resolve_media(&artifact.file_path);
    if !path.is_file() {
        return ItemContent::Missing {
            placeholder: missing_placeholder(artifact),
        };
    }
    match item.kind {
        SlideItemKind::Image => ItemContent::Image {
            url: config.media_url(&artifact.file_path),
            path,
        },
        SlideItemKind::LogSnippet | SlideItemKind::Attachment => match std::fs::read(&path) {
            Ok(bytes) => {
                let text = lossy_text(&bytes, TEXT_INLINE_LIMIT);
                let summary = LayoutMetadata::parse(&text)
                    .map(|meta| meta.summary_lines())
                    .unwrap_or_default();
                ItemContent::Text { text, summary }
            }
            Err(e) => {
                tracing::warn!(
                    "artifact_read_failed artifact_id={} path={} error={}",
                    artifact.artifact_id,
                    artifact.file_path,
                    e
                );
                ItemContent::Missing {
                    placeholder: missing_placeholder(artifact),
                }
            }
        },
    }
}

pub fn missing_placeholder(artifact: &ArtifactRecord) -> String {
    format!("[missing artifact: {}]", artifact.file_path)
}

/// Lossy UTF-8 of at most `limit` bytes, marking the cut.
pub fn lossy_text(bytes: &[u8], limit: usize) -> String {
    if bytes.len() <= limit {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    let mut text = String::from_utf8_lossy(&bytes[..limit]).into_owned();
    text.push_str(&format!("\n[truncated {} bytes]", bytes.len() - limit));
    text
}

/// At most `max_chars` characters of `text`, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n[truncated]", &text[..cut]),
        None => text.to_string(),
    }
}
