//! PDF export: one continuous document, a heading per slide, wrapped text and
//! embedded images scaled to the page width.

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use edalaunch_kernel::LauncherError;

use super::{DocumentItem, ItemContent, PresentationDocument};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 48;
const CONTENT_WIDTH: i64 = PAGE_WIDTH - 2 * MARGIN;
const TITLE_SIZE: i64 = 22;
const HEADING_SIZE: i64 = 16;
const FONT_NAME: &str = "F1";

/// Body text metrics for a template layout.
#[derive(Clone, Copy, Debug)]
struct BodyStyle {
    size: i64,
    line_height: i64,
    columns: usize,
}

impl BodyStyle {
    fn for_layout(layout: &str) -> Self {
        match layout {
            "executive" => BodyStyle {
                size: 12,
                line_height: 15,
                columns: 78,
            },
            _ => BodyStyle {
                size: 9,
                line_height: 12,
                columns: 100,
            },
        }
    }
}

#[derive(Default)]
struct PageBuilder {
    operations: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

struct PdfComposer {
    doc: Document,
    pages: Vec<PageBuilder>,
    cursor_y: i64,
    image_count: usize,
    body: BodyStyle,
}

impl PdfComposer {
    fn new(body: BodyStyle) -> Self {
        Self {
            doc: Document::with_version("1.5"),
            pages: vec![PageBuilder::default()],
            cursor_y: PAGE_HEIGHT - MARGIN,
            image_count: 0,
            body,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(PageBuilder::default());
        self.cursor_y = PAGE_HEIGHT - MARGIN;
    }

    fn current_page_is_empty(&self) -> bool {
        self.pages
            .last()
            .map(|p| p.operations.is_empty())
            .unwrap_or(true)
    }

    fn ensure_space(&mut self, height: i64) {
        if self.cursor_y - height < MARGIN && !self.current_page_is_empty() {
            self.new_page();
        }
    }

    fn push(&mut self, operation: Operation) {
        if let Some(page) = self.pages.last_mut() {
            page.operations.push(operation);
        }
    }

    fn text_line(&mut self, size: i64, line_height: i64, text: &str) {
        self.ensure_space(line_height);
        self.cursor_y -= line_height;
        let y = self.cursor_y;
        self.push(Operation::new("BT", vec![]));
        self.push(Operation::new("Tf", vec![FONT_NAME.into(), size.into()]));
        self.push(Operation::new("Td", vec![MARGIN.into(), y.into()]));
        self.push(Operation::new(
            "Tj",
            vec![Object::string_literal(pdf_safe_text(text))],
        ));
        self.push(Operation::new("ET", vec![]));
    }

    fn heading(&mut self, size: i64, text: &str) {
        self.ensure_space(size * 3);
        self.text_line(size, size + size / 2, text);
        self.cursor_y -= size / 2;
    }

    fn paragraph(&mut self, text: &str) {
        let body = self.body;
        for line in wrap_text(text, body.columns) {
            self.text_line(body.size, body.line_height, &line);
        }
    }

    fn gap(&mut self, height: i64) {
        self.cursor_y -= height;
    }

    /// Embeds a decoded image at the content width, shrunk to fit one page.
    fn image(&mut self, path: &Path) -> Result<(), String> {
        let decoded = image::open(path).map_err(|e| e.to_string())?.to_rgb8();
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err("empty image".to_string());
        }
        let max_height = PAGE_HEIGHT - 2 * MARGIN;
        let mut draw_w = CONTENT_WIDTH;
        let mut draw_h = draw_w * height as i64 / width as i64;
        if draw_h > max_height {
            draw_h = max_height;
            draw_w = draw_h * width as i64 / height as i64;
        }
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8i64,
            },
            decoded.into_raw(),
        );
        let image_id = self.doc.add_object(stream);
        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        self.ensure_space(draw_h);
        self.cursor_y -= draw_h;
        let y = self.cursor_y;
        self.push(Operation::new("q", vec![]));
        self.push(Operation::new(
            "cm",
            vec![
                draw_w.into(),
                0i64.into(),
                0i64.into(),
                draw_h.into(),
                MARGIN.into(),
                y.into(),
            ],
        ));
        self.push(Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]));
        self.push(Operation::new("Q", vec![]));
        if let Some(page) = self.pages.last_mut() {
            page.images.push((name, image_id));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, LauncherError> {
        let pages_id = self.doc.new_object_id();
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for page in std::mem::take(&mut self.pages) {
            let content = Content {
                operations: page.operations,
            };
            let encoded = content
                .encode()
                .map_err(|e| LauncherError::Render(format!("encode pdf content: {}", e)))?;
            let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));
            let mut xobjects = Dictionary::new();
            for (name, id) in page.images {
                xobjects.set(name, id);
            }
            let resources = dictionary! {
                "Font" => dictionary! { FONT_NAME => font_id },
                "XObject" => xobjects,
            };
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0i64.into(), 0i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| LauncherError::Render(format!("write pdf: {}", e)))?;
        Ok(out)
    }
}

/// Renders the whole presentation as one PDF.
pub fn render_pdf(doc: &PresentationDocument) -> Result<Vec<u8>, LauncherError> {
    let mut pdf = PdfComposer::new(BodyStyle::for_layout(doc.layout()));

    pdf.heading(TITLE_SIZE, &doc.presentation.title);
    if let Some(source) = doc.source_line() {
        pdf.paragraph(&source);
    }
    if let Some(description) = &doc.presentation.description {
        pdf.paragraph(description);
    }
    pdf.paragraph(&format!(
        "Template: {}  Theme: {}",
        doc.presentation.template_key, doc.presentation.theme_key
    ));

    for slide in &doc.slides {
        pdf.gap(HEADING_SIZE);
        pdf.heading(
            HEADING_SIZE,
            &format!("{}. {}", slide.slide.order, slide.slide.title),
        );
        if slide.items.is_empty() {
            pdf.paragraph("(no artifacts)");
        }
        for item in &slide.items {
            render_item(&mut pdf, item);
            pdf.gap(pdf.body.line_height);
        }
    }

    let pages = pdf.pages.len();
    let bytes = pdf.finish()?;
    tracing::info!(
        "pdf_rendered presentation_id={} pages={} bytes={}",
        doc.presentation.presentation_id,
        pages,
        bytes.len()
    );
    Ok(bytes)
}

fn render_item(pdf: &mut PdfComposer, item: &DocumentItem) {
    pdf.paragraph(&format!("{} ({})", item.artifact.name, item.artifact.file_path));
    match &item.content {
        ItemContent::Image { path, .. } => {
            if let Err(err) = pdf.image(path) {
                tracing::warn!(
                    "pdf_image_skipped artifact_id={} error={}",
                    item.artifact.artifact_id,
                    err
                );
                pdf.paragraph(&format!("[unreadable image: {}]", item.artifact.file_path));
            }
        }
        ItemContent::Text { text, summary } => {
            for line in summary {
                pdf.paragraph(&format!("- {}", line));
            }
            pdf.paragraph(text);
        }
        ItemContent::Missing { placeholder } => pdf.paragraph(placeholder),
    }
}

/// Printable ASCII only; Helvetica without an embedded font has no wider repertoire.
fn pdf_safe_text(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c,
            '\t' => ' ',
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap at `columns` characters; overlong words are split.
fn wrap_text(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    for raw in text.replace('\t', "    ").lines() {
        let mut line = String::new();
        let mut line_len = 0usize;
        for word in raw.split(' ') {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > columns {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(columns);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if line_len == 0 {
                word.len()
            } else {
                line_len + 1 + word.len()
            };
            if needed > columns {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line_len += word.len();
            line.extend(word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use edalaunch_kernel::{
        ArtifactKind, ArtifactRecord, PresentationRecord, SlideItemKind, SlideItemRecord,
        SlideRecord,
    };

    use super::{pdf_safe_text, render_pdf, wrap_text};
    use crate::export::{DocumentItem, DocumentSlide, ItemContent, PresentationDocument};

    fn item(kind: SlideItemKind, content: ItemContent) -> DocumentItem {
        DocumentItem {
            item: SlideItemRecord {
                item_id: 1,
                slide_id: 1,
                artifact_id: 1,
                kind,
                display_config: None,
                added_by: None,
                created_at: Utc::now(),
            },
            artifact: ArtifactRecord {
                artifact_id: 1,
                run_id: "r".into(),
                kind: ArtifactKind::Image,
                name: "Layout preview".into(),
                file_path: "runs/r/preview.png".into(),
                size_bytes: 1,
                sha256: String::new(),
                created_at: Utc::now(),
            },
            content,
        }
    }

    #[test]
    fn wraps_on_words_and_splits_long_tokens() {
        assert_eq!(wrap_text("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("one\n\ntwo", 10), vec!["one", "", "two"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn non_ascii_is_replaced() {
        assert_eq!(pdf_safe_text("µm (ok)\t"), "?m (ok) ");
    }

    #[test]
    fn renders_images_text_and_overflow_pages() {
        let dir = std::env::temp_dir().join(format!("edalaunch-pdf-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let png = dir.join("preview.png");
        image::RgbImage::from_pixel(8, 4, image::Rgb([10, 200, 30]))
            .save(&png)
            .unwrap();

        let long_log = (0..200)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let doc = PresentationDocument {
            presentation: PresentationRecord {
                presentation_id: 1,
                title: "Design Review".into(),
                description: None,
                creator: None,
                run_id: None,
                template_key: "standard".into(),
                theme_key: "dark".into(),
                created_at: Utc::now(),
            },
            run: None,
            template: None,
            theme: None,
            slides: vec![
                DocumentSlide {
                    slide: SlideRecord {
                        slide_id: 1,
                        presentation_id: 1,
                        title: "Layout View".into(),
                        order: 1,
                        created_at: Utc::now(),
                    },
                    items: vec![item(
                        SlideItemKind::Image,
                        ItemContent::Image {
                            path: png.clone(),
                            url: "/media/runs/r/preview.png".into(),
                        },
                    )],
                },
                DocumentSlide {
                    slide: SlideRecord {
                        slide_id: 2,
                        presentation_id: 1,
                        title: "Logs".into(),
                        order: 3,
                        created_at: Utc::now(),
                    },
                    items: vec![item(
                        SlideItemKind::LogSnippet,
                        ItemContent::Text {
                            text: long_log,
                            summary: vec![],
                        },
                    )],
                },
            ],
        };

        let bytes = render_pdf(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let parsed = lopdf::Document::load_mem(&bytes).unwrap();
        assert!(parsed.get_pages().len() >= 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
