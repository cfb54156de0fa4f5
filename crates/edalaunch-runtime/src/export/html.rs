//! Interactive presentation view: one slide at a time with slide navigation
//! and the template/theme selector.

use quick_xml::escape::escape;

use edalaunch_kernel::{LauncherError, SlideId, TemplateRecord, ThemeRecord, ToolRecord};

use super::{DocumentItem, DocumentSlide, ItemContent, PresentationDocument};

const BASE_CSS: &str = r#"
body { margin: 0; font-family: "Segoe UI", Helvetica, Arial, sans-serif; }
header { padding: 16px 24px; }
header h1 { margin: 0 0 4px 0; font-size: 22px; }
header .source { font-size: 13px; opacity: 0.8; }
.shell { display: flex; min-height: calc(100vh - 80px); }
nav { width: 220px; padding: 16px; }
nav ol { list-style: none; margin: 0; padding: 0; }
nav li a { display: block; padding: 6px 8px; border-radius: 4px; text-decoration: none; color: inherit; }
nav li.active a { font-weight: bold; }
main { flex: 1; padding: 16px 24px; }
figure { margin: 0 0 16px 0; }
figure img { max-width: 100%; border-radius: 4px; }
pre.log { white-space: pre-wrap; word-break: break-word; padding: 12px; border-radius: 4px; max-height: 60vh; overflow: auto; font-size: 12px; }
ul.summary { margin: 0 0 8px 0; }
.placeholder { font-style: italic; opacity: 0.7; }
form.style { display: flex; gap: 8px; align-items: center; margin-top: 16px; }
.theme-dark { background: #11151c; color: #e6e9ef; }
.theme-dark nav, .theme-dark pre.log { background: #1b212c; }
.theme-dark nav li.active a { background: #2b3442; }
.theme-light { background: #ffffff; color: #1d2330; }
.theme-light nav, .theme-light pre.log { background: #f1f3f7; }
.theme-light nav li.active a { background: #dde3ee; }
.theme-blueprint { background: #0b3d91; color: #e8f0ff; }
.theme-blueprint nav, .theme-blueprint pre.log { background: #0a3377; }
.theme-blueprint nav li.active a { background: #1552b8; }
.layout-executive main { font-size: 18px; }
.layout-engineering pre.log { max-height: none; }
.layout-darkboard { background: #000000; }
"#;

/// Renders the interactive view with `selected` (default: first slide) open.
pub fn render_presentation_page(
    doc: &PresentationDocument,
    selected: Option<SlideId>,
    templates: &[TemplateRecord],
    themes: &[ThemeRecord],
) -> Result<String, LauncherError> {
    let current = match selected {
        Some(slide_id) => Some(
            doc.slides
                .iter()
                .find(|s| s.slide.slide_id == slide_id)
                .ok_or_else(|| {
                    LauncherError::NotFound(format!(
                        "slide {} in presentation {}",
                        slide_id, doc.presentation.presentation_id
                    ))
                })?,
        ),
        None => doc.slides.first(),
    };
    let presentation_id = doc.presentation.presentation_id;
    let theme_class = doc
        .theme
        .as_ref()
        .map(|t| t.css_class.clone())
        .unwrap_or_else(|| format!("theme-{}", doc.presentation.theme_key));

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!(
        "<title>{}</title>\n<style>{}</style>\n</head>\n",
        escape(&doc.presentation.title),
        BASE_CSS
    ));
    out.push_str(&format!(
        "<body class=\"{} layout-{}\">\n<header>\n<h1>{}</h1>\n",
        escape(&theme_class),
        escape(doc.layout()),
        escape(&doc.presentation.title)
    ));
    if let Some(source) = doc.source_line() {
        out.push_str(&format!("<div class=\"source\">{}</div>\n", escape(&source)));
    }
    if let Some(description) = &doc.presentation.description {
        out.push_str(&format!(
            "<div class=\"source\">{}</div>\n",
            escape(description)
        ));
    }
    out.push_str("</header>\n<div class=\"shell\">\n<nav>\n<ol>\n");
    for slide in &doc.slides {
        let active = current.map(|c| c.slide.slide_id) == Some(slide.slide.slide_id);
        out.push_str(&format!(
            "<li{}><a href=\"/presentations/{}?slide={}\">{}. {}</a></li>\n",
            if active { " class=\"active\"" } else { "" },
            presentation_id,
            slide.slide.slide_id,
            slide.slide.order,
            escape(&slide.slide.title)
        ));
    }
    out.push_str("</ol>\n");
    out.push_str(&style_form(doc, templates, themes));
    out.push_str(&format!(
        "<p><a href=\"/presentations/{id}/export/pdf\">Download PDF</a><br>\
         <a href=\"/presentations/{id}/export/pptx\">Download PPTX</a></p>\n",
        id = presentation_id
    ));
    out.push_str("</nav>\n<main>\n");
    match current {
        Some(slide) => out.push_str(&render_slide(slide)),
        None => out.push_str("<p class=\"placeholder\">This presentation has no slides.</p>\n"),
    }
    out.push_str("</main>\n</div>\n</body>\n</html>\n");
    Ok(out)
}

/// Browser workspace of a tool: batch upload form plus desktop launch buttons.
pub fn render_tool_workspace(tool: &ToolRecord) -> String {
    let slug = escape(&tool.slug);
    let mut out = String::new();
    out.push_str(&format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{} workspace</title><style>{}</style></head>\n",
        escape(&tool.name),
        BASE_CSS
    ));
    out.push_str("<body class=\"theme-dark\">\n");
    out.push_str(&format!(
        "<header><h1>{}</h1><div class=\"source\">{}</div></header>\n<main>\n",
        escape(&tool.name),
        escape(&tool.description)
    ));
    out.push_str(&format!(
        "<form class=\"run\" method=\"post\" action=\"/v1/tools/{slug}/runs\" enctype=\"multipart/form-data\">\n\
<input type=\"file\" name=\"file\" required>\n\
<input type=\"text\" name=\"user\" placeholder=\"user\">\n\
<button type=\"submit\">Run {name}</button>\n</form>\n",
        slug = slug,
        name = escape(&tool.name)
    ));
    if tool.slug == "klayout" {
        out.push_str(
            "<form class=\"open\" method=\"post\" action=\"/v1/klayout/open\" enctype=\"multipart/form-data\">\n\
<input type=\"file\" name=\"file\" required>\n\
<button type=\"submit\">Open in desktop viewer</button>\n</form>\n",
        );
    }
    out.push_str(&format!(
        "<form class=\"desktop\" method=\"post\" action=\"/v1/tools/{}/launch-desktop\">\n\
<button type=\"submit\">Launch desktop</button>\n</form>\n",
        slug
    ));
    out.push_str("</main>\n</body></html>\n");
    out
}

fn style_form(
    doc: &PresentationDocument,
    templates: &[TemplateRecord],
    themes: &[ThemeRecord],
) -> String {
    let mut out = format!(
        "<form class=\"style\" method=\"post\" action=\"/presentations/{}/style\">\n",
        doc.presentation.presentation_id
    );
    out.push_str("<select name=\"template_key\">\n");
    for template in templates {
        out.push_str(&option(
            &template.key,
            &template.name,
            template.key == doc.presentation.template_key,
        ));
    }
    out.push_str("</select>\n<select name=\"theme_key\">\n");
    for theme in themes {
        out.push_str(&option(
            &theme.key,
            &theme.name,
            theme.key == doc.presentation.theme_key,
        ));
    }
    out.push_str("</select>\n<button type=\"submit\">Apply</button>\n</form>\n");
    out
}

fn option(value: &str, label: &str, selected: bool) -> String {
    format!(
        "<option value=\"{}\"{}>{}</option>\n",
        escape(value),
        if selected { " selected" } else { "" },
        escape(label)
    )
}

fn render_slide(slide: &DocumentSlide) -> String {
    let mut out = format!(
        "<section class=\"slide\" data-slide-id=\"{}\">\n<h2>{}</h2>\n",
        slide.slide.slide_id,
        escape(&slide.slide.title)
    );
    if slide.items.is_empty() {
        out.push_str("<p class=\"placeholder\">No artifacts on this slide.</p>\n");
    }
    for item in &slide.items {
        out.push_str(&render_item(item));
    }
    out.push_str("</section>\n");
    out
}

fn render_item(item: &DocumentItem) -> String {
    let annotation = item
        .item
        .display_config
        .as_ref()
        .and_then(|cfg| cfg.get("annotation"))
        .and_then(|v| v.as_str());
    match &item.content {
        ItemContent::Image { url, .. } => format!(
            "<figure><img src=\"{}\" alt=\"{}\"><figcaption>{}</figcaption></figure>\n",
            escape(url),
            escape(&item.artifact.name),
            escape(annotation.unwrap_or(&item.artifact.name))
        ),
        ItemContent::Text { text, summary } => {
            let mut out = format!(
                "<div class=\"artifact\"><h3>{}</h3>\n",
                escape(annotation.unwrap_or(&item.artifact.name))
            );
            if !summary.is_empty() {
                out.push_str("<ul class=\"summary\">\n");
                for line in summary {
                    out.push_str(&format!("<li>{}</li>\n", escape(line)));
                }
                out.push_str("</ul>\n");
            }
            out.push_str(&format!("<pre class=\"log\">{}</pre></div>\n", escape(text)));
            out
        }
        ItemContent::Missing { placeholder } => {
            format!("<p class=\"placeholder\">{}</p>\n", escape(placeholder))
        }
    }
}
