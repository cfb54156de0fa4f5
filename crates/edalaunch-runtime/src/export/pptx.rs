//! PPTX export: a minimal OOXML package with a title slide followed by one
//! slide per presentation slide.
//!
//! Parts are written in a fixed order with a fixed timestamp so the same
//! presentation always produces the same bytes.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use edalaunch_kernel::LauncherError;

use super::{truncate_chars, DocumentSlide, ItemContent, PresentationDocument};

/// Characters of text placed in a single text box.
pub const TEXT_BOX_CHAR_LIMIT: usize = 3000;

const SLIDE_CX: i64 = 12_192_000;
const SLIDE_CY: i64 = 6_858_000;
const MARGIN_X: i64 = 457_200;
const TITLE_Y: i64 = 228_600;
const TITLE_CY: i64 = 914_400;
const BODY_TOP: i64 = 1_280_160;
const BODY_BOTTOM: i64 = SLIDE_CY - 365_760;
const BODY_CX: i64 = SLIDE_CX - 2 * MARGIN_X;
/// Pictures are placed at this width; height follows the aspect ratio.
const PICTURE_CX: i64 = 6_096_000;
const ITEM_GAP: i64 = 91_440;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Slide colours derived from the presentation theme key.
#[derive(Clone, Copy, Debug)]
struct Palette {
    background: &'static str,
    text: &'static str,
    accent: &'static str,
}

impl Palette {
    fn for_theme(theme_key: &str) -> Self {
        match theme_key {
            "light" => Palette {
                background: "FFFFFF",
                text: "1D2330",
                accent: "2F5597",
            },
            "blueprint" => Palette {
                background: "0B3D91",
                text: "E8F0FF",
                accent: "9CC3FF",
            },
            _ => Palette {
                background: "11151C",
                text: "E6E9EF",
                accent: "5AA9E6",
            },
        }
    }
}

struct MediaPart {
    rel_id: String,
    file_name: String,
    bytes: Vec<u8>,
}

struct SlidePart {
    xml: String,
    media: Vec<MediaPart>,
}

/// Renders the presentation as a `.pptx` package.
pub fn render_pptx(doc: &PresentationDocument) -> Result<Vec<u8>, LauncherError> {
    let palette = Palette::for_theme(&doc.presentation.theme_key);
    let mut slides = vec![title_slide(doc, palette)];
    let mut media_count = 0usize;
    for slide in &doc.slides {
        slides.push(content_slide(slide, palette, &mut media_count));
    }

    let mut package = Package::new();
    package.add("[Content_Types].xml", content_types(slides.len()))?;
    package.add("_rels/.rels", root_rels())?;
    package.add("docProps/app.xml", app_props(slides.len()))?;
    package.add("docProps/core.xml", core_props(doc))?;
    package.add("ppt/presentation.xml", presentation_xml(slides.len()))?;
    package.add(
        "ppt/_rels/presentation.xml.rels",
        presentation_rels(slides.len()),
    )?;
    package.add("ppt/slideMasters/slideMaster1.xml", slide_master(palette))?;
    package.add(
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        relationships(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("rId2", "theme", "../theme/theme1.xml"),
        ]),
    )?;
    package.add("ppt/slideLayouts/slideLayout1.xml", slide_layout())?;
    package.add(
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    )?;
    package.add("ppt/theme/theme1.xml", theme_xml(palette))?;

    for (index, slide) in slides.iter().enumerate() {
        let number = index + 1;
        package.add(&format!("ppt/slides/slide{}.xml", number), slide.xml.clone())?;
        let mut rels = vec![(
            "rId1".to_string(),
            "slideLayout".to_string(),
            "../slideLayouts/slideLayout1.xml".to_string(),
        )];
        for media in &slide.media {
            rels.push((
                media.rel_id.clone(),
                "image".to_string(),
                format!("../media/{}", media.file_name),
            ));
        }
        let rels: Vec<(&str, &str, &str)> = rels
            .iter()
            .map(|(id, kind, target)| (id.as_str(), kind.as_str(), target.as_str()))
            .collect();
        package.add(
            &format!("ppt/slides/_rels/slide{}.xml.rels", number),
            relationships(&rels),
        )?;
    }
    for slide in &slides {
        for media in &slide.media {
            package.add_bytes(&format!("ppt/media/{}", media.file_name), &media.bytes)?;
        }
    }

    let bytes = package.finish()?;
    tracing::info!(
        "pptx_rendered presentation_id={} slides={} images={} bytes={}",
        doc.presentation.presentation_id,
        slides.len(),
        media_count,
        bytes.len()
    );
    Ok(bytes)
}

struct Package {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
}

impl Package {
    fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .last_modified_time(zip::DateTime::default()),
        }
    }

    fn add(&mut self, name: &str, xml: String) -> Result<(), LauncherError> {
        self.add_bytes(name, xml.as_bytes())
    }

    fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<(), LauncherError> {
        self.writer
            .start_file(name, self.options)
            .map_err(|e| LauncherError::Render(format!("start pptx part {}: {}", name, e)))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| LauncherError::Render(format!("write pptx part {}: {}", name, e)))
    }

    fn finish(self) -> Result<Vec<u8>, LauncherError> {
        self.writer
            .finish()
            .map(Cursor::into_inner)
            .map_err(|e| LauncherError::Render(format!("finish pptx package: {}", e)))
    }
}

fn title_slide(doc: &PresentationDocument, palette: Palette) -> SlidePart {
    let mut subtitle = Vec::new();
    if let Some(source) = doc.source_line() {
        subtitle.push(source);
    }
    if let Some(run) = &doc.run {
        subtitle.push(format!("Tool: {}", run.tool_slug));
    }
    if let Some(description) = &doc.presentation.description {
        subtitle.push(description.clone());
    }
    subtitle.push(format!(
        "Template: {}  Theme: {}",
        doc.presentation.template_key, doc.presentation.theme_key
    ));

    let shapes = vec![
        text_shape(
            2,
            "Title",
            (MARGIN_X, SLIDE_CY / 3, BODY_CX, TITLE_CY),
            &[doc.presentation.title.clone()],
            3600,
            true,
            palette.accent,
        ),
        text_shape(
            3,
            "Subtitle",
            (MARGIN_X, SLIDE_CY / 3 + TITLE_CY, BODY_CX, TITLE_CY * 2),
            &subtitle,
            1600,
            false,
            palette.text,
        ),
    ];
    SlidePart {
        xml: slide_xml(palette, &shapes.concat()),
        media: Vec::new(),
    }
}

fn content_slide(slide: &DocumentSlide, palette: Palette, media_count: &mut usize) -> SlidePart {
    let mut shapes = vec![text_shape(
        2,
        "Title",
        (MARGIN_X, TITLE_Y, BODY_CX, TITLE_CY),
        &[slide.slide.title.clone()],
        2800,
        true,
        palette.accent,
    )];
    let mut media = Vec::new();
    let mut shape_id = 3u32;
    let mut y = BODY_TOP;

    if slide.items.is_empty() {
        shapes.push(text_shape(
            shape_id,
            "Empty",
            (MARGIN_X, y, BODY_CX, TITLE_CY),
            &["No artifacts on this slide.".to_string()],
            1400,
            false,
            palette.text,
        ));
    }

    let total = slide.items.len() as i64;
    for (index, item) in slide.items.iter().enumerate() {
        let remaining_items = (total - index as i64).max(1);
        let share = ((BODY_BOTTOM - y) / remaining_items).max(TITLE_CY / 2);
        match &item.content {
            ItemContent::Image { path, .. } => match png_bytes(path) {
                Ok((bytes, width, height)) => {
                    *media_count += 1;
                    let rel_id = format!("rId{}", media.len() + 2);
                    let mut cx = PICTURE_CX;
                    let mut cy = PICTURE_CX * height as i64 / width as i64;
                    let available = (BODY_BOTTOM - y).max(TITLE_CY);
                    if cy > available {
                        cy = available;
                        cx = cy * width as i64 / height as i64;
                    }
                    shapes.push(picture_shape(
                        shape_id,
                        &item.artifact.name,
                        &rel_id,
                        (MARGIN_X, y, cx, cy),
                    ));
                    media.push(MediaPart {
                        rel_id,
                        file_name: format!("image{}.png", media_count),
                        bytes,
                    });
                    y += cy + ITEM_GAP;
                }
                Err(err) => {
                    tracing::warn!(
                        "pptx_image_skipped artifact_id={} error={}",
                        item.artifact.artifact_id,
                        err
                    );
                    shapes.push(text_shape(
                        shape_id,
                        &item.artifact.name,
                        (MARGIN_X, y, BODY_CX, TITLE_CY / 2),
                        &[format!("[unreadable image: {}]", item.artifact.file_path)],
                        1200,
                        false,
                        palette.text,
                    ));
                    y += TITLE_CY / 2 + ITEM_GAP;
                }
            },
            ItemContent::Text { text, summary } => {
                let mut lines: Vec<String> = summary.clone();
                lines.extend(
                    truncate_chars(text, TEXT_BOX_CHAR_LIMIT)
                        .lines()
                        .map(str::to_string),
                );
                shapes.push(text_shape(
                    shape_id,
                    &item.artifact.name,
                    (MARGIN_X, y, BODY_CX, share),
                    &lines,
                    1000,
                    false,
                    palette.text,
                ));
                y += share + ITEM_GAP;
            }
            ItemContent::Missing { placeholder } => {
                shapes.push(text_shape(
                    shape_id,
                    &item.artifact.name,
                    (MARGIN_X, y, BODY_CX, TITLE_CY / 2),
                    &[placeholder.clone()],
                    1200,
                    false,
                    palette.text,
                ));
                y += TITLE_CY / 2 + ITEM_GAP;
            }
        }
        shape_id += 1;
    }

    SlidePart {
        xml: slide_xml(palette, &shapes.concat()),
        media,
    }
}

/// Re-encodes an image as PNG and returns it with its pixel size.
fn png_bytes(path: &std::path::Path) -> Result<(Vec<u8>, u32, u32), String> {
    let decoded = image::open(path).map_err(|e| e.to_string())?;
    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err("empty image".to_string());
    }
    let mut out = Cursor::new(Vec::new());
    decoded
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok((out.into_inner(), width, height))
}

/// XML text content: control characters other than tab are dropped, the rest escaped.
fn xml_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect();
    escape(cleaned.as_str()).into_owned()
}

fn slide_xml(palette: Palette, shapes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}"><p:cSld><p:bg><p:bgPr><a:solidFill><a:srgbClr val="{bg}"/></a:solidFill><a:effectLst/></p:bgPr></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>{shapes}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sld>"#,
        a = NS_A,
        r = NS_R,
        p = NS_P,
        bg = palette.background,
        shapes = shapes
    )
}

fn text_shape(
    id: u32,
    name: &str,
    (x, y, cx, cy): (i64, i64, i64, i64),
    lines: &[String],
    size: u32,
    bold: bool,
    color: &str,
) -> String {
    let mut paragraphs = String::new();
    for line in lines {
        if line.is_empty() {
            paragraphs.push_str(&format!(
                r#"<a:p><a:endParaRPr lang="en-US" sz="{}"/></a:p>"#,
                size
            ));
            continue;
        }
        paragraphs.push_str(&format!(
            r#"<a:p><a:r><a:rPr lang="en-US" sz="{}" b="{}" dirty="0"><a:solidFill><a:srgbClr val="{}"/></a:solidFill></a:rPr><a:t>{}</a:t></a:r></a:p>"#,
            size,
            if bold { 1 } else { 0 },
            color,
            xml_text(line)
        ));
    }
    if paragraphs.is_empty() {
        paragraphs.push_str("<a:p/>");
    }
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="{name}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        id = id,
        name = xml_text(name),
        x = x,
        y = y,
        cx = cx,
        cy = cy,
        paragraphs = paragraphs
    )
}

fn picture_shape(id: u32, name: &str, rel_id: &str, (x, y, cx, cy): (i64, i64, i64, i64)) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="{name}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rel}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr><a:xfrm><a:off x="{x}" y="{y}"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        id = id,
        name = xml_text(name),
        rel = rel_id,
        x = x,
        y = y,
        cx = cx,
        cy = cy
    )
}

fn relationships(rels: &[(&str, &str, &str)]) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, kind, target) in rels {
        out.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
            id, REL_BASE, kind, target
        ));
    }
    out.push_str("</Relationships>");
    out
}

fn root_rels() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{base}/officeDocument" Target="ppt/presentation.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/><Relationship Id="rId3" Type="{base}/extended-properties" Target="docProps/app.xml"/></Relationships>"#,
        base = REL_BASE
    )
}

fn content_types(slide_count: usize) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/><Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml"/><Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml"/><Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/><Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/><Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
    );
    for number in 1..=slide_count {
        out.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#,
            number
        ));
    }
    out.push_str("</Types>");
    out
}

fn app_props(slide_count: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>edalaunch</Application><Slides>{}</Slides></Properties>"#,
        slide_count
    )
}

fn core_props(doc: &PresentationDocument) -> String {
    let created = doc
        .presentation
        .created_at
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><dc:title>{title}</dc:title><dc:creator>{creator}</dc:creator><dcterms:created xsi:type="dcterms:W3CDTF">{created}</dcterms:created></cp:coreProperties>"#,
        title = xml_text(&doc.presentation.title),
        creator = xml_text(doc.presentation.creator.as_deref().unwrap_or("edalaunch")),
        created = created
    )
}

fn presentation_xml(slide_count: usize) -> String {
    let mut slide_ids = String::new();
    for index in 0..slide_count {
        slide_ids.push_str(&format!(
            r#"<p:sldId id="{}" r:id="rId{}"/>"#,
            256 + index,
            index + 2
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentation xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{ids}</p:sldIdLst><p:sldSz cx="{cx}" cy="{cy}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        a = NS_A,
        r = NS_R,
        p = NS_P,
        ids = slide_ids,
        cx = SLIDE_CX,
        cy = SLIDE_CY
    )
}

fn presentation_rels(slide_count: usize) -> String {
    let mut rels: Vec<(String, &str, String)> = vec![(
        "rId1".to_string(),
        "slideMaster",
        "slideMasters/slideMaster1.xml".to_string(),
    )];
    for number in 1..=slide_count {
        rels.push((
            format!("rId{}", number + 1),
            "slide",
            format!("slides/slide{}.xml", number),
        ));
    }
    rels.push((
        format!("rId{}", slide_count + 2),
        "theme",
        "theme/theme1.xml".to_string(),
    ));
    let borrowed: Vec<(&str, &str, &str)> = rels
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    relationships(&borrowed)
}

fn slide_master(palette: Palette) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}"><p:cSld><p:bg><p:bgPr><a:solidFill><a:srgbClr val="{bg}"/></a:solidFill><a:effectLst/></p:bgPr></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst></p:sldMaster>"#,
        a = NS_A,
        r = NS_R,
        p = NS_P,
        bg = palette.background
    )
}

fn slide_layout() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="{a}" xmlns:r="{r}" xmlns:p="{p}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        a = NS_A,
        r = NS_R,
        p = NS_P
    )
}

fn theme_xml(palette: Palette) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="{a}" name="edalaunch"><a:themeElements><a:clrScheme name="edalaunch"><a:dk1><a:srgbClr val="000000"/></a:dk1><a:lt1><a:srgbClr val="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="{bg}"/></a:dk2><a:lt2><a:srgbClr val="{text}"/></a:lt2><a:accent1><a:srgbClr val="{accent}"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="4472C4"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="edalaunch"><a:majorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="edalaunch"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        a = NS_A,
        bg = palette.background,
        text = palette.text,
        accent = palette.accent
    )
}
