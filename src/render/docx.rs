//! WordprocessingML package written from scratch with `quick-xml` and `zip`.
//!
//! Paragraph styles come from the text itself: known section titles (and
//! the current-visit prefix) become Heading1, current-visit sub-titles and
//! date lines in the previous-visits section become Heading2.

use std::io::{Cursor, Write};
use std::sync::LazyLock;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::RenderError;
use crate::config::PageGeometry;
use crate::document::{
    Block, DocumentModel, HeadingLevel, CURRENT_VISIT_PREFIX, SECTION_PREVIOUS_VISITS,
    SECTION_TITLES, SUBSECTION_TITLES,
};
use crate::growth::ChartImage;
use crate::models::OutputFormat;

pub const EMU_PER_POINT: u64 = 12_700;
const TWIPS_PER_POINT: f32 = 20.0;

const NS_MAIN: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_PACKAGE_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const STYLES_REL_ID: &str = "rId1";

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    const MONTH: &str = r"(?:jan|feb|mar|apr|may|jun|jul|aug|sep|sept|oct|nov|dec)[a-z]*\.?";
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid regex"),
        Regex::new(&format!(r"(?i)^{MONTH}\s+\d{{1,2}},\s*\d{{4}}$")).expect("valid regex"),
        Regex::new(&format!(r"(?i)^\d{{1,2}}\s+{MONTH}\s+\d{{4}}$")).expect("valid regex"),
    ]
});

/// `2024-10-01`, `Oct 1, 2024`, `1 oct 2024`.
pub fn is_date_line(line: &str) -> bool {
    let line = line.trim();
    DATE_PATTERNS.iter().any(|re| re.is_match(line))
}

// ═══════════════════════════════════════════════════════════
// Heading classification
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Title,
    Heading1,
    Heading2,
    Normal,
}

impl ParagraphStyle {
    fn style_id(self) -> Option<&'static str> {
        match self {
            ParagraphStyle::Title => Some("Title"),
            ParagraphStyle::Heading1 => Some("Heading1"),
            ParagraphStyle::Heading2 => Some("Heading2"),
            ParagraphStyle::Normal => None,
        }
    }
}

/// Tracks which top-level section the lines belong to.
#[derive(Debug, Default)]
pub struct HeadingClassifier {
    in_previous_visits: bool,
}

impl HeadingClassifier {
    pub fn classify(&mut self, line: &str) -> ParagraphStyle {
        let trimmed = line.trim();
        if SECTION_TITLES.contains(&trimmed) || trimmed.starts_with(CURRENT_VISIT_PREFIX) {
            self.in_previous_visits = trimmed == SECTION_PREVIOUS_VISITS;
            return ParagraphStyle::Heading1;
        }
        if SUBSECTION_TITLES.contains(&trimmed) {
            return ParagraphStyle::Heading2;
        }
        if self.in_previous_visits && is_date_line(trimmed) {
            return ParagraphStyle::Heading2;
        }
        ParagraphStyle::Normal
    }
}

// ═══════════════════════════════════════════════════════════
// XML helpers
// ═══════════════════════════════════════════════════════════

fn docx_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::encoding(OutputFormat::Docx, e)
}

struct Xml {
    writer: Writer<Vec<u8>>,
}

impl Xml {
    fn new() -> Result<Self, RenderError> {
        let mut xml = Self {
            writer: Writer::new(Vec::new()),
        };
        xml.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(xml)
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), RenderError> {
        self.writer.write_event(event).map_err(docx_error)
    }

    fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.event(Event::Start(el))
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), RenderError> {
        let mut el = BytesStart::new(name);
        for attr in attrs {
            el.push_attribute(*attr);
        }
        self.event(Event::Empty(el))
    }

    fn end(&mut self, name: &str) -> Result<(), RenderError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, text: &str) -> Result<(), RenderError> {
        self.event(Event::Text(BytesText::new(text)))
    }

    fn element(&mut self, name: &str, attrs: &[(&str, &str)], text: &str) -> Result<(), RenderError> {
        self.start(name, attrs)?;
        self.text(text)?;
        self.end(name)
    }

    fn finish(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

// ═══════════════════════════════════════════════════════════
// Fixed parts
// ═══════════════════════════════════════════════════════════

fn content_types_xml() -> Result<Vec<u8>, RenderError> {
    let mut x = Xml::new()?;
    x.start("Types", &[("xmlns", NS_CONTENT_TYPES)])?;
    x.empty(
        "Default",
        &[("Extension", "rels"), ("ContentType", "application/vnd.openxmlformats-package.relationships+xml")],
    )?;
    x.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    x.empty("Default", &[("Extension", "png"), ("ContentType", "image/png")])?;
    x.empty(
        "Override",
        &[
            ("PartName", "/word/document.xml"),
            (
                "ContentType",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
            ),
        ],
    )?;
    x.empty(
        "Override",
        &[
            ("PartName", "/word/styles.xml"),
            ("ContentType", "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"),
        ],
    )?;
    x.empty(
        "Override",
        &[
            ("PartName", "/docProps/core.xml"),
            ("ContentType", "application/vnd.openxmlformats-package.core-properties+xml"),
        ],
    )?;
    x.end("Types")?;
    Ok(x.finish())
}

fn relationships_xml(rels: &[(String, &str, String)]) -> Result<Vec<u8>, RenderError> {
    let mut x = Xml::new()?;
    x.start("Relationships", &[("xmlns", NS_PACKAGE_REL)])?;
    for (id, kind, target) in rels {
        x.empty(
            "Relationship",
            &[("Id", id.as_str()), ("Type", *kind), ("Target", target.as_str())],
        )?;
    }
    x.end("Relationships")?;
    Ok(x.finish())
}

fn package_rels_xml() -> Result<Vec<u8>, RenderError> {
    relationships_xml(&[
        ("rId1".to_string(), REL_OFFICE_DOCUMENT, "word/document.xml".to_string()),
        ("rId2".to_string(), REL_CORE, "docProps/core.xml".to_string()),
    ])
}

/// (style id, display name, half-points, bold)
const STYLES: &[(&str, &str, &str, bool)] = &[
    ("Normal", "Normal", "22", false),
    ("Title", "Title", "40", true),
    ("Heading1", "heading 1", "28", true),
    ("Heading2", "heading 2", "24", true),
];

fn styles_xml() -> Result<Vec<u8>, RenderError> {
    let mut x = Xml::new()?;
    x.start("w:styles", &[("xmlns:w", NS_MAIN)])?;
    for (id, name, size, bold) in STYLES {
        let default = if *id == "Normal" { "1" } else { "0" };
        x.start("w:style", &[("w:type", "paragraph"), ("w:styleId", *id), ("w:default", default)])?;
        x.empty("w:name", &[("w:val", *name)])?;
        if *id != "Normal" {
            x.empty("w:basedOn", &[("w:val", "Normal")])?;
            x.empty("w:next", &[("w:val", "Normal")])?;
            x.start("w:pPr", &[])?;
            x.empty("w:keepNext", &[])?;
            x.empty("w:spacing", &[("w:before", "240"), ("w:after", "120")])?;
            x.end("w:pPr")?;
        }
        x.start("w:rPr", &[])?;
        x.empty("w:rFonts", &[("w:ascii", "Calibri"), ("w:hAnsi", "Calibri"), ("w:cs", "Calibri")])?;
        if *bold {
            x.empty("w:b", &[])?;
        }
        x.empty("w:sz", &[("w:val", *size)])?;
        x.empty("w:szCs", &[("w:val", *size)])?;
        x.end("w:rPr")?;
        x.end("w:style")?;
    }
    x.end("w:styles")?;
    Ok(x.finish())
}

fn core_xml(doc: &DocumentModel) -> Result<Vec<u8>, RenderError> {
    let created = doc.generated_at.format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let mut x = Xml::new()?;
    x.start(
        "cp:coreProperties",
        &[
            (
                "xmlns:cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
            ),
            ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
            ("xmlns:dcterms", "http://purl.org/dc/terms/"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ],
    )?;
    x.element("dc:title", &[], &doc.title)?;
    if let Some(author) = &doc.author {
        x.element("dc:creator", &[], author)?;
    }
    x.element("dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], &created)?;
    x.element("dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], &created)?;
    x.end("cp:coreProperties")?;
    Ok(x.finish())
}

// ═══════════════════════════════════════════════════════════
// Document body
// ═══════════════════════════════════════════════════════════

/// A run of text, optionally bold.
struct Run<'a> {
    text: &'a str,
    bold: bool,
}

struct BodyWriter {
    x: Xml,
    classifier: HeadingClassifier,
    images: Vec<(String, String, ChartImage)>,
}

impl BodyWriter {
    fn paragraph(
        &mut self,
        style: ParagraphStyle,
        indent_twips: Option<u32>,
        runs: &[Run<'_>],
    ) -> Result<(), RenderError> {
        self.x.start("w:p", &[])?;
        if style.style_id().is_some() || indent_twips.is_some() {
            self.x.start("w:pPr", &[])?;
            if let Some(id) = style.style_id() {
                self.x.empty("w:pStyle", &[("w:val", id)])?;
            }
            if let Some(left) = indent_twips {
                let left = left.to_string();
                self.x.empty("w:ind", &[("w:left", left.as_str())])?;
            }
            self.x.end("w:pPr")?;
        }
        for run in runs {
            self.x.start("w:r", &[])?;
            if run.bold {
                self.x.start("w:rPr", &[])?;
                self.x.empty("w:b", &[])?;
                self.x.end("w:rPr")?;
            }
            for (i, line) in run.text.split('\n').enumerate() {
                if i > 0 {
                    self.x.empty("w:br", &[])?;
                }
                self.x.element("w:t", &[("xml:space", "preserve")], line)?;
            }
            self.x.end("w:r")?;
        }
        self.x.end("w:p")
    }

    /// Plain text line, styled by the classifier.
    fn line(&mut self, text: &str, indent: Option<u32>, bold: bool) -> Result<(), RenderError> {
        let style = self.classifier.classify(text);
        let bold = bold && style == ParagraphStyle::Normal;
        self.paragraph(style, indent, &[Run { text, bold }])
    }

    fn page_break(&mut self) -> Result<(), RenderError> {
        self.x.start("w:p", &[])?;
        self.x.start("w:r", &[])?;
        self.x.empty("w:br", &[("w:type", "page")])?;
        self.x.end("w:r")?;
        self.x.end("w:p")
    }

    fn image(&mut self, chart: &ChartImage) -> Result<(), RenderError> {
        let n = self.images.len() + 1;
        // rId1 is the styles part
        let rel_id = format!("rId{}", n + 1);
        let file = format!("chart{n}.png");
        let cx = ((chart.width_pt as f64) * EMU_PER_POINT as f64).round() as u64;
        let cy = ((chart.height_pt as f64) * EMU_PER_POINT as f64).round() as u64;
        let (cx, cy) = (cx.to_string(), cy.to_string());
        let id = n.to_string();

        self.paragraph(ParagraphStyle::Normal, None, &[Run { text: &chart.caption, bold: true }])?;

        let x = &mut self.x;
        x.start("w:p", &[])?;
        x.start("w:pPr", &[])?;
        x.empty("w:jc", &[("w:val", "center")])?;
        x.end("w:pPr")?;
        x.start("w:r", &[])?;
        x.start("w:drawing", &[])?;
        x.start("wp:inline", &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")])?;
        x.empty("wp:extent", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
        x.empty("wp:docPr", &[("id", id.as_str()), ("name", chart.caption.as_str())])?;
        x.start("wp:cNvGraphicFramePr", &[])?;
        x.empty("a:graphicFrameLocks", &[("noChangeAspect", "1")])?;
        x.end("wp:cNvGraphicFramePr")?;
        x.start("a:graphic", &[])?;
        x.start("a:graphicData", &[("uri", NS_PIC)])?;
        x.start("pic:pic", &[])?;
        x.start("pic:nvPicPr", &[])?;
        x.empty("pic:cNvPr", &[("id", id.as_str()), ("name", file.as_str())])?;
        x.empty("pic:cNvPicPr", &[])?;
        x.end("pic:nvPicPr")?;
        x.start("pic:blipFill", &[])?;
        x.empty("a:blip", &[("r:embed", rel_id.as_str())])?;
        x.start("a:stretch", &[])?;
        x.empty("a:fillRect", &[])?;
        x.end("a:stretch")?;
        x.end("pic:blipFill")?;
        x.start("pic:spPr", &[])?;
        x.start("a:xfrm", &[])?;
        x.empty("a:off", &[("x", "0"), ("y", "0")])?;
        x.empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
        x.end("a:xfrm")?;
        x.start("a:prstGeom", &[("prst", "rect")])?;
        x.empty("a:avLst", &[])?;
        x.end("a:prstGeom")?;
        x.end("pic:spPr")?;
        x.end("pic:pic")?;
        x.end("a:graphicData")?;
        x.end("a:graphic")?;
        x.end("wp:inline")?;
        x.end("w:drawing")?;
        x.end("w:r")?;
        x.end("w:p")?;

        self.images.push((rel_id, file, chart.clone()));
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<(), RenderError> {
        match block {
            Block::Heading {
                level: HeadingLevel::Title,
                text,
            } => self.paragraph(ParagraphStyle::Title, None, &[Run { text, bold: false }]),
            Block::Heading { text, .. } => self.line(text, None, true),
            Block::Paragraph(text) => self.line(text, None, false),
            Block::BulletList(items) => {
                for item in items {
                    self.paragraph(
                        ParagraphStyle::Normal,
                        Some(360),
                        &[Run { text: &format!("\u{2022} {item}"), bold: false }],
                    )?;
                }
                Ok(())
            }
            Block::KeyValue(fields) => {
                for (key, value) in fields {
                    self.paragraph(
                        ParagraphStyle::Normal,
                        None,
                        &[
                            Run { text: &format!("{key}: "), bold: true },
                            Run { text: value, bold: false },
                        ],
                    )?;
                }
                Ok(())
            }
            Block::GroupedLines(groups) => {
                for group in groups {
                    self.paragraph(ParagraphStyle::Normal, None, &[Run { text: &group.title, bold: true }])?;
                    for line in &group.lines {
                        self.paragraph(ParagraphStyle::Normal, Some(360), &[Run { text: line, bold: false }])?;
                    }
                }
                Ok(())
            }
            Block::Image(chart) => self.image(chart),
            Block::PageBreak => self.page_break(),
        }
    }
}

fn document_xml(
    doc: &DocumentModel,
    page: &PageGeometry,
) -> Result<(Vec<u8>, Vec<(String, String, ChartImage)>), RenderError> {
    let mut x = Xml::new()?;
    x.start(
        "w:document",
        &[
            ("xmlns:w", NS_MAIN),
            ("xmlns:r", NS_REL),
            ("xmlns:wp", NS_WP),
            ("xmlns:a", NS_A),
            ("xmlns:pic", NS_PIC),
        ],
    )?;
    x.start("w:body", &[])?;

    let mut body = BodyWriter {
        x,
        classifier: HeadingClassifier::default(),
        images: Vec::new(),
    };
    for block in doc.blocks() {
        body.block(block)?;
    }

    let twips = |pt: f32| ((pt * TWIPS_PER_POINT).round() as u32).to_string();
    let mut x = body.x;
    x.start("w:sectPr", &[])?;
    let (width, height) = (twips(page.width_pt), twips(page.height_pt));
    x.empty("w:pgSz", &[("w:w", width.as_str()), ("w:h", height.as_str())])?;
    let margin = twips(page.margin_pt);
    x.empty(
        "w:pgMar",
        &[
            ("w:top", margin.as_str()),
            ("w:right", margin.as_str()),
            ("w:bottom", margin.as_str()),
            ("w:left", margin.as_str()),
            ("w:header", "0"),
            ("w:footer", "0"),
            ("w:gutter", "0"),
        ],
    )?;
    x.end("w:sectPr")?;
    x.end("w:body")?;
    x.end("w:document")?;
    Ok((x.finish(), body.images))
}

// ═══════════════════════════════════════════════════════════
// Packaging
// ═══════════════════════════════════════════════════════════

fn packaging_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Packaging(e.to_string())
}

/// Build the `.docx` bytes. Every part sits at its archive-root path.
pub fn render_docx(doc: &DocumentModel, page: &PageGeometry) -> Result<Vec<u8>, RenderError> {
    let (document, images) = document_xml(doc, page)?;

    let mut rels = vec![(STYLES_REL_ID.to_string(), REL_STYLES, "styles.xml".to_string())];
    rels.extend(
        images
            .iter()
            .map(|(id, file, _)| (id.clone(), REL_IMAGE, format!("media/{file}"))),
    );

    let mut parts: Vec<(String, Vec<u8>, CompressionMethod)> = vec![
        ("[Content_Types].xml".into(), content_types_xml()?, CompressionMethod::Deflated),
        ("_rels/.rels".into(), package_rels_xml()?, CompressionMethod::Deflated),
        ("docProps/core.xml".into(), core_xml(doc)?, CompressionMethod::Deflated),
        ("word/document.xml".into(), document, CompressionMethod::Deflated),
        ("word/styles.xml".into(), styles_xml()?, CompressionMethod::Deflated),
        (
            "word/_rels/document.xml.rels".into(),
            relationships_xml(&rels)?,
            CompressionMethod::Deflated,
        ),
    ];
    for (_, file, chart) in images {
        parts.push((format!("word/media/{file}"), chart.png, CompressionMethod::Stored));
    }

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes, method) in &parts {
        let options = SimpleFileOptions::default().compression_method(*method);
        zip.start_file(name.as_str(), options).map_err(packaging_error)?;
        zip.write_all(bytes).map_err(packaging_error)?;
    }
    let cursor = zip.finish().map_err(packaging_error)?;
    tracing::debug!(parts = parts.len(), "DOCX package written");
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::{chart, well_report};
    use crate::document::build_document;
    use crate::growth::Indicator;
    use std::collections::HashMap;
    use std::io::Read;

    fn read_part(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Option<String> {
        let mut file = archive.by_name(name).ok()?;
        let mut out = String::new();
        file.read_to_string(&mut out).ok()?;
        Some(out)
    }

    fn package(charts: &[ChartImage]) -> zip::ZipArchive<Cursor<Vec<u8>>> {
        let doc = build_document(&well_report(), charts);
        let bytes = render_docx(&doc, &PageGeometry::default()).unwrap();
        zip::ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn parts_sit_at_archive_root() {
        let mut archive = package(&[]);
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        for expected in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/document.xml",
            "word/styles.xml",
            "word/_rels/document.xml.rels",
        ] {
            assert!(names.iter().any(|n| n == expected), "{expected} missing");
        }
        assert!(names.iter().all(|n| !n.starts_with('/') && !n.starts_with("./")));
        let core = read_part(&mut archive, "docProps/core.xml").unwrap();
        assert!(core.contains("<dc:creator>Sara Benali</dc:creator>"));
    }

    #[test]
    fn every_image_relationship_resolves() {
        let charts = [chart(Indicator::Weight), chart(Indicator::Length)];
        let charts: Vec<ChartImage> = charts
            .into_iter()
            .map(|mut c| {
                c.png = b"\x89PNG\r\n\x1a\nfake".to_vec();
                c
            })
            .collect();
        let mut archive = package(&charts);
        let document = read_part(&mut archive, "word/document.xml").unwrap();
        let rels = read_part(&mut archive, "word/_rels/document.xml.rels").unwrap();

        let rel_re = Regex::new(r#"Id="(rId\d+)" Type="[^"]+" Target="([^"]+)""#).unwrap();
        let targets: HashMap<String, String> = rel_re
            .captures_iter(&rels)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();

        let embed_re = Regex::new(r#"r:embed="(rId\d+)""#).unwrap();
        let embeds: Vec<String> = embed_re.captures_iter(&document).map(|c| c[1].to_string()).collect();
        assert_eq!(embeds.len(), 2);
        for id in embeds {
            let target = targets.get(&id).unwrap_or_else(|| panic!("{id} not in rels"));
            let path = format!("word/{target}");
            assert!(archive.by_name(&path).is_ok(), "{path} missing from archive");
        }
        assert!(targets.get(STYLES_REL_ID).is_some_and(|t| t == "styles.xml"));
    }

    #[test]
    fn image_extent_uses_emu_per_point() {
        let mut archive = package(&[chart(Indicator::Weight)]);
        let document = read_part(&mut archive, "word/document.xml").unwrap();
        let cx = (510.0 * EMU_PER_POINT as f64) as u64;
        assert!(document.contains(&format!(r#"<wp:extent cx="{cx}""#)));
    }

    #[test]
    fn headings_and_prior_visit_dates_are_promoted() {
        let mut archive = package(&[]);
        let document = read_part(&mut archive, "word/document.xml").unwrap();
        assert!(document.contains(
            r#"<w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t xml:space="preserve">Previous Visits</w:t>"#
        ));
        assert!(document.contains(
            r#"<w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t xml:space="preserve">2024-10-01</w:t>"#
        ));
        assert!(document.contains(r#"<w:pStyle w:val="Title"/>"#));
    }

    #[test]
    fn classifier_only_promotes_dates_under_previous_visits() {
        let mut c = HeadingClassifier::default();
        assert_eq!(c.classify("2024-10-01"), ParagraphStyle::Normal);
        assert_eq!(c.classify(SECTION_PREVIOUS_VISITS), ParagraphStyle::Heading1);
        assert_eq!(c.classify("2024-10-01"), ParagraphStyle::Heading2);
        assert_eq!(c.classify("Oct 1, 2024"), ParagraphStyle::Heading2);
        assert_eq!(c.classify("1 OCT 2024"), ParagraphStyle::Heading2);
        assert_eq!(c.classify("Well visit \u{2014} 9-month visit"), ParagraphStyle::Normal);
        assert_eq!(c.classify("Current Visit \u{2014} 12-month visit"), ParagraphStyle::Heading1);
        assert_eq!(c.classify("2024-10-01"), ParagraphStyle::Normal);
        assert_eq!(c.classify("Feeding"), ParagraphStyle::Heading2);
    }

    #[test]
    fn date_lines() {
        assert!(is_date_line("2025-01-01"));
        assert!(is_date_line("Jan 5, 2025"));
        assert!(is_date_line("sept 12, 2024"));
        assert!(is_date_line("12 December 2024"));
        assert!(!is_date_line("2025-01-01 follow-up"));
        assert!(!is_date_line("Problems: None"));
    }

    #[test]
    fn text_is_escaped() {
        let mut report = well_report();
        if let crate::models::VisitReport::Well(data) = &mut report {
            data.current.comments = Some("weight < 3rd & rising".into());
        }
        let doc = build_document(&report, &[]);
        let bytes = render_docx(&doc, &PageGeometry::default()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let document = read_part(&mut archive, "word/document.xml").unwrap();
        assert!(document.contains("weight &lt; 3rd &amp; rising"));
    }
}
