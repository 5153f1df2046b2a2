//! PDF output via `printpdf`.
//!
//! Layout is a pure pass from blocks to positioned draw operations, so the
//! pagination can be inspected without producing bytes. Body and charts are
//! laid out separately, trimmed of empty pages, then concatenated.

use std::io::BufWriter;

use chrono::NaiveDateTime;
use printpdf::lopdf::{self, Object, StringFormat};
use printpdf::{
    BuiltinFont, CustomPdfConformance, Image, ImageTransform, IndirectFontRef, Mm, OffsetDateTime,
    PdfConformance, PdfDocument, PdfDocumentReference, PdfLayerIndex, PdfLayerReference,
    PdfPageIndex, Pt,
};
use sha2::{Digest, Sha256};

use super::RenderError;
use crate::config::PageGeometry;
use crate::document::{Block, DocumentModel, HeadingLevel};
use crate::growth::ChartImage;
use crate::models::OutputFormat;

const BODY_SIZE: f32 = 10.0;
const TITLE_SIZE: f32 = 18.0;
const SECTION_SIZE: f32 = 13.5;
const SUBSECTION_SIZE: f32 = 11.0;
const CAPTION_SIZE: f32 = 10.5;
const LINE_FACTOR: f32 = 1.35;
/// Mean Helvetica advance width as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;
const KEY_COLUMN: f32 = 150.0;
const INDENT: f32 = 14.0;
const MIN_IMAGE_HEIGHT: f32 = 72.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Regular,
    Bold,
}

/// One positioned drawing instruction. Coordinates are PDF points from the
/// bottom-left page corner.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        x: f32,
        y: f32,
        size: f32,
        face: Face,
        text: String,
    },
    Image {
        /// Position of the chart in document order.
        chart: usize,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaidOutPage {
    pub ops: Vec<DrawOp>,
}

impl LaidOutPage {
    /// Non-blank text or any image.
    pub fn has_content(&self) -> bool {
        self.ops.iter().any(|op| match op {
            DrawOp::Text { text, .. } => !text.trim().is_empty(),
            DrawOp::Image { .. } => true,
        })
    }
}

/// Greedy wrap on whitespace. `max_chars` comes from the mean glyph width, so
/// lines are an estimate of what fits between the margins.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

fn chars_per_line(width: f32, size: f32) -> usize {
    ((width / (size * AVG_CHAR_WIDTH)).floor() as usize).max(8)
}

// ═══════════════════════════════════════════════════════════
// Layout
// ═══════════════════════════════════════════════════════════

struct Layout<'a> {
    page: &'a PageGeometry,
    pages: Vec<LaidOutPage>,
    /// Distance already used below the top margin on the current page.
    cursor: f32,
    next_chart: usize,
}

impl<'a> Layout<'a> {
    fn new(page: &'a PageGeometry, first_chart: usize) -> Self {
        Self {
            page,
            pages: vec![LaidOutPage::default()],
            cursor: 0.0,
            next_chart: first_chart,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(LaidOutPage::default());
        self.cursor = 0.0;
    }

    fn remaining(&self) -> f32 {
        self.page.content_height() - self.cursor
    }

    fn ensure(&mut self, height: f32) {
        if height > self.remaining() && self.cursor > 0.0 {
            self.new_page();
        }
    }

    fn gap(&mut self, height: f32) {
        if self.cursor > 0.0 {
            self.cursor = (self.cursor + height).min(self.page.content_height());
        }
    }

    fn push_op(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }

    fn line(&mut self, indent: f32, size: f32, face: Face, text: &str) {
        let height = size * LINE_FACTOR;
        self.ensure(height);
        self.cursor += height;
        let y = self.page.height_pt - self.page.margin_pt - self.cursor + size * 0.3;
        self.push_op(DrawOp::Text {
            x: self.page.margin_pt + indent,
            y,
            size,
            face,
            text: text.to_string(),
        });
    }

    fn wrapped(&mut self, indent: f32, size: f32, face: Face, text: &str) {
        let max = chars_per_line(self.page.content_width() - indent, size);
        for raw_line in text.lines() {
            for line in wrap_text(raw_line, max) {
                self.line(indent, size, face, &line);
            }
        }
    }

    fn key_value(&mut self, key: &str, value: &str) {
        let key_width = KEY_COLUMN.min(self.page.content_width() / 2.0);
        let max = chars_per_line(self.page.content_width() - key_width, BODY_SIZE);
        let lines: Vec<String> = value.lines().flat_map(|l| wrap_text(l, max)).collect();
        let height = BODY_SIZE * LINE_FACTOR;
        for (i, line) in lines.iter().enumerate() {
            self.ensure(height);
            self.cursor += height;
            let y = self.page.height_pt - self.page.margin_pt - self.cursor + BODY_SIZE * 0.3;
            if i == 0 {
                self.push_op(DrawOp::Text {
                    x: self.page.margin_pt,
                    y,
                    size: BODY_SIZE,
                    face: Face::Bold,
                    text: format!("{key}:"),
                });
            }
            self.push_op(DrawOp::Text {
                x: self.page.margin_pt + key_width,
                y,
                size: BODY_SIZE,
                face: Face::Regular,
                text: line.clone(),
            });
        }
    }

    fn image(&mut self, chart: &ChartImage) {
        let caption_height = CAPTION_SIZE * LINE_FACTOR;
        if self.remaining() - caption_height < MIN_IMAGE_HEIGHT {
            self.new_page();
        }
        self.wrapped(0.0, CAPTION_SIZE, Face::Bold, &chart.caption);
        self.gap(4.0);

        let width_room = self.page.content_width();
        let height_room = self.remaining().max(0.0);
        let scale = (width_room / chart.width_pt)
            .min(height_room / chart.height_pt)
            .min(1.0)
            .max(0.0);
        let (width, height) = (chart.width_pt * scale, chart.height_pt * scale);
        let x = self.page.margin_pt + (width_room - width) / 2.0;
        self.cursor += height;
        let y = self.page.height_pt - self.page.margin_pt - self.cursor;
        let index = self.next_chart;
        self.next_chart += 1;
        self.push_op(DrawOp::Image {
            chart: index,
            x,
            y,
            width,
            height,
        });
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading { level, text } => {
                let (size, before) = match level {
                    HeadingLevel::Title => (TITLE_SIZE, 0.0),
                    HeadingLevel::Section => (SECTION_SIZE, 12.0),
                    HeadingLevel::Subsection => (SUBSECTION_SIZE, 6.0),
                };
                self.gap(before);
                // keep the heading with at least one following line
                self.ensure(size * LINE_FACTOR + BODY_SIZE * LINE_FACTOR * 2.0);
                self.wrapped(0.0, size, Face::Bold, text);
                self.gap(2.0);
            }
            Block::Paragraph(text) => {
                self.wrapped(0.0, BODY_SIZE, Face::Regular, text);
                self.gap(3.0);
            }
            Block::BulletList(items) => {
                for item in items {
                    let max = chars_per_line(self.page.content_width() - INDENT, BODY_SIZE);
                    for (i, line) in wrap_text(item, max).iter().enumerate() {
                        let text = if i == 0 { format!("\u{2022} {line}") } else { format!("  {line}") };
                        self.line(INDENT / 2.0, BODY_SIZE, Face::Regular, &text);
                    }
                }
                self.gap(3.0);
            }
            Block::KeyValue(fields) => {
                for (key, value) in fields {
                    self.key_value(key, value);
                }
                self.gap(3.0);
            }
            Block::GroupedLines(groups) => {
                for group in groups {
                    self.ensure(BODY_SIZE * LINE_FACTOR * 2.0);
                    self.wrapped(0.0, BODY_SIZE, Face::Bold, &group.title);
                    for line in &group.lines {
                        self.wrapped(INDENT, BODY_SIZE, Face::Regular, line);
                    }
                    self.gap(2.0);
                }
            }
            Block::Image(chart) => self.image(chart),
            Block::PageBreak => self.new_page(),
        }
    }
}

/// Lay out `blocks` into pages. `first_chart` numbers the images.
pub fn layout_blocks(blocks: &[Block], page: &PageGeometry, first_chart: usize) -> Vec<LaidOutPage> {
    let mut layout = Layout::new(page, first_chart);
    for block in blocks {
        layout.block(block);
    }
    layout.pages
}

fn trim_trailing(pages: &mut Vec<LaidOutPage>) {
    while pages.last().is_some_and(|p| !p.has_content()) {
        pages.pop();
    }
}

fn trim_leading(pages: &mut Vec<LaidOutPage>) {
    let first = pages.iter().position(LaidOutPage::has_content).unwrap_or(pages.len());
    pages.drain(..first);
}

/// Body pages lose empty pages at the end; chart pages at both ends.
pub fn join_pages(mut body: Vec<LaidOutPage>, mut charts: Vec<LaidOutPage>) -> Vec<LaidOutPage> {
    trim_trailing(&mut body);
    trim_leading(&mut charts);
    trim_trailing(&mut charts);
    body.extend(charts);
    body
}

/// Final page list for a document.
pub fn layout_document(doc: &DocumentModel, page: &PageGeometry) -> Vec<LaidOutPage> {
    let body_charts = doc
        .body
        .iter()
        .filter(|b| matches!(b, Block::Image(_)))
        .count();
    let body = layout_blocks(&doc.body, page, 0);
    let charts = layout_blocks(&doc.charts, page, body_charts);
    join_pages(body, charts)
}

// ═══════════════════════════════════════════════════════════
// Emission
// ═══════════════════════════════════════════════════════════

fn pdf_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::encoding(OutputFormat::Pdf, e)
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn draw_page(
    layer: &PdfLayerReference,
    page: &LaidOutPage,
    fonts: &Fonts,
    charts: &[&ChartImage],
) -> Result<(), RenderError> {
    for op in &page.ops {
        match op {
            DrawOp::Text { x, y, size, face, text } => {
                let font = match face {
                    Face::Regular => &fonts.regular,
                    Face::Bold => &fonts.bold,
                };
                layer.use_text(text.as_str(), *size, Mm::from(Pt(*x)), Mm::from(Pt(*y)), font);
            }
            DrawOp::Image { chart, x, y, width, .. } => {
                let chart = charts
                    .get(*chart)
                    .ok_or_else(|| pdf_error(format!("missing chart #{chart}")))?;
                place_image(layer, chart, *x, *y, *width)?;
            }
        }
    }
    Ok(())
}

/// Identity and timestamps written into a file. Both derive from the content,
/// so rendering the same document twice yields the same bytes.
pub(super) struct PdfStamp {
    id: String,
    created: OffsetDateTime,
}

impl PdfStamp {
    pub(super) fn new(
        title: &str,
        author: Option<&str>,
        generated_at: NaiveDateTime,
        part: &str,
    ) -> Result<Self, RenderError> {
        let mut hasher = Sha256::new();
        for field in [title, author.unwrap_or_default(), part] {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update(generated_at.format("%Y-%m-%dT%H:%M:%S").to_string().as_bytes());
        let digest = hasher.finalize();
        let created = OffsetDateTime::from_unix_timestamp(generated_at.and_utc().timestamp())
            .map_err(pdf_error)?;
        Ok(Self {
            id: hex::encode_upper(&digest[..16]),
            created,
        })
    }

    pub(super) fn for_document(doc: &DocumentModel) -> Result<Self, RenderError> {
        Self::new(&doc.title, doc.author.as_deref(), doc.generated_at, "report")
    }
}

/// A document with one page of the given size, no XMP packet, and dates
/// taken from the stamp.
pub(super) fn stamped_document(
    title: &str,
    width: Mm,
    height: Mm,
    stamp: &PdfStamp,
) -> (PdfDocumentReference, PdfPageIndex, PdfLayerIndex) {
    let (pdf, page, layer) = PdfDocument::new(title, width, height, "Layer 1");
    let pdf = pdf
        .with_conformance(PdfConformance::Custom(CustomPdfConformance {
            requires_xmp_metadata: false,
            requires_icc_profile: false,
            ..Default::default()
        }))
        .with_document_id(stamp.id.clone())
        .with_creation_date(stamp.created)
        .with_mod_date(stamp.created)
        .with_metadata_date(stamp.created);
    (pdf, page, layer)
}

pub(super) fn save(doc: PdfDocumentReference, stamp: &PdfStamp) -> Result<Vec<u8>, RenderError> {
    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf).map_err(pdf_error)?;
    let bytes = buf.into_inner().map_err(pdf_error)?;

    // printpdf writes a fresh random pair into the trailer /ID on every save
    let mut saved = lopdf::Document::load_mem(&bytes).map_err(pdf_error)?;
    let id = Object::String(stamp.id.clone().into_bytes(), StringFormat::Literal);
    saved.trailer.set("ID", Object::Array(vec![id.clone(), id]));
    let mut out = Vec::with_capacity(bytes.len());
    saved.save_to(&mut out).map_err(pdf_error)?;
    Ok(out)
}

fn place_image(
    layer: &PdfLayerReference,
    chart: &ChartImage,
    x: f32,
    y: f32,
    width: f32,
) -> Result<(), RenderError> {
    let decoded = printpdf::image_crate::load_from_memory(&chart.png).map_err(pdf_error)?;
    let image = Image::from_dynamic_image(&decoded);
    // pixel width spread over the target width in points
    let dpi = chart.width_px as f32 * 72.0 / width.max(1.0);
    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm::from(Pt(x))),
            translate_y: Some(Mm::from(Pt(y))),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

/// One chart alone on a page cut to its display size.
pub(super) fn chart_page(chart: &ChartImage, stamp: &PdfStamp) -> Result<Vec<u8>, RenderError> {
    let (width, height) = (chart.width_pt.max(1.0), chart.height_pt.max(1.0));
    let (pdf, page, layer) =
        stamped_document(&chart.caption, Mm::from(Pt(width)), Mm::from(Pt(height)), stamp);
    let layer = pdf.get_page(page).get_layer(layer);
    place_image(&layer, chart, 0.0, 0.0, width)?;
    save(pdf, stamp)
}

pub fn render_pdf(doc: &DocumentModel, page: &PageGeometry) -> Result<Vec<u8>, RenderError> {
    let pages = layout_document(doc, page);
    let charts: Vec<&ChartImage> = doc.images().collect();
    let (width, height) = (Mm::from(Pt(page.width_pt)), Mm::from(Pt(page.height_pt)));

    let stamp = PdfStamp::for_document(doc)?;
    let (pdf, first_page, first_layer) = stamped_document(&doc.title, width, height, &stamp);
    let fonts = Fonts {
        regular: pdf.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_error)?,
        bold: pdf.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_error)?,
    };

    for (i, laid_out) in pages.iter().enumerate() {
        let layer = if i == 0 {
            pdf.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = pdf.add_page(width, height, "Layer 1");
            pdf.get_page(page_index).get_layer(layer_index)
        };
        draw_page(&layer, laid_out, &fonts, &charts)?;
    }

    tracing::debug!(pages = pages.len().max(1), "PDF laid out");
    save(pdf, &stamp)
}
