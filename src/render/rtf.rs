//! Legacy RTF output. Text first, then each chart as a hex `\pict` group.

use std::fmt::Write as _;
use std::io::Cursor;

use chrono::NaiveDateTime;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;

use super::pdf::{chart_page, PdfStamp};
use super::RenderError;
use crate::config::{LegacyConfig, LegacyImageFormat};
use crate::document::{Block, DocumentModel, HeadingLevel};
use crate::growth::ChartImage;
use crate::models::OutputFormat;

const HEADER: &str = concat!(
    r"{\rtf1\ansi\ansicpg1252\deff0",
    r"{\fonttbl{\f0\fswiss\fcharset0 Helvetica;}}",
    r"{\colortbl;\red0\green0\blue0;\red85\green85\blue85;}",
    "\n",
    r"\viewkind4\uc1\f0\fs22",
    "\n",
);

const TWIPS_PER_POINT: f32 = 20.0;
const HEX_LINE: usize = 128;

fn rtf_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::encoding(OutputFormat::Rtf, e)
}

/// Escape control characters; everything outside ASCII goes out as `\uN?`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '\n' => out.push_str(r"\line "),
            '\t' => out.push_str(r"\tab "),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c if c.is_ascii() => {}
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    // RTF wants the signed 16-bit value
                    let _ = write!(out, r"\u{}?", *unit as i16);
                }
            }
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════
// Pictures
// ═══════════════════════════════════════════════════════════

/// An encoded picture ready for a `\pict` group.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyPicture {
    pub format: LegacyImageFormat,
    pub bytes: Vec<u8>,
}

impl LegacyPicture {
    fn blip(&self) -> &'static str {
        match self.format {
            LegacyImageFormat::Pdf => r"\pdfblip",
            LegacyImageFormat::Jpeg => r"\jpegblip",
            LegacyImageFormat::Png => r"\pngblip",
        }
    }
}

fn encode_jpeg(png: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let decoded = image::load_from_memory_with_format(png, ImageFormat::Png).map_err(|e| e.to_string())?;
    let rgb = decoded.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| e.to_string())?;
    Ok(out.into_inner())
}

fn encode_pdf(chart: &ChartImage, generated_at: NaiveDateTime) -> Result<Vec<u8>, String> {
    let stamp = PdfStamp::new(&chart.caption, None, generated_at, "chart")
        .map_err(|e| e.to_string())?;
    chart_page(chart, &stamp).map_err(|e| e.to_string())
}

/// Try each configured format in turn; the first that encodes wins.
/// `generated_at` dates the single-page PDF variant.
pub fn encode_picture(
    chart: &ChartImage,
    generated_at: NaiveDateTime,
    cfg: &LegacyConfig,
) -> Result<LegacyPicture, RenderError> {
    let mut failures = Vec::new();
    for &format in &cfg.image_formats {
        let attempt = match format {
            LegacyImageFormat::Pdf => encode_pdf(chart, generated_at),
            LegacyImageFormat::Jpeg => encode_jpeg(&chart.png, cfg.jpeg_quality),
            LegacyImageFormat::Png if chart.png.is_empty() => Err("empty PNG".to_string()),
            LegacyImageFormat::Png => Ok(chart.png.clone()),
        };
        match attempt {
            Ok(bytes) => return Ok(LegacyPicture { format, bytes }),
            Err(e) => {
                tracing::debug!(?format, error = %e, caption = %chart.caption, "Legacy image encoding failed");
                failures.push(format!("{format:?}: {e}"));
            }
        }
    }
    Err(rtf_error(format!(
        "no image encoding succeeded for \"{}\" ({})",
        chart.caption,
        if failures.is_empty() {
            "no formats configured".to_string()
        } else {
            failures.join("; ")
        }
    )))
}

fn write_pict(out: &mut String, chart: &ChartImage, picture: &LegacyPicture) {
    let goal = |pt: f32| (pt * TWIPS_PER_POINT).round() as u32;
    let _ = write!(
        out,
        r"{{\pict{}\picw{}\pich{}\picwgoal{}\pichgoal{}",
        picture.blip(),
        chart.width_px,
        chart.height_px,
        goal(chart.width_pt),
        goal(chart.height_pt),
    );
    let hex = hex::encode(&picture.bytes);
    for chunk in hex.as_bytes().chunks(HEX_LINE) {
        out.push('\n');
        // hex output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out.push_str("}\n");
}

// ═══════════════════════════════════════════════════════════
// Text
// ═══════════════════════════════════════════════════════════

fn heading(out: &mut String, level: HeadingLevel, text: &str) {
    let (align, before, size) = match level {
        HeadingLevel::Title => (r"\qc", 0, 40),
        HeadingLevel::Section => ("", 240, 28),
        HeadingLevel::Subsection => ("", 160, 24),
    };
    let _ = writeln!(
        out,
        r"\pard{align}\sb{before}\sa120\b\fs{size} {}\b0\fs22\par",
        escape(text)
    );
}

fn paragraph(out: &mut String, text: &str) {
    let _ = writeln!(out, r"\pard\sa120 {}\par", escape(text));
}

fn indented(out: &mut String, text: &str) {
    let _ = writeln!(out, r"\pard\li360\sa60 {}\par", escape(text));
}

/// Serialise the document. Fails only when a chart cannot be embedded.
pub fn render_rtf(doc: &DocumentModel, cfg: &LegacyConfig) -> Result<Vec<u8>, RenderError> {
    let mut out = String::from(HEADER);
    let _ = writeln!(out, r"{{\info{{\title {}}}", escape(&doc.title));
    if let Some(author) = &doc.author {
        let _ = write!(out, r"{{\author {}}}", escape(author));
    }
    out.push_str("}\n");

    for block in doc.blocks() {
        match block {
            Block::Heading { level, text } => heading(&mut out, *level, text),
            Block::Paragraph(text) => paragraph(&mut out, text),
            Block::BulletList(items) => {
                for item in items {
                    let _ = writeln!(out, r"\pard\li360\fi-180\sa60 \bullet  {}\par", escape(item));
                }
            }
            Block::KeyValue(fields) => {
                for (key, value) in fields {
                    let _ = writeln!(out, r"\pard\sa60 {{\b {}:}} {}\par", escape(key), escape(value));
                }
            }
            Block::GroupedLines(groups) => {
                for group in groups {
                    let _ = writeln!(out, r"\pard\sa60\b {}\b0\par", escape(&group.title));
                    for line in &group.lines {
                        indented(&mut out, line);
                    }
                }
            }
            Block::Image(chart) => {
                let picture = encode_picture(chart, doc.generated_at, cfg)?;
                let _ = writeln!(out, r"\pard\qc\sa120\b {}\b0\par", escape(&chart.caption));
                out.push_str(r"\pard\qc ");
                write_pict(&mut out, chart, &picture);
                out.push_str("\\par\n");
            }
            Block::PageBreak => out.push_str("\\page\n"),
        }
    }
    out.push('}');
    Ok(out.into_bytes())
}
