//! One renderer per output format, all consuming the same [`DocumentModel`].

pub mod docx;
pub mod pdf;
pub mod rtf;

use thiserror::Error;

use crate::config::ReportConfig;
use crate::document::DocumentModel;
use crate::models::OutputFormat;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("{format} encoding failed: {message}")]
    Encoding {
        format: OutputFormat,
        message: String,
    },

    #[error("Packaging failed: {0}")]
    Packaging(String),
}

impl RenderError {
    pub(crate) fn encoding(format: OutputFormat, message: impl std::fmt::Display) -> Self {
        RenderError::Encoding {
            format,
            message: message.to_string(),
        }
    }
}

/// Serialise the document in `format`.
pub fn render(
    doc: &DocumentModel,
    format: OutputFormat,
    config: &ReportConfig,
) -> Result<Vec<u8>, RenderError> {
    let bytes = match format {
        OutputFormat::Pdf => pdf::render_pdf(doc, &config.page)?,
        OutputFormat::Docx => docx::render_docx(doc, &config.page)?,
        OutputFormat::Rtf => rtf::render_rtf(doc, &config.legacy)?,
    };
    tracing::debug!(%format, bytes = bytes.len(), "Document rendered");
    Ok(bytes)
}
