//! Visit report generator.
//!
//! Reads one visit out of a patient bundle database whose schema drifts across
//! versions, gates current-visit sections by visit type and age, renders growth
//! charts and writes the result as PDF, DOCX or legacy RTF.

pub mod config;
pub mod context;
pub mod models;
pub mod age;
pub mod db;
pub mod visibility;
pub mod aggregate;
pub mod assemble;
pub mod growth;
pub mod document;
pub mod render;
pub mod orchestrator;

pub use context::{
    BundlePathProvider, ClinicianDirectory, PatientRecord, PatientSnapshot, ReportContext,
    VisitListing,
};
pub use models::{OutputFormat, VisitKind, VisitRef, VisitReport};
pub use orchestrator::{ReportError, ReportService};

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}
