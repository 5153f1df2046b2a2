//! Report orchestration: one visit in, one document on disk out.
//!
//! `build_report` runs aggregation, visibility gating and assembly against a
//! short-lived read-only connection. `generate_report` adds growth charts,
//! renders the requested format and writes the file atomically.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use thiserror::Error;

use crate::aggregate;
use crate::assemble::assemble;
use crate::config::{ConfigError, ReportConfig};
use crate::context::{ClinicianDirectory, Collaborators, PatientRecord, ReportContext, VisitListing};
use crate::db::{self, DatabaseError, SchemaCapability};
use crate::document::{build_document, DocumentModel};
use crate::growth::{self, ChartImage};
use crate::models::{OutputFormat, VisitRef, VisitReport};
use crate::render::{self, RenderError};
use crate::visibility::VisibilityRules;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No active record store at {0}")]
    NoActiveRecordStore(PathBuf),

    #[error("Visit not found: {0}")]
    VisitNotFound(VisitRef),

    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("{format} rendering failed: {message}")]
    RenderEncoding { format: OutputFormat, message: String },

    #[error("Packaging failed: {0}")]
    PackagingTool(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<RenderError> for ReportError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Encoding { format, message } => ReportError::RenderEncoding { format, message },
            RenderError::Packaging(message) => ReportError::PackagingTool(message),
        }
    }
}

impl ReportError {
    fn from_database(err: DatabaseError, visit: VisitRef) -> Self {
        match err {
            DatabaseError::NoActiveRecordStore(path) => ReportError::NoActiveRecordStore(path),
            DatabaseError::NotFound { .. } => ReportError::VisitNotFound(visit),
            other => ReportError::Database(other),
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Entry point for callers. Builds are serialised through an internal lock.
pub struct ReportService<'a> {
    config: ReportConfig,
    rules: VisibilityRules,
    collaborators: Collaborators<'a>,
    build_lock: Mutex<()>,
}

impl<'a> ReportService<'a> {
    pub fn new(config: ReportConfig) -> Result<Self, ReportError> {
        let rules = VisibilityRules::from_config(&config)?;
        Ok(Self {
            config,
            rules,
            collaborators: Collaborators::default(),
            build_lock: Mutex::new(()),
        })
    }

    pub fn with_rules(mut self, rules: VisibilityRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_patient(mut self, patient: &'a dyn PatientRecord) -> Self {
        self.collaborators.patient = Some(patient);
        self
    }

    pub fn with_clinicians(mut self, clinicians: &'a dyn ClinicianDirectory) -> Self {
        self.collaborators.clinicians = Some(clinicians);
        self
    }

    pub fn with_visits(mut self, visits: &'a dyn VisitListing) -> Self {
        self.collaborators.visits = Some(visits);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Aggregate, gate and assemble one visit.
    pub fn build_report(&self, ctx: &ReportContext, visit: VisitRef) -> Result<VisitReport, ReportError> {
        let _guard = self.build_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.build_report_locked(ctx, visit).map(|(report, _)| report)
    }

    /// The report plus the patient id the visit resolved to.
    fn build_report_locked(
        &self,
        ctx: &ReportContext,
        visit: VisitRef,
    ) -> Result<(VisitReport, Option<i64>), ReportError> {
        let db_path = db::resolve_database_path(&ctx.bundle_path)
            .map_err(|e| ReportError::from_database(e, visit))?;
        let conn = db::open_read_only(&db_path).map_err(|e| ReportError::from_database(e, visit))?;
        let cap = SchemaCapability::probe(&conn);

        let raw = aggregate::collect(
            &conn,
            &cap,
            ctx,
            visit,
            self.collaborators,
            Local::now().naive_local(),
        )
        .map_err(|e| ReportError::from_database(e, visit))?;
        drop(conn);

        let flags = match raw.age_months {
            Some(age) => self.rules.visibility(&raw.meta.visit_type_id, age),
            None => {
                tracing::info!(%visit, "Age at visit unknown; current-visit sections hidden");
                None
            }
        };
        let patient_id = raw.patient_id;
        Ok((assemble(raw, flags), patient_id))
    }

    /// Growth charts for the report's patient, or none when disabled or unrenderable.
    fn charts_for(&self, report: &VisitReport, db_path: &Path, patient_id: Option<i64>) -> Vec<ChartImage> {
        if !self.config.include_growth_charts {
            return Vec::new();
        }
        let cutoff = report.meta().visit_date.map(|d| d.date());
        let mut series = growth::load_growth_series(
            db_path,
            patient_id,
            cutoff,
            self.collaborators.patient,
        );
        if series.sex.is_none() {
            series.sex = report.meta().sex;
        }
        match growth::render_charts(&series, &self.config.charts) {
            Ok(charts) => charts,
            Err(e) => {
                tracing::warn!(error = %e, "Growth charts skipped");
                Vec::new()
            }
        }
    }

    /// Build the format-neutral document, charts included.
    pub fn build_document(&self, ctx: &ReportContext, visit: VisitRef) -> Result<DocumentModel, ReportError> {
        let _guard = self.build_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (report, patient_id) = self.build_report_locked(ctx, visit)?;
        let charts = match db::resolve_database_path(&ctx.bundle_path) {
            Ok(db_path) => self.charts_for(&report, &db_path, patient_id),
            Err(_) => Vec::new(),
        };
        Ok(build_document(&report, &charts))
    }

    /// Render `visit` as `format` and write it to `output`. The extension is
    /// appended when missing. The destination is untouched on failure.
    pub fn generate_report(
        &self,
        ctx: &ReportContext,
        visit: VisitRef,
        format: OutputFormat,
        output: &Path,
    ) -> Result<PathBuf, ReportError> {
        tracing::info!(%visit, %format, bundle = %ctx.bundle_path.display(), "Generating report");
        let doc = self.build_document(ctx, visit)?;
        let bytes = render::render(&doc, format, &self.config)?;

        let path = with_extension(output, format);
        write_atomic(&path, &bytes)?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "Report written");
        Ok(path)
    }
}

fn with_extension(output: &Path, format: OutputFormat) -> PathBuf {
    let matches = output
        .extension()
        .and_then(|e| e.to_str())
        .and_then(OutputFormat::from_extension)
        == Some(format);
    if matches {
        output.to_path_buf()
    } else {
        let mut name = output.as_os_str().to_owned();
        name.push(".");
        name.push(format.extension());
        PathBuf::from(name)
    }
}

/// Temp file in the destination directory, then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ReportError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| ReportError::io(&parent, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| ReportError::io(&parent, e))?;
    tmp.write_all(bytes).map_err(|e| ReportError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| ReportError::io(path, e))?;
    tmp.persist(path).map_err(|e| ReportError::io(path, e.error))?;
    Ok(())
}
