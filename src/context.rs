//! Caller-supplied context and collaborator seams.
//!
//! The generator never reaches into global state. The active bundle, the
//! signed-in clinician and an optional cached patient record all come in
//! through these types.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::models::{Sex, VisitRef};

/// Where the active bundle lives. `None` means no record store is open.
pub trait BundlePathProvider {
    fn active_bundle_path(&self) -> Option<PathBuf>;
}

impl BundlePathProvider for Option<PathBuf> {
    fn active_bundle_path(&self) -> Option<PathBuf> {
        self.clone()
    }
}

/// Demographics the host application already has in memory. Values read from
/// the bundle database take precedence over these.
pub trait PatientRecord {
    fn display_name(&self) -> Option<String> {
        match (self.first_name(), self.last_name()) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    }
    fn first_name(&self) -> Option<String>;
    fn last_name(&self) -> Option<String>;
    fn alias(&self) -> Option<String>;
    fn mrn(&self) -> Option<String>;
    fn dob(&self) -> Option<NaiveDate>;
    fn sex(&self) -> Option<Sex>;
}

/// Plain in-memory patient record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientSnapshot {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub alias: Option<String>,
    pub mrn: Option<String>,
    pub dob: Option<NaiveDate>,
    pub sex: Option<Sex>,
}

impl PatientRecord for PatientSnapshot {
    fn first_name(&self) -> Option<String> {
        self.first_name.clone()
    }
    fn last_name(&self) -> Option<String> {
        self.last_name.clone()
    }
    fn alias(&self) -> Option<String> {
        self.alias.clone()
    }
    fn mrn(&self) -> Option<String> {
        self.mrn.clone()
    }
    fn dob(&self) -> Option<NaiveDate> {
        self.dob
    }
    fn sex(&self) -> Option<Sex> {
        self.sex
    }
}

/// Resolves a clinician id to a display name when the bundle has no users table.
pub trait ClinicianDirectory {
    fn clinician_name(&self, id: i64) -> Option<String>;
}

impl ClinicianDirectory for HashMap<i64, String> {
    fn clinician_name(&self, id: i64) -> Option<String> {
        self.get(&id).cloned()
    }
}

/// Visit dates known to the host, used when the visit row has none.
pub trait VisitListing {
    fn visit_date(&self, visit: VisitRef) -> Option<NaiveDate>;
}

impl VisitListing for BTreeMap<VisitRef, NaiveDate> {
    fn visit_date(&self, visit: VisitRef) -> Option<NaiveDate> {
        self.get(&visit).copied()
    }
}

/// Per-call inputs. Passed explicitly instead of living in globals.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportContext {
    pub bundle_path: PathBuf,
    pub active_user_id: Option<i64>,
    /// Overrides the patient id found on the visit row.
    pub patient_id: Option<i64>,
}

impl ReportContext {
    pub fn new(bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            bundle_path: bundle_path.into(),
            active_user_id: None,
            patient_id: None,
        }
    }

    pub fn from_provider(provider: &dyn BundlePathProvider) -> Option<Self> {
        provider.active_bundle_path().map(Self::new)
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.active_user_id = Some(user_id);
        self
    }

    pub fn with_patient(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }
}

/// Optional host-side collaborators the aggregator may consult.
#[derive(Clone, Copy, Default)]
pub struct Collaborators<'a> {
    pub patient: Option<&'a dyn PatientRecord>,
    pub clinicians: Option<&'a dyn ClinicianDirectory>,
    pub visits: Option<&'a dyn VisitListing>,
}
