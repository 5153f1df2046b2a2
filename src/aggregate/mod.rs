//! Clinical data aggregation: one visit's raw fields plus its never-gated
//! context (identity, perinatal summary, past history, prior visits).
//!
//! Everything past the visit row itself is best effort. A missing table or
//! column is a schema gap, logged and read as "no value".

pub mod current;
pub mod fields;
pub mod identity;
pub mod perinatal;
pub mod prior;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::age::{age_display, age_in_months};
use crate::context::{Collaborators, ReportContext};
use crate::db::{DatabaseError, SchemaCapability};
use crate::models::{
    ExamGroup, FieldList, Measurements, MilestoneSummary, PriorVisitFinding, ReportMeta, VisitKind,
    VisitRef, EM_DASH,
};
use crate::visibility::{canonical_visit_type, visit_type_label, EPISODE_VISIT_TYPE};

const VISIT_TYPE_KEYS: &[&str] = &["visit_type", "visit_type_id", "type"];

// ═══════════════════════════════════════════════════════════
// Raw (ungated) current-visit fields
// ═══════════════════════════════════════════════════════════

/// Feeding items split by the visit shape that shows them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeeding {
    pub milk: FieldList,
    pub solids: FieldList,
    pub older: FieldList,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDevelopment {
    pub score: FieldList,
    pub result: FieldList,
    pub mchat: FieldList,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWellFields {
    pub parents_concerns: Option<String>,
    pub issues_since_last: Option<String>,
    pub feeding: RawFeeding,
    pub supplementation: FieldList,
    pub sleep: FieldList,
    pub development: RawDevelopment,
    pub milestones: MilestoneSummary,
    pub measurements: Measurements,
    pub physical_exam: Vec<ExamGroup>,
    pub problem_listing: Option<String>,
    pub conclusions: Option<String>,
    pub guidance: Option<String>,
    pub comments: Option<String>,
    pub next_visit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSickFields {
    pub complaint: Option<String>,
    pub history: Option<String>,
    pub symptoms: FieldList,
    pub vitals: FieldList,
    pub physical_exam: Vec<ExamGroup>,
    pub problem_listing: Option<String>,
    pub investigations: Option<String>,
    pub diagnosis: Option<String>,
    pub plan: Option<String>,
    pub guidance: Option<String>,
    pub comments: Option<String>,
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawCurrentFields {
    Well(RawWellFields),
    Sick(RawSickFields),
}

/// Everything read for one visit, before visibility gating.
#[derive(Debug, Clone, PartialEq)]
pub struct RawVisit {
    pub visit: VisitRef,
    pub patient_id: Option<i64>,
    pub meta: ReportMeta,
    /// Fractional months at the visit; `None` without DOB or visit date.
    pub age_months: Option<f64>,
    pub perinatal_summary: Option<String>,
    pub past_medical_history: Option<String>,
    pub prior_visits: Vec<PriorVisitFinding>,
    pub current: RawCurrentFields,
}

impl RawVisit {
    pub fn visit_date(&self) -> Option<NaiveDate> {
        self.meta.visit_date.map(|d| d.date())
    }
}

// ═══════════════════════════════════════════════════════════
// Collection
// ═══════════════════════════════════════════════════════════

/// Read one visit and its context. Only a missing visit row is an error.
pub fn collect(
    conn: &Connection,
    cap: &SchemaCapability,
    ctx: &ReportContext,
    visit: VisitRef,
    collaborators: Collaborators<'_>,
    generated_at: NaiveDateTime,
) -> Result<RawVisit, DatabaseError> {
    let row = identity::fetch_visit_row(conn, cap, visit)?;

    let patient_id = ctx.patient_id.or_else(|| identity::patient_id_of(&row));
    if patient_id.is_none() {
        tracing::warn!(%visit, "Visit row has no patient id");
    }

    let who = identity::fetch_identity(conn, cap, patient_id, collaborators.patient);

    let date_keys = match visit.kind {
        VisitKind::Well => prior::WELL_DATE_KEYS,
        VisitKind::Sick => prior::SICK_DATE_KEYS,
    };
    let visit_date = row.datetime(date_keys).or_else(|| {
        let listed = collaborators
            .visits
            .and_then(|v| v.visit_date(visit))
            .map(|d| d.and_time(chrono::NaiveTime::MIN));
        if listed.is_none() {
            tracing::warn!(%visit, "Visit has no parseable date");
        }
        listed
    });

    let visit_type_id = match visit.kind {
        VisitKind::Sick => EPISODE_VISIT_TYPE.to_string(),
        VisitKind::Well => match row.text(VISIT_TYPE_KEYS) {
            Some(raw) => canonical_visit_type(&raw).map(str::to_string).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Unknown visit type label");
                raw
            }),
            None => String::new(),
        },
    };
    let visit_type_label = if visit_type_id.is_empty() {
        EM_DASH.to_string()
    } else {
        visit_type_label(&visit_type_id)
    };

    let age_months = match (who.dob, visit_date) {
        (Some(dob), Some(at)) => Some(age_in_months(dob, at)),
        _ => None,
    };

    let meta = ReportMeta {
        kind: visit.kind,
        patient_name: who.display_name.clone().unwrap_or_else(|| EM_DASH.to_string()),
        alias: who.alias.clone(),
        mrn: who.mrn.clone(),
        dob: who.dob,
        sex: who.sex,
        visit_date,
        age_display: age_display(who.dob, visit_date.map(|d| d.date())),
        clinician: identity::clinician_name(
            conn,
            cap,
            &row,
            ctx.active_user_id,
            collaborators.clinicians,
        ),
        visit_type_id,
        visit_type_label,
        created_at: row.text(&["created_at"]).map(|raw| crate::age::display_date(&raw)),
        updated_at: row.text(&["updated_at"]).map(|raw| crate::age::display_date(&raw)),
        generated_at,
    };

    let as_of = visit_date.map(|d| d.date());
    let (perinatal_summary, past_medical_history, prior_visits) = match patient_id {
        Some(pid) => (
            perinatal::perinatal_summary(conn, cap, pid, as_of),
            perinatal::past_medical_history_summary(conn, cap, pid, as_of),
            prior::prior_visits(conn, cap, pid, visit, visit_date),
        ),
        None => (None, None, Vec::new()),
    };

    let current = match visit.kind {
        VisitKind::Well => RawCurrentFields::Well(current::well_fields(conn, cap, visit.id, &row)),
        VisitKind::Sick => RawCurrentFields::Sick(current::sick_fields(conn, cap, visit.id, &row)),
    };

    tracing::debug!(
        %visit,
        prior = prior_visits.len(),
        has_perinatal = perinatal_summary.is_some(),
        "Visit aggregated"
    );

    Ok(RawVisit {
        visit,
        patient_id,
        meta,
        age_months,
        perinatal_summary,
        past_medical_history,
        prior_visits,
        current,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PatientSnapshot;
    use crate::db::fixtures;
    use std::collections::BTreeMap;

    fn generated() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn collects_well_visit_with_context() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let ctx = ReportContext::new("/unused");
        let raw = collect(&conn, &cap, &ctx, VisitRef::well(6), Collaborators::default(), generated())
            .unwrap();

        assert_eq!(raw.patient_id, Some(1));
        assert_eq!(raw.meta.patient_name, "Lina Haddad");
        assert_eq!(raw.meta.visit_type_id, "twelve_month");
        assert_eq!(raw.meta.visit_type_label, "12-month visit");
        assert_eq!(raw.meta.age_display, "1y");
        assert_eq!(raw.meta.clinician.as_deref(), Some("Sara Benali"));
        assert_eq!(raw.meta.created_at.as_deref(), Some("2025-01-01"));
        let age = raw.age_months.unwrap();
        assert!((age - 366.0 / crate::age::DAYS_PER_MONTH).abs() < 1e-9);
        assert!(raw.perinatal_summary.is_some());
        assert_eq!(raw.prior_visits.len(), 5);
        assert!(matches!(raw.current, RawCurrentFields::Well(_)));
    }

    #[test]
    fn sick_visit_uses_episode_type() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let ctx = ReportContext::new("/unused");
        let raw = collect(&conn, &cap, &ctx, VisitRef::sick(1), Collaborators::default(), generated())
            .unwrap();
        assert_eq!(raw.meta.visit_type_id, "episode");
        assert_eq!(raw.meta.visit_type_label, "Sick visit");
        assert_eq!(raw.meta.age_display, "11m");
        assert_eq!(raw.prior_visits.len(), 5);
        assert_eq!(raw.prior_visits[0].date, "2024-10-01");
    }

    #[test]
    fn missing_visit_is_not_found() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let ctx = ReportContext::new("/unused");
        let err = collect(&conn, &cap, &ctx, VisitRef::sick(77), Collaborators::default(), generated());
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn minimal_bundle_uses_collaborators() {
        let conn = crate::db::open_memory_database().unwrap();
        conn.execute_batch(
            "CREATE TABLE well_child_visits (id INTEGER PRIMARY KEY, pid INTEGER, visit_type TEXT);
             INSERT INTO well_child_visits VALUES (3, 9, 'Two-month visit');",
        )
        .unwrap();
        let cap = SchemaCapability::probe(&conn);
        let ctx = ReportContext::new("/unused");

        let patient = PatientSnapshot {
            first_name: Some("Omar".into()),
            dob: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Default::default()
        };
        let mut listing = BTreeMap::new();
        listing.insert(VisitRef::well(3), NaiveDate::from_ymd_opt(2024, 3, 3).unwrap());
        let collab = Collaborators {
            patient: Some(&patient),
            clinicians: None,
            visits: Some(&listing),
        };

        let raw = collect(&conn, &cap, &ctx, VisitRef::well(3), collab, generated()).unwrap();
        assert_eq!(raw.patient_id, Some(9));
        assert_eq!(raw.meta.patient_name, "Omar");
        assert_eq!(raw.meta.visit_type_id, "two_month");
        assert_eq!(raw.meta.age_display, "2m 2d");
        assert_eq!(raw.perinatal_summary, None);
        assert!(raw.prior_visits.is_empty());
    }
}
