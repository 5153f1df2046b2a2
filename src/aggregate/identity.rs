use chrono::NaiveDate;
use rusqlite::Connection;

use crate::context::{ClinicianDirectory, PatientRecord};
use crate::db::{tables, DatabaseError, RowMap, SchemaCapability, SelectQuery};
use crate::models::{Sex, VisitKind, VisitRef};

const NAME_KEYS: &[&str] = &["full_name", "display_name", "name"];
const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstname", "given_name", "prenom"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastname", "family_name", "nom"];
const ALIAS_KEYS: &[&str] = &["alias_label", "alias", "alias_id", "nickname"];
const MRN_KEYS: &[&str] = &["mrn", "medical_record_number", "record_number"];
const DOB_KEYS: &[&str] = &["dob", "date_of_birth", "birth_date", "birthdate"];
const SEX_KEYS: &[&str] = &["sex", "gender"];

const CLINICIAN_FK: &[&str] = &["user_id", "clinician_id", "created_by"];

/// Patient demographics as shown in the report header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientIdentity {
    pub display_name: Option<String>,
    pub alias: Option<String>,
    pub mrn: Option<String>,
    pub dob: Option<NaiveDate>,
    pub sex: Option<Sex>,
}

fn visit_table(kind: VisitKind) -> &'static [&'static str] {
    match kind {
        VisitKind::Well => tables::WELL_VISITS,
        VisitKind::Sick => tables::SICK_EPISODES,
    }
}

/// Read the whole visit row. A missing table or row is `NotFound`.
pub fn fetch_visit_row(
    conn: &Connection,
    cap: &SchemaCapability,
    visit: VisitRef,
) -> Result<RowMap, DatabaseError> {
    let not_found = || DatabaseError::NotFound {
        entity_type: format!("{} visit", visit.kind.as_str()),
        id: visit.id.to_string(),
    };
    let table = cap.resolve_table(visit_table(visit.kind)).ok_or_else(not_found)?;
    SelectQuery::from(table)
        .eq("id", visit.id)
        .limit(1)
        .fetch(conn)?
        .into_iter()
        .next()
        .ok_or_else(not_found)
}

/// Patient id from the visit row's foreign key, whatever its spelling.
pub fn patient_id_of(row: &RowMap) -> Option<i64> {
    row.int(crate::db::PATIENT_FK)
}

fn name_from_row(row: &RowMap) -> Option<String> {
    if let Some(name) = row.text(NAME_KEYS) {
        return Some(name);
    }
    match (row.text(FIRST_NAME_KEYS), row.text(LAST_NAME_KEYS)) {
        (Some(f), Some(l)) => Some(format!("{f} {l}")),
        (Some(f), None) => Some(f),
        (None, Some(l)) => Some(l),
        (None, None) => None,
    }
}

/// Demographics from the patients table, each field falling back to the
/// host's cached record when the database lacks it.
pub fn fetch_identity(
    conn: &Connection,
    cap: &SchemaCapability,
    patient_id: Option<i64>,
    cached: Option<&dyn PatientRecord>,
) -> PatientIdentity {
    let row = match (patient_id, cap.resolve_table(tables::PATIENTS)) {
        (Some(id), Some(table)) => SelectQuery::from(table)
            .eq("id", id)
            .fetch_one_lenient(conn)
            .unwrap_or_default(),
        (_, None) => {
            tracing::debug!("No patients table in bundle");
            RowMap::default()
        }
        (None, Some(_)) => RowMap::default(),
    };

    PatientIdentity {
        display_name: name_from_row(&row).or_else(|| cached.and_then(|p| p.display_name())),
        alias: row.text(ALIAS_KEYS).or_else(|| cached.and_then(|p| p.alias())),
        mrn: row.text(MRN_KEYS).or_else(|| cached.and_then(|p| p.mrn())),
        dob: row
            .text(DOB_KEYS)
            .and_then(|raw| crate::age::parse_date_logged(&raw, "dob"))
            .or_else(|| cached.and_then(|p| p.dob())),
        sex: row
            .text(SEX_KEYS)
            .and_then(|raw| Sex::parse(&raw))
            .or_else(|| cached.and_then(|p| p.sex())),
    }
}

/// Clinician on the visit row, else the active user. Name from the users
/// table, else the host directory.
pub fn clinician_name(
    conn: &Connection,
    cap: &SchemaCapability,
    visit_row: &RowMap,
    active_user_id: Option<i64>,
    directory: Option<&dyn ClinicianDirectory>,
) -> Option<String> {
    let id = visit_row.int(CLINICIAN_FK).or(active_user_id)?;

    let from_db = cap.resolve_table(tables::CLINICIANS).and_then(|table| {
        SelectQuery::from(table)
            .eq("id", id)
            .fetch_one_lenient(conn)
            .and_then(|row| name_from_row(&row))
    });

    from_db.or_else(|| directory.and_then(|d| d.clinician_name(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PatientSnapshot;
    use crate::db::fixtures;
    use std::collections::HashMap;

    #[test]
    fn visit_row_found_and_missing() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let row = fetch_visit_row(&conn, &cap, VisitRef::well(6)).unwrap();
        assert_eq!(patient_id_of(&row), Some(1));

        let missing = fetch_visit_row(&conn, &cap, VisitRef::well(999));
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn identity_prefers_database_over_cached_record() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let cached = PatientSnapshot {
            first_name: Some("Cached".into()),
            mrn: Some("OLD".into()),
            sex: Some(Sex::Male),
            ..Default::default()
        };
        let id = fetch_identity(&conn, &cap, Some(1), Some(&cached));
        assert_eq!(id.display_name.as_deref(), Some("Lina Haddad"));
        assert_eq!(id.mrn.as_deref(), Some("MRN-0042"));
        assert_eq!(id.sex, Some(Sex::Female));
        assert_eq!(id.dob, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn identity_falls_back_to_cached_record_without_patients_table() {
        let conn = crate::db::open_memory_database().unwrap();
        let cap = SchemaCapability::probe(&conn);
        let cached = PatientSnapshot {
            first_name: Some("Omar".into()),
            dob: NaiveDate::from_ymd_opt(2023, 5, 2),
            ..Default::default()
        };
        let id = fetch_identity(&conn, &cap, Some(1), Some(&cached));
        assert_eq!(id.display_name.as_deref(), Some("Omar"));
        assert_eq!(id.dob, NaiveDate::from_ymd_opt(2023, 5, 2));
        assert_eq!(id.mrn, None);
    }

    #[test]
    fn clinician_from_users_table_then_directory() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let row = fetch_visit_row(&conn, &cap, VisitRef::well(6)).unwrap();
        assert_eq!(
            clinician_name(&conn, &cap, &row, None, None).as_deref(),
            Some("Sara Benali")
        );

        let mut dir = HashMap::new();
        dir.insert(42, "Dr Who".to_string());
        let no_fk = RowMap::default();
        assert_eq!(
            clinician_name(&conn, &cap, &no_fk, Some(42), Some(&dir)).as_deref(),
            Some("Dr Who")
        );
        assert_eq!(clinician_name(&conn, &cap, &no_fk, None, Some(&dir)), None);
    }
}
