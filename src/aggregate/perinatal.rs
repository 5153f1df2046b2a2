use chrono::NaiveDate;
use rusqlite::Connection;

use super::fields::{date, number, summarize, text, yes_no, FieldSpec};
use crate::db::{tables, RowMap, SchemaCapability, SelectQuery};

pub const PERINATAL_FIELDS: &[FieldSpec] = &[
    text("Pregnancy risk", &["pregnancy_risk"]),
    text("Birth mode", &["birth_mode", "delivery_mode"]),
    number("Term", &["birth_term_weeks", "gestational_age_weeks"], "wk"),
    text("Resuscitation", &["resuscitation"]),
    yes_no("NICU stay", &["nicu_stay"]),
    text("Infection risk", &["infection_risk"]),
    number("Birth weight", &["birth_weight_g"], "g"),
    number("Birth length", &["birth_length_cm"], "cm"),
    number("Birth head circumference", &["birth_head_circumference_cm"], "cm"),
    text("Maternity stay events", &["maternity_stay_events"]),
    text("Maternity vaccinations", &["maternity_vaccinations"]),
    yes_no("Vitamin K", &["vitamin_k"]),
    text("Feeding in maternity", &["feeding_in_maternity"]),
    yes_no("Meconium within 24 h", &["passed_meconium_24h"]),
    yes_no("Urination within 24 h", &["urination_24h"]),
    text("Heart screening", &["heart_screening"]),
    text("Metabolic screening", &["metabolic_screening"]),
    text("Hearing screening", &["hearing_screening"]),
    text("Mother's vaccinations", &["mother_vaccinations"]),
    text("Family vaccinations", &["family_vaccinations"]),
    date("Discharge date", &["maternity_discharge_date", "discharge_date"]),
    number("Discharge weight", &["discharge_weight_g"], "g"),
    text("Illnesses after birth", &["illnesses_after_birth"]),
    text("Evolution since maternity", &["evolution_since_maternity"]),
];

pub const PAST_MEDICAL_HISTORY_FIELDS: &[FieldSpec] = &[
    text("Chronic conditions", &["chronic_conditions", "conditions"]),
    text("Hospitalisations", &["hospitalizations", "hospitalisations"]),
    text("Surgeries", &["surgeries", "surgical_history"]),
    text("Allergies", &["allergies"]),
    text("Medications", &["medications", "current_medications"]),
    text("Vaccination status", &["vaccination_status", "immunizations"]),
    text("Family history", &["family_history"]),
    text("Other", &["other", "notes"]),
];

const RECENCY_COLUMNS: &[&str] = &["updated_at", "created_at"];

/// Most recent row for the patient in one of `candidates`, ignoring rows
/// stamped after `as_of`.
pub fn latest_patient_row(
    conn: &Connection,
    cap: &SchemaCapability,
    candidates: &[&'static str],
    patient_id: i64,
    as_of: Option<NaiveDate>,
) -> Option<RowMap> {
    let Some(table) = cap.resolve_table(candidates) else {
        tracing::debug!(table = candidates.first().copied().unwrap_or_default(), "Table absent");
        return None;
    };
    let Some(fk) = cap.patient_fk(table) else {
        tracing::debug!(table, "No patient foreign key");
        return None;
    };

    let mut query = SelectQuery::from(table).eq(fk, patient_id);
    for &col in RECENCY_COLUMNS {
        if cap.has_column(table, col) {
            query = query.order_desc(col);
        }
    }
    if cap.has_column(table, "id") {
        query = query.order_desc("id");
    }

    query.fetch_lenient(conn).into_iter().find(|row| match (as_of, row.date(RECENCY_COLUMNS)) {
        (Some(limit), Some(stamp)) => stamp <= limit,
        _ => true,
    })
}

pub fn perinatal_summary(
    conn: &Connection,
    cap: &SchemaCapability,
    patient_id: i64,
    as_of: Option<NaiveDate>,
) -> Option<String> {
    let row = latest_patient_row(conn, cap, tables::PERINATAL, patient_id, as_of)?;
    summarize(&row, PERINATAL_FIELDS)
}

pub fn past_medical_history_summary(
    conn: &Connection,
    cap: &SchemaCapability,
    patient_id: i64,
    as_of: Option<NaiveDate>,
) -> Option<String> {
    let row = latest_patient_row(conn, cap, tables::PAST_MEDICAL_HISTORY, patient_id, as_of)?;
    summarize(&row, PAST_MEDICAL_HISTORY_FIELDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, open_memory_database};

    #[test]
    fn perinatal_summary_in_fixed_order() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let summary = perinatal_summary(&conn, &cap, 1, None).unwrap();
        assert!(summary.starts_with("Pregnancy risk: Low; Birth mode: Vaginal; Term: 39 wk"));
        assert!(summary.contains("Birth weight: 3200 g"));
        assert!(summary.contains("Vitamin K: Yes"));
        assert!(summary.contains("Discharge date: 2024-01-04"));
    }

    #[test]
    fn perinatal_summary_respects_as_of() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let before = NaiveDate::from_ymd_opt(2024, 1, 2);
        assert_eq!(perinatal_summary(&conn, &cap, 1, before), None);
    }

    #[test]
    fn latest_row_wins() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "CREATE TABLE perinatal (id INTEGER PRIMARY KEY, pid INTEGER, birth_mode TEXT);
             INSERT INTO perinatal VALUES (1, 3, 'C-section'), (2, 3, 'Vaginal');",
        )
        .unwrap();
        let cap = SchemaCapability::probe(&conn);
        assert_eq!(
            perinatal_summary(&conn, &cap, 3, None).as_deref(),
            Some("Birth mode: Vaginal")
        );
    }

    #[test]
    fn missing_table_is_none_not_error() {
        let conn = open_memory_database().unwrap();
        let cap = SchemaCapability::probe(&conn);
        assert_eq!(perinatal_summary(&conn, &cap, 1, None), None);
        assert_eq!(past_medical_history_summary(&conn, &cap, 1, None), None);
    }

    #[test]
    fn past_medical_history_summary_from_pmh() {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        assert_eq!(
            past_medical_history_summary(&conn, &cap, 1, None).as_deref(),
            Some("Chronic conditions: Atopic dermatitis; Allergies: None known")
        );
    }
}
