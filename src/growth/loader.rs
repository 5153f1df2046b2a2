use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::Connection;

use super::{GrowthPoint, GrowthSeries, Indicator};
use crate::age::age_in_months;
use crate::aggregate::identity::fetch_identity;
use crate::aggregate::perinatal::latest_patient_row;
use crate::context::PatientRecord;
use crate::db::{
    ensure_auxiliary_tables, open_read_write, tables, DatabaseError, RowMap, SchemaCapability,
    SelectQuery,
};

const MEASURED_AT_KEYS: &[&str] = &["measured_at", "recorded_at", "date", "visit_date", "created_at"];
const AGE_MONTHS_KEYS: &[&str] = &["age_months", "age_in_months"];

const WEIGHT_KG_KEYS: &[&str] = &["weight_kg", "weight"];
const WEIGHT_G_KEYS: &[&str] = &["weight_g", "weight_grams"];
const LENGTH_KEYS: &[&str] = &["height_cm", "length_cm", "height", "length"];
const HEAD_KEYS: &[&str] = &["head_circumference_cm", "head_circ_cm", "hc_cm", "head_circumference"];

const BIRTH_WEIGHT_G_KEYS: &[&str] = &["birth_weight_g"];
const BIRTH_WEIGHT_KG_KEYS: &[&str] = &["birth_weight_kg"];
const BIRTH_LENGTH_KEYS: &[&str] = &["birth_length_cm"];
const BIRTH_HEAD_KEYS: &[&str] = &["birth_head_circumference_cm", "birth_hc_cm"];
const DISCHARGE_DATE_KEYS: &[&str] = &["maternity_discharge_date", "discharge_date"];
const DISCHARGE_WEIGHT_G_KEYS: &[&str] = &["discharge_weight_g"];

/// One measurement row flattened to the three indicators.
#[derive(Debug, Clone, Copy, Default)]
struct Measured {
    age_months: f64,
    weight: Option<f64>,
    length: Option<f64>,
    head_circumference: Option<f64>,
}

impl Measured {
    fn value(&self, indicator: Indicator) -> Option<f64> {
        match indicator {
            Indicator::Weight => self.weight,
            Indicator::Length => self.length,
            Indicator::HeadCircumference => self.head_circumference,
        }
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite() && *v > 0.0)
}

fn weight_kg(row: &RowMap, kg_keys: &[&str], g_keys: &[&str]) -> Option<f64> {
    positive(row.real(kg_keys)).or_else(|| positive(row.real(g_keys)).map(|g| g / 1000.0))
}

/// Load the patient's growth points up to `cutoff`. Never fails: a bundle
/// that cannot be opened or read yields an empty series.
pub fn load_growth_series(
    db_path: &Path,
    patient_id: Option<i64>,
    cutoff: Option<NaiveDate>,
    cached: Option<&dyn PatientRecord>,
) -> GrowthSeries {
    match try_load(db_path, patient_id, cutoff, cached) {
        Ok(series) => {
            tracing::debug!(
                weight = series.weight.len(),
                length = series.length.len(),
                head = series.head_circumference.len(),
                "Growth series loaded"
            );
            series
        }
        Err(e) => {
            tracing::warn!(path = %db_path.display(), error = %e, "Growth data unavailable");
            GrowthSeries {
                sex: cached.and_then(|p| p.sex()),
                dob: cached.and_then(|p| p.dob()),
                cutoff,
                ..Default::default()
            }
        }
    }
}

fn try_load(
    db_path: &Path,
    patient_id: Option<i64>,
    cutoff: Option<NaiveDate>,
    cached: Option<&dyn PatientRecord>,
) -> Result<GrowthSeries, DatabaseError> {
    let conn = open_read_write(db_path)?;
    ensure_auxiliary_tables(&conn)?;
    let cap = SchemaCapability::probe(&conn);

    let patient_id = patient_id.or_else(|| sole_patient_id(&conn, &cap));
    let identity = fetch_identity(&conn, &cap, patient_id, cached);

    let mut series = GrowthSeries {
        sex: identity.sex,
        dob: identity.dob,
        cutoff,
        ..Default::default()
    };
    let Some(pid) = patient_id else {
        tracing::warn!("No patient id for growth data");
        return Ok(series);
    };

    let window = Window {
        dob: identity.dob,
        cutoff,
    };
    let mut measured = perinatal_points(&conn, &cap, pid, &window);
    measured.extend(table_points(&conn, &cap, tables::VITALS, pid, &window));
    measured.extend(table_points(&conn, &cap, tables::MANUAL_GROWTH, pid, &window));

    for indicator in Indicator::ALL {
        let points = series.points_mut(indicator);
        points.extend(measured.iter().filter_map(|m| {
            m.value(indicator).map(|value| GrowthPoint {
                age_months: m.age_months,
                value,
            })
        }));
        points.sort_by(|a, b| a.age_months.total_cmp(&b.age_months));
    }
    Ok(series)
}

/// A bundle holds one patient; use it when the caller names none.
fn sole_patient_id(conn: &Connection, cap: &SchemaCapability) -> Option<i64> {
    let table = cap.resolve_table(tables::PATIENTS)?;
    let rows = SelectQuery::from(table).limit(2).fetch_lenient(conn);
    match rows.as_slice() {
        [only] => only.int(&["id"]),
        _ => None,
    }
}

/// Date-of-birth and cutoff bounds shared by every source.
struct Window {
    dob: Option<NaiveDate>,
    cutoff: Option<NaiveDate>,
}

impl Window {
    fn includes_date(&self, at: NaiveDate) -> bool {
        self.cutoff.map_or(true, |limit| at <= limit)
    }

    fn age_at(&self, at: NaiveDateTime) -> Option<f64> {
        self.dob.map(|dob| age_in_months(dob, at))
    }

    fn cutoff_age(&self) -> Option<f64> {
        let limit = self.cutoff?.and_time(NaiveTime::MIN);
        self.age_at(limit)
    }

    /// Age for a row dated `at` and/or carrying a precomputed age. `None`
    /// when the row falls after the cutoff or cannot be placed on the axis.
    fn place(&self, at: Option<NaiveDateTime>, precomputed: Option<f64>) -> Option<f64> {
        if let Some(at) = at {
            if !self.includes_date(at.date()) {
                return None;
            }
        }
        match (precomputed.filter(|a| a.is_finite() && *a >= 0.0), at) {
            (Some(age), Some(_)) => Some(age),
            (Some(age), None) => match self.cutoff_age() {
                Some(limit) if age > limit => None,
                _ => Some(age),
            },
            (None, Some(at)) => self.age_at(at),
            (None, None) => None,
        }
    }
}

fn perinatal_points(
    conn: &Connection,
    cap: &SchemaCapability,
    pid: i64,
    window: &Window,
) -> Vec<Measured> {
    let Some(row) = latest_patient_row(conn, cap, tables::PERINATAL, pid, None) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    let birth = Measured {
        age_months: 0.0,
        weight: weight_kg(&row, BIRTH_WEIGHT_KG_KEYS, BIRTH_WEIGHT_G_KEYS),
        length: positive(row.real(BIRTH_LENGTH_KEYS)),
        head_circumference: positive(row.real(BIRTH_HEAD_KEYS)),
    };
    if birth.weight.is_some() || birth.length.is_some() || birth.head_circumference.is_some() {
        out.push(birth);
    }

    let discharge_weight = positive(row.real(DISCHARGE_WEIGHT_G_KEYS)).map(|g| g / 1000.0);
    if let (Some(at), Some(weight)) = (row.datetime(DISCHARGE_DATE_KEYS), discharge_weight) {
        if let Some(age) = window.place(Some(at), None) {
            out.push(Measured {
                age_months: age,
                weight: Some(weight),
                ..Default::default()
            });
        }
    }
    out
}

fn table_points(
    conn: &Connection,
    cap: &SchemaCapability,
    candidates: &[&'static str],
    pid: i64,
    window: &Window,
) -> Vec<Measured> {
    let Some(table) = cap.resolve_table(candidates) else {
        return Vec::new();
    };
    let Some(fk) = cap.patient_fk(table) else {
        tracing::debug!(table, "No patient foreign key, skipping growth rows");
        return Vec::new();
    };
    let mut query = SelectQuery::from(table).eq(fk, pid);
    if cap.has_column(table, "id") {
        query = query.order_asc("id");
    }

    query
        .fetch_lenient(conn)
        .iter()
        .filter_map(|row| {
            let age = window.place(row.datetime(MEASURED_AT_KEYS), row.real(AGE_MONTHS_KEYS))?;
            let m = Measured {
                age_months: age,
                weight: weight_kg(row, WEIGHT_KG_KEYS, WEIGHT_G_KEYS),
                length: positive(row.real(LENGTH_KEYS)),
                head_circumference: positive(row.real(HEAD_KEYS)),
            };
            (m.weight.is_some() || m.length.is_some() || m.head_circumference.is_some())
                .then_some(m)
        })
        .collect()
}
