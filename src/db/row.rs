use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

use super::{quote_ident, DatabaseError};
use crate::age::parse_datetime;

/// One result row keyed by lowercased column name.
///
/// Accessors take candidate column lists and return the first present,
/// non-empty value, which is how drifting column names are absorbed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMap {
    values: BTreeMap<String, Value>,
}

impl RowMap {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let stmt = row.as_ref();
        let mut values = BTreeMap::new();
        for i in 0..stmt.column_count() {
            let name = stmt.column_name(i)?.to_ascii_lowercase();
            values.insert(name, row.get::<_, Value>(i)?);
        }
        Ok(Self { values })
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v))
            .collect();
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// First candidate holding a non-null, non-blank value.
    fn first<'a>(&'a self, candidates: &[&str]) -> Option<&'a Value> {
        candidates.iter().find_map(|key| match self.values.get(*key) {
            None | Some(Value::Null) => None,
            Some(Value::Text(t)) if t.trim().is_empty() => None,
            Some(v) => Some(v),
        })
    }

    pub fn text(&self, candidates: &[&str]) -> Option<String> {
        match self.first(candidates)? {
            Value::Text(t) => Some(clean_text(t)).filter(|t| !t.is_empty()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(format_number(*r)),
            Value::Blob(_) | Value::Null => None,
        }
    }

    pub fn real(&self, candidates: &[&str]) -> Option<f64> {
        candidates.iter().find_map(|key| match self.values.get(*key)? {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            Value::Text(t) => t.trim().replace(',', ".").parse::<f64>().ok(),
            _ => None,
        })
    }

    pub fn int(&self, candidates: &[&str]) -> Option<i64> {
        candidates.iter().find_map(|key| match self.values.get(*key)? {
            Value::Integer(i) => Some(*i),
            Value::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            Value::Text(t) => t.trim().parse::<i64>().ok(),
            _ => None,
        })
    }

    /// Yes/no columns: 0/1 integers or text flags.
    pub fn flag(&self, candidates: &[&str]) -> Option<bool> {
        candidates.iter().find_map(|key| match self.values.get(*key)? {
            Value::Integer(i) => Some(*i != 0),
            Value::Real(r) => Some(*r != 0.0),
            Value::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "y" | "oui" | "normal" => Some(true),
                "0" | "false" | "no" | "n" | "non" | "abnormal" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn datetime(&self, candidates: &[&str]) -> Option<NaiveDateTime> {
        candidates.iter().find_map(|key| match self.values.get(*key)? {
            Value::Text(t) => parse_datetime(t),
            _ => None,
        })
    }

    pub fn date(&self, candidates: &[&str]) -> Option<NaiveDate> {
        self.datetime(candidates).map(|dt| dt.date())
    }

    /// True when any candidate column exists, even if null.
    pub fn has_any(&self, candidates: &[&str]) -> bool {
        candidates.iter().any(|c| self.values.contains_key(*c))
    }
}

/// Collapse whitespace runs. JSON string arrays (multi-select answers) are
/// joined with ", ".
pub fn clean_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
            return items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
        }
    }
    trimmed
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop a trailing ".0" on integral values.
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{v:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

// ═══════════════════════════════════════════════════════════
// Query building
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
}

impl Comparison {
    fn sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
        }
    }
}

/// `SELECT *` over one allow-listed table. Identifiers are `'static` so they
/// can only come from the schema allow-lists; values are always bound.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: &'static str,
    conditions: Vec<(&'static str, Comparison, Value)>,
    order_by: Vec<(&'static str, bool)>,
    limit: Option<u32>,
}

impl SelectQuery {
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, column: &'static str, op: Comparison, value: impl Into<Value>) -> Self {
        self.conditions.push((column, op, value.into()));
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparison::Eq, value)
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order_by.push((column, true));
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order_by.push((column, false));
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn sql(&self) -> String {
        let mut sql = format!("SELECT * FROM {}", quote_ident(self.table));
        if !self.conditions.is_empty() {
            let clauses: Vec<String> = self
                .conditions
                .iter()
                .enumerate()
                .map(|(i, (col, op, _))| format!("{} {} ?{}", quote_ident(col), op.sql(), i + 1))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(col, desc)| {
                    format!("{} {}", quote_ident(col), if *desc { "DESC" } else { "ASC" })
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }
        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }
        sql
    }

    pub fn fetch(&self, conn: &Connection) -> Result<Vec<RowMap>, DatabaseError> {
        let mut stmt = conn.prepare(&self.sql())?;
        let params = rusqlite::params_from_iter(self.conditions.iter().map(|(_, _, v)| v));
        let rows = stmt.query_map(params, |row| RowMap::from_row(row))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
    }

    /// Fetch, logging and swallowing errors (missing columns, type drift).
    pub fn fetch_lenient(&self, conn: &Connection) -> Vec<RowMap> {
        match self.fetch(conn) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(table = self.table, error = %e, "Query failed, treating as empty");
                Vec::new()
            }
        }
    }

    pub fn fetch_one_lenient(&self, conn: &Connection) -> Option<RowMap> {
        self.clone().limit(1).fetch_lenient(conn).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        RowMap::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
    }

    #[test]
    fn text_skips_blank_and_null_candidates() {
        let r = row(&[
            ("parent_concerns", Value::Text("   ".into())),
            ("parents_concerns", Value::Null),
            ("concerns", Value::Text("  Poor  sleep ".into())),
        ]);
        assert_eq!(
            r.text(&["parent_concerns", "parents_concerns", "concerns"]),
            Some("Poor sleep".into())
        );
        assert_eq!(r.text(&["missing"]), None);
    }

    #[test]
    fn text_renders_json_arrays_and_numbers() {
        let r = row(&[
            ("milk_types", Value::Text(r#"["breast", "formula"]"#.into())),
            ("volume", Value::Real(120.0)),
            ("score", Value::Real(7.25)),
        ]);
        assert_eq!(r.text(&["milk_types"]), Some("breast, formula".into()));
        assert_eq!(r.text(&["volume"]), Some("120".into()));
        assert_eq!(r.text(&["score"]), Some("7.25".into()));
    }

    #[test]
    fn numeric_and_flag_accessors_are_lenient() {
        let r = row(&[
            ("weight", Value::Text("7,4".into())),
            ("count", Value::Real(3.0)),
            ("given", Value::Text("Yes".into())),
            ("normal", Value::Integer(0)),
        ]);
        assert_eq!(r.real(&["weight"]), Some(7.4));
        assert_eq!(r.int(&["count"]), Some(3));
        assert_eq!(r.flag(&["given"]), Some(true));
        assert_eq!(r.flag(&["normal"]), Some(false));
        assert_eq!(r.flag(&["weight"]), None);
    }

    #[test]
    fn select_query_binds_values_and_quotes_identifiers() {
        let q = SelectQuery::from("well_visits")
            .eq("patient_id", 1)
            .filter("visit_date", Comparison::Lt, String::from("2024-05-01"))
            .order_desc("visit_date")
            .limit(5);
        assert_eq!(
            q.sql(),
            "SELECT * FROM \"well_visits\" WHERE \"patient_id\" = ?1 AND \"visit_date\" < ?2 ORDER BY \"visit_date\" DESC LIMIT 5"
        );
    }

    #[test]
    fn fetch_returns_rows_keyed_by_lowercase_column() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "CREATE TABLE patients (id INTEGER PRIMARY KEY, First_Name TEXT);
             INSERT INTO patients VALUES (1, 'Lina'), (2, 'Omar');",
        )
        .unwrap();
        let rows = SelectQuery::from("patients").eq("id", 2).fetch(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(&["first_name"]), Some("Omar".into()));
    }

    #[test]
    fn fetch_lenient_swallows_missing_columns() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch("CREATE TABLE patients (id INTEGER PRIMARY KEY);").unwrap();
        let rows = SelectQuery::from("patients").eq("pid", 1).fetch_lenient(&conn);
        assert!(rows.is_empty());
    }

    #[test]
    fn format_number_trims_trailing_zeros() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(format_number(3.456), "3.46");
    }
}
