//! Runtime schema capability map.
//!
//! Bundles written by different app versions name the same table or column
//! differently. Every table the generator may read is listed here; the probe
//! records which of them exist and with what columns, and queries resolve
//! their identifiers against that map. Identifiers therefore only ever come
//! from these allow-lists, never from data.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rusqlite::Connection;

use super::DatabaseError;

/// Candidate table names per logical table, preferred name first.
pub mod tables {
    pub const PATIENTS: &[&str] = &["patients", "patient"];
    pub const WELL_VISITS: &[&str] = &["well_visits", "well_child_visits"];
    pub const SICK_EPISODES: &[&str] = &["episodes", "sick_episodes"];
    pub const PERINATAL: &[&str] = &["perinatal_history", "perinatal", "perinatal_histories"];
    pub const MILESTONES: &[&str] = &["well_visit_milestones", "milestones"];
    pub const PAST_MEDICAL_HISTORY: &[&str] = &["past_medical_history", "pmh"];
    pub const MANUAL_GROWTH: &[&str] = &["manual_growth"];
    pub const VITALS: &[&str] = &["vitals"];
    pub const CLINICIANS: &[&str] = &["users", "clinicians"];

    pub const ALL: &[&[&str]] = &[
        PATIENTS,
        WELL_VISITS,
        SICK_EPISODES,
        PERINATAL,
        MILESTONES,
        PAST_MEDICAL_HISTORY,
        MANUAL_GROWTH,
        VITALS,
        CLINICIANS,
    ];
}

/// Foreign keys to the patient, most common spelling first.
pub const PATIENT_FK: &[&str] = &["patient_id", "patientid", "pid"];

/// Double-quote an identifier for interpolation into SQL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Which allow-listed tables exist, and their columns (lowercased).
#[derive(Debug, Clone, Default)]
pub struct SchemaCapability {
    tables: BTreeMap<&'static str, BTreeSet<String>>,
}

static NO_COLUMNS: BTreeSet<String> = BTreeSet::new();

impl SchemaCapability {
    /// Probe the connection. Any failure yields an empty map, which makes
    /// every table look absent.
    pub fn probe(conn: &Connection) -> Self {
        match Self::try_probe(conn) {
            Ok(cap) => {
                tracing::debug!(tables = ?cap.tables.keys().collect::<Vec<_>>(), "Schema probed");
                cap
            }
            Err(e) => {
                tracing::warn!(error = %e, "Schema probe failed, treating bundle as empty");
                Self::default()
            }
        }
    }

    fn try_probe(conn: &Connection) -> Result<Self, DatabaseError> {
        let present: HashSet<String> = conn
            .prepare("SELECT lower(name) FROM sqlite_master WHERE type IN ('table', 'view')")?
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::from)?;

        let mut tables = BTreeMap::new();
        for candidates in tables::ALL {
            for &name in *candidates {
                if !present.contains(name) {
                    continue;
                }
                let columns: BTreeSet<String> = conn
                    .prepare("SELECT lower(name) FROM pragma_table_info(?1)")?
                    .query_map([name], |row| row.get::<_, String>(0))?
                    .collect::<Result<_, _>>()
                    .map_err(DatabaseError::from)?;
                tables.insert(name, columns);
            }
        }
        Ok(Self { tables })
    }

    /// Build directly from a table → columns listing (tests, fixtures).
    pub fn from_tables(listing: &[(&'static str, &[&str])]) -> Self {
        let tables = listing
            .iter()
            .map(|(name, cols)| (*name, cols.iter().map(|c| c.to_ascii_lowercase()).collect()))
            .collect();
        Self { tables }
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// First candidate that exists.
    pub fn resolve_table(&self, candidates: &[&'static str]) -> Option<&'static str> {
        candidates.iter().copied().find(|t| self.has_table(t))
    }

    /// First candidate that exists, else the preferred (first) name.
    pub fn table_or_default(&self, candidates: &[&'static str]) -> &'static str {
        self.resolve_table(candidates)
            .or_else(|| candidates.first().copied())
            .unwrap_or_default()
    }

    pub fn columns_of(&self, table: &str) -> &BTreeSet<String> {
        self.tables.get(table).unwrap_or(&NO_COLUMNS)
    }

    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns_of(table).contains(&column.to_ascii_lowercase())
    }

    /// First candidate column present on `table`.
    pub fn resolve_column(&self, table: &str, candidates: &[&'static str]) -> Option<&'static str> {
        candidates.iter().copied().find(|c| self.has_column(table, c))
    }

    /// Patient foreign key on `table`, if any spelling is present.
    pub fn patient_fk(&self, table: &str) -> Option<&'static str> {
        self.resolve_column(table, PATIENT_FK)
    }

    /// First candidate present on `table`, else `default`.
    pub fn resolve_foreign_key(
        &self,
        table: &str,
        candidates: &[&'static str],
        default: &'static str,
    ) -> &'static str {
        self.resolve_column(table, candidates).unwrap_or(default)
    }
}
