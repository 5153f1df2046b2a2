use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{FieldList, VisitKind, EM_DASH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Lenient parse of the values bundles have used over time.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "boy" | "masculin" | "1" => Some(Sex::Male),
            "f" | "female" | "girl" | "feminin" | "féminin" | "2" => Some(Sex::Female),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
        }
    }
}

/// Header block shared by both report kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportMeta {
    pub kind: VisitKind,
    pub patient_name: String,
    pub alias: Option<String>,
    pub mrn: Option<String>,
    pub dob: Option<NaiveDate>,
    pub sex: Option<Sex>,
    pub visit_date: Option<NaiveDateTime>,
    /// Compact age such as "2m 2d" or "1y 3m"; an em-dash when DOB or date is missing.
    pub age_display: String,
    pub clinician: Option<String>,
    /// Canonical visit type id, `episode` for sick visits.
    pub visit_type_id: String,
    pub visit_type_label: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub generated_at: NaiveDateTime,
}

impl ReportMeta {
    /// Display rows in header order. Absent values show an em-dash.
    pub fn to_fields(&self) -> FieldList {
        let or_dash = |v: Option<String>| v.unwrap_or_else(|| EM_DASH.to_string());
        let mut fields = vec![
            ("Patient".to_string(), self.patient_name.clone()),
            ("Alias".to_string(), or_dash(self.alias.clone())),
            ("MRN".to_string(), or_dash(self.mrn.clone())),
            (
                "Date of birth".to_string(),
                or_dash(self.dob.map(|d| d.format("%Y-%m-%d").to_string())),
            ),
            ("Sex".to_string(), or_dash(self.sex.map(|s| s.label().to_string()))),
            (
                "Visit date".to_string(),
                or_dash(self.visit_date.map(|d| d.format("%Y-%m-%d").to_string())),
            ),
            ("Age at visit".to_string(), self.age_display.clone()),
            ("Visit type".to_string(), self.visit_type_label.clone()),
            ("Clinician".to_string(), or_dash(self.clinician.clone())),
        ];
        if let Some(created) = &self.created_at {
            fields.push(("Record created".to_string(), created.clone()));
        }
        if let Some(updated) = &self.updated_at {
            fields.push(("Record updated".to_string(), updated.clone()));
        }
        fields.push((
            "Generated".to_string(),
            self.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        ));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sex_parse_is_lenient() {
        assert_eq!(Sex::parse("F"), Some(Sex::Female));
        assert_eq!(Sex::parse(" boy "), Some(Sex::Male));
        assert_eq!(Sex::parse("unknown"), None);
    }

    #[test]
    fn missing_header_values_show_em_dash() {
        let meta = ReportMeta {
            kind: VisitKind::Well,
            patient_name: "Lina Haddad".into(),
            alias: None,
            mrn: None,
            dob: None,
            sex: None,
            visit_date: None,
            age_display: EM_DASH.into(),
            clinician: None,
            visit_type_id: "one_month".into(),
            visit_type_label: "1-month visit".into(),
            created_at: None,
            updated_at: None,
            generated_at: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        };
        let fields = meta.to_fields();
        let mrn = fields.iter().find(|(k, _)| k == "MRN").unwrap();
        assert_eq!(mrn.1, EM_DASH);
        assert!(!fields.iter().any(|(k, _)| k == "Record created"));
        assert_eq!(fields.last().unwrap().1, "2025-01-02 09:30");
    }
}
