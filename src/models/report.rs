use serde::Serialize;

use super::{FieldList, ReportMeta, VisitKind};
use crate::visibility::SectionFlags;

/// One earlier visit condensed to at most three finding lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorVisitFinding {
    pub kind: VisitKind,
    pub title: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MilestoneSummary {
    pub achieved: u32,
    pub total: u32,
    /// "<label> (<status>) — <note>" for every milestone not achieved.
    pub flags: Vec<String>,
}

impl MilestoneSummary {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Measurements {
    pub weight_kg: Option<f64>,
    pub length_cm: Option<f64>,
    pub head_circumference_cm: Option<f64>,
    pub weight_gain: Option<String>,
}

impl Measurements {
    pub fn is_empty(&self) -> bool {
        self.weight_kg.is_none()
            && self.length_cm.is_none()
            && self.head_circumference_cm.is_none()
            && self.weight_gain.is_none()
    }

    pub fn to_fields(&self) -> FieldList {
        let mut fields = Vec::new();
        if let Some(w) = self.weight_kg {
            fields.push(("Weight".to_string(), format!("{w:.2} kg")));
        }
        if let Some(l) = self.length_cm {
            fields.push(("Length".to_string(), format!("{l:.1} cm")));
        }
        if let Some(h) = self.head_circumference_cm {
            fields.push(("Head circumference".to_string(), format!("{h:.1} cm")));
        }
        if let Some(gain) = &self.weight_gain {
            fields.push(("Weight gain".to_string(), gain.clone()));
        }
        fields
    }
}

/// Physical exam lines under one body-system heading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamGroup {
    pub title: String,
    pub lines: Vec<String>,
}

// ═══════════════════════════════════════════════════════════
// Current-visit fields, after gating
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WellVisitFields {
    pub parents_concerns: Option<String>,
    pub issues_since_last: Option<String>,
    pub feeding: FieldList,
    pub supplementation: FieldList,
    pub sleep: FieldList,
    pub development: FieldList,
    pub milestones: MilestoneSummary,
    pub measurements: Measurements,
    pub physical_exam: Vec<ExamGroup>,
    pub problem_listing: Option<String>,
    pub conclusions: Option<String>,
    pub guidance: Option<String>,
    pub comments: Option<String>,
    pub next_visit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SickVisitFields {
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

// ═══════════════════════════════════════════════════════════
// Report data
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WellReportData {
    pub meta: ReportMeta,
    pub perinatal_summary: Option<String>,
    pub past_medical_history: Option<String>,
    pub prior_visits: Vec<PriorVisitFinding>,
    pub current: WellVisitFields,
    /// `None` when no visibility rule matched; the current fields are then all empty.
    pub flags: Option<SectionFlags>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SickReportData {
    pub meta: ReportMeta,
    pub perinatal_summary: Option<String>,
    pub past_medical_history: Option<String>,
    pub prior_visits: Vec<PriorVisitFinding>,
    pub current: SickVisitFields,
    pub flags: Option<SectionFlags>,
}

/// Fully assembled, gated report for one visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisitReport {
    Well(WellReportData),
    Sick(SickReportData),
}

impl VisitReport {
    pub fn kind(&self) -> VisitKind {
        match self {
            VisitReport::Well(_) => VisitKind::Well,
            VisitReport::Sick(_) => VisitKind::Sick,
        }
    }

    pub fn meta(&self) -> &ReportMeta {
        match self {
            VisitReport::Well(d) => &d.meta,
            VisitReport::Sick(d) => &d.meta,
        }
    }

    pub fn perinatal_summary(&self) -> Option<&str> {
        match self {
            VisitReport::Well(d) => d.perinatal_summary.as_deref(),
            VisitReport::Sick(d) => d.perinatal_summary.as_deref(),
        }
    }

    pub fn past_medical_history(&self) -> Option<&str> {
        match self {
            VisitReport::Well(d) => d.past_medical_history.as_deref(),
            VisitReport::Sick(d) => d.past_medical_history.as_deref(),
        }
    }

    pub fn prior_visits(&self) -> &[PriorVisitFinding] {
        match self {
            VisitReport::Well(d) => &d.prior_visits,
            VisitReport::Sick(d) => &d.prior_visits,
        }
    }

    pub fn flags(&self) -> Option<&SectionFlags> {
        match self {
            VisitReport::Well(d) => d.flags.as_ref(),
            VisitReport::Sick(d) => d.flags.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurements_fields_skip_missing_values() {
        let m = Measurements {
            weight_kg: Some(7.25),
            head_circumference_cm: Some(42.0),
            ..Default::default()
        };
        let fields = m.to_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], ("Weight".to_string(), "7.25 kg".to_string()));
        assert!(!m.is_empty());
        assert!(Measurements::default().is_empty());
    }
}
