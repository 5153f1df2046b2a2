//! Merge raw current-visit fields with the visibility result.
//!
//! Gating happens here and only here. Context sections (perinatal, past
//! history, prior visits) pass through untouched.

use crate::aggregate::{RawCurrentFields, RawSickFields, RawVisit, RawWellFields};
use crate::models::{
    FieldList, SickReportData, SickVisitFields, VisitReport, WellReportData, WellVisitFields,
};
use crate::visibility::SectionFlags;

fn keep<T: Default>(visible: bool, value: T) -> T {
    if visible {
        value
    } else {
        T::default()
    }
}

fn gate_well(raw: RawWellFields, flags: &SectionFlags) -> WellVisitFields {
    let shape = flags.shape;

    let mut feeding = FieldList::new();
    if flags.feeding {
        if shape.early_milk_only || shape.structured_feeding_under_12 {
            feeding.extend(raw.feeding.milk);
        }
        if shape.solids {
            feeding.extend(raw.feeding.solids);
        }
        if shape.older_feeding {
            feeding.extend(raw.feeding.older);
        }
        if let Some(comment) = raw.feeding.comment {
            feeding.push(("Notes".to_string(), comment));
        }
    }

    let mut development = FieldList::new();
    if flags.development {
        if shape.dev_test_score {
            development.extend(raw.development.score);
        }
        if shape.dev_test_result {
            development.extend(raw.development.result);
        }
        if shape.mchat {
            development.extend(raw.development.mchat);
        }
    }

    WellVisitFields {
        parents_concerns: keep(flags.parents_concerns, raw.parents_concerns),
        issues_since_last: keep(flags.parents_concerns, raw.issues_since_last),
        feeding,
        supplementation: keep(flags.supplementation, raw.supplementation),
        sleep: keep(flags.sleep, raw.sleep),
        development,
        milestones: keep(flags.milestones, raw.milestones),
        measurements: keep(flags.measurements, raw.measurements),
        physical_exam: keep(flags.physical_exam, raw.physical_exam),
        problem_listing: keep(flags.problem_listing, raw.problem_listing),
        conclusions: keep(flags.conclusions, raw.conclusions),
        guidance: keep(flags.guidance, raw.guidance),
        comments: keep(flags.comments, raw.comments),
        next_visit: keep(flags.next_visit, raw.next_visit),
    }
}

fn gate_sick(raw: RawSickFields, flags: &SectionFlags) -> SickVisitFields {
    SickVisitFields {
        complaint: keep(flags.parents_concerns, raw.complaint),
        history: keep(flags.parents_concerns, raw.history),
        symptoms: keep(flags.parents_concerns, raw.symptoms),
        vitals: keep(flags.measurements, raw.vitals),
        physical_exam: keep(flags.physical_exam, raw.physical_exam),
        problem_listing: keep(flags.problem_listing, raw.problem_listing),
        investigations: keep(flags.problem_listing, raw.investigations),
        diagnosis: keep(flags.conclusions, raw.diagnosis),
        plan: keep(flags.guidance, raw.plan),
        guidance: keep(flags.guidance, raw.guidance),
        comments: keep(flags.comments, raw.comments),
        follow_up: keep(flags.next_visit, raw.follow_up),
    }
}

/// Build the canonical report. `None` flags hide every current-visit field.
pub fn assemble(raw: RawVisit, flags: Option<SectionFlags>) -> VisitReport {
    let gate = flags.unwrap_or_else(SectionFlags::hidden);
    match raw.current {
        RawCurrentFields::Well(fields) => VisitReport::Well(WellReportData {
            meta: raw.meta,
            perinatal_summary: raw.perinatal_summary,
            past_medical_history: raw.past_medical_history,
            prior_visits: raw.prior_visits,
            current: gate_well(fields, &gate),
            flags,
        }),
        RawCurrentFields::Sick(fields) => VisitReport::Sick(SickReportData {
            meta: raw.meta,
            perinatal_summary: raw.perinatal_summary,
            past_medical_history: raw.past_medical_history,
            prior_visits: raw.prior_visits,
            current: gate_sick(fields, &gate),
            flags,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{self, RawDevelopment, RawFeeding};
    use crate::context::{Collaborators, ReportContext};
    use crate::db::{fixtures, SchemaCapability};
    use crate::models::{MilestoneSummary, VisitRef};
    use crate::visibility::VisitShape;
    use chrono::NaiveDate;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    fn raw_well() -> RawWellFields {
        RawWellFields {
            parents_concerns: Some("Picky eater".into()),
            feeding: RawFeeding {
                milk: vec![pair("Milk", "breast")],
                solids: vec![pair("Solids started", "Yes")],
                older: vec![pair("Dairy intake", "500 ml")],
                comment: None,
            },
            supplementation: vec![pair("Vitamin D", "Yes")],
            development: RawDevelopment {
                score: vec![pair("Developmental test score", "52")],
                result: vec![pair("Developmental test result", "Pass")],
                mchat: vec![pair("M-CHAT score", "3")],
            },
            milestones: MilestoneSummary {
                achieved: 1,
                total: 2,
                flags: vec!["Walks (Delayed)".into()],
            },
            conclusions: Some("Healthy".into()),
            ..Default::default()
        }
    }

    fn collected(visit: VisitRef) -> RawVisit {
        let conn = fixtures::seeded_bundle();
        let cap = SchemaCapability::probe(&conn);
        let generated = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
        aggregate::collect(
            &conn,
            &cap,
            &ReportContext::new("/unused"),
            visit,
            Collaborators::default(),
            generated,
        )
        .unwrap()
    }

    #[test]
    fn shape_trims_feeding_and_development_items() {
        let flags = SectionFlags::from_shape(VisitShape {
            solids: true,
            dev_test_score: true,
            ..Default::default()
        });
        let gated = gate_well(raw_well(), &flags);
        assert_eq!(gated.feeding, vec![pair("Solids started", "Yes")]);
        assert_eq!(gated.development, vec![pair("Developmental test score", "52")]);
        assert!(gated.supplementation.is_empty());
        assert_eq!(gated.parents_concerns.as_deref(), Some("Picky eater"));
        assert_eq!(gated.milestones.total, 2);
    }

    #[test]
    fn fully_visible_keeps_everything() {
        let gated = gate_well(raw_well(), &SectionFlags::all_visible());
        assert_eq!(gated.feeding.len(), 3);
        assert_eq!(gated.development.len(), 3);
        assert_eq!(gated.supplementation.len(), 1);
    }

    #[test]
    fn no_profile_hides_every_current_field_but_not_context() {
        let hidden = assemble(collected(VisitRef::well(6)), None);
        let visible = assemble(collected(VisitRef::well(6)), Some(SectionFlags::all_visible()));

        let (VisitReport::Well(h), VisitReport::Well(v)) = (&hidden, &visible) else {
            panic!("expected well reports");
        };
        assert_eq!(h.current, WellVisitFields::default());
        assert_ne!(v.current, WellVisitFields::default());
        assert_eq!(h.perinatal_summary, v.perinatal_summary);
        assert_eq!(h.past_medical_history, v.past_medical_history);
        assert_eq!(h.prior_visits, v.prior_visits);
        assert_eq!(h.meta, v.meta);
        assert!(h.flags.is_none());
    }

    #[test]
    fn sick_fields_follow_mapped_flags() {
        let mut flags = SectionFlags::from_shape(VisitShape::default());
        flags.measurements = false;
        flags.guidance = false;
        let report = assemble(collected(VisitRef::sick(1)), Some(flags));
        let VisitReport::Sick(data) = report else {
            panic!("expected sick report");
        };
        assert!(data.current.vitals.is_empty());
        assert!(data.current.plan.is_none());
        assert_eq!(data.current.complaint.as_deref(), Some("Fever (2 days)"));
        assert!(data.current.diagnosis.is_some());

        let hidden = assemble(collected(VisitRef::sick(1)), None);
        let VisitReport::Sick(data) = hidden else {
            panic!("expected sick report");
        };
        assert_eq!(data.current, SickVisitFields::default());
        assert_eq!(data.prior_visits.len(), 5);
    }
}
