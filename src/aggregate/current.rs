//! Current-visit structured fields, read from the whole visit row.

use rusqlite::Connection;

use super::fields::{
    collect_exam, collect_fields, exam, number, text, yes_no, date, ExamSection, FieldSpec,
};
use super::{RawDevelopment, RawFeeding, RawSickFields, RawWellFields};
use crate::db::{format_number, tables, RowMap, SchemaCapability, SelectQuery};
use crate::models::{Measurements, MilestoneSummary};

// ═══════════════════════════════════════════════════════════
// Well visit field tables
// ═══════════════════════════════════════════════════════════

const PARENTS_CONCERNS: &[&str] = &["parent_concerns", "parents_concerns", "concerns"];
const ISSUES_SINCE_LAST: &[&str] = &["issues_since_last", "issues_since_last_visit"];

const MILK_FEEDING: &[FieldSpec] = &[
    text("Milk", &["milk_types", "feeding_milk_types", "milk_type"]),
    number("Volume per feed", &["feed_volume_ml", "feeding_volume_ml"], "ml"),
    number("Feeds per 24 h", &["feed_freq_per_24h", "feeds_per_day"], ""),
    yes_no("Regurgitation", &["regurgitation"]),
    text("Feeding difficulty", &["feeding_issue", "feeding_difficulty"]),
];

const SOLIDS_FEEDING: &[FieldSpec] = &[
    yes_no("Solids started", &["solid_food_started"]),
    date("Solids start date", &["solid_food_start_date"]),
    text("Solid food quality", &["solid_food_quality"]),
    text("Solid food notes", &["solid_food_comment"]),
];

const OLDER_FEEDING: &[FieldSpec] = &[
    text("Food variety", &["food_variety_quality"]),
    text("Dairy intake", &["dairy_amount_text", "dairy_amount"]),
    yes_no("Eats independently", &["feeds_self", "self_feeding"]),
];

const FEEDING_COMMENT: &[&str] = &["feeding_comment", "feeding_notes"];

const SUPPLEMENTATION: &[FieldSpec] = &[
    yes_no("Vitamin D", &["vitamin_d_given", "vit_d_given"]),
    text("Vitamin D dose", &["vitamin_d_dose"]),
    yes_no("Iron", &["iron_given"]),
    text("Other supplements", &["other_supplements"]),
    text("Notes", &["supplementation_comment"]),
];

const SLEEP: &[FieldSpec] = &[
    text("Hours per 24 h", &["sleep_hours_text", "sleep_hours"]),
    yes_no("Regular schedule", &["sleep_regular"]),
    yes_no("Snoring", &["sleep_snoring", "snoring"]),
    yes_no("Sleep issue reported", &["sleep_issue_reported"]),
    text("Sleep issue", &["sleep_issue_text"]),
    text("Notes", &["sleep_comment"]),
];

const DEV_SCORE: &[FieldSpec] =
    &[number("Developmental test score", &["devtest_score", "dev_test_score", "asq_score"], "")];
const DEV_RESULT: &[FieldSpec] =
    &[text("Developmental test result", &["devtest_result", "dev_test_result", "asq_result"])];
const MCHAT: &[FieldSpec] = &[
    number("M-CHAT score", &["mchat_score"], ""),
    text("M-CHAT result", &["mchat_result"]),
];

const WEIGHT_KG: &[&str] = &["weight_today_kg", "weight_kg"];
const WEIGHT_G: &[&str] = &["weight_today_g", "weight_g"];
const LENGTH_CM: &[&str] = &["length_today_cm", "length_cm", "height_cm"];
const HEAD_CM: &[&str] = &["head_circ_today_cm", "head_circumference_cm", "hc_cm"];
const DELTA_WEIGHT_G: &[&str] = &["delta_weight_g"];
const DELTA_DAYS: &[&str] = &["delta_days_since_discharge", "delta_days"];

const WELL_EXAM: &[ExamSection] = &[
    ExamSection {
        title: "General",
        items: &[
            exam("Trophic state", &["pe_trophic_normal"], &["pe_trophic_comment"]),
            exam("Hydration", &["pe_hydration_normal"], &["pe_hydration_comment"]),
            exam("Colour", &["pe_color_normal"], &["pe_color_comment"]),
            exam("Tone", &["pe_tone_normal"], &["pe_tone_comment"]),
        ],
    },
    ExamSection {
        title: "Head and neck",
        items: &[
            exam("Fontanelle", &["pe_fontanelle_normal"], &["pe_fontanelle_comment"]),
            exam("Eyes", &["pe_eyes_normal"], &["pe_eyes_comment"]),
            exam("Ears", &["pe_ears_normal"], &["pe_ears_comment"]),
            exam("Mouth", &["pe_mouth_normal"], &["pe_mouth_comment"]),
        ],
    },
    ExamSection {
        title: "Cardiorespiratory",
        items: &[
            exam("Heart", &["pe_heart_normal"], &["pe_heart_comment"]),
            exam("Lungs", &["pe_lungs_normal", "pe_breathing_normal"], &["pe_lungs_comment"]),
            exam("Femoral pulses", &["pe_femoral_pulses_normal"], &["pe_femoral_pulses_comment"]),
        ],
    },
    ExamSection {
        title: "Abdomen",
        items: &[
            exam("Abdomen", &["pe_abdomen_normal"], &["pe_abdomen_comment"]),
            exam("Umbilicus", &["pe_umbilic_normal"], &["pe_umbilic_comment"]),
        ],
    },
    ExamSection {
        title: "Genitalia",
        items: &[
            exam("Genitalia", &["pe_genitalia_normal"], &["pe_genitalia_comment"]),
            exam("Testes descended", &["pe_testicles_descended"], &[]),
        ],
    },
    ExamSection {
        title: "Skin",
        items: &[exam("Skin", &["pe_skin_normal"], &["pe_skin_comment"])],
    },
    ExamSection {
        title: "Musculoskeletal",
        items: &[
            exam("Hips", &["pe_hips_normal"], &["pe_hips_comment"]),
            exam("Spine", &["pe_spine_normal"], &["pe_spine_comment"]),
        ],
    },
    ExamSection {
        title: "Neurological",
        items: &[
            exam("Neurology", &["pe_neuro_normal"], &["pe_neuro_comment"]),
            exam("Primitive reflexes", &["pe_moro_normal", "pe_reflexes_normal"], &["pe_reflexes_comment"]),
        ],
    },
];

const PROBLEM_LISTING: &[&str] = &["problem_listing", "problems"];
const CONCLUSIONS: &[&str] = &["conclusions", "conclusion"];
const GUIDANCE: &[&str] = &["anticipatory_guidance", "guidance"];
const COMMENTS: &[&str] = &["comments", "comment"];
const NEXT_VISIT: &[&str] = &["next_visit_date", "next_visit", "follow_up_date"];

// ═══════════════════════════════════════════════════════════
// Milestones
// ═══════════════════════════════════════════════════════════

/// Statuses that count as achieved. Compared trimmed and case-insensitive.
pub const ACHIEVED_STATUSES: &[&str] =
    &["achieved", "done", "passed", "ok", "normal", "complete", "completed"];

const MILESTONE_VISIT_FK: &[&str] = &["visit_id", "well_visit_id"];

pub fn is_achieved(status: &str) -> bool {
    let s = status.trim().to_lowercase();
    ACHIEVED_STATUSES.contains(&s.as_str())
}

/// Count and flag milestone rows for one well visit.
pub fn summarize_milestones(rows: &[RowMap]) -> MilestoneSummary {
    let mut summary = MilestoneSummary::default();
    for row in rows {
        summary.total += 1;
        let status = row.text(&["status", "state"]).unwrap_or_default();
        if is_achieved(&status) {
            summary.achieved += 1;
            continue;
        }
        let label = row
            .text(&["label", "name", "code"])
            .unwrap_or_else(|| "Milestone".to_string());
        let status = if status.is_empty() { "not recorded".to_string() } else { status };
        let line = match row.text(&["note", "notes", "comment"]) {
            Some(note) => format!("{label} ({status}) \u{2014} {note}"),
            None => format!("{label} ({status})"),
        };
        summary.flags.push(line);
    }
    summary
}

pub fn fetch_milestones(conn: &Connection, cap: &SchemaCapability, visit_id: i64) -> MilestoneSummary {
    let Some(table) = cap.resolve_table(tables::MILESTONES) else {
        tracing::debug!("No milestones table");
        return MilestoneSummary::default();
    };
    let Some(fk) = cap.resolve_column(table, MILESTONE_VISIT_FK) else {
        tracing::debug!(table, "Milestones table has no visit foreign key");
        return MilestoneSummary::default();
    };
    let mut query = SelectQuery::from(table).eq(fk, visit_id);
    if cap.has_column(table, "id") {
        query = query.order_asc("id");
    }
    summarize_milestones(&query.fetch_lenient(conn))
}

fn measurements(row: &RowMap) -> Measurements {
    let weight_kg = row
        .real(WEIGHT_KG)
        .or_else(|| row.real(WEIGHT_G).map(|g| g / 1000.0));
    let weight_gain = match (row.real(DELTA_WEIGHT_G), row.real(DELTA_DAYS)) {
        (Some(grams), Some(days)) if days > 0.0 => Some(format!(
            "{} g over {} days ({:.0} g/day)",
            format_number(grams),
            format_number(days),
            grams / days
        )),
        (Some(grams), _) => Some(format!("{} g", format_number(grams))),
        _ => None,
    };
    Measurements {
        weight_kg,
        length_cm: row.real(LENGTH_CM),
        head_circumference_cm: row.real(HEAD_CM),
        weight_gain,
    }
}

pub fn well_fields(
    conn: &Connection,
    cap: &SchemaCapability,
    visit_id: i64,
    row: &RowMap,
) -> RawWellFields {
    RawWellFields {
        parents_concerns: row.text(PARENTS_CONCERNS),
        issues_since_last: row.text(ISSUES_SINCE_LAST),
        feeding: RawFeeding {
            milk: collect_fields(row, MILK_FEEDING),
            solids: collect_fields(row, SOLIDS_FEEDING),
            older: collect_fields(row, OLDER_FEEDING),
            comment: row.text(FEEDING_COMMENT),
        },
        supplementation: collect_fields(row, SUPPLEMENTATION),
        sleep: collect_fields(row, SLEEP),
        development: RawDevelopment {
            score: collect_fields(row, DEV_SCORE),
            result: collect_fields(row, DEV_RESULT),
            mchat: collect_fields(row, MCHAT),
        },
        milestones: fetch_milestones(conn, cap, visit_id),
        measurements: measurements(row),
        physical_exam: collect_exam(row, WELL_EXAM),
        problem_listing: row.text(PROBLEM_LISTING),
        conclusions: row.text(CONCLUSIONS),
        guidance: row.text(GUIDANCE),
        comments: row.text(COMMENTS),
        next_visit: row
            .text(NEXT_VISIT)
            .map(|raw| crate::age::display_date(&raw)),
    }
}

// ═══════════════════════════════════════════════════════════
// Sick visit field tables
// ═══════════════════════════════════════════════════════════

const COMPLAINT: &[&str] = &["main_complaint", "complaint", "chief_complaint"];
const DURATION: &[&str] = &["duration", "complaint_duration"];
const HISTORY: &[&str] = &["hpi", "history_present_illness", "history"];

const SYMPTOMS: &[FieldSpec] = &[
    text("Appearance", &["appearance"]),
    text("Feeding", &["feeding"]),
    text("Breathing", &["breathing"]),
    text("Urination", &["urination"]),
    text("Pain", &["pain", "pain_location"]),
    text("Stools", &["stools"]),
    text("Context", &["context"]),
];

const VITALS: &[FieldSpec] = &[
    number("Temperature", &["temperature_c", "temperature", "temp_c"], "\u{b0}C"),
    number("Heart rate", &["heart_rate", "hr"], "bpm"),
    number("Respiratory rate", &["respiratory_rate", "rr"], "/min"),
    number("SpO2", &["spo2", "o2_sat"], "%"),
    number("Weight", &["weight_kg"], "kg"),
    number("Height", &["height_cm", "length_cm"], "cm"),
];

const BP_SYSTOLIC: &[&str] = &["bp_systolic", "systolic"];
const BP_DIASTOLIC: &[&str] = &["bp_diastolic", "diastolic"];
const VITALS_EPISODE_FK: &[&str] = &["episode_id", "sick_episode_id"];

const SICK_EXAM: &[ExamSection] = &[
    ExamSection {
        title: "General",
        items: &[
            exam("General appearance", &[], &["general_appearance"]),
            exam("Hydration", &[], &["hydration"]),
            exam("Colour", &[], &["color", "colour"]),
        ],
    },
    ExamSection {
        title: "ENT",
        items: &[
            exam("ENT", &[], &["ent"]),
            exam("Right ear", &[], &["right_ear", "ear_right"]),
            exam("Left ear", &[], &["left_ear", "ear_left"]),
            exam("Right eye", &[], &["right_eye", "eye_right"]),
            exam("Left eye", &[], &["left_eye", "eye_left"]),
        ],
    },
    ExamSection {
        title: "Cardiorespiratory",
        items: &[exam("Heart", &[], &["heart"]), exam("Lungs", &[], &["lungs"])],
    },
    ExamSection {
        title: "Abdomen",
        items: &[
            exam("Abdomen", &[], &["abdomen"]),
            exam("Peristalsis", &[], &["peristalsis"]),
        ],
    },
    ExamSection {
        title: "Genitalia",
        items: &[exam("Genitalia", &[], &["genitalia"])],
    },
    ExamSection {
        title: "Skin",
        items: &[exam("Skin", &[], &["skin"])],
    },
    ExamSection {
        title: "Lymph nodes",
        items: &[exam("Lymph nodes", &[], &["lymph_nodes", "nodes"])],
    },
    ExamSection {
        title: "Neurological",
        items: &[exam("Neurological", &[], &["neurological", "neuro"])],
    },
    ExamSection {
        title: "Musculoskeletal",
        items: &[exam("Musculoskeletal", &[], &["musculoskeletal", "msk"])],
    },
];

const INVESTIGATIONS: &[&str] = &["complementary_investigations", "investigations"];
const DIAGNOSIS: &[&str] = &["diagnosis", "final_diagnosis"];
const ICD10: &[&str] = &["icd10", "icd10_code", "icd_10"];
const PLAN_PARTS: &[(&str, &[&str])] = &[
    ("Medications", &["medications", "prescriptions"]),
    ("Treatment", &["treatment"]),
    ("Plan", &["plan"]),
];

fn vitals_fields(row: &RowMap) -> Vec<(String, String)> {
    let mut fields = collect_fields(row, VITALS);
    if let (Some(sys), Some(dia)) = (row.real(BP_SYSTOLIC), row.real(BP_DIASTOLIC)) {
        fields.push((
            "Blood pressure".to_string(),
            format!("{}/{} mmHg", format_number(sys), format_number(dia)),
        ));
    }
    fields
}

/// Latest vitals row linked to the episode, else vitals columns on the
/// episode row itself.
fn episode_vitals(
    conn: &Connection,
    cap: &SchemaCapability,
    episode_id: i64,
    row: &RowMap,
) -> Vec<(String, String)> {
    let linked = cap.resolve_table(tables::VITALS).and_then(|table| {
        let fk = cap.resolve_column(table, VITALS_EPISODE_FK)?;
        let mut query = SelectQuery::from(table).eq(fk, episode_id);
        for &col in &["measured_at", "created_at", "id"] {
            if cap.has_column(table, col) {
                query = query.order_desc(col);
            }
        }
        query.fetch_one_lenient(conn)
    });
    match linked.map(|r| vitals_fields(&r)) {
        Some(fields) if !fields.is_empty() => fields,
        _ => vitals_fields(row),
    }
}

pub fn sick_fields(
    conn: &Connection,
    cap: &SchemaCapability,
    episode_id: i64,
    row: &RowMap,
) -> RawSickFields {
    let complaint = match (row.text(COMPLAINT), row.text(DURATION)) {
        (Some(c), Some(d)) => Some(format!("{c} ({d})")),
        (c, _) => c,
    };
    let diagnosis = match (row.text(DIAGNOSIS), row.text(ICD10)) {
        (Some(dx), Some(code)) => Some(format!("{dx} (ICD-10 {code})")),
        (Some(dx), None) => Some(dx),
        (None, Some(code)) => Some(format!("ICD-10 {code}")),
        (None, None) => None,
    };
    let plan_lines: Vec<String> = PLAN_PARTS
        .iter()
        .filter_map(|(label, keys)| row.text(keys).map(|t| format!("{label}: {t}")))
        .collect();

    RawSickFields {
        complaint,
        history: row.text(HISTORY),
        symptoms: collect_fields(row, SYMPTOMS),
        vitals: episode_vitals(conn, cap, episode_id, row),
        physical_exam: collect_exam(row, SICK_EXAM),
        problem_listing: row.text(PROBLEM_LISTING),
        investigations: row.text(INVESTIGATIONS),
        diagnosis,
        plan: (!plan_lines.is_empty()).then(|| plan_lines.join("\n")),
        guidance: row.text(GUIDANCE),
        comments: row.text(COMMENTS),
        follow_up: row
            .text(NEXT_VISIT)
            .map(|raw| crate::age::display_date(&raw)),
    }
}
