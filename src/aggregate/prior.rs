use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::{tables, RowMap, SchemaCapability, SelectQuery};
use crate::models::{PriorVisitFinding, VisitKind, VisitRef};
use crate::visibility::{canonical_visit_type, visit_type_label};

pub const MAX_PRIOR_VISITS: usize = 5;
pub const MAX_LINES_PER_VISIT: usize = 3;
const MAX_LINE_CHARS: usize = 180;

pub const WELL_DATE_KEYS: &[&str] = &["visit_date", "date", "created_at"];
pub const SICK_DATE_KEYS: &[&str] = &["visit_date", "created_at", "date"];

/// Condensed-line sources in priority order.
const LINE_PRIORITY: &[(&str, &[&str])] = &[
    ("Issues since last visit", &["issues_since_last", "issues_since_last_visit"]),
    ("Problems", &["problem_listing", "problems"]),
    ("Conclusions", &["conclusions", "diagnosis"]),
    ("Parents' concerns", &["parent_concerns", "parents_concerns", "main_complaint"]),
    ("Comments", &["comments", "comment"]),
];

fn condense(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= MAX_LINE_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(MAX_LINE_CHARS - 1).collect();
    format!("{}\u{2026}", cut.trim_end())
}

/// At most three "Label: text" lines, highest-priority sources first.
pub fn condensed_lines(row: &RowMap) -> Vec<String> {
    LINE_PRIORITY
        .iter()
        .filter_map(|(label, keys)| row.text(keys).map(|t| format!("{label}: {}", condense(&t))))
        .take(MAX_LINES_PER_VISIT)
        .collect()
}

fn title_for(kind: VisitKind, row: &RowMap) -> String {
    match kind {
        VisitKind::Well => match row
            .text(&["visit_type", "visit_type_id", "type"])
            .map(|raw| canonical_visit_type(&raw).map(visit_type_label).unwrap_or(raw))
        {
            Some(label) => format!("Well visit \u{2014} {label}"),
            None => "Well visit".to_string(),
        },
        VisitKind::Sick => match row.text(&["main_complaint", "complaint"]) {
            Some(complaint) => format!("Sick visit \u{2014} {}", condense(&complaint)),
            None => "Sick visit".to_string(),
        },
    }
}

struct Candidate {
    kind: VisitKind,
    at: NaiveDateTime,
    row: RowMap,
}

fn dated_rows(
    conn: &Connection,
    cap: &SchemaCapability,
    kind: VisitKind,
    patient_id: i64,
    exclude: VisitRef,
) -> Vec<Candidate> {
    let (candidates, date_keys) = match kind {
        VisitKind::Well => (tables::WELL_VISITS, WELL_DATE_KEYS),
        VisitKind::Sick => (tables::SICK_EPISODES, SICK_DATE_KEYS),
    };
    let Some(table) = cap.resolve_table(candidates) else {
        return Vec::new();
    };
    let Some(fk) = cap.patient_fk(table) else {
        tracing::debug!(table, "No patient foreign key, skipping prior visits");
        return Vec::new();
    };

    SelectQuery::from(table)
        .eq(fk, patient_id)
        .fetch_lenient(conn)
        .into_iter()
        .filter(|row| !(kind == exclude.kind && row.int(&["id"]) == Some(exclude.id)))
        .filter_map(|row| {
            let at = row.datetime(date_keys)?;
            Some(Candidate { kind, at, row })
        })
        .collect()
}

/// Up to five visits of either kind strictly before `before`, newest first.
pub fn prior_visits(
    conn: &Connection,
    cap: &SchemaCapability,
    patient_id: i64,
    current: VisitRef,
    before: Option<NaiveDateTime>,
) -> Vec<PriorVisitFinding> {
    let Some(before) = before else {
        tracing::warn!(visit = %current, "Current visit has no date, prior visits skipped");
        return Vec::new();
    };
    let before_day = before.date();

    let mut all = dated_rows(conn, cap, VisitKind::Well, patient_id, current);
    all.extend(dated_rows(conn, cap, VisitKind::Sick, patient_id, current));
    all.retain(|c| c.at.date() < before_day);
    all.sort_by(|a, b| b.at.cmp(&a.at));
    all.truncate(MAX_PRIOR_VISITS);

    all.into_iter()
        .map(|c| PriorVisitFinding {
            kind: c.kind,
            title: title_for(c.kind, &c.row),
            date: c.at.format("%Y-%m-%d").to_string(),
            lines: condensed_lines(&c.row),
        })
        .collect()
}
