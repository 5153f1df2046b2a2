//! Declarative field tables: label, candidate columns, value kind.

use crate::age::display_date;
use crate::db::{format_number, RowMap};
use crate::models::{ExamGroup, FieldList};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    YesNo,
    /// Numeric with a unit suffix (may be empty).
    Number(&'static str),
    Date,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub label: &'static str,
    pub keys: &'static [&'static str],
    pub kind: FieldKind,
}

pub const fn text(label: &'static str, keys: &'static [&'static str]) -> FieldSpec {
    FieldSpec { label, keys, kind: FieldKind::Text }
}

pub const fn yes_no(label: &'static str, keys: &'static [&'static str]) -> FieldSpec {
    FieldSpec { label, keys, kind: FieldKind::YesNo }
}

pub const fn number(label: &'static str, keys: &'static [&'static str], unit: &'static str) -> FieldSpec {
    FieldSpec { label, keys, kind: FieldKind::Number(unit) }
}

pub const fn date(label: &'static str, keys: &'static [&'static str]) -> FieldSpec {
    FieldSpec { label, keys, kind: FieldKind::Date }
}

pub fn field_value(row: &RowMap, spec: &FieldSpec) -> Option<String> {
    match spec.kind {
        FieldKind::Text => row.text(spec.keys),
        FieldKind::YesNo => match row.flag(spec.keys) {
            Some(true) => Some("Yes".to_string()),
            Some(false) => Some("No".to_string()),
            // free text in a yes/no column is still worth showing
            None => row.text(spec.keys),
        },
        FieldKind::Number(unit) => match row.real(spec.keys) {
            Some(v) if unit.is_empty() => Some(format_number(v)),
            Some(v) => Some(format!("{} {unit}", format_number(v))),
            None => row.text(spec.keys),
        },
        FieldKind::Date => row.text(spec.keys).map(|raw| display_date(&raw)),
    }
}

/// Ordered label/value pairs for every spec with a value.
pub fn collect_fields(row: &RowMap, specs: &[FieldSpec]) -> FieldList {
    specs
        .iter()
        .filter_map(|spec| field_value(row, spec).map(|v| (spec.label.to_string(), v)))
        .collect()
}

/// "Label: value; Label: value" over every spec with a value.
pub fn summarize(row: &RowMap, specs: &[FieldSpec]) -> Option<String> {
    let parts: Vec<String> = collect_fields(row, specs)
        .into_iter()
        .map(|(label, value)| format!("{label}: {value}"))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

// ═══════════════════════════════════════════════════════════
// Physical exam
// ═══════════════════════════════════════════════════════════

/// One exam finding: a normal/abnormal flag column and/or a free-text column.
#[derive(Debug, Clone, Copy)]
pub struct ExamItem {
    pub label: &'static str,
    pub normal_keys: &'static [&'static str],
    pub comment_keys: &'static [&'static str],
}

pub const fn exam(
    label: &'static str,
    normal_keys: &'static [&'static str],
    comment_keys: &'static [&'static str],
) -> ExamItem {
    ExamItem { label, normal_keys, comment_keys }
}

#[derive(Debug, Clone, Copy)]
pub struct ExamSection {
    pub title: &'static str,
    pub items: &'static [ExamItem],
}

fn exam_line(row: &RowMap, item: &ExamItem) -> Option<String> {
    let normal = if item.normal_keys.is_empty() {
        None
    } else {
        row.flag(item.normal_keys)
    };
    let comment = if item.comment_keys.is_empty() {
        None
    } else {
        row.text(item.comment_keys)
    };
    let label = item.label;
    match (normal, comment) {
        (Some(true), None) => Some(format!("{label}: normal")),
        (Some(true), Some(c)) => Some(format!("{label}: normal \u{2014} {c}")),
        (Some(false), None) => Some(format!("{label}: abnormal")),
        (Some(false), Some(c)) => Some(format!("{label}: abnormal \u{2014} {c}")),
        (None, Some(c)) => Some(format!("{label}: {c}")),
        (None, None) => None,
    }
}

/// Exam groups in table order; groups without any finding are dropped.
pub fn collect_exam(row: &RowMap, sections: &[ExamSection]) -> Vec<ExamGroup> {
    sections
        .iter()
        .filter_map(|section| {
            let lines: Vec<String> = section
                .items
                .iter()
                .filter_map(|item| exam_line(row, item))
                .collect();
            (!lines.is_empty()).then(|| ExamGroup {
                title: section.title.to_string(),
                lines,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        RowMap::from_pairs(pairs.iter().map(|(k, v)| (*k, v.clone())))
    }

    const SPECS: &[FieldSpec] = &[
        text("Birth mode", &["birth_mode", "delivery_mode"]),
        number("Term", &["birth_term_weeks"], "wk"),
        yes_no("Vitamin K", &["vitamin_k"]),
        date("Discharge", &["maternity_discharge_date"]),
    ];

    #[test]
    fn summarize_skips_absent_columns_in_table_order() {
        let r = row(&[
            ("vitamin_k", Value::Integer(1)),
            ("delivery_mode", Value::Text("Vaginal".into())),
            ("maternity_discharge_date", Value::Text("2024-01-04T09:00:00Z".into())),
        ]);
        assert_eq!(
            summarize(&r, SPECS).unwrap(),
            "Birth mode: Vaginal; Vitamin K: Yes; Discharge: 2024-01-04"
        );
    }

    #[test]
    fn summarize_of_empty_row_is_none() {
        assert_eq!(summarize(&RowMap::default(), SPECS), None);
    }

    #[test]
    fn number_with_unit() {
        let r = row(&[("birth_term_weeks", Value::Real(39.0))]);
        assert_eq!(collect_fields(&r, SPECS), vec![("Term".into(), "39 wk".into())]);
    }

    #[test]
    fn exam_lines_combine_flag_and_comment() {
        const GROUPS: &[ExamSection] = &[
            ExamSection {
                title: "Cardiorespiratory",
                items: &[
                    exam("Heart", &["pe_heart_normal"], &["pe_heart_comment"]),
                    exam("Lungs", &[], &["lungs"]),
                ],
            },
            ExamSection {
                title: "Skin",
                items: &[exam("Skin", &["pe_skin_normal"], &[])],
            },
        ];
        let r = row(&[
            ("pe_heart_normal", Value::Integer(0)),
            ("pe_heart_comment", Value::Text("soft murmur".into())),
            ("lungs", Value::Text("clear".into())),
        ]);
        let groups = collect_exam(&r, GROUPS);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].lines,
            vec!["Heart: abnormal \u{2014} soft murmur".to_string(), "Lungs: clear".to_string()]
        );
    }
}
