//! Format-neutral document built once per report.
//!
//! Every renderer walks the same blocks: the body first, then the charts.
//! Section wording lives here so the renderers never decide what a report
//! says, only how it looks.

use chrono::NaiveDateTime;

use crate::growth::ChartImage;
use crate::models::{
    ExamGroup, FieldList, PriorVisitFinding, ReportMeta, SickVisitFields, VisitKind, VisitReport,
    WellVisitFields, EM_DASH,
};

// ═══════════════════════════════════════════════════════════
// Section titles
// ═══════════════════════════════════════════════════════════

pub const TITLE_WELL: &str = "Well Visit Report";
pub const TITLE_SICK: &str = "Sick Visit Report";

pub const SECTION_VISIT_DETAILS: &str = "Visit Details";
pub const SECTION_PERINATAL: &str = "Perinatal History";
pub const SECTION_PAST_HISTORY: &str = "Past Medical History";
pub const SECTION_PREVIOUS_VISITS: &str = "Previous Visits";
pub const SECTION_GROWTH_CHARTS: &str = "Growth Charts";
pub const CURRENT_VISIT_PREFIX: &str = "Current Visit \u{2014} ";

/// Top-level section headings.
pub const SECTION_TITLES: &[&str] = &[
    SECTION_VISIT_DETAILS,
    SECTION_PERINATAL,
    SECTION_PAST_HISTORY,
    SECTION_PREVIOUS_VISITS,
    SECTION_GROWTH_CHARTS,
];

pub const SUB_PARENTS_CONCERNS: &str = "Parents' Concerns";
pub const SUB_ISSUES_SINCE_LAST: &str = "Issues Since Last Visit";
pub const SUB_FEEDING: &str = "Feeding";
pub const SUB_SUPPLEMENTATION: &str = "Supplementation";
pub const SUB_SLEEP: &str = "Sleep";
pub const SUB_DEVELOPMENT: &str = "Development";
pub const SUB_MILESTONES: &str = "Milestones";
pub const SUB_MEASUREMENTS: &str = "Measurements";
pub const SUB_PHYSICAL_EXAM: &str = "Physical Examination";
pub const SUB_PROBLEM_LISTING: &str = "Problem Listing";
pub const SUB_CONCLUSIONS: &str = "Conclusions";
pub const SUB_GUIDANCE: &str = "Anticipatory Guidance";
pub const SUB_COMMENTS: &str = "Comments";
pub const SUB_NEXT_VISIT: &str = "Next Visit";
pub const SUB_COMPLAINT: &str = "Presenting Complaint";
pub const SUB_HISTORY: &str = "History of Present Illness";
pub const SUB_SYMPTOMS: &str = "Symptoms";
pub const SUB_VITALS: &str = "Vital Signs";
pub const SUB_INVESTIGATIONS: &str = "Investigations";
pub const SUB_DIAGNOSIS: &str = "Diagnosis";
pub const SUB_PLAN: &str = "Treatment Plan";
pub const SUB_FOLLOW_UP: &str = "Follow-up";

/// Current-visit sub-section headings of both report kinds.
pub const SUBSECTION_TITLES: &[&str] = &[
    SUB_PARENTS_CONCERNS,
    SUB_ISSUES_SINCE_LAST,
    SUB_FEEDING,
    SUB_SUPPLEMENTATION,
    SUB_SLEEP,
    SUB_DEVELOPMENT,
    SUB_MILESTONES,
    SUB_MEASUREMENTS,
    SUB_PHYSICAL_EXAM,
    SUB_PROBLEM_LISTING,
    SUB_CONCLUSIONS,
    SUB_GUIDANCE,
    SUB_COMMENTS,
    SUB_NEXT_VISIT,
    SUB_COMPLAINT,
    SUB_HISTORY,
    SUB_SYMPTOMS,
    SUB_VITALS,
    SUB_INVESTIGATIONS,
    SUB_DIAGNOSIS,
    SUB_PLAN,
    SUB_FOLLOW_UP,
];

/// Shown when no visibility rule matched the visit.
pub const NO_PROFILE_NOTICE: &str =
    "No current-visit sections apply to this visit type at this age.";

// ═══════════════════════════════════════════════════════════
// Blocks
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    Title,
    Section,
    Subsection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    pub title: String,
    pub lines: Vec<String>,
}

impl From<&ExamGroup> for LineGroup {
    fn from(group: &ExamGroup) -> Self {
        Self {
            title: group.title.clone(),
            lines: group.lines.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading { level: HeadingLevel, text: String },
    /// May hold several lines separated by `\n`.
    Paragraph(String),
    BulletList(Vec<String>),
    KeyValue(FieldList),
    GroupedLines(Vec<LineGroup>),
    Image(ChartImage),
    /// Always starts a new page in paged formats.
    PageBreak,
}

impl Block {
    fn heading(level: HeadingLevel, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentModel {
    pub title: String,
    pub author: Option<String>,
    pub generated_at: NaiveDateTime,
    pub body: Vec<Block>,
    pub charts: Vec<Block>,
}

impl DocumentModel {
    /// Body then charts, the order linear renderers emit.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.body.iter().chain(self.charts.iter())
    }

    pub fn images(&self) -> impl Iterator<Item = &ChartImage> {
        self.blocks().filter_map(|b| match b {
            Block::Image(chart) => Some(chart),
            _ => None,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Building
// ═══════════════════════════════════════════════════════════

/// Accumulates current-visit sub-sections, skipping empty ones.
struct SectionWriter<'a> {
    blocks: &'a mut Vec<Block>,
    written: usize,
}

impl SectionWriter<'_> {
    fn push(&mut self, title: &str, content: Option<Block>) {
        if let Some(content) = content {
            self.blocks.push(Block::heading(HeadingLevel::Subsection, title));
            self.blocks.push(content);
            self.written += 1;
        }
    }

    fn text(&mut self, title: &str, value: &Option<String>) {
        self.push(title, value.clone().map(Block::Paragraph));
    }

    fn fields(&mut self, title: &str, fields: &FieldList) {
        self.push(title, (!fields.is_empty()).then(|| Block::KeyValue(fields.clone())));
    }

    fn exam(&mut self, groups: &[ExamGroup]) {
        self.push(
            SUB_PHYSICAL_EXAM,
            (!groups.is_empty()).then(|| Block::GroupedLines(groups.iter().map(LineGroup::from).collect())),
        );
    }
}

fn well_sections(fields: &WellVisitFields, out: &mut SectionWriter<'_>) {
    out.text(SUB_PARENTS_CONCERNS, &fields.parents_concerns);
    out.text(SUB_ISSUES_SINCE_LAST, &fields.issues_since_last);
    out.fields(SUB_FEEDING, &fields.feeding);
    out.fields(SUB_SUPPLEMENTATION, &fields.supplementation);
    out.fields(SUB_SLEEP, &fields.sleep);
    out.fields(SUB_DEVELOPMENT, &fields.development);

    if !fields.milestones.is_empty() {
        let m = &fields.milestones;
        out.push(
            SUB_MILESTONES,
            Some(Block::Paragraph(format!("{} of {} achieved", m.achieved, m.total))),
        );
        if !m.flags.is_empty() {
            out.blocks.push(Block::BulletList(m.flags.clone()));
        }
    }

    out.fields(SUB_MEASUREMENTS, &fields.measurements.to_fields());
    out.exam(&fields.physical_exam);
    out.text(SUB_PROBLEM_LISTING, &fields.problem_listing);
    out.text(SUB_CONCLUSIONS, &fields.conclusions);
    out.text(SUB_GUIDANCE, &fields.guidance);
    out.text(SUB_COMMENTS, &fields.comments);
    out.text(SUB_NEXT_VISIT, &fields.next_visit);
}

fn sick_sections(fields: &SickVisitFields, out: &mut SectionWriter<'_>) {
    out.text(SUB_COMPLAINT, &fields.complaint);
    out.text(SUB_HISTORY, &fields.history);
    out.fields(SUB_SYMPTOMS, &fields.symptoms);
    out.fields(SUB_VITALS, &fields.vitals);
    out.exam(&fields.physical_exam);
    out.text(SUB_PROBLEM_LISTING, &fields.problem_listing);
    out.text(SUB_INVESTIGATIONS, &fields.investigations);
    out.text(SUB_DIAGNOSIS, &fields.diagnosis);
    out.text(SUB_PLAN, &fields.plan);
    out.text(SUB_GUIDANCE, &fields.guidance);
    out.text(SUB_COMMENTS, &fields.comments);
    out.text(SUB_FOLLOW_UP, &fields.follow_up);
}

fn context_text(blocks: &mut Vec<Block>, title: &str, value: Option<&str>) {
    blocks.push(Block::heading(HeadingLevel::Section, title));
    blocks.push(Block::Paragraph(value.unwrap_or(EM_DASH).to_string()));
}

fn prior_visit_blocks(blocks: &mut Vec<Block>, prior: &[PriorVisitFinding]) {
    blocks.push(Block::heading(HeadingLevel::Section, SECTION_PREVIOUS_VISITS));
    if prior.is_empty() {
        blocks.push(Block::Paragraph(EM_DASH.to_string()));
        return;
    }
    for finding in prior {
        blocks.push(Block::heading(HeadingLevel::Subsection, finding.date.clone()));
        blocks.push(Block::Paragraph(finding.title.clone()));
        if !finding.lines.is_empty() {
            blocks.push(Block::BulletList(finding.lines.clone()));
        }
    }
}

fn current_heading(meta: &ReportMeta) -> String {
    format!("{CURRENT_VISIT_PREFIX}{}", meta.visit_type_label)
}

/// Lay the report out as blocks. Each chart gets a page of its own.
pub fn build_document(report: &VisitReport, charts: &[ChartImage]) -> DocumentModel {
    let meta = report.meta();
    let title = match report.kind() {
        VisitKind::Well => TITLE_WELL,
        VisitKind::Sick => TITLE_SICK,
    };

    let mut body = vec![
        Block::heading(HeadingLevel::Title, title),
        Block::heading(HeadingLevel::Section, SECTION_VISIT_DETAILS),
        Block::KeyValue(meta.to_fields()),
    ];
    context_text(&mut body, SECTION_PERINATAL, report.perinatal_summary());
    context_text(&mut body, SECTION_PAST_HISTORY, report.past_medical_history());
    prior_visit_blocks(&mut body, report.prior_visits());

    body.push(Block::heading(HeadingLevel::Section, current_heading(meta)));
    let mut writer = SectionWriter {
        blocks: &mut body,
        written: 0,
    };
    match report {
        VisitReport::Well(data) => well_sections(&data.current, &mut writer),
        VisitReport::Sick(data) => sick_sections(&data.current, &mut writer),
    }
    if writer.written == 0 {
        let notice = if report.flags().is_none() {
            NO_PROFILE_NOTICE
        } else {
            EM_DASH
        };
        body.push(Block::Paragraph(notice.to_string()));
    }

    let mut chart_blocks = Vec::new();
    for (i, chart) in charts.iter().enumerate() {
        chart_blocks.push(Block::PageBreak);
        if i == 0 {
            chart_blocks.push(Block::heading(HeadingLevel::Section, SECTION_GROWTH_CHARTS));
        }
        chart_blocks.push(Block::Image(chart.clone()));
    }

    DocumentModel {
        title: title.to_string(),
        author: meta.clinician.clone(),
        generated_at: meta.generated_at,
        body,
        charts: chart_blocks,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::growth::Indicator;
    use crate::models::{MilestoneSummary, SickReportData, WellReportData};
    use crate::visibility::SectionFlags;
    use chrono::NaiveDate;

    pub(crate) fn meta(kind: VisitKind) -> ReportMeta {
        ReportMeta {
            kind,
            patient_name: "Lina Haddad".into(),
            alias: Some("Blue Fox".into()),
            mrn: Some("MRN-0042".into()),
            dob: NaiveDate::from_ymd_opt(2024, 1, 1),
            sex: None,
            visit_date: NaiveDate::from_ymd_opt(2025, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
            age_display: "1y".into(),
            clinician: Some("Sara Benali".into()),
            visit_type_id: "twelve_month".into(),
            visit_type_label: "12-month visit".into(),
            created_at: None,
            updated_at: None,
            generated_at: NaiveDate::from_ymd_opt(2025, 2, 1)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap(),
        }
    }

    pub(crate) fn well_report() -> VisitReport {
        VisitReport::Well(WellReportData {
            meta: meta(VisitKind::Well),
            perinatal_summary: Some("Birth weight: 3200 g".into()),
            past_medical_history: None,
            prior_visits: vec![PriorVisitFinding {
                kind: VisitKind::Well,
                title: "Well visit \u{2014} 9-month visit".into(),
                date: "2024-10-01".into(),
                lines: vec!["Problems: Eczema on cheeks".into()],
            }],
            current: WellVisitFields {
                parents_concerns: Some("Picky eater".into()),
                feeding: vec![("Milk".into(), "breast".into())],
                milestones: MilestoneSummary {
                    achieved: 2,
                    total: 3,
                    flags: vec!["Walks alone (Delayed) \u{2014} slow progress".into()],
                },
                conclusions: Some("Healthy".into()),
                ..Default::default()
            },
            flags: Some(SectionFlags::all_visible()),
        })
    }

    pub(crate) fn chart(indicator: Indicator) -> ChartImage {
        ChartImage {
            indicator,
            caption: indicator.caption(None),
            png: Vec::new(),
            width_px: 300,
            height_px: 200,
            width_pt: 510.0,
            height_pt: 340.0,
        }
    }

    fn headings(doc: &DocumentModel) -> Vec<String> {
        doc.blocks()
            .filter_map(|b| match b {
                Block::Heading { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn sections_follow_fixed_order() {
        let doc = build_document(&well_report(), &[]);
        assert_eq!(
            headings(&doc),
            vec![
                TITLE_WELL,
                SECTION_VISIT_DETAILS,
                SECTION_PERINATAL,
                SECTION_PAST_HISTORY,
                SECTION_PREVIOUS_VISITS,
                "2024-10-01",
                "Current Visit \u{2014} 12-month visit",
                SUB_PARENTS_CONCERNS,
                SUB_FEEDING,
                SUB_MILESTONES,
                SUB_CONCLUSIONS,
            ]
        );
        assert!(doc.charts.is_empty());
        assert_eq!(doc.author.as_deref(), Some("Sara Benali"));
    }

    #[test]
    fn absent_context_shows_em_dash() {
        let doc = build_document(&well_report(), &[]);
        let after_pmh = doc
            .body
            .iter()
            .skip_while(|b| !matches!(b, Block::Heading { text, .. } if text == SECTION_PAST_HISTORY))
            .nth(1);
        assert_eq!(after_pmh, Some(&Block::Paragraph(EM_DASH.to_string())));
    }

    #[test]
    fn milestone_flags_follow_counts() {
        let doc = build_document(&well_report(), &[]);
        let pos = doc
            .body
            .iter()
            .position(|b| matches!(b, Block::Heading { text, .. } if text == SUB_MILESTONES))
            .unwrap();
        assert_eq!(doc.body[pos + 1], Block::Paragraph("2 of 3 achieved".into()));
        assert!(matches!(&doc.body[pos + 2], Block::BulletList(items) if items.len() == 1));
    }

    #[test]
    fn each_chart_on_its_own_page() {
        let charts = [chart(Indicator::Weight), chart(Indicator::Length)];
        let doc = build_document(&well_report(), &charts);
        assert!(matches!(doc.charts[0], Block::PageBreak));
        assert!(matches!(&doc.charts[1], Block::Heading { text, .. } if text == SECTION_GROWTH_CHARTS));
        assert!(matches!(doc.charts[2], Block::Image(_)));
        assert!(matches!(doc.charts[3], Block::PageBreak));
        assert!(matches!(doc.charts[4], Block::Image(_)));
        assert_eq!(doc.images().count(), 2);
    }

    #[test]
    fn missing_profile_gets_notice() {
        let report = VisitReport::Sick(SickReportData {
            meta: meta(VisitKind::Sick),
            perinatal_summary: None,
            past_medical_history: None,
            prior_visits: Vec::new(),
            current: SickVisitFields::default(),
            flags: None,
        });
        let doc = build_document(&report, &[]);
        assert_eq!(doc.title, TITLE_SICK);
        assert_eq!(doc.body.last(), Some(&Block::Paragraph(NO_PROFILE_NOTICE.into())));
    }

    #[test]
    fn every_subsection_title_is_registered() {
        let doc = build_document(&well_report(), &[]);
        for block in &doc.body {
            if let Block::Heading {
                level: HeadingLevel::Subsection,
                text,
            } = block
            {
                let is_date = text.chars().next().is_some_and(|c| c.is_ascii_digit());
                assert!(is_date || SUBSECTION_TITLES.contains(&text.as_str()), "{text}");
            }
        }
    }
}
