//! Visibility rules: which current-visit sections a (visit type, age) pair shows.
//!
//! The rule table is data. A bundled default ships with the crate and a JSON
//! file named in the config replaces it. The first row whose type matches and
//! whose `[min, max)` age window contains the visit age wins. No match yields
//! `None`, and the assembler then hides every current-visit field.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ReportConfig};

/// Canonical id used for every sick visit.
pub const EPISODE_VISIT_TYPE: &str = "episode";

// ═══════════════════════════════════════════════════════════
// Flags
// ═══════════════════════════════════════════════════════════

/// Finer predicates describing what kind of visit this is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitShape {
    pub early_milk_only: bool,
    pub structured_feeding_under_12: bool,
    pub solids: bool,
    pub older_feeding: bool,
    pub supplementation: bool,
    pub dev_test_score: bool,
    pub dev_test_result: bool,
    pub mchat: bool,
}

impl VisitShape {
    pub fn all() -> Self {
        Self {
            early_milk_only: true,
            structured_feeding_under_12: true,
            solids: true,
            older_feeding: true,
            supplementation: true,
            dev_test_score: true,
            dev_test_result: true,
            mchat: true,
        }
    }
}

/// One boolean per current-visit section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionFlags {
    pub parents_concerns: bool,
    pub feeding: bool,
    pub supplementation: bool,
    pub sleep: bool,
    pub development: bool,
    pub milestones: bool,
    pub measurements: bool,
    pub physical_exam: bool,
    pub problem_listing: bool,
    pub conclusions: bool,
    pub guidance: bool,
    pub comments: bool,
    pub next_visit: bool,
    pub shape: VisitShape,
}

impl SectionFlags {
    /// Flags for a matched rule: the constant sections are always on, the rest
    /// derive from the shape.
    pub fn from_shape(shape: VisitShape) -> Self {
        Self {
            parents_concerns: true,
            feeding: shape.early_milk_only
                || shape.structured_feeding_under_12
                || shape.solids
                || shape.older_feeding,
            supplementation: shape.supplementation,
            sleep: true,
            development: shape.dev_test_score || shape.dev_test_result || shape.mchat,
            milestones: true,
            measurements: true,
            physical_exam: true,
            problem_listing: true,
            conclusions: true,
            guidance: true,
            comments: true,
            next_visit: true,
            shape,
        }
    }

    pub fn all_visible() -> Self {
        Self::from_shape(VisitShape::all())
    }

    /// Every section off. What a missing profile amounts to.
    pub fn hidden() -> Self {
        Self {
            parents_concerns: false,
            feeding: false,
            supplementation: false,
            sleep: false,
            development: false,
            milestones: false,
            measurements: false,
            physical_exam: false,
            problem_listing: false,
            conclusions: false,
            guidance: false,
            comments: false,
            next_visit: false,
            shape: VisitShape::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rule table
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub visit_type: String,
    /// Inclusive.
    pub min_age_months: f64,
    /// Exclusive.
    pub max_age_months: f64,
    #[serde(default)]
    pub shape: VisitShape,
}

impl VisibilityRule {
    fn matches(&self, visit_type: &str, age_months: f64) -> bool {
        self.visit_type == visit_type
            && age_months >= self.min_age_months
            && age_months < self.max_age_months
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRules {
    pub rules: Vec<VisibilityRule>,
}

const BUNDLED_RULES: &str = include_str!("../../resources/visibility_rules.json");

impl VisibilityRules {
    /// The table shipped with the crate. A broken bundled table is logged and
    /// replaced by an empty one, which hides every current-visit section.
    pub fn bundled() -> Self {
        Self::from_json(BUNDLED_RULES).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Bundled visibility rules are invalid");
            Self::default()
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let table: Self =
            serde_json::from_str(raw).map_err(|e| ConfigError::Rules(e.to_string()))?;
        table.validate()?;
        Ok(table)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// The configured override when set, the bundled table otherwise.
    pub fn from_config(config: &ReportConfig) -> Result<Self, ConfigError> {
        match &config.visibility_rules {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading visibility rules override");
                Self::load(path)
            }
            None => Ok(Self::bundled()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, rule) in self.rules.iter().enumerate() {
            if canonical_visit_type(&rule.visit_type) != Some(rule.visit_type.as_str()) {
                return Err(ConfigError::Rules(format!(
                    "row {i}: unknown visit type '{}'",
                    rule.visit_type
                )));
            }
            if !(rule.min_age_months >= 0.0 && rule.min_age_months < rule.max_age_months) {
                return Err(ConfigError::Rules(format!(
                    "row {i}: empty age window [{}, {})",
                    rule.min_age_months, rule.max_age_months
                )));
            }
        }
        Ok(())
    }

    /// Flags for a canonical visit type at `age_months`, or `None` when no row matches.
    pub fn visibility(&self, visit_type: &str, age_months: f64) -> Option<SectionFlags> {
        let found = self
            .rules
            .iter()
            .find(|rule| rule.matches(visit_type, age_months))
            .map(|rule| SectionFlags::from_shape(rule.shape));
        if found.is_none() {
            tracing::info!(visit_type, age_months, "No visibility rule matched");
        }
        found
    }
}

// ═══════════════════════════════════════════════════════════
// Visit types
// ═══════════════════════════════════════════════════════════

struct VisitType {
    id: &'static str,
    label: &'static str,
    aliases: &'static [&'static str],
}

const VISIT_TYPES: &[VisitType] = &[
    VisitType {
        id: "newborn_first",
        label: "Newborn first visit",
        aliases: &["newborn", "first_visit", "newborn_visit", "first", "nouveau_ne", "nn"],
    },
    VisitType {
        id: "one_month",
        label: "1-month visit",
        aliases: &["1_month", "1_months", "1m", "1_mo", "month_1", "un_mois"],
    },
    VisitType {
        id: "two_month",
        label: "2-month visit",
        aliases: &["2_month", "2_months", "2m", "2_mo", "month_2", "deux_mois"],
    },
    VisitType {
        id: "four_month",
        label: "4-month visit",
        aliases: &["4_month", "4_months", "4m", "4_mo", "month_4", "quatre_mois"],
    },
    VisitType {
        id: "six_month",
        label: "6-month visit",
        aliases: &["6_month", "6_months", "6m", "6_mo", "month_6", "six_mois"],
    },
    VisitType {
        id: "nine_month",
        label: "9-month visit",
        aliases: &["9_month", "9_months", "9m", "9_mo", "month_9", "neuf_mois"],
    },
    VisitType {
        id: "twelve_month",
        label: "12-month visit",
        aliases: &["12_month", "12_months", "12m", "12_mo", "one_year", "1_year", "1y", "douze_mois"],
    },
    VisitType {
        id: "fifteen_month",
        label: "15-month visit",
        aliases: &["15_month", "15_months", "15m", "15_mo"],
    },
    VisitType {
        id: "eighteen_month",
        label: "18-month visit",
        aliases: &["18_month", "18_months", "18m", "18_mo"],
    },
    VisitType {
        id: "twentyfour_month",
        label: "24-month visit",
        aliases: &[
            "24_month", "24_months", "24m", "24_mo", "twenty_four_month", "two_year", "2_year",
            "2_years", "2y",
        ],
    },
    VisitType {
        id: "thirty_month",
        label: "30-month visit",
        aliases: &["30_month", "30_months", "30m", "30_mo"],
    },
    VisitType {
        id: "thirtysix_month",
        label: "36-month visit",
        aliases: &[
            "36_month", "36_months", "36m", "36_mo", "thirty_six_month", "three_year", "3_year",
            "3_years", "3y",
        ],
    },
    VisitType {
        id: "four_year",
        label: "4-year visit",
        aliases: &["4_year", "4_years", "4y", "48_month", "48_months"],
    },
    VisitType {
        id: "five_year",
        label: "5-year visit",
        aliases: &["5_year", "5_years", "5y", "60_month", "60_months"],
    },
    VisitType {
        id: EPISODE_VISIT_TYPE,
        label: "Sick visit",
        aliases: &["sick", "sick_visit", "sick_episode"],
    },
];

/// Lowercase, non-alphanumerics to single underscores, trailing "visit" dropped.
fn normalize_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let out = out.trim_matches('_');
    let out = out.strip_suffix("_visit").unwrap_or(out);
    out.to_string()
}

/// Map a stored visit-type label to its canonical id.
pub fn canonical_visit_type(raw: &str) -> Option<&'static str> {
    let key = normalize_label(raw);
    if key.is_empty() {
        return None;
    }
    VISIT_TYPES
        .iter()
        .find(|vt| vt.id == key || vt.aliases.contains(&key.as_str()))
        .map(|vt| vt.id)
}

/// Human label for a canonical id; unknown ids are shown as-is.
pub fn visit_type_label(id: &str) -> String {
    VISIT_TYPES
        .iter()
        .find(|vt| vt.id == id)
        .map(|vt| vt.label.to_string())
        .unwrap_or_else(|| id.to_string())
}
