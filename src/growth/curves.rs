//! WHO percentile reference curves, bundled as CSV.
//!
//! Each table lists the five percentiles at knot months from 0 to 60; the
//! chart joins the knots with straight segments.

use serde::Deserialize;

use super::{ChartError, Indicator};
use crate::models::Sex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percentile {
    P3,
    P15,
    P50,
    P85,
    P97,
}

impl Percentile {
    pub const ALL: [Percentile; 5] = [
        Percentile::P3,
        Percentile::P15,
        Percentile::P50,
        Percentile::P85,
        Percentile::P97,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Percentile::P3 => "P3",
            Percentile::P15 => "P15",
            Percentile::P50 => "P50",
            Percentile::P85 => "P85",
            Percentile::P97 => "P97",
        }
    }

    fn index(self) -> usize {
        match self {
            Percentile::P3 => 0,
            Percentile::P15 => 1,
            Percentile::P50 => 2,
            Percentile::P85 => 3,
            Percentile::P97 => 4,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CurveRow {
    month: f64,
    p3: f64,
    p15: f64,
    p50: f64,
    p85: f64,
    p97: f64,
}

/// Percentile values at knot months, months strictly ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileTable {
    months: Vec<f64>,
    values: Vec<[f64; 5]>,
    placeholder: bool,
}

impl PercentileTable {
    pub fn curve(&self, percentile: Percentile) -> Vec<(f64, f64)> {
        let i = percentile.index();
        self.months
            .iter()
            .zip(&self.values)
            .map(|(m, v)| (*m, v[i]))
            .collect()
    }

    /// Smallest and largest value over every curve.
    pub fn value_range(&self) -> (f64, f64) {
        self.values
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)))
    }

    /// True for the flat stand-in used when the bundled table is unusable.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Flat curves spread around a typical value so the chart still has
    /// a frame to plot against.
    pub fn placeholder(indicator: Indicator) -> Self {
        let (centre, step) = match indicator {
            Indicator::Weight => (12.0, 1.5),
            Indicator::Length => (85.0, 5.0),
            Indicator::HeadCircumference => (46.0, 1.5),
        };
        let row = [
            centre - 2.0 * step,
            centre - step,
            centre,
            centre + step,
            centre + 2.0 * step,
        ];
        Self {
            months: vec![0.0, 60.0],
            values: vec![row, row],
            placeholder: true,
        }
    }
}

/// Parse a reference table. `#` lines are comments.
pub fn parse_table(name: &str, raw: &str) -> Result<PercentileTable, ChartError> {
    let invalid = |message: String| ChartError::Reference {
        name: name.to_string(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(raw.as_bytes());

    let mut months = Vec::new();
    let mut values = Vec::new();
    for result in reader.deserialize::<CurveRow>() {
        let row = result.map_err(|e| invalid(e.to_string()))?;
        let knot = [row.p3, row.p15, row.p50, row.p85, row.p97];
        if !row.month.is_finite() || knot.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("non-numeric value at month {}", row.month)));
        }
        if months.last().is_some_and(|prev: &f64| row.month <= *prev) {
            return Err(invalid(format!("month {} out of order", row.month)));
        }
        if knot.windows(2).any(|w| w[0] > w[1]) {
            return Err(invalid(format!("percentiles not ordered at month {}", row.month)));
        }
        months.push(row.month);
        values.push(knot);
    }

    if months.len() < 2 {
        return Err(invalid("fewer than two rows".to_string()));
    }
    Ok(PercentileTable {
        months,
        values,
        placeholder: false,
    })
}

fn bundled_table(indicator: Indicator, sex: Sex) -> &'static str {
    match (indicator, sex) {
        (Indicator::Weight, Sex::Male) => include_str!("../../resources/who/weight_boys.csv"),
        (Indicator::Weight, Sex::Female) => include_str!("../../resources/who/weight_girls.csv"),
        (Indicator::Length, Sex::Male) => include_str!("../../resources/who/length_boys.csv"),
        (Indicator::Length, Sex::Female) => include_str!("../../resources/who/length_girls.csv"),
        (Indicator::HeadCircumference, Sex::Male) => include_str!("../../resources/who/head_boys.csv"),
        (Indicator::HeadCircumference, Sex::Female) => {
            include_str!("../../resources/who/head_girls.csv")
        }
    }
}

/// Reference curves for an indicator. Unknown sex uses the boys' tables; a
/// table that fails to parse degrades to flat placeholder curves.
pub fn load_reference(indicator: Indicator, sex: Option<Sex>) -> PercentileTable {
    let sex = sex.unwrap_or_else(|| {
        tracing::info!(indicator = indicator.label(), "Sex unknown, using boys' reference curves");
        Sex::Male
    });
    let name = format!(
        "{}_{}",
        indicator.file_stem(),
        if sex == Sex::Female { "girls" } else { "boys" }
    );
    match parse_table(&name, bundled_table(indicator, sex)) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!(error = %e, "Reference curves unusable, drawing placeholders");
            PercentileTable::placeholder(indicator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bundled_table_parses() {
        for indicator in Indicator::ALL {
            for sex in [Sex::Male, Sex::Female] {
                let table = load_reference(indicator, Some(sex));
                assert!(!table.is_placeholder(), "{indicator:?} {sex:?}");
                let p3 = table.curve(Percentile::P3);
                assert_eq!(p3.first().map(|p| p.0), Some(0.0));
                assert_eq!(p3.last().map(|p| p.0), Some(60.0));
            }
        }
    }

    #[test]
    fn unknown_sex_uses_boys_tables() {
        assert_eq!(
            load_reference(Indicator::Weight, None),
            load_reference(Indicator::Weight, Some(Sex::Male))
        );
    }

    #[test]
    fn girls_are_lighter_at_median() {
        let boys = load_reference(Indicator::Weight, Some(Sex::Male)).curve(Percentile::P50);
        let girls = load_reference(Indicator::Weight, Some(Sex::Female)).curve(Percentile::P50);
        assert!(girls[12].1 < boys[12].1);
    }

    #[test]
    fn rejects_unordered_months_and_percentiles() {
        let months = "month,p3,p15,p50,p85,p97\n2,1,2,3,4,5\n1,1,2,3,4,5\n";
        assert!(matches!(parse_table("t", months), Err(ChartError::Reference { .. })));

        let pct = "month,p3,p15,p50,p85,p97\n0,1,2,3,4,5\n1,5,4,3,2,1\n";
        assert!(parse_table("t", pct).is_err());

        let short = "month,p3,p15,p50,p85,p97\n0,1,2,3,4,5\n";
        assert!(parse_table("t", short).is_err());

        assert!(parse_table("t", "month,p3\nfoo,1\n").is_err());
    }

    #[test]
    fn comments_and_whitespace_are_ignored() {
        let raw = "# source note\nmonth, p3, p15, p50, p85, p97\n0, 1, 2, 3, 4, 5\n# mid\n6, 2, 3, 4, 5, 6\n";
        let table = parse_table("t", raw).unwrap();
        assert_eq!(table.curve(Percentile::P50), vec![(0.0, 3.0), (6.0, 4.0)]);
        assert_eq!(table.value_range(), (1.0, 6.0));
    }

    #[test]
    fn placeholder_is_flat_and_ordered() {
        let table = PercentileTable::placeholder(Indicator::Length);
        assert!(table.is_placeholder());
        let p97 = table.curve(Percentile::P97);
        assert_eq!(p97[0].1, p97[1].1);
        let (lo, hi) = table.value_range();
        assert!(lo < hi);
    }
}
