//! Growth measurements over time and their WHO percentile charts.
//!
//! The loader gathers points from the bundle; the chart renderer draws one
//! raster chart per indicator. Charts bypass visibility gating.

pub mod chart;
pub mod curves;
pub mod loader;

pub use chart::{chart_geometry, render_charts, ChartGeometry};
pub use curves::{load_reference, parse_table, Percentile, PercentileTable};
pub use loader::load_growth_series;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Sex;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Chart drawing failed: {0}")]
    Drawing(String),

    #[error("Chart image encoding failed: {0}")]
    Encoding(#[from] image::ImageError),

    #[error("Reference table {name}: {message}")]
    Reference { name: String, message: String },

    #[error("Invalid chart geometry: {0}")]
    Geometry(String),
}

/// The three anthropometric indicators charted against age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Indicator {
    Weight,
    Length,
    HeadCircumference,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [
        Indicator::Weight,
        Indicator::Length,
        Indicator::HeadCircumference,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Indicator::Weight => "Weight",
            Indicator::Length => "Length",
            Indicator::HeadCircumference => "Head circumference",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Indicator::Weight => "kg",
            Indicator::Length | Indicator::HeadCircumference => "cm",
        }
    }

    /// Reference table file stem under `resources/who/`.
    pub fn file_stem(self) -> &'static str {
        match self {
            Indicator::Weight => "weight",
            Indicator::Length => "length",
            Indicator::HeadCircumference => "head",
        }
    }

    /// (minor, major) value-axis grid steps.
    pub fn grid_steps(self) -> (f64, f64) {
        match self {
            Indicator::Weight => (0.5, 1.0),
            Indicator::Length | Indicator::HeadCircumference => (1.0, 5.0),
        }
    }

    pub fn caption(self, sex: Option<Sex>) -> String {
        let who = match sex {
            Some(Sex::Female) => "girls",
            _ => "boys",
        };
        format!("{}-for-age (WHO, {who}, 0\u{2013}60 months)", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPoint {
    pub age_months: f64,
    pub value: f64,
}

/// All measurements for one patient up to the cutoff, per indicator, sorted
/// by age. Points at equal ages are all kept in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrowthSeries {
    pub sex: Option<Sex>,
    pub dob: Option<NaiveDate>,
    pub cutoff: Option<NaiveDate>,
    pub weight: Vec<GrowthPoint>,
    pub length: Vec<GrowthPoint>,
    pub head_circumference: Vec<GrowthPoint>,
}

impl GrowthSeries {
    pub fn points(&self, indicator: Indicator) -> &[GrowthPoint] {
        match indicator {
            Indicator::Weight => &self.weight,
            Indicator::Length => &self.length,
            Indicator::HeadCircumference => &self.head_circumference,
        }
    }

    pub(crate) fn points_mut(&mut self, indicator: Indicator) -> &mut Vec<GrowthPoint> {
        match indicator {
            Indicator::Weight => &mut self.weight,
            Indicator::Length => &mut self.length,
            Indicator::HeadCircumference => &mut self.head_circumference,
        }
    }

    pub fn is_empty(&self) -> bool {
        Indicator::ALL.iter().all(|i| self.points(*i).is_empty())
    }
}

/// One rendered chart, ready to embed in any output format.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartImage {
    pub indicator: Indicator,
    pub caption: String,
    pub png: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub width_pt: f32,
    pub height_pt: f32,
}
