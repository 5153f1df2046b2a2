//! Raster growth charts drawn with plotters on an in-memory bitmap.
//!
//! Grid, curves and patient points are drawn without any text, so a chart
//! always renders. Axis labels and the legend are a separate pass that only
//! runs when a TTF font could be registered.

use std::path::PathBuf;
use std::sync::Mutex;

use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};

use super::curves::{load_reference, Percentile, PercentileTable};
use super::{ChartError, ChartImage, GrowthPoint, GrowthSeries, Indicator};
use crate::config::ChartConfig;

const FONT_FAMILY: &str = "sans-serif";
const AGE_AXIS_MONTHS: f64 = 60.0;
const AGE_MINOR_STEP: f64 = 1.0;
const AGE_MAJOR_STEP: f64 = 6.0;
const VALUE_PADDING: f64 = 0.08;
const CM_PER_INCH: f32 = 2.54;
const POINTS_PER_INCH: f32 = 72.0;

const MINOR_GRID: RGBColor = RGBColor(235, 235, 235);
const MAJOR_GRID: RGBColor = RGBColor(200, 200, 200);
const PATIENT: RGBColor = RGBColor(20, 40, 120);

/// Font files seen by plotters. A rejected file has already been leaked once
/// and is not read again.
struct FontState {
    registered: Option<PathBuf>,
    rejected: Vec<PathBuf>,
}

static FONT_STATE: Mutex<FontState> = Mutex::new(FontState {
    registered: None,
    rejected: Vec::new(),
});

// ═══════════════════════════════════════════════════════════
// Geometry
// ═══════════════════════════════════════════════════════════

/// Pixel and logical size of every chart produced with one config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartGeometry {
    pub width_px: u32,
    pub height_px: u32,
    pub width_pt: f32,
    pub height_pt: f32,
}

impl ChartGeometry {
    /// Stroke and text sizes are designed for a 1000 px wide chart.
    fn scale(&self) -> f64 {
        (f64::from(self.width_px) / 1000.0).max(0.2)
    }

    fn px(&self, base: f64) -> u32 {
        (base * self.scale()).round().max(1.0) as u32
    }
}

pub fn chart_geometry(cfg: &ChartConfig) -> Result<ChartGeometry, ChartError> {
    if cfg.dpi == 0 || !(cfg.max_width_cm > 0.0) || !(cfg.aspect_ratio > 0.0) {
        return Err(ChartError::Geometry(format!(
            "dpi {}, width {} cm, aspect {}",
            cfg.dpi, cfg.max_width_cm, cfg.aspect_ratio
        )));
    }
    let width_in = cfg.max_width_cm / CM_PER_INCH;
    let width_px = (width_in * cfg.dpi as f32).round() as u32;
    let height_px = (width_px as f32 / cfg.aspect_ratio).round() as u32;
    if width_px < 100 || height_px < 50 {
        return Err(ChartError::Geometry(format!("{width_px}x{height_px} px is too small")));
    }
    let width_pt = width_in * POINTS_PER_INCH;
    Ok(ChartGeometry {
        width_px,
        height_px,
        width_pt,
        height_pt: width_pt / cfg.aspect_ratio,
    })
}

// ═══════════════════════════════════════════════════════════
// Axis helpers
// ═══════════════════════════════════════════════════════════

/// Value-axis range: the reference curves widened to hold every patient
/// point, padded by 8% of the span on each side.
pub fn value_axis(table: &PercentileTable, points: &[GrowthPoint]) -> (f64, f64) {
    let (lo, hi) = points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .fold(table.value_range(), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    let pad = if span > 0.0 { span * VALUE_PADDING } else { 1.0 };
    (lo - pad, hi + pad)
}

/// Multiples of `step` within `[lo, hi]`.
pub fn grid_lines(lo: f64, hi: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || hi < lo {
        return Vec::new();
    }
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

/// Split a polyline into dash segments. `to_px` maps data to pixel space,
/// where `dash` and `gap` are measured.
pub fn dash_segments(
    points: &[(f64, f64)],
    to_px: impl Fn((f64, f64)) -> (f64, f64),
    dash: f64,
    gap: f64,
) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    if points.len() < 2 || !(dash > 0.0) || !(gap >= 0.0) {
        return segments;
    }
    let period = dash + gap;
    let mut phase = 0.0_f64;
    let mut current: Vec<(f64, f64)> = vec![points[0]];

    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (pa, pb) = (to_px(a), to_px(b));
        let length = ((pb.0 - pa.0).powi(2) + (pb.1 - pa.1).powi(2)).sqrt();
        if length == 0.0 {
            continue;
        }
        let lerp = |t: f64| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
        let mut travelled = 0.0;
        while travelled < length {
            let drawing = phase < dash;
            let boundary = if drawing { dash } else { period };
            let step = (boundary - phase).min(length - travelled);
            travelled += step;
            phase += step;
            let here = lerp(travelled / length);
            if drawing {
                current.push(here);
            }
            if phase >= boundary {
                if drawing {
                    if current.len() >= 2 {
                        segments.push(std::mem::take(&mut current));
                    }
                    current.clear();
                } else {
                    phase = 0.0;
                    current = vec![here];
                }
            }
        }
    }
    if current.len() >= 2 {
        segments.push(current);
    }
    segments
}

fn percentile_style(p: Percentile) -> (RGBColor, Option<(f64, f64)>) {
    match p {
        Percentile::P3 => (RGBColor(190, 50, 50), Some((4.0, 6.0))),
        Percentile::P15 => (RGBColor(220, 130, 30), Some((12.0, 6.0))),
        Percentile::P50 => (RGBColor(30, 130, 60), None),
        Percentile::P85 => (RGBColor(60, 110, 200), Some((20.0, 8.0))),
        Percentile::P97 => (RGBColor(130, 60, 170), Some((28.0, 6.0))),
    }
}

// ═══════════════════════════════════════════════════════════
// Fonts
// ═══════════════════════════════════════════════════════════

fn ensure_font(cfg: &ChartConfig) -> bool {
    let Some(path) = cfg.resolve_font_path() else {
        tracing::warn!("No chart font available, drawing charts without text");
        return false;
    };
    let mut state = match FONT_STATE.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if state.registered.as_deref() == Some(path.as_path()) {
        return true;
    }
    if state.rejected.contains(&path) {
        tracing::debug!(font = %path.display(), "Chart font previously rejected, drawing charts without text");
        return false;
    }
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(font = %path.display(), error = %e, "Chart font unreadable, drawing charts without text");
            return false;
        }
    };
    // plotters keeps registered font data for the life of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match register_font(FONT_FAMILY, FontStyle::Normal, bytes) {
        Ok(()) => {
            tracing::debug!(font = %path.display(), "Chart font registered");
            state.registered = Some(path);
            true
        }
        Err(_) => {
            tracing::warn!(font = %path.display(), "Chart font is not a usable TrueType font, drawing charts without text");
            state.rejected.push(path);
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Drawing
// ═══════════════════════════════════════════════════════════

fn drawing_error(e: impl std::fmt::Display) -> ChartError {
    ChartError::Drawing(e.to_string())
}

/// Draw every indicator for the series.
pub fn render_charts(series: &GrowthSeries, cfg: &ChartConfig) -> Result<Vec<ChartImage>, ChartError> {
    let geometry = chart_geometry(cfg)?;
    let with_text = ensure_font(cfg);
    let charts = Indicator::ALL
        .iter()
        .map(|indicator| render_chart(series, *indicator, &geometry, with_text))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(count = charts.len(), px = geometry.width_px, "Growth charts rendered");
    Ok(charts)
}

pub fn render_chart(
    series: &GrowthSeries,
    indicator: Indicator,
    geometry: &ChartGeometry,
    with_text: bool,
) -> Result<ChartImage, ChartError> {
    let reference = load_reference(indicator, series.sex);
    let points = series.points(indicator);
    let (width, height) = (geometry.width_px, geometry.height_px);
    let mut buffer = vec![0u8; (width as usize) * (height as usize) * 3];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_error)?;

        let (lo, hi) = value_axis(&reference, points);
        let mut chart = ChartBuilder::on(&root)
            .margin(geometry.px(20.0))
            .x_label_area_size(geometry.px(70.0))
            .y_label_area_size(geometry.px(90.0))
            .build_cartesian_2d(0.0..AGE_AXIS_MONTHS, lo..hi)
            .map_err(drawing_error)?;

        // Grid
        let (value_minor, value_major) = indicator.grid_steps();
        let thin = MINOR_GRID.stroke_width(1);
        let thick = MAJOR_GRID.stroke_width(geometry.px(1.5));
        for (lines, style) in [
            (grid_lines(0.0, AGE_AXIS_MONTHS, AGE_MINOR_STEP), thin),
            (grid_lines(0.0, AGE_AXIS_MONTHS, AGE_MAJOR_STEP), thick),
        ] {
            chart
                .draw_series(lines.into_iter().map(|x| PathElement::new(vec![(x, lo), (x, hi)], style)))
                .map_err(drawing_error)?;
        }
        for (lines, style) in [
            (grid_lines(lo, hi, value_minor), thin),
            (grid_lines(lo, hi, value_major), thick),
        ] {
            chart
                .draw_series(
                    lines
                        .into_iter()
                        .map(|y| PathElement::new(vec![(0.0, y), (AGE_AXIS_MONTHS, y)], style)),
                )
                .map_err(drawing_error)?;
        }
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(0.0, lo), (AGE_AXIS_MONTHS, hi)],
                BLACK.stroke_width(geometry.px(1.5)),
            )))
            .map_err(drawing_error)?;

        // Percentile curves, dashed in pixel space
        let (plot_w, plot_h) = chart.plotting_area().dim_in_pixel();
        let x_scale = f64::from(plot_w) / AGE_AXIS_MONTHS;
        let y_scale = f64::from(plot_h) / (hi - lo);
        let to_px = |(x, y): (f64, f64)| (x * x_scale, (y - lo) * y_scale);
        for percentile in Percentile::ALL {
            let (colour, pattern) = percentile_style(percentile);
            let style = colour.stroke_width(geometry.px(2.5));
            let curve = reference.curve(percentile);
            let segments = match pattern {
                Some((dash, gap)) => dash_segments(
                    &curve,
                    to_px,
                    dash * geometry.scale(),
                    gap * geometry.scale(),
                ),
                None => vec![curve],
            };
            chart
                .draw_series(segments.into_iter().map(|seg| PathElement::new(seg, style)))
                .map_err(drawing_error)?
                .label(percentile.label())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], style));
        }

        // Patient
        let patient: Vec<(f64, f64)> = points
            .iter()
            .filter(|p| p.age_months <= AGE_AXIS_MONTHS)
            .map(|p| (p.age_months, p.value))
            .collect();
        let patient_style = PATIENT.stroke_width(geometry.px(3.5));
        chart
            .draw_series(LineSeries::new(patient.clone(), patient_style))
            .map_err(drawing_error)?
            .label("Patient")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], patient_style));
        let radius = geometry.px(7.0) as i32;
        chart
            .draw_series(patient.iter().map(|(x, y)| Circle::new((*x, *y), radius, PATIENT.filled())))
            .map_err(drawing_error)?;

        if with_text {
            let font_px = f64::from(geometry.px(26.0));
            let unit = indicator.unit();
            let axes = chart
                .configure_mesh()
                .disable_mesh()
                .x_labels(11)
                .y_labels(10)
                .x_desc("Age (months)")
                .y_desc(format!("{} ({unit})", indicator.label()))
                .x_label_formatter(&|x| format!("{x:.0}"))
                .y_label_formatter(&|y| format!("{y:.1}"))
                .label_style((FONT_FAMILY, font_px))
                .axis_desc_style((FONT_FAMILY, font_px))
                .draw();
            let annotated = axes.and_then(|_| {
                chart
                    .configure_series_labels()
                    .position(SeriesLabelPosition::UpperLeft)
                    .label_font((FONT_FAMILY, font_px))
                    .background_style(WHITE.mix(0.85))
                    .border_style(BLACK)
                    .draw()
            });
            if let Err(e) = annotated {
                tracing::warn!(indicator = indicator.label(), error = %e, "Chart text skipped");
            }
        }

        root.present().map_err(drawing_error)?;
    }

    let png = encode_png(buffer, width, height)?;
    Ok(ChartImage {
        indicator,
        caption: indicator.caption(series.sex),
        png,
        width_px: width,
        height_px: height,
        width_pt: geometry.width_pt,
        height_pt: geometry.height_pt,
    })
}

fn encode_png(rgb: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>, ChartError> {
    let img = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| ChartError::Geometry("bitmap buffer does not match chart size".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}
