use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "VisitReport";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file name inside the application data directory.
pub const CONFIG_FILE_NAME: &str = "report-config.json";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "visit_report=info"
}

/// Get the application data directory (~/VisitReport/).
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Default config location, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Directory used by the CLI when no output path is given.
pub fn exports_dir() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("exports"))
}

/// Fonts probed when the config does not name one for chart text.
const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid visibility rules: {0}")]
    Rules(String),
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Everything tunable about report generation. Every field has a default so a
/// partial JSON file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub page: PageGeometry,
    pub charts: ChartConfig,
    pub legacy: LegacyConfig,
    /// Replaces the bundled visibility rule table when set.
    pub visibility_rules: Option<PathBuf>,
    pub include_growth_charts: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            page: PageGeometry::default(),
            charts: ChartConfig::default(),
            legacy: LegacyConfig::default(),
            visibility_rules: None,
            include_growth_charts: true,
        }
    }
}

/// Page size and margins in PDF points (72 per inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_pt: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width_pt: 595.0,
            height_pt: 842.0,
            margin_pt: 36.0,
        }
    }
}

impl PageGeometry {
    pub fn content_width(&self) -> f32 {
        self.width_pt - 2.0 * self.margin_pt
    }

    pub fn content_height(&self) -> f32 {
        self.height_pt - 2.0 * self.margin_pt
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Raster density the charts are drawn at.
    pub dpi: u32,
    /// Logical width cap; pixel width is derived from this and `dpi`.
    pub max_width_cm: f32,
    /// Width / height.
    pub aspect_ratio: f32,
    /// TTF used for axis labels and legend. Probed from common system
    /// locations when unset.
    pub font_path: Option<PathBuf>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_width_cm: 18.0,
            aspect_ratio: 1.5,
            font_path: None,
        }
    }
}

impl ChartConfig {
    pub fn resolve_font_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.font_path {
            return Some(path.clone());
        }
        SYSTEM_FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    }
}

/// Encodings the legacy RTF writer may embed a chart as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyImageFormat {
    /// The chart alone on a single-page PDF.
    Pdf,
    Jpeg,
    Png,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Tried in order; the first encoding that succeeds is embedded.
    pub image_formats: Vec<LegacyImageFormat>,
    pub jpeg_quality: u8,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            image_formats: vec![
                LegacyImageFormat::Pdf,
                LegacyImageFormat::Jpeg,
                LegacyImageFormat::Png,
            ],
            jpeg_quality: 90,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════

impl ReportConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path` when given, otherwise the default location if the file
    /// exists, otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_is_a4_points_with_half_inch_margins() {
        let page = PageGeometry::default();
        assert_eq!(page.width_pt, 595.0);
        assert_eq!(page.height_pt, 842.0);
        assert_eq!(page.margin_pt, 36.0);
        assert_eq!(page.content_width(), 523.0);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{"charts": {"dpi": 150}, "include_growth_charts": false}"#).unwrap();

        let cfg = ReportConfig::load(&path).unwrap();
        assert_eq!(cfg.charts.dpi, 150);
        assert_eq!(cfg.charts.max_width_cm, 18.0);
        assert!(!cfg.include_growth_charts);
        assert_eq!(cfg.page, PageGeometry::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ReportConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn legacy_formats_default_to_jpeg_then_png() {
        let cfg = LegacyConfig::default();
        assert_eq!(
            cfg.image_formats,
            vec![LegacyImageFormat::Pdf, LegacyImageFormat::Jpeg, LegacyImageFormat::Png]
        );
    }

    #[test]
    fn explicit_font_path_wins() {
        let cfg = ChartConfig {
            font_path: Some(PathBuf::from("/tmp/custom.ttf")),
            ..ChartConfig::default()
        };
        assert_eq!(cfg.resolve_font_path(), Some(PathBuf::from("/tmp/custom.ttf")));
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        if let Some(dir) = app_data_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
    }
}
