use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which table a visit lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitKind {
    Well,
    Sick,
}

impl VisitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VisitKind::Well => "well",
            VisitKind::Sick => "sick",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "well" | "well_visit" | "wellvisit" => Some(VisitKind::Well),
            "sick" | "sick_visit" | "episode" | "sick_episode" => Some(VisitKind::Sick),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VisitKind::Well => "Well visit",
            VisitKind::Sick => "Sick visit",
        }
    }
}

/// Reference to one visit row: `well:12`, `sick:3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VisitRef {
    pub kind: VisitKind,
    pub id: i64,
}

impl VisitRef {
    pub fn well(id: i64) -> Self {
        Self { kind: VisitKind::Well, id }
    }

    pub fn sick(id: i64) -> Self {
        Self { kind: VisitKind::Sick, id }
    }
}

impl fmt::Display for VisitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

impl FromStr for VisitRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <kind>:<id>, got '{s}'"))?;
        let kind = VisitKind::from_str(kind).ok_or_else(|| format!("unknown visit kind '{kind}'"))?;
        let id = id
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("invalid visit id '{id}'"))?;
        Ok(Self { kind, id })
    }
}

/// Output document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Pdf,
    Docx,
    /// Legacy RTF with hex-embedded chart images. Deprecated.
    Rtf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Docx => "docx",
            OutputFormat::Rtf => "rtf",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(OutputFormat::Pdf),
            "docx" => Some(OutputFormat::Docx),
            "rtf" => Some(OutputFormat::Rtf),
            _ => None,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Pdf => "PDF",
            OutputFormat::Docx => "DOCX",
            OutputFormat::Rtf => "RTF",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim()).ok_or_else(|| format!("unknown output format '{s}'"))
    }
}
