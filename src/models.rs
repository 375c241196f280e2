use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Export groups delivered per reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NdviEvi,
    Fire,
    Water,
    Climate,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::NdviEvi,
        Category::Fire,
        Category::Water,
        Category::Climate,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Category::NdviEvi => "ndvi_evi",
            Category::Fire => "fire",
            Category::Water => "water",
            Category::Climate => "climate",
        }
    }

    pub fn file_name(self, year: i32, month: u32) -> String {
        let prefix = match self {
            Category::NdviEvi => "ndvi_evi",
            Category::Fire => "fire_burn",
            Category::Water => "water_ndwi",
            Category::Climate => "climate",
        };
        format!("{prefix}_{year}_{month:02}.csv")
    }

    /// Whether exports of this group carry current and baseline rows.
    pub fn tracks_baseline(self) -> bool {
        matches!(self, Category::NdviEvi | Category::Climate)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Which side of the comparison a row belongs to, tagged from its
/// `indicator` value when the export is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPeriod {
    Current,
    Baseline,
    #[default]
    Other,
}

impl RowPeriod {
    pub fn classify(indicator: &str) -> Self {
        let lowered = indicator.to_lowercase();
        if lowered.contains("current") {
            RowPeriod::Current
        } else if lowered.contains("baseline") {
            RowPeriod::Baseline
        } else {
            RowPeriod::Other
        }
    }
}

/// Measurement family of an export column, tagged once at load time so the
/// alert rules never re-match column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Ndvi,
    Evi,
    Rainfall,
    LandSurfaceTemperature,
    FireDetection,
    #[default]
    Other,
}

impl IndicatorKind {
    pub fn classify(column: &str) -> Self {
        let dispersion = column.contains("stdDev");
        let lowered = column.to_lowercase();
        if column.contains("NDVI") && !dispersion {
            IndicatorKind::Ndvi
        } else if column.contains("EVI") && !dispersion {
            IndicatorKind::Evi
        } else if lowered.contains("rainfall") {
            IndicatorKind::Rainfall
        } else if column.contains("LST") {
            IndicatorKind::LandSurfaceTemperature
        } else if lowered.contains("count") || column.contains("T21") {
            IndicatorKind::FireDetection
        } else {
            IndicatorKind::Other
        }
    }
}

/// A single cell of a loaded export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Null,
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if !value.is_nan() => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Number(value) => value.is_nan(),
            Cell::Text(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub zone: String,
    pub indicator: String,
    pub year: i32,
    pub month: u32,
    #[serde(skip)]
    pub period: RowPeriod,
    #[serde(flatten)]
    pub values: BTreeMap<String, Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub kind: IndicatorKind,
    pub numeric: bool,
}

/// One loaded export. `columns` lists the measurement columns in header
/// order; the four key columns live on each `Record`.
#[derive(Debug, Clone)]
pub struct ExportTable {
    pub category: Category,
    pub columns: Vec<TableColumn>,
    pub records: Vec<Record>,
}

impl ExportTable {
    pub fn numeric_columns(&self) -> impl Iterator<Item = &TableColumn> {
        self.columns.iter().filter(|column| column.numeric)
    }

    /// Distinct non-empty zones in first-appearance order.
    pub fn zones(&self) -> Vec<String> {
        let mut zones: Vec<String> = Vec::new();
        for record in &self.records {
            if !record.zone.is_empty() && !zones.contains(&record.zone) {
                zones.push(record.zone.clone());
            }
        }
        zones
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub zone: String,
    pub indicator: String,
    #[serde(default)]
    pub kind: IndicatorKind,
    pub current: Option<f64>,
    pub baseline: Option<f64>,
    pub deviation_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Moderate,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "HIGH"),
            Severity::Moderate => write!(f, "MODERATE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub zone: String,
    pub indicator: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub escalation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityStatus {
    Pass,
    Warning,
}

impl fmt::Display for QualityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityStatus::Pass => write!(f, "PASS"),
            QualityStatus::Warning => write!(f, "WARNING"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCheck {
    pub dataset: Category,
    pub records: usize,
    pub null_pct: f64,
    pub zones_present: Vec<String>,
    pub status: QualityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl QualityCheck {
    pub fn flag(&mut self, note: String) {
        self.status = QualityStatus::Warning;
        self.note = Some(match self.note.take() {
            Some(existing) => format!("{existing}; {note}"),
            None => note,
        });
    }
}

/// A zone that could not be compared because one side was absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub dataset: Category,
    pub zone: String,
    pub missing: RowPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub checks: Vec<QualityCheck>,
    pub overall_status: QualityStatus,
    #[serde(default)]
    pub load_warnings: Vec<String>,
    #[serde(default)]
    pub coverage_gaps: Vec<CoverageGap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub report_period: String,
    pub generated_at: String,
    pub prepared_by: String,
    pub organisation: String,
    pub boundary_status: String,
    pub crs_analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyDataset {
    pub metadata: Metadata,
    pub data_quality: DataQuality,
    pub deviations: Vec<Deviation>,
    pub alerts: Vec<Alert>,
    pub raw_datasets: BTreeMap<Category, Vec<Record>>,
}

impl MonthlyDataset {
    pub fn high_alert_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|alert| alert.severity == Severity::High)
            .count()
    }
}
