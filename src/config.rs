use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Thresholds consulted by the quality and alert rules. Every rule has a
/// default; only the NDVI/EVI pair must be supplied by the zone config.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertThresholds {
    pub ndvi_evi_high: f64,
    pub ndvi_evi_moderate: f64,
    pub rainfall_deficit_pct: f64,
    pub lst_anomaly_c: f64,
    pub null_pct_warning: f64,
}

pub const DEFAULT_RAINFALL_DEFICIT_PCT: f64 = -40.0;
pub const DEFAULT_LST_ANOMALY_C: f64 = 3.0;
pub const DEFAULT_NULL_PCT_WARNING: f64 = 30.0;

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            ndvi_evi_high: -25.0,
            ndvi_evi_moderate: -15.0,
            rainfall_deficit_pct: DEFAULT_RAINFALL_DEFICIT_PCT,
            lst_anomaly_c: DEFAULT_LST_ANOMALY_C,
            null_pct_warning: DEFAULT_NULL_PCT_WARNING,
        }
    }
}

impl AlertThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ndvi_evi_high >= 0.0 || self.ndvi_evi_moderate >= 0.0 {
            return Err(ConfigError::InvalidThresholds(format!(
                "ndvi_evi thresholds must be negative (high {}, moderate {})",
                self.ndvi_evi_high, self.ndvi_evi_moderate
            )));
        }
        if self.ndvi_evi_high >= self.ndvi_evi_moderate {
            return Err(ConfigError::InvalidThresholds(format!(
                "ndvi_evi_high ({}) must be below ndvi_evi_moderate ({})",
                self.ndvi_evi_high, self.ndvi_evi_moderate
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Zone {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// MODERATE alerts in this zone are raised to HIGH.
    #[serde(default)]
    pub escalate_moderate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReportMetadata {
    pub prepared_by: String,
    pub organisation: String,
    pub boundary_status: String,
    pub crs_analysis: String,
}

impl Default for ReportMetadata {
    fn default() -> Self {
        Self {
            prepared_by: "Six Rivers Africa Monitoring Team".to_string(),
            organisation: "Six Rivers Africa".to_string(),
            boundary_status: "PLACEHOLDER".to_string(),
            crs_analysis: "EPSG:32736".to_string(),
        }
    }
}

/// Static zone, threshold and metadata configuration. Loaded once and
/// handed to the compiler; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringConfig {
    pub zones: BTreeMap<String, Zone>,
    pub thresholds: AlertThresholds,
    pub metadata: ReportMetadata,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            zones: default_zones(),
            thresholds: AlertThresholds::default(),
            metadata: ReportMetadata::default(),
        }
    }
}

impl MonitoringConfig {
    /// Reads the zone config and checks that the indicator catalog exists.
    pub fn load(zones_path: &Path, catalog_path: &Path) -> Result<Self, ConfigError> {
        if !catalog_path.exists() {
            return Err(ConfigError::MissingCatalog(catalog_path.to_path_buf()));
        }
        let text = std::fs::read_to_string(zones_path).map_err(|source| ConfigError::Read {
            path: zones_path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: zones_path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: Default::default(),
            source,
        })?;

        let rules = raw.alert_thresholds;
        let thresholds = AlertThresholds {
            ndvi_evi_high: rules.ndvi_evi_high.deviation_pct,
            ndvi_evi_moderate: rules.ndvi_evi_moderate.deviation_pct,
            rainfall_deficit_pct: rules
                .rainfall_deficit
                .map_or(DEFAULT_RAINFALL_DEFICIT_PCT, |rule| rule.deviation_pct),
            lst_anomaly_c: rules
                .lst_anomaly
                .map_or(DEFAULT_LST_ANOMALY_C, |rule| rule.anomaly_c),
            null_pct_warning: rules
                .null_rate
                .map_or(DEFAULT_NULL_PCT_WARNING, |rule| rule.null_pct),
        };
        thresholds.validate()?;

        Ok(Self {
            zones: raw.zones.unwrap_or_else(default_zones),
            thresholds,
            metadata: raw.metadata,
        })
    }

    pub fn zone_names(&self) -> impl Iterator<Item = &str> {
        self.zones.values().map(|zone| zone.name.as_str())
    }

    pub fn escalates(&self, zone_name: &str) -> bool {
        self.zones
            .values()
            .any(|zone| zone.escalate_moderate && zone.name == zone_name)
    }
}

fn default_zones() -> BTreeMap<String, Zone> {
    let zone = |name: &str, escalate_moderate: bool| Zone {
        name: name.to_string(),
        description: None,
        escalate_moderate,
    };
    BTreeMap::from([
        ("zone_1".to_string(), zone("Usangu GR", false)),
        ("zone_1_ihefu".to_string(), zone("Ihefu Core", true)),
        ("zone_2".to_string(), zone("Nyerere NP", false)),
    ])
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    zones: Option<BTreeMap<String, Zone>>,
    alert_thresholds: RawThresholds,
    #[serde(default)]
    metadata: ReportMetadata,
}

#[derive(Deserialize)]
struct RawThresholds {
    ndvi_evi_high: DeviationRule,
    ndvi_evi_moderate: DeviationRule,
    #[serde(default)]
    rainfall_deficit: Option<DeviationRule>,
    #[serde(default)]
    lst_anomaly: Option<AnomalyRule>,
    #[serde(default)]
    null_rate: Option<NullRateRule>,
}

#[derive(Deserialize)]
struct DeviationRule {
    deviation_pct: f64,
}

#[derive(Deserialize)]
struct AnomalyRule {
    anomaly_c: f64,
}

#[derive(Deserialize)]
struct NullRateRule {
    null_pct: f64,
}
