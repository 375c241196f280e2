use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{NaiveDate, SecondsFormat, Utc};
use tracing::{error, info, info_span, warn};

use crate::alerts;
use crate::config::MonitoringConfig;
use crate::deviation;
use crate::error::CompileError;
use crate::ingest;
use crate::models::{Category, Deviation, Metadata, MonthlyDataset, RowPeriod};
use crate::quality;

/// Pipeline stages, run strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Validate,
    ComputeDeviations,
    ClassifyAlerts,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Validate => "validate",
            Stage::ComputeDeviations => "compute_deviations",
            Stage::ClassifyAlerts => "classify_alerts",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

pub fn report_period(year: i32, month: u32) -> String {
    format!("{year}-{month:02}")
}

pub fn dataset_path(dir: &Path, year: i32, month: u32) -> PathBuf {
    dir.join(format!("monthly_dataset_{year}_{month:02}.json"))
}

pub fn period_start(year: i32, month: u32) -> Result<NaiveDate, CompileError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(CompileError::InvalidPeriod { year, month })
}

/// Builds the monthly dataset for one period from the exports directory.
pub struct Compiler {
    config: MonitoringConfig,
    exports_dir: PathBuf,
    output_dir: PathBuf,
}

impl Compiler {
    pub fn new(config: MonitoringConfig, exports_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            config,
            exports_dir,
            output_dir,
        }
    }

    pub fn compile(&self, year: i32, month: u32) -> Result<MonthlyDataset, CompileError> {
        period_start(year, month)?;
        let period = report_period(year, month);
        let _span = info_span!("compile", period = %period).entered();
        info!("processing {period}");

        info!(stage = %Stage::Load);
        let loaded = ingest::load_monthly_exports(&self.exports_dir, year, month);
        if loaded.tables.is_empty() {
            error!("no datasets found for this period");
            return Err(CompileError::NoDatasets { period });
        }

        info!(stage = %Stage::Validate);
        let mut data_quality = quality::validate(&loaded.tables, &self.config);
        data_quality.load_warnings = loaded.warnings;

        info!(stage = %Stage::ComputeDeviations);
        let mut deviations: Vec<Deviation> = Vec::new();
        for category in [Category::NdviEvi, Category::Climate] {
            let Some(table) = loaded.tables.get(&category) else {
                continue;
            };
            let outcome = deviation::compute_deviations(table);
            deviations.extend(outcome.deviations);

            for gap in outcome.gaps {
                let side = match gap.missing {
                    RowPeriod::Baseline => "baseline",
                    _ => "current",
                };
                warn!(category = %category, zone = %gap.zone, "no {side} rows, deviations skipped");
                if let Some(check) = data_quality
                    .checks
                    .iter_mut()
                    .find(|check| check.dataset == category)
                {
                    check.flag(format!("No {side} rows for {}, deviations skipped", gap.zone));
                }
                data_quality.coverage_gaps.push(gap);
            }
        }
        data_quality.refresh_status();

        info!(stage = %Stage::ClassifyAlerts);
        let alerts = alerts::detect_alerts(&loaded.tables, &deviations, &self.config);

        let meta = &self.config.metadata;
        let metadata = Metadata {
            report_period: period,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            prepared_by: meta.prepared_by.clone(),
            organisation: meta.organisation.clone(),
            boundary_status: meta.boundary_status.clone(),
            crs_analysis: meta.crs_analysis.clone(),
        };

        let raw_datasets = loaded
            .tables
            .into_iter()
            .map(|(category, table)| (category, table.records))
            .collect();

        Ok(MonthlyDataset {
            metadata,
            data_quality,
            deviations,
            alerts,
            raw_datasets,
        })
    }

    /// Writes the dataset, replacing any earlier document for the period.
    pub fn persist(&self, dataset: &MonthlyDataset, year: i32, month: u32) -> Result<PathBuf, CompileError> {
        info!(stage = %Stage::Persist);
        let write_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CompileError::Write { path, source }
        };
        std::fs::create_dir_all(&self.output_dir).map_err(write_error(&self.output_dir))?;

        let path = dataset_path(&self.output_dir, year, month);
        let mut body = serde_json::to_string_pretty(dataset)?;
        body.push('\n');
        std::fs::write(&path, body).map_err(write_error(&path))?;

        info!(
            alerts = dataset.alerts.len(),
            quality = %dataset.data_quality.overall_status,
            "output written: {}",
            path.display()
        );
        Ok(path)
    }

    pub fn run(&self, year: i32, month: u32) -> Result<(MonthlyDataset, PathBuf), CompileError> {
        let dataset = self.compile(year, month)?;
        let path = self.persist(&dataset, year, month)?;
        Ok((dataset, path))
    }
}

pub fn load_dataset(dir: &Path, year: i32, month: u32) -> anyhow::Result<MonthlyDataset> {
    let path = dataset_path(dir, year, month);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("monthly dataset not found: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QualityStatus, Severity};

    const NDVI: &str = "zone,indicator,year,month,NDVI_mean,EVI_mean,NDVI_stdDev\n\
        Usangu GR,NDVI_current,2026,1,0.42,0.30,0.04\n\
        Usangu GR,NDVI_baseline,2026,1,0.60,0.31,0.05\n\
        Ihefu Core,NDVI_current,2026,1,0.41,0.40,0.03\n\
        Ihefu Core,NDVI_baseline,2026,1,0.50,0.40,0.03\n\
        Nyerere NP,NDVI_current,2026,1,0.55,0.35,0.06\n\
        Nyerere NP,NDVI_baseline,2026,1,0.56,0.36,0.06\n";

    const FIRE: &str = "zone,indicator,year,month,fire_count,burned_area_ha\n\
        Nyerere NP,firms_active,2026,1,3,140.5\n\
        Usangu GR,firms_active,2026,1,0,0\n\
        Ihefu Core,firms_active,2026,1,0,0\n";

    const CLIMATE: &str = "zone,indicator,year,month,rainfall_mm,LST_Day_C\n\
        Usangu GR,climate_current,2026,1,55,31.0\n\
        Usangu GR,climate_baseline,2026,1,100,30.0\n\
        Nyerere NP,climate_current,2026,1,90,34.5\n\
        Nyerere NP,climate_baseline,2026,1,100,31.0\n\
        Ihefu Core,climate_current,2026,1,80,30.0\n";

    fn workspace(files: &[(&str, &str)]) -> (tempfile::TempDir, Compiler) {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("exports");
        std::fs::create_dir_all(&exports).unwrap();
        for (name, body) in files {
            std::fs::write(exports.join(name), body).unwrap();
        }
        let compiler = Compiler::new(
            MonitoringConfig::default(),
            exports,
            dir.path().join("monthly"),
        );
        (dir, compiler)
    }

    #[test]
    fn rejects_invalid_month() {
        let (_dir, compiler) = workspace(&[]);
        assert!(matches!(
            compiler.compile(2026, 13),
            Err(CompileError::InvalidPeriod { year: 2026, month: 13 })
        ));
    }

    #[test]
    fn fails_when_no_category_loads() {
        let (_dir, compiler) = workspace(&[("climate_2026_01.csv", "zone,year\nUsangu GR,2026\n")]);
        match compiler.run(2026, 1) {
            Err(CompileError::NoDatasets { period }) => assert_eq!(period, "2026-01"),
            other => panic!("expected NoDatasets, got {other:?}"),
        }
    }

    #[test]
    fn compiles_full_period() {
        let (_dir, compiler) = workspace(&[
            ("ndvi_evi_2026_01.csv", NDVI),
            ("fire_burn_2026_01.csv", FIRE),
            ("climate_2026_01.csv", CLIMATE),
        ]);
        let (dataset, path) = compiler.run(2026, 1).unwrap();
        assert!(path.ends_with("monthly_dataset_2026_01.json"));
        assert_eq!(dataset.metadata.report_period, "2026-01");

        let summary: Vec<(&str, &str, Severity)> = dataset
            .alerts
            .iter()
            .map(|a| (a.zone.as_str(), a.indicator.as_str(), a.severity))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Usangu GR", "NDVI", Severity::High),
                ("Ihefu Core", "NDVI", Severity::High),
                ("Nyerere NP", "Active Fire", Severity::High),
                ("Usangu GR", "Rainfall Deficit", Severity::High),
                ("Nyerere NP", "Land Surface Temperature", Severity::Moderate),
            ]
        );
        assert!(dataset.alerts[1].escalation.is_some());
        assert_eq!(dataset.alerts[2].detail.as_deref(), Some("Fire detections: 3"));
        assert!(dataset
            .alerts
            .iter()
            .filter(|a| a.zone == "Ihefu Core")
            .all(|a| a.severity != Severity::Moderate));

        // Missing water export and the Ihefu Core climate gap are both surfaced.
        let quality = &dataset.data_quality;
        assert_eq!(quality.load_warnings, vec!["Missing export: water_ndwi_2026_01.csv"]);
        assert_eq!(quality.coverage_gaps.len(), 1);
        assert_eq!(quality.coverage_gaps[0].zone, "Ihefu Core");
        assert_eq!(quality.overall_status, QualityStatus::Warning);

        assert_eq!(dataset.raw_datasets.len(), 3);
        assert!(dataset
            .deviations
            .iter()
            .all(|d| d.baseline != Some(0.0) || d.deviation_pct.is_none()));
    }

    #[test]
    fn reprocessing_is_idempotent_apart_from_timestamp() {
        let (dir, compiler) = workspace(&[
            ("ndvi_evi_2026_01.csv", NDVI),
            ("fire_burn_2026_01.csv", FIRE),
        ]);
        let (_, path) = compiler.run(2026, 1).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        let (_, path) = compiler.run(2026, 1).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();

        let strip = |text: &str| {
            let mut value: serde_json::Value = serde_json::from_str(text).unwrap();
            value["metadata"]["generated_at"] = serde_json::Value::Null;
            value
        };
        assert_eq!(strip(&first), strip(&second));

        let reloaded = load_dataset(&dir.path().join("monthly"), 2026, 1).unwrap();
        assert_eq!(reloaded.metadata.report_period, "2026-01");
        assert_eq!(reloaded.alerts.len(), 3);
        assert_eq!(reloaded.high_alert_count(), 3);
        assert_eq!(reloaded.raw_datasets[&Category::Fire].len(), 3);
    }

    #[test]
    fn missing_dataset_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_dataset(dir.path(), 2026, 4).unwrap_err();
        assert!(err.to_string().contains("monthly_dataset_2026_04.json"));
    }
}
