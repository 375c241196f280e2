use std::collections::BTreeMap;

use crate::config::MonitoringConfig;
use crate::deviation::round_to;
use crate::models::{Category, DataQuality, ExportTable, QualityCheck, QualityStatus};

/// Share of empty cells across every column of the table, as a percentage
/// rounded to one decimal.
pub fn null_pct(table: &ExportTable) -> f64 {
    let cells = table.records.len() * (table.columns.len() + 4);
    if cells == 0 {
        return 0.0;
    }
    let nulls: usize = table
        .records
        .iter()
        .map(|record| {
            let keys = usize::from(record.zone.is_empty()) + usize::from(record.indicator.is_empty());
            keys + record.values.values().filter(|cell| cell.is_null()).count()
        })
        .sum();
    round_to(nulls as f64 / cells as f64 * 100.0, 1)
}

pub fn check_table(table: &ExportTable, config: &MonitoringConfig) -> QualityCheck {
    let mut check = QualityCheck {
        dataset: table.category,
        records: table.records.len(),
        null_pct: null_pct(table),
        zones_present: table.zones(),
        status: QualityStatus::Pass,
        note: None,
    };

    if check.null_pct > config.thresholds.null_pct_warning {
        let note = format!("High null rate ({:.1}%), likely cloud cover", check.null_pct);
        check.flag(note);
    }

    let missing: Vec<&str> = config
        .zone_names()
        .filter(|zone| !check.zones_present.iter().any(|present| present == zone))
        .collect();
    if !missing.is_empty() {
        check.flag(format!("Missing zones: {}", missing.join(", ")));
    }

    check
}

/// Annotates every loaded table. Never fails; problems only downgrade the
/// overall status.
pub fn validate(tables: &BTreeMap<Category, ExportTable>, config: &MonitoringConfig) -> DataQuality {
    let checks: Vec<QualityCheck> = tables
        .values()
        .map(|table| check_table(table, config))
        .collect();

    let mut quality = DataQuality {
        checks,
        overall_status: QualityStatus::Pass,
        load_warnings: Vec::new(),
        coverage_gaps: Vec::new(),
    };
    quality.refresh_status();
    quality
}

impl DataQuality {
    pub fn refresh_status(&mut self) {
        self.overall_status = if self
            .checks
            .iter()
            .all(|check| check.status == QualityStatus::Pass)
        {
            QualityStatus::Pass
        } else {
            QualityStatus::Warning
        };
    }
}
