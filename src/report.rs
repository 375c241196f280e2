use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::ValueEnum;

use crate::alerts;
use crate::config::{MonitoringConfig, Zone};
use crate::models::{Alert, Deviation, IndicatorKind, MonthlyDataset, Severity};

const RULE: &str = "================================================================================";
const BANNER: &str = "XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";
const PENDING: &str = "[pending]";
const VEGETATION_STRESS_PCT: f64 = -15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportMode {
    /// Complete monthly report
    Full,
    /// One-page funder summary
    Donor,
    /// Alert table and recommendations only
    Alert,
}

impl ReportMode {
    pub fn key(self) -> &'static str {
        match self {
            ReportMode::Full => "full",
            ReportMode::Donor => "donor",
            ReportMode::Alert => "alert",
        }
    }
}

fn period_label(report_period: &str) -> String {
    NaiveDate::parse_from_str(&format!("{report_period}-01"), "%Y-%m-%d")
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or_else(|_| report_period.to_string())
}

fn high_alerts(data: &MonthlyDataset) -> Vec<&Alert> {
    data.alerts
        .iter()
        .filter(|alert| alert.severity == Severity::High)
        .collect()
}

fn write_header(output: &mut String, data: &MonthlyDataset) {
    let meta = &data.metadata;
    let generated = meta.generated_at.get(..10).unwrap_or(&meta.generated_at);

    let _ = writeln!(output, "{BANNER}");
    let _ = writeln!(output, "{} -- LANDSCAPE HEALTH INTELLIGENCE REPORT", meta.organisation.to_uppercase());
    let _ = writeln!(output, "{BANNER}");
    let _ = writeln!(output, "Reporting Period  : {}", period_label(&meta.report_period));
    let _ = writeln!(output, "Prepared by       : {}", meta.prepared_by);
    let _ = writeln!(output, "Boundary Status   : {}", meta.boundary_status);
    let _ = writeln!(output, "Analysis CRS      : {}", meta.crs_analysis);
    let _ = writeln!(output, "Report Generated  : {generated}");
    let _ = writeln!(output, "Status            : DRAFT -- Pending field verification");
    let _ = writeln!(output, "{BANNER}");
}

fn write_spatial_disclaimer(output: &mut String) {
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "!! SPATIAL DISCLAIMER: Zone boundaries used in this analysis are indicative\n\
         placeholders based on published descriptions. Results are directionally\n\
         informative but spatial attribution should be treated as approximate until\n\
         authoritative boundaries are received."
    );
}

fn write_executive_summary(output: &mut String, data: &MonthlyDataset) {
    let high = high_alerts(data);
    let alert_summary = if high.is_empty() {
        "No HIGH-severity alerts this reporting cycle.".to_string()
    } else {
        let listed: Vec<String> = high
            .iter()
            .take(3)
            .map(|alert| format!("{} in {}", alert.indicator, alert.zone))
            .collect();
        let mut summary = format!("{} HIGH-severity alert(s) detected: {}", high.len(), listed.join("; "));
        if high.len() > 3 {
            let _ = write!(summary, " (+{} additional)", high.len() - 3);
        }
        summary
    };

    let stressed = data.deviations.iter().any(|deviation| {
        deviation.kind == IndicatorKind::Ndvi
            && deviation
                .deviation_pct
                .is_some_and(|pct| pct < VEGETATION_STRESS_PCT)
    });
    let landscape = if stressed {
        "showing vegetation stress"
    } else {
        "stable"
    };

    let _ = writeln!(output);
    let _ = writeln!(output, "EXECUTIVE SUMMARY");
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "{alert_summary} Landscape conditions across the monitored zones are {landscape}."
    );
    let _ = writeln!(
        output,
        "All findings are subject to field verification and should be interpreted in\n\
         the context of placeholder boundary limitations."
    );
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| PENDING.to_string(), |value| value.to_string())
}

fn write_zone_section(output: &mut String, data: &MonthlyDataset, zone: &Zone) {
    let find = |kind: IndicatorKind| {
        data.deviations
            .iter()
            .find(|deviation| deviation.zone == zone.name && deviation.kind == kind)
    };
    let zone_alerts: Vec<&Alert> = data
        .alerts
        .iter()
        .filter(|alert| alert.zone == zone.name)
        .collect();

    let status = if zone_alerts.iter().any(|alert| alert.severity == Severity::High) {
        "HIGH"
    } else if zone_alerts.is_empty() {
        "NORMAL"
    } else {
        "MODERATE"
    };

    let _ = writeln!(output);
    let _ = writeln!(output, "{}", zone.name.to_uppercase());
    if let Some(description) = &zone.description {
        let _ = writeln!(output, "  {description}");
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "  Vegetation Health (NDVI / EVI)");
    for (label, kind) in [("NDVI", IndicatorKind::Ndvi), ("EVI", IndicatorKind::Evi)] {
        let deviation = find(kind);
        let _ = writeln!(
            output,
            "     Current {label:<4} mean    : {}  |  Baseline: {}  |  Deviation: {}%",
            format_value(deviation.and_then(|d| d.current)),
            format_value(deviation.and_then(|d| d.baseline)),
            deviation
                .and_then(|d| d.deviation_pct)
                .map_or_else(|| PENDING.to_string(), |pct| format!("{pct:.1}")),
        );
    }
    let _ = writeln!(output, "     ALERT STATUS          : {status}");
    let _ = writeln!(output);
    let _ = writeln!(output, "  Active Alerts ({} total)", zone_alerts.len());

    if zone_alerts.is_empty() {
        let _ = writeln!(output, "     No alerts this cycle.");
    }
    for alert in zone_alerts {
        let _ = write!(output, "     [{}] {}", alert.severity, alert.indicator);
        if let Some(detail) = &alert.detail {
            let _ = write!(output, ": {detail}");
        }
        if let Some(escalation) = &alert.escalation {
            let _ = write!(output, " ({escalation})");
        }
        let _ = writeln!(output);
    }
}

fn write_alert_table(output: &mut String, data: &MonthlyDataset) {
    let _ = writeln!(output);
    if data.alerts.is_empty() {
        let _ = writeln!(output, "ACTIVE ALERTS THIS MONTH");
        let _ = writeln!(output, "  No active alerts.");
        return;
    }

    let mut ordered = data.alerts.clone();
    alerts::sort_high_first(&mut ordered);

    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "ACTIVE ALERTS THIS MONTH");
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "{:<20} {:<25} {:<10} Detail", "Zone", "Indicator", "Severity");
    let _ = writeln!(output, "{}", "-".repeat(80));
    for alert in &ordered {
        let detail = match alert.deviation_pct {
            Some(pct) => format!("{pct:+.1}% deviation"),
            None => alert.detail.clone().unwrap_or_default(),
        };
        let _ = writeln!(
            output,
            "{:<20} {:<25} {:<10} {}",
            alert.zone,
            alert.indicator,
            alert.severity.to_string(),
            detail
        );
    }
}

fn write_recommendations(output: &mut String, data: &MonthlyDataset) {
    let high = high_alerts(data);
    let _ = writeln!(output);
    if high.is_empty() {
        let _ = writeln!(output, "RECOMMENDATIONS");
        let _ = writeln!(output, "  No HIGH-severity alerts, no immediate actions required.");
        return;
    }

    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "RECOMMENDATIONS");
    let _ = writeln!(output, "{RULE}");
    for alert in high {
        let signal = alert.indicator.to_lowercase();
        let zone = &alert.zone;
        let _ = writeln!(output);
        let _ = writeln!(output, "  [{} - {zone}]", alert.indicator);
        let _ = writeln!(
            output,
            "  (a) Field Teams: Deploy ground-truth verification for {signal} signal in {zone}."
        );
        let _ = write!(
            output,
            "  (b) Government (TANAPA/TAWA): Formal notification of {signal} anomaly in {zone}."
        );
        if zone.contains("Nyerere") {
            let _ = write!(output, " Reference Tanzania's UNESCO World Heritage obligations.");
        }
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "  (c) Donor Reporting: Document {signal} evidence for adaptive management reporting."
        );
    }
}

fn write_quality_notes(output: &mut String, data: &MonthlyDataset) {
    let quality = &data.data_quality;
    let _ = writeln!(output);
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "DATA QUALITY & ASSUMPTIONS NOTES");
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "  Overall quality status : {}", quality.overall_status);
    let _ = writeln!(output, "  Boundary confidence    : {}", data.metadata.boundary_status);
    for check in &quality.checks {
        let _ = write!(output, "  {:<20} : {}", check.dataset.key(), check.status);
        if let Some(note) = &check.note {
            let _ = write!(output, ", {note}");
        }
        let _ = writeln!(output);
    }
    for warning in &quality.load_warnings {
        let _ = writeln!(output, "  {warning}");
    }
}

pub fn build_full_report(data: &MonthlyDataset, config: &MonitoringConfig) -> String {
    let mut output = String::new();
    write_header(&mut output, data);
    if data.metadata.boundary_status == "PLACEHOLDER" {
        write_spatial_disclaimer(&mut output);
    }
    write_executive_summary(&mut output, data);

    let _ = writeln!(output);
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "ZONE ANALYSIS");
    let _ = writeln!(output, "{RULE}");
    for zone in config.zones.values() {
        write_zone_section(&mut output, data, zone);
    }

    write_alert_table(&mut output, data);
    write_recommendations(&mut output, data);
    write_quality_notes(&mut output, data);

    let _ = writeln!(output);
    let _ = writeln!(output, "{BANNER}");
    let _ = writeln!(output, "All satellite-derived indicators subject to field verification.");
    let _ = writeln!(output, "Prepared by {}.", data.metadata.prepared_by);
    let _ = writeln!(output, "{BANNER}");
    output
}

pub fn build_donor_brief(data: &MonthlyDataset, config: &MonitoringConfig) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} -- LANDSCAPE HEALTH UPDATE",
        data.metadata.organisation.to_uppercase()
    );
    let _ = writeln!(output, "{}", period_label(&data.metadata.report_period));
    let _ = writeln!(output);
    let _ = writeln!(output, "Zones Monitored: {}", config.zones.len());
    let _ = writeln!(
        output,
        "Alerts This Month: {} total ({} requiring immediate attention)",
        data.alerts.len(),
        data.high_alert_count()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "KEY FINDINGS");
    write_executive_summary(&mut output, data);
    let _ = writeln!(output);
    let _ = writeln!(output, "IMPACT");
    let _ = writeln!(
        output,
        "This monitoring capability provides continuous, transparent evidence of\n\
         landscape health to inform adaptive conservation management."
    );
    output
}

pub fn build_alert_report(data: &MonthlyDataset) -> String {
    let mut output = String::new();
    write_header(&mut output, data);
    write_alert_table(&mut output, data);
    write_recommendations(&mut output, data);
    output
}

pub fn build_report(mode: ReportMode, data: &MonthlyDataset, config: &MonitoringConfig) -> String {
    match mode {
        ReportMode::Full => build_full_report(data, config),
        ReportMode::Donor => build_donor_brief(data, config),
        ReportMode::Alert => build_alert_report(data),
    }
}

pub fn report_path(dir: &Path, mode: ReportMode, year: i32, month: u32) -> PathBuf {
    dir.join(format!("sra_report_{}_{year}_{month:02}.txt", mode.key()))
}

pub fn save_report(
    dir: &Path,
    mode: ReportMode,
    year: i32,
    month: u32,
    content: &str,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = report_path(dir, mode, year, month);
    std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
