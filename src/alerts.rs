use std::collections::BTreeMap;

use tracing::info;

use crate::config::MonitoringConfig;
use crate::models::{Alert, Category, Deviation, ExportTable, IndicatorKind, Severity};

/// Collects alerts, applying zone escalation on the way in.
struct AlertSink<'a> {
    config: &'a MonitoringConfig,
    alerts: Vec<Alert>,
}

impl<'a> AlertSink<'a> {
    fn new(config: &'a MonitoringConfig) -> Self {
        Self {
            config,
            alerts: Vec::new(),
        }
    }

    fn emit(&mut self, mut alert: Alert) {
        if alert.severity == Severity::Moderate && self.config.escalates(&alert.zone) {
            alert.severity = Severity::High;
            alert.escalation = Some(format!("Escalated: MODERATE in {} -> HIGH", alert.zone));
        }
        self.alerts.push(alert);
    }

    fn base(zone: &str, indicator: &str, severity: Severity) -> Alert {
        Alert {
            zone: zone.to_string(),
            indicator: indicator.to_string(),
            severity,
            deviation_pct: None,
            current: None,
            baseline: None,
            detail: None,
            escalation: None,
        }
    }
}

pub fn vegetation_severity(deviation_pct: f64, config: &MonitoringConfig) -> Option<Severity> {
    let thresholds = &config.thresholds;
    if deviation_pct <= thresholds.ndvi_evi_high {
        Some(Severity::High)
    } else if deviation_pct <= thresholds.ndvi_evi_moderate {
        Some(Severity::Moderate)
    } else {
        None
    }
}

fn vegetation_alerts(deviations: &[Deviation], sink: &mut AlertSink<'_>) {
    for deviation in deviations {
        let label = match deviation.kind {
            IndicatorKind::Ndvi => "NDVI",
            IndicatorKind::Evi => "EVI",
            _ => continue,
        };
        let Some(pct) = deviation.deviation_pct else {
            continue;
        };
        let Some(severity) = vegetation_severity(pct, sink.config) else {
            continue;
        };

        let mut alert = AlertSink::base(&deviation.zone, label, severity);
        alert.deviation_pct = Some(pct);
        alert.current = deviation.current;
        alert.baseline = deviation.baseline;
        sink.emit(alert);
    }
}

fn fire_alerts(fire: &ExportTable, sink: &mut AlertSink<'_>) {
    let detection_columns: Vec<&str> = fire
        .columns
        .iter()
        .filter(|column| column.kind == IndicatorKind::FireDetection)
        .map(|column| column.name.as_str())
        .collect();

    for record in &fire.records {
        for column in &detection_columns {
            let Some(detections) = record.values.get(*column).and_then(|cell| cell.as_number()) else {
                continue;
            };
            if detections > 0.0 {
                let mut alert = AlertSink::base(&record.zone, "Active Fire", Severity::High);
                alert.detail = Some(format!("Fire detections: {}", detections.trunc() as i64));
                sink.emit(alert);
            }
        }
    }
}

fn climate_alerts(deviations: &[Deviation], sink: &mut AlertSink<'_>) {
    let config = sink.config;
    let thresholds = &config.thresholds;

    for deviation in deviations {
        match deviation.kind {
            IndicatorKind::Rainfall => {
                let Some(pct) = deviation.deviation_pct else {
                    continue;
                };
                if pct <= thresholds.rainfall_deficit_pct {
                    let mut alert = AlertSink::base(&deviation.zone, "Rainfall Deficit", Severity::High);
                    alert.deviation_pct = Some(pct);
                    alert.detail = Some(format!(
                        "Drought watch: >{}% deficit vs 30-yr mean",
                        thresholds.rainfall_deficit_pct.abs()
                    ));
                    sink.emit(alert);
                }
            }
            IndicatorKind::LandSurfaceTemperature => {
                let (Some(current), Some(baseline)) = (deviation.current, deviation.baseline) else {
                    continue;
                };
                let anomaly = current - baseline;
                if anomaly > thresholds.lst_anomaly_c {
                    let mut alert =
                        AlertSink::base(&deviation.zone, "Land Surface Temperature", Severity::Moderate);
                    alert.detail = Some(format!("LST anomaly: +{anomaly:.1}°C above baseline"));
                    sink.emit(alert);
                }
            }
            _ => {}
        }
    }
}

/// Stable ordering with HIGH alerts ahead of the rest.
pub fn sort_high_first(alerts: &mut [Alert]) {
    alerts.sort_by_key(|alert| alert.severity != Severity::High);
}

/// Applies every rule family to the computed deviations and the raw fire
/// export. Families fire independently; the result is HIGH-first.
pub fn detect_alerts(
    tables: &BTreeMap<Category, ExportTable>,
    deviations: &[Deviation],
    config: &MonitoringConfig,
) -> Vec<Alert> {
    let mut sink = AlertSink::new(config);

    vegetation_alerts(deviations, &mut sink);
    if let Some(fire) = tables.get(&Category::Fire) {
        fire_alerts(fire, &mut sink);
    }
    climate_alerts(deviations, &mut sink);

    let mut alerts = sink.alerts;
    sort_high_first(&mut alerts);
    info!(alerts = alerts.len(), "generated alerts");
    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Record, RowPeriod, TableColumn};

    fn deviation(zone: &str, indicator: &str, current: f64, baseline: f64, pct: Option<f64>) -> Deviation {
        Deviation {
            zone: zone.to_string(),
            indicator: indicator.to_string(),
            kind: IndicatorKind::classify(indicator),
            current: Some(current),
            baseline: Some(baseline),
            deviation_pct: pct,
        }
    }

    fn fire_table(rows: &[(&str, Option<f64>)]) -> BTreeMap<Category, ExportTable> {
        let records = rows
            .iter()
            .map(|(zone, count)| Record {
                zone: zone.to_string(),
                indicator: "firms_active".to_string(),
                year: 2026,
                month: 1,
                period: RowPeriod::Other,
                values: [
                    ("fire_count".to_string(), count.map_or(Cell::Null, Cell::Number)),
                    ("burned_area_ha".to_string(), Cell::Number(120.0)),
                ]
                .into_iter()
                .collect(),
            })
            .collect();
        let columns = ["fire_count", "burned_area_ha"]
            .iter()
            .map(|name| TableColumn {
                name: name.to_string(),
                kind: IndicatorKind::classify(name),
                numeric: true,
            })
            .collect();
        BTreeMap::from([(
            Category::Fire,
            ExportTable {
                category: Category::Fire,
                columns,
                records,
            },
        )])
    }

    fn config() -> MonitoringConfig {
        MonitoringConfig::default()
    }

    #[test]
    fn ndvi_drop_beyond_high_threshold_is_high() {
        let alerts = detect_alerts(
            &BTreeMap::new(),
            &[deviation("Usangu GR", "NDVI_mean", 0.42, 0.60, Some(-30.0))],
            &config(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].indicator, "NDVI");
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].deviation_pct, Some(-30.0));
        assert_eq!(alerts[0].escalation, None);
    }

    #[test]
    fn thresholds_are_inclusive() {
        let config = config();
        assert_eq!(vegetation_severity(-25.0, &config), Some(Severity::High));
        assert_eq!(vegetation_severity(-24.9, &config), Some(Severity::Moderate));
        assert_eq!(vegetation_severity(-15.0, &config), Some(Severity::Moderate));
        assert_eq!(vegetation_severity(-14.9, &config), None);
    }

    #[test]
    fn moderate_in_escalating_zone_becomes_high() {
        let deviations = [
            deviation("Ihefu Core", "EVI_mean", 0.41, 0.5, Some(-18.0)),
            deviation("Usangu GR", "EVI_mean", 0.41, 0.5, Some(-18.0)),
        ];
        let alerts = detect_alerts(&BTreeMap::new(), &deviations, &config());

        let ihefu = alerts.iter().find(|a| a.zone == "Ihefu Core").unwrap();
        assert_eq!(ihefu.severity, Severity::High);
        assert_eq!(
            ihefu.escalation.as_deref(),
            Some("Escalated: MODERATE in Ihefu Core -> HIGH")
        );

        let usangu = alerts.iter().find(|a| a.zone == "Usangu GR").unwrap();
        assert_eq!(usangu.severity, Severity::Moderate);
        assert_eq!(usangu.escalation, None);
    }

    #[test]
    fn dispersion_and_null_deviations_are_ignored() {
        let alerts = detect_alerts(
            &BTreeMap::new(),
            &[
                deviation("Usangu GR", "NDVI_stdDev", 0.01, 0.1, Some(-90.0)),
                deviation("Usangu GR", "NDVI_mean", 0.4, 0.0, None),
            ],
            &config(),
        );
        assert!(alerts.is_empty());
    }

    #[test]
    fn each_positive_fire_count_is_high() {
        let tables = fire_table(&[("Nyerere NP", Some(3.0)), ("Usangu GR", Some(0.0)), ("Ihefu Core", None)]);
        let alerts = detect_alerts(&tables, &[], &config());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].zone, "Nyerere NP");
        assert_eq!(alerts[0].indicator, "Active Fire");
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[0].detail.as_deref(), Some("Fire detections: 3"));
    }

    #[test]
    fn rainfall_deficit_is_high() {
        let alerts = detect_alerts(
            &BTreeMap::new(),
            &[
                deviation("Nyerere NP", "rainfall_mm", 55.0, 100.0, Some(-45.0)),
                deviation("Usangu GR", "rainfall_mm", 65.0, 100.0, Some(-35.0)),
            ],
            &config(),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].indicator, "Rainfall Deficit");
        assert_eq!(alerts[0].severity, Severity::High);
        assert!(alerts[0].detail.as_deref().unwrap().contains("40%"));
    }

    #[test]
    fn lst_anomaly_is_moderate_unless_escalated() {
        let alerts = detect_alerts(
            &BTreeMap::new(),
            &[
                deviation("Nyerere NP", "LST_Day_C", 36.5, 33.0, Some(10.6)),
                deviation("Ihefu Core", "LST_Day_C", 34.0, 30.0, Some(13.3)),
                deviation("Usangu GR", "LST_Day_C", 33.0, 30.0, Some(10.0)),
            ],
            &config(),
        );
        assert_eq!(alerts.len(), 2);
        // Escalated HIGH sorts ahead of the MODERATE one.
        assert_eq!(alerts[0].zone, "Ihefu Core");
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(alerts[1].zone, "Nyerere NP");
        assert_eq!(alerts[1].severity, Severity::Moderate);
        assert_eq!(alerts[1].detail.as_deref(), Some("LST anomaly: +3.5°C above baseline"));
    }

    #[test]
    fn escalation_covers_every_rule_family() {
        let deviations = [
            deviation("Ihefu Core", "NDVI_mean", 0.4, 0.5, Some(-20.0)),
            deviation("Ihefu Core", "LST_Day_C", 35.0, 30.0, Some(16.7)),
        ];
        let alerts = detect_alerts(&BTreeMap::new(), &deviations, &config());
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().all(|a| a.severity == Severity::High && a.escalation.is_some()));
    }

    #[test]
    fn sort_keeps_detection_order_within_severity() {
        let mut alerts = vec![
            AlertSink::base("A", "LST", Severity::Moderate),
            AlertSink::base("B", "Active Fire", Severity::High),
            AlertSink::base("C", "LST", Severity::Moderate),
            AlertSink::base("D", "NDVI", Severity::High),
        ];
        sort_high_first(&mut alerts);
        let zones: Vec<_> = alerts.iter().map(|a| a.zone.as_str()).collect();
        assert_eq!(zones, vec!["B", "D", "A", "C"]);
    }
}
