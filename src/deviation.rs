use crate::models::{CoverageGap, Deviation, ExportTable, Record, RowPeriod};

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Percentage change of `current` against `baseline`. Zero, NaN or missing
/// baselines, and any non-finite quotient, yield `None`.
pub fn deviation_pct(current: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    let (current, baseline) = (current?, baseline?);
    if baseline == 0.0 || baseline.is_nan() || current.is_nan() {
        return None;
    }
    let pct = (current - baseline) / baseline.abs() * 100.0;
    pct.is_finite().then(|| round_to(pct, 1))
}

#[derive(Debug, Default, PartialEq)]
pub struct DeviationOutcome {
    pub deviations: Vec<Deviation>,
    pub gaps: Vec<CoverageGap>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Compares current and baseline rows zone by zone. Zones lacking either
/// side produce no deviations and are reported as gaps instead.
pub fn compute_deviations(table: &ExportTable) -> DeviationOutcome {
    let mut outcome = DeviationOutcome::default();

    for zone in table.zones() {
        let rows_for = |period: RowPeriod| {
            table
                .records
                .iter()
                .filter(|record| record.zone == zone && record.period == period)
                .collect::<Vec<_>>()
        };
        let current_rows = rows_for(RowPeriod::Current);
        let baseline_rows = rows_for(RowPeriod::Baseline);

        let missing = match (current_rows.is_empty(), baseline_rows.is_empty()) {
            (false, false) => None,
            (true, _) => Some(RowPeriod::Current),
            (false, true) => Some(RowPeriod::Baseline),
        };
        if let Some(missing) = missing {
            outcome.gaps.push(CoverageGap {
                dataset: table.category,
                zone: zone.clone(),
                missing,
            });
            continue;
        }

        for column in table.numeric_columns() {
            let column_mean = |rows: &[&Record]| {
                mean(
                    rows.iter()
                        .filter_map(|record| record.values.get(&column.name))
                        .filter_map(|cell| cell.as_number()),
                )
            };
            let current = column_mean(&current_rows[..]);
            let baseline = column_mean(&baseline_rows[..]);

            outcome.deviations.push(Deviation {
                zone: zone.clone(),
                indicator: column.name.clone(),
                kind: column.kind,
                current: current.map(|value| round_to(value, 4)),
                baseline: baseline.map(|value| round_to(value, 4)),
                deviation_pct: deviation_pct(current, baseline),
            });
        }
    }

    outcome
}
