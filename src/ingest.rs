use std::collections::BTreeMap;
use std::path::Path;

use tracing::{error, info, warn};

use crate::error::IngestError;
use crate::models::{Category, Cell, ExportTable, IndicatorKind, Record, RowPeriod, TableColumn};

const REQUIRED_COLUMNS: [&str; 4] = ["zone", "indicator", "year", "month"];
const NULL_TOKENS: [&str; 7] = ["", "NA", "N/A", "NaN", "nan", "null", "None"];

/// Tables found for one period, plus the warnings raised while looking.
#[derive(Debug, Default)]
pub struct LoadedExports {
    pub tables: BTreeMap<Category, ExportTable>,
    pub warnings: Vec<String>,
}

pub fn load_export(path: &Path, category: Category) -> Result<ExportTable, IngestError> {
    let read_error = |source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(read_error)?;
    let headers = reader.headers().map_err(read_error)?.clone();

    let positions = REQUIRED_COLUMNS.map(|name| headers.iter().position(|header| header == name));
    let [Some(zone_at), Some(indicator_at), Some(year_at), Some(month_at)] = positions else {
        let mut missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .zip(positions)
            .filter(|(_, position)| position.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        missing.sort();
        return Err(IngestError::Schema {
            path: path.to_path_buf(),
            missing,
        });
    };

    let measured: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(index, _)| ![zone_at, indicator_at, year_at, month_at].contains(index))
        .map(|(index, name)| (index, name.to_string()))
        .collect();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let fields = result.map_err(read_error)?;
        let field = |index: usize| fields.get(index).unwrap_or("");

        let year = parse_int(field(year_at)).ok_or_else(|| IngestError::InvalidValue {
            path: path.to_path_buf(),
            row: row + 1,
            column: "year",
            value: field(year_at).to_string(),
        })?;
        let month = parse_int(field(month_at))
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| IngestError::InvalidValue {
                path: path.to_path_buf(),
                row: row + 1,
                column: "month",
                value: field(month_at).to_string(),
            })?;

        let indicator = text_or_empty(field(indicator_at));
        let values = measured
            .iter()
            .map(|(index, name)| (name.clone(), parse_cell(field(*index))))
            .collect();

        records.push(Record {
            zone: text_or_empty(field(zone_at)),
            period: RowPeriod::classify(&indicator),
            indicator,
            year: year as i32,
            month,
            values,
        });
    }

    let columns = measured
        .into_iter()
        .map(|(_, name)| {
            let numeric = records
                .iter()
                .all(|record: &Record| !matches!(record.values.get(&name), Some(Cell::Text(_))));
            TableColumn {
                kind: IndicatorKind::classify(&name),
                name,
                numeric,
            }
        })
        .collect();

    Ok(ExportTable {
        category,
        columns,
        records,
    })
}

/// Loads every category export present in `dir` for the period. Missing
/// files and unreadable tables are recorded as warnings, never raised.
pub fn load_monthly_exports(dir: &Path, year: i32, month: u32) -> LoadedExports {
    let mut loaded = LoadedExports::default();

    for category in Category::ALL {
        let file_name = category.file_name(year, month);
        let path = dir.join(&file_name);
        if !path.exists() {
            warn!(category = %category, "missing export: {file_name}");
            loaded.warnings.push(format!("Missing export: {file_name}"));
            continue;
        }

        match load_export(&path, category) {
            Ok(table) => {
                info!(
                    category = %category,
                    records = table.records.len(),
                    zones = ?table.zones(),
                    "loaded export {file_name}"
                );
                loaded.tables.insert(category, table);
            }
            Err(err) => {
                error!(category = %category, "excluding export: {err}");
                loaded.warnings.push(format!("Excluded {category}: {err}"));
            }
        }
    }

    loaded
}

fn is_null_token(raw: &str) -> bool {
    NULL_TOKENS.contains(&raw)
}

fn parse_cell(raw: &str) -> Cell {
    if is_null_token(raw) {
        return Cell::Null;
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Cell::Number(value),
        Ok(_) => Cell::Null,
        Err(_) => Cell::Text(raw.to_string()),
    }
}

fn parse_int(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

fn text_or_empty(raw: &str) -> String {
    if is_null_token(raw) {
        String::new()
    } else {
        raw.to_string()
    }
}
