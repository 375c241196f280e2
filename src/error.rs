use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read export {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("export {path} is missing required columns: {}", missing.join(", "))]
    Schema { path: PathBuf, missing: Vec<String> },
    #[error("export {path} row {row}: column {column} holds {value:?}, expected an integer")]
    InvalidValue {
        path: PathBuf,
        row: usize,
        column: &'static str,
        value: String,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid alert thresholds: {0}")]
    InvalidThresholds(String),
    #[error("indicator catalog not found: {0}")]
    MissingCatalog(PathBuf),
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("invalid reporting period {year}-{month}")]
    InvalidPeriod { year: i32, month: u32 },
    #[error("no datasets found for {period}")]
    NoDatasets { period: String },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode dataset: {0}")]
    Encode(#[from] serde_json::Error),
}
