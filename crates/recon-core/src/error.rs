use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{ColumnRole, TableKind};

/// Pipeline stage in which an unexpected computation failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Aggregate,
    Metrics,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Aggregate => "aggregate",
            Stage::Metrics => "metrics",
        };
        f.write_str(name)
    }
}

/// All errors produced by the banner reconciliation crates.
#[derive(Error, Debug)]
pub enum ReconError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be created or appended to.
    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file extension is not one the loader understands.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    /// The file was read but its contents could not be decoded into a table.
    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// A CSV record could not be parsed.
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A spreadsheet workbook could not be opened or read.
    #[error("Failed to read workbook: {0}")]
    Excel(String),

    /// One or more required semantic roles could not be resolved in a table.
    #[error(
        "Missing required column(s) in {table} table: {} (detected columns: {})",
        join_roles(.missing),
        .detected.join(", ")
    )]
    MissingColumns {
        table: TableKind,
        missing: Vec<ColumnRole>,
        detected: Vec<String>,
    },

    /// The join-key extraction pattern is not a valid regular expression.
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// The period filter was given a start date after its end date.
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Any other failure while computing results, with the stage and key.
    #[error("Computation failed during {stage}{}: {message}", .key.as_deref().map(|k| format!(" for key {k}")).unwrap_or_default())]
    Computation {
        stage: Stage,
        key: Option<String>,
        message: String,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the recon crates.
pub type Result<T> = std::result::Result<T, ReconError>;

fn join_roles(roles: &[ColumnRole]) -> String {
    roles
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ReconError::FileRead {
            path: PathBuf::from("/some/spend.csv"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/spend.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_file_write() {
        let err = ReconError::FileWrite {
            path: PathBuf::from("/tmp/summary.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to write file"));
        assert!(msg.contains("/tmp/summary.csv"));
    }

    #[test]
    fn test_error_display_missing_columns_lists_roles_and_detected() {
        let err = ReconError::MissingColumns {
            table: TableKind::Spend,
            missing: vec![ColumnRole::EntityName, ColumnRole::SpendAmount],
            detected: vec!["キャンペーン".to_string(), "インプレッション".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required column(s) in spend table: entity_name, spend_amount \
             (detected columns: キャンペーン, インプレッション)"
        );
    }

    #[test]
    fn test_error_display_computation_with_key() {
        let err = ReconError::Computation {
            stage: Stage::Metrics,
            key: Some("bn007".to_string()),
            message: "spend is not finite".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Computation failed during metrics for key bn007: spend is not finite"
        );
    }

    #[test]
    fn test_error_display_computation_without_key() {
        let err = ReconError::Computation {
            stage: Stage::Aggregate,
            key: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Computation failed during aggregate: boom");
    }

    #[test]
    fn test_error_display_invalid_date_range() {
        let err = ReconError::InvalidDateRange {
            start: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date range: 2024-03-10 is after 2024-03-01"
        );
    }

    #[test]
    fn test_error_display_unsupported_format() {
        let err = ReconError::UnsupportedFormat(PathBuf::from("/tmp/report.pdf"));
        assert_eq!(err.to_string(), "Unsupported file format: /tmp/report.pdf");
    }

    #[test]
    fn test_error_display_config() {
        let err = ReconError::Config("start and end dates must be given together".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: start and end dates must be given together"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ReconError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_regex() {
        let regex_err = regex::Regex::new("(bn").unwrap_err();
        let err: ReconError = regex_err.into();
        assert!(err.to_string().starts_with("Invalid key pattern"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: ReconError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
