//! One-line-per-run summary log.
//!
//! Each reconciliation run can append a row of totals to an external log.
//! The row's values are produced here; where they end up is the job of a
//! [`SummarySink`].

use std::fs::OpenOptions;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use recon_core::calculations::SummaryTotals;
use recon_core::error::{ReconError, Result};
use recon_core::time_utils::format_log_timestamp;
use serde::Serialize;
use tracing::debug;

/// Column headers written before the first row of a new log.
pub const HEADER: [&str; 8] = [
    "timestamp",
    "spend_source",
    "lead_source",
    "total_spend",
    "total_leads",
    "total_connects",
    "total_deals",
    "total_corporate",
];

// ── SummaryLogRow ─────────────────────────────────────────────────────────────

/// Field values for one appended log row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryLogRow {
    /// `%Y-%m-%d %H:%M:%S` in the configured timezone.
    pub timestamp: String,
    pub spend_source: String,
    pub lead_source: String,
    pub total_spend: f64,
    pub total_leads: u64,
    pub total_connects: u64,
    pub total_deals: u64,
    pub total_corporate: u64,
}

impl SummaryLogRow {
    pub fn from_totals(
        now: DateTime<Utc>,
        timezone: &str,
        spend_source: impl Into<String>,
        lead_source: impl Into<String>,
        totals: &SummaryTotals,
    ) -> Self {
        Self {
            timestamp: format_log_timestamp(now, timezone),
            spend_source: spend_source.into(),
            lead_source: lead_source.into(),
            total_spend: totals.spend,
            total_leads: totals.leads,
            total_connects: totals.connects,
            total_deals: totals.deals(),
            total_corporate: totals.corporate,
        }
    }

    /// Values in [`HEADER`] order.  Spend is written without decimals.
    pub fn fields(&self) -> Vec<String> {
        vec![
            self.timestamp.clone(),
            self.spend_source.clone(),
            self.lead_source.clone(),
            format!("{:.0}", self.total_spend),
            self.total_leads.to_string(),
            self.total_connects.to_string(),
            self.total_deals.to_string(),
            self.total_corporate.to_string(),
        ]
    }
}

// ── Sinks ─────────────────────────────────────────────────────────────────────

/// Destination for summary rows.
pub trait SummarySink {
    fn append(&mut self, row: &SummaryLogRow) -> Result<()>;
}

/// Appends rows to a local CSV file, writing the header once when the file
/// is new or empty.
#[derive(Debug, Clone)]
pub struct CsvSummarySink {
    path: PathBuf,
}

impl CsvSummarySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SummarySink for CsvSummarySink {
    fn append(&mut self, row: &SummaryLogRow) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| ReconError::FileWrite {
                path: self.path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(HEADER)?;
        }
        writer.write_record(row.fields())?;
        writer.flush()?;

        debug!("Appended summary row to {}", self.path.display());
        Ok(())
    }
}

/// Collects rows in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySummarySink {
    pub rows: Vec<SummaryLogRow>,
}

impl SummarySink for MemorySummarySink {
    fn append(&mut self, row: &SummaryLogRow) -> Result<()> {
        self.rows.push(row.clone());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn row(spend: f64) -> SummaryLogRow {
        let totals = SummaryTotals {
            spend,
            leads: 12,
            connects: 7,
            deals_done: 2,
            deals_scheduled: 1,
            corporate: 4,
            ..Default::default()
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 1, 2, 3).unwrap();
        SummaryLogRow::from_totals(now, "Asia/Tokyo", "meta.csv", "hubspot.csv", &totals)
    }

    #[test]
    fn test_fields_order_and_timezone() {
        assert_eq!(
            row(123_456.7).fields(),
            vec![
                "2024-03-05 10:02:03",
                "meta.csv",
                "hubspot.csv",
                "123457",
                "12",
                "7",
                "3",
                "4"
            ]
        );
    }

    #[test]
    fn test_csv_sink_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("summary.csv");
        let mut sink = CsvSummarySink::new(&path);

        sink.append(&row(1_000.0)).unwrap();
        sink.append(&row(2_000.0)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], HEADER.join(","));
        assert!(lines[1].contains(",1000,"));
        assert!(lines[2].contains(",2000,"));
    }

    #[test]
    fn test_csv_sink_appends_to_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("summary.csv");
        std::fs::write(&path, format!("{}\n", HEADER.join(","))).unwrap();

        CsvSummarySink::new(&path).append(&row(5.0)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_csv_sink_open_failure_is_a_write_error() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for append.
        let path = dir.path().join("summary.csv");
        std::fs::create_dir(&path).unwrap();

        let err = CsvSummarySink::new(&path).append(&row(1.0)).unwrap_err();
        assert!(matches!(err, ReconError::FileWrite { .. }));
        assert!(err.to_string().contains("Failed to write file"));
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySummarySink::default();
        sink.append(&row(1.0)).unwrap();
        assert_eq!(sink.rows.len(), 1);
    }
}
