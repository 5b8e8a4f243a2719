//! Runtime layer for banner reconciliation.
//!
//! Drives one reconciliation run from source files to scored records and
//! owns the summary-log sinks.

pub mod orchestrator;
pub mod summary_log;

pub use orchestrator::{ReconOrchestrator, RunOutcome};
pub use summary_log::{CsvSummarySink, SummaryLogRow, SummarySink};
