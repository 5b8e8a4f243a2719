//! Single-run reconciliation orchestrator.
//!
//! Loads both source tables, runs the analysis pipeline and prepares the
//! summary-log row.  Every run owns its inputs and intermediate state; nothing
//! is shared between runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use recon_core::error::Result;
use recon_core::settings::RunConfig;
use recon_data::analysis::{analyze_with_rules, AnalysisResult};
use recon_data::reader::load_table;
use recon_data::resolver::ResolverRules;
use tracing::{info, instrument};

use crate::summary_log::{SummaryLogRow, SummarySink};

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything a completed run hands to the presentation layer.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub analysis: AnalysisResult,
    /// Row ready to be appended to the summary log.
    pub log_row: SummaryLogRow,
}

// ── ReconOrchestrator ─────────────────────────────────────────────────────────

pub struct ReconOrchestrator {
    config: RunConfig,
}

impl ReconOrchestrator {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Load both tables and score every banner.
    ///
    /// Both files must load before any processing starts.  Any failure aborts
    /// the run with no partial result.
    pub fn run(&self, spend_path: &Path, lead_path: &Path) -> Result<RunOutcome> {
        self.run_at(spend_path, lead_path, Utc::now())
    }

    /// As [`run`](Self::run), with an explicit log timestamp.
    #[instrument(skip(self, now), fields(spend = %spend_path.display(), leads = %lead_path.display()))]
    pub fn run_at(&self, spend_path: &Path, lead_path: &Path, now: DateTime<Utc>) -> Result<RunOutcome> {
        let rules = match &self.config.roles_file {
            Some(path) => ResolverRules::from_overrides_file(path)?,
            None => ResolverRules::default(),
        };

        let spend = load_table(spend_path)?;
        let leads = load_table(lead_path)?;
        info!(
            "Loaded {} spend rows and {} lead rows",
            spend.len(),
            leads.len()
        );

        let analysis = analyze_with_rules(&spend, &leads, &self.config, &rules)?;
        let log_row = SummaryLogRow::from_totals(
            now,
            &self.config.timezone,
            spend.label.as_str(),
            leads.label.as_str(),
            &analysis.totals,
        );

        Ok(RunOutcome { analysis, log_row })
    }

    /// Append the outcome's summary row to `sink`.
    pub fn record(&self, outcome: &RunOutcome, sink: &mut dyn SummarySink) -> Result<()> {
        sink.append(&outcome.log_row)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
