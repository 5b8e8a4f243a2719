//! Main reconciliation pipeline.
//!
//! Resolves columns, filters by period, extracts keys, aggregates both tables,
//! joins them and scores every banner, returning an [`AnalysisResult`] ready
//! for the UI layer.

use recon_core::calculations::{Classifier, SummaryTotals};
use recon_core::error::Result;
use recon_core::models::{ColumnRole, ColumnRoleMap, JoinPolicy, RawTable, ScoredRecord, TableKind};
use recon_core::settings::RunConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregator::{aggregate_leads, aggregate_spend, merge, ConditionSets};
use crate::keys::KeyExtractor;
use crate::period::filter_rows;
use crate::resolver::{resolve, ResolverRules};

// ── Public types ──────────────────────────────────────────────────────────────

/// Row accounting for one source table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Data rows read from the source.
    pub rows_read: usize,
    /// Rows inside the reporting period that produced a key.
    pub rows_kept: usize,
    /// Rows outside the period.
    pub rows_out_of_period: usize,
    /// Rows without a usable key.
    pub rows_without_key: usize,
    /// Distinct keys after aggregation.
    pub keys: usize,
}

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisMetadata {
    pub spend: TableStats,
    pub leads: TableStats,
    pub join: JoinPolicy,
}

/// The complete output of [`analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    /// One record per key, sorted by key.
    pub records: Vec<ScoredRecord>,
    pub totals: SummaryTotals,
    pub spend_roles: ColumnRoleMap,
    pub lead_roles: ColumnRoleMap,
    pub metadata: AnalysisMetadata,
}

impl AnalysisResult {
    /// Whether `role` of the lead table was matched to a column.
    pub fn lead_feature(&self, role: ColumnRole) -> bool {
        self.lead_roles.has(role)
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the pipeline with the built-in column rules.
pub fn analyze(spend: &RawTable, leads: &RawTable, config: &RunConfig) -> Result<AnalysisResult> {
    analyze_with_rules(spend, leads, config, &ResolverRules::default())
}

/// Run the full pipeline.
///
/// 1. Resolve column roles for both tables; abort if a required one is missing.
/// 2. Restrict both tables to the configured period.
/// 3. Extract join keys.
/// 4. Aggregate each table per key and join the summaries.
/// 5. Compute metrics and classify every record.
pub fn analyze_with_rules(
    spend: &RawTable,
    leads: &RawTable,
    config: &RunConfig,
    rules: &ResolverRules,
) -> Result<AnalysisResult> {
    // ── Step 1: Resolve ───────────────────────────────────────────────────────
    let spend_roles = resolve(&spend.columns, TableKind::Spend, rules);
    let lead_roles = resolve(&leads.columns, TableKind::Leads, rules);
    spend_roles.require()?;
    lead_roles.require()?;
    warn_degraded(&lead_roles);

    // ── Step 2: Period ────────────────────────────────────────────────────────
    let period = config.period.as_ref();
    let spend_rows = filter_rows(spend, &spend_roles, period);
    let lead_rows = filter_rows(leads, &lead_roles, period);

    // ── Step 3: Keys ──────────────────────────────────────────────────────────
    let extractor = KeyExtractor::new(&config.key_pattern, config.key_fallback)?;
    let spend_keyed = extractor.key_rows(spend, &spend_roles, &spend_rows);
    let lead_keyed = extractor.key_rows(leads, &lead_roles, &lead_rows);

    // ── Step 4: Aggregate and join ────────────────────────────────────────────
    let sets = ConditionSets::default();
    let spend_summary = aggregate_spend(spend, &spend_roles, &spend_keyed)?;
    let lead_summary = aggregate_leads(leads, &lead_roles, &lead_keyed, &sets, config.meeting_source)?;
    let merged = merge(&spend_summary, &lead_summary, config.join);

    // ── Step 5: Score ─────────────────────────────────────────────────────────
    let corporate_resolved = lead_roles.has(ColumnRole::Attribute);
    let records = merged
        .into_iter()
        .map(|record| Classifier::score(record, &config.thresholds, corporate_resolved))
        .collect::<Result<Vec<_>>>()?;

    if records.is_empty() {
        warn!("no banner keys survived filtering; result set is empty");
    }

    let totals = SummaryTotals::from_records(&records);
    let metadata = AnalysisMetadata {
        spend: TableStats {
            rows_read: spend.len(),
            rows_kept: spend_keyed.keyed.len(),
            rows_out_of_period: spend.len() - spend_rows.len(),
            rows_without_key: spend_keyed.dropped,
            keys: spend_summary.len(),
        },
        leads: TableStats {
            rows_read: leads.len(),
            rows_kept: lead_keyed.keyed.len(),
            rows_out_of_period: leads.len() - lead_rows.len(),
            rows_without_key: lead_keyed.dropped,
            keys: lead_summary.len(),
        },
        join: config.join,
    };

    info!(
        "Scored {} banners ({} spend rows, {} lead rows kept)",
        records.len(),
        metadata.spend.rows_kept,
        metadata.leads.rows_kept
    );
    debug!("Tier counts: {:?}", totals.tier_counts);

    Ok(AnalysisResult {
        records,
        totals,
        spend_roles,
        lead_roles,
        metadata,
    })
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn warn_degraded(lead_roles: &ColumnRoleMap) {
    for role in [
        ColumnRole::ConnectFlag,
        ColumnRole::DealFlag,
        ColumnRole::Attribute,
    ] {
        if !lead_roles.has(role) {
            warn!("lead table has no {} column; its count will be zero", role);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
