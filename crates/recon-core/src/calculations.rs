use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{ReconError, Result, Stage};
use crate::models::{AggregatedRecord, Metrics, ScoredRecord, ThresholdChecks, Thresholds, Tier};

// ── MetricCalculator ──────────────────────────────────────────────────────────

/// Stateless derivation of cost and rate metrics from aggregated counts.
pub struct MetricCalculator;

impl MetricCalculator {
    /// Derive [`Metrics`] for one merged key.
    ///
    /// Every rate uses `lead_count` as its denominator and is `0` when there
    /// are no leads, so orphaned spend yields a zero CPA rather than an error.
    /// `corporate_resolved` controls whether `corporate_rate` is reported at
    /// all.
    ///
    /// Fails only when the spend total itself is not a finite number, which
    /// can happen when summing extreme values.
    pub fn compute(record: &AggregatedRecord, corporate_resolved: bool) -> Result<Metrics> {
        if !record.spend.is_finite() {
            return Err(ReconError::Computation {
                stage: Stage::Metrics,
                key: Some(record.key.clone()),
                message: format!("spend total {} is not finite", record.spend),
            });
        }

        let leads = record.lead_count;
        let corporate_rate = corporate_resolved.then(|| rate(record.corporate_count, leads));

        Ok(Metrics {
            cost_per_result: cost_per_result(record.spend, leads),
            connect_rate: rate(record.connect_count, leads),
            meeting_rate: rate(record.meeting_count(), leads),
            corporate_rate,
        })
    }
}

/// `floor(spend / leads)`, or `0` when there are no leads.
pub fn cost_per_result(spend: f64, leads: u64) -> i64 {
    if leads == 0 {
        return 0;
    }
    (spend / leads as f64).floor() as i64
}

/// `100 * part / leads`, or `0.0` when there are no leads.
pub fn rate(part: u64, leads: u64) -> f64 {
    if leads == 0 {
        return 0.0;
    }
    100.0 * part as f64 / leads as f64
}

// ── Classifier ────────────────────────────────────────────────────────────────

/// Maps metrics to a [`Tier`] using three independent threshold checks.
pub struct Classifier;

impl Classifier {
    /// Compare metrics against the configured thresholds.
    ///
    /// A CPA of zero never passes the cost check, since it means either no
    /// leads or no spend.
    pub fn checks(metrics: &Metrics, thresholds: &Thresholds) -> ThresholdChecks {
        let cpa = metrics.cost_per_result as f64;
        ThresholdChecks {
            cost_ok: metrics.cost_per_result > 0 && cpa <= thresholds.cpa_limit,
            connect_ok: metrics.connect_rate >= thresholds.connect_target,
            meeting_ok: metrics.meeting_rate >= thresholds.meeting_target,
        }
    }

    /// Pure mapping from the three checks to a tier.
    ///
    /// Rules, first match wins:
    /// 1. all three pass → [`Tier::Top`]
    /// 2. two pass including the meeting check → [`Tier::High`]
    /// 3. two pass without the meeting check → [`Tier::NeedsImprovement`]
    /// 4. only the meeting check passes → [`Tier::NeedsImprovement`]
    /// 5. anything else → [`Tier::StopRecommended`]
    pub fn tier(checks: ThresholdChecks) -> Tier {
        match (checks.passed(), checks.meeting_ok) {
            (3, _) => Tier::Top,
            (2, true) => Tier::High,
            (2, false) => Tier::NeedsImprovement,
            (1, true) => Tier::NeedsImprovement,
            _ => Tier::StopRecommended,
        }
    }

    /// Compute metrics, checks and tier for one aggregated record.
    pub fn score(
        record: AggregatedRecord,
        thresholds: &Thresholds,
        corporate_resolved: bool,
    ) -> Result<ScoredRecord> {
        let metrics = MetricCalculator::compute(&record, corporate_resolved)?;
        let checks = Self::checks(&metrics, thresholds);
        Ok(ScoredRecord {
            record,
            metrics,
            checks,
            tier: Self::tier(checks),
        })
    }
}

// ── SummaryTotals ─────────────────────────────────────────────────────────────

/// Reductions over a scored result set for summary views and the run log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTotals {
    /// Number of distinct banners in the result set.
    pub banners: usize,
    pub spend: f64,
    pub reported_results: f64,
    pub leads: u64,
    pub connects: u64,
    pub deals_done: u64,
    pub deals_scheduled: u64,
    pub corporate: u64,
    /// Overall `floor(spend / leads)`.
    pub cost_per_result: i64,
    pub connect_rate: f64,
    pub meeting_rate: f64,
    /// Number of banners per tier; every tier is present, possibly with `0`.
    pub tier_counts: BTreeMap<Tier, usize>,
}

impl SummaryTotals {
    pub fn from_records(records: &[ScoredRecord]) -> Self {
        let mut totals = SummaryTotals {
            tier_counts: Tier::ALL.iter().map(|t| (*t, 0)).collect(),
            ..Default::default()
        };

        for scored in records {
            let r = &scored.record;
            totals.banners += 1;
            totals.spend += r.spend;
            totals.reported_results += r.reported_results;
            totals.leads += r.lead_count;
            totals.connects += r.connect_count;
            totals.deals_done += r.deal_done_count;
            totals.deals_scheduled += r.deal_scheduled_count;
            totals.corporate += r.corporate_count;
            *totals.tier_counts.entry(scored.tier).or_default() += 1;
        }

        totals.cost_per_result = cost_per_result(totals.spend, totals.leads);
        totals.connect_rate = rate(totals.connects, totals.leads);
        totals.meeting_rate = rate(totals.deals(), totals.leads);
        totals
    }

    /// Completed plus scheduled meetings.
    pub fn deals(&self) -> u64 {
        self.deals_done + self.deals_scheduled
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
