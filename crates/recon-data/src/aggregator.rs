//! Per-key aggregation of the spend and lead tables, and the join that
//! combines them.

use std::collections::BTreeMap;

use recon_core::error::{ReconError, Result, Stage};
use recon_core::models::{
    AggregatedRecord, CellValue, ColumnRole, ColumnRoleMap, JoinPolicy, MeetingSource, RawRecord,
    RawTable,
};
use recon_core::time_utils::parse_cell_datetime;
use tracing::debug;

use crate::keys::KeyedRows;

// ── KeywordSet ────────────────────────────────────────────────────────────────

/// Case-insensitive substring OR-list with an exclusion list that wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl KeywordSet {
    pub fn new(include: &[&str], exclude: &[&str]) -> Self {
        let lower = |list: &[&str]| list.iter().map(|k| k.to_lowercase()).collect();
        Self {
            include: lower(include),
            exclude: lower(exclude),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim().to_lowercase();
        if text.is_empty() || self.exclude.iter().any(|k| text.contains(k.as_str())) {
            return false;
        }
        self.include.iter().any(|k| text.contains(k.as_str()))
    }

    pub fn matches_cell(&self, cell: &CellValue) -> bool {
        !cell.is_blank() && self.matches(&cell.as_text())
    }

    /// Calls reached the lead.
    pub fn connect() -> Self {
        Self::new(
            &["あり", "済", "true", "yes", "done", "connected", "接続", "通電"],
            &["なし", "未", "not", "false"],
        )
    }

    /// A sales meeting took place.
    pub fn deal_done() -> Self {
        Self::new(
            &["実施", "済", "あり", "done", "held", "true", "yes", "受注", "closed won"],
            &["未", "なし", "not", "false", "予定", "scheduled"],
        )
    }

    /// A sales meeting is booked but has not happened yet.
    pub fn deal_scheduled() -> Self {
        Self::new(&["予定", "scheduled", "booked"], &["未定", "キャンセル", "cancel"])
    }

    /// Lead is a company rather than an individual.
    pub fn corporate() -> Self {
        Self::new(&["法人", "corporate", "company", "business"], &["個人"])
    }
}

/// The four condition sets used when counting lead rows.
#[derive(Debug, Clone)]
pub struct ConditionSets {
    pub connect: KeywordSet,
    pub deal_done: KeywordSet,
    pub deal_scheduled: KeywordSet,
    pub corporate: KeywordSet,
}

impl Default for ConditionSets {
    fn default() -> Self {
        Self {
            connect: KeywordSet::connect(),
            deal_done: KeywordSet::deal_done(),
            deal_scheduled: KeywordSet::deal_scheduled(),
            corporate: KeywordSet::corporate(),
        }
    }
}

// ── MeetingFlags ──────────────────────────────────────────────────────────────

/// Meeting evidence of one lead row.  `done` and `scheduled` are decided
/// independently, so one row may feed both counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeetingFlags {
    pub done: bool,
    pub scheduled: bool,
}

impl MeetingFlags {
    /// Read the flags of `row` from whichever columns `source` selects.
    pub fn of(
        row: &RawRecord,
        roles: &ColumnRoleMap,
        sets: &ConditionSets,
        source: MeetingSource,
    ) -> Self {
        match source {
            MeetingSource::Status => Self::from_status(row, roles, sets),
            MeetingSource::Dates => Self {
                done: false,
                scheduled: has_meeting_date(row, roles),
            },
            MeetingSource::Combined => {
                let status = Self::from_status(row, roles, sets);
                Self {
                    done: status.done,
                    scheduled: status.scheduled || has_meeting_date(row, roles),
                }
            }
        }
    }

    fn from_status(row: &RawRecord, roles: &ColumnRoleMap, sets: &ConditionSets) -> Self {
        let cell = move |role| roles.index(role).map(|idx| row.get(idx));
        let status_cells = [cell(ColumnRole::DealFlag), cell(ColumnRole::Stage)];

        let done = status_cells
            .iter()
            .flatten()
            .any(|c| sets.deal_done.matches_cell(c));
        let scheduled_by_status = status_cells
            .iter()
            .flatten()
            .any(|c| sets.deal_scheduled.matches_cell(c));
        // A dedicated scheduled column may just hold a yes/no flag.
        let scheduled_by_flag = cell(ColumnRole::DealScheduledFlag).is_some_and(|c| {
            sets.deal_scheduled.matches_cell(c) || sets.connect.matches_cell(c)
        });

        Self {
            done,
            scheduled: scheduled_by_status || scheduled_by_flag,
        }
    }
}

/// A parseable date in either meeting-date column.  Counted once per row.
fn has_meeting_date(row: &RawRecord, roles: &ColumnRoleMap) -> bool {
    [ColumnRole::FirstMeetingDate, ColumnRole::FollowUpMeetingDate]
        .iter()
        .filter_map(|&role| roles.index(role))
        .any(|idx| parse_cell_datetime(row.get(idx)).is_some())
}

// ── Per-table summaries ───────────────────────────────────────────────────────

/// Spend-side totals for one key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendSummary {
    pub spend: f64,
    pub reported_results: f64,
    pub rows: usize,
}

/// Lead-side counts for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadSummary {
    pub lead_count: u64,
    pub connect_count: u64,
    pub deal_done_count: u64,
    pub deal_scheduled_count: u64,
    pub corporate_count: u64,
}

/// Sum spend (and reported results, when resolved) per key.
///
/// Non-numeric spend cells count as zero.
pub fn aggregate_spend(
    table: &RawTable,
    roles: &ColumnRoleMap,
    keyed: &KeyedRows,
) -> Result<BTreeMap<String, SpendSummary>> {
    roles.require()?;
    let mut out: BTreeMap<String, SpendSummary> = BTreeMap::new();
    let (Some(spend_col), results_col) = (
        roles.index(ColumnRole::SpendAmount),
        roles.index(ColumnRole::ResultCount),
    ) else {
        return Ok(out);
    };

    for (row_idx, key) in &keyed.keyed {
        let row = &table.rows[*row_idx];
        let summary = out.entry(key.clone()).or_default();
        summary.spend += row.get(spend_col).as_number();
        if let Some(col) = results_col {
            summary.reported_results += row.get(col).as_number();
        }
        summary.rows += 1;
    }

    if let Some((key, summary)) = out.iter().find(|(_, s)| !s.spend.is_finite()) {
        return Err(ReconError::Computation {
            stage: Stage::Aggregate,
            key: Some(key.clone()),
            message: format!("spend total {} is not finite", summary.spend),
        });
    }

    debug!("spend table aggregated into {} keys", out.len());
    Ok(out)
}

/// Count leads and condition matches per key.
///
/// Unresolved optional columns leave their counters at zero.
pub fn aggregate_leads(
    table: &RawTable,
    roles: &ColumnRoleMap,
    keyed: &KeyedRows,
    sets: &ConditionSets,
    meeting_source: MeetingSource,
) -> Result<BTreeMap<String, LeadSummary>> {
    roles.require()?;
    let connect_col = roles.index(ColumnRole::ConnectFlag);
    let attribute_col = roles.index(ColumnRole::Attribute);

    let mut out: BTreeMap<String, LeadSummary> = BTreeMap::new();
    for (row_idx, key) in &keyed.keyed {
        let row = &table.rows[*row_idx];
        let summary = out.entry(key.clone()).or_default();
        summary.lead_count += 1;

        if connect_col.is_some_and(|c| sets.connect.matches_cell(row.get(c))) {
            summary.connect_count += 1;
        }
        if attribute_col.is_some_and(|c| sets.corporate.matches_cell(row.get(c))) {
            summary.corporate_count += 1;
        }
        let meeting = MeetingFlags::of(row, roles, sets, meeting_source);
        if meeting.done {
            summary.deal_done_count += 1;
        }
        if meeting.scheduled {
            summary.deal_scheduled_count += 1;
        }
    }

    debug!("lead table aggregated into {} keys", out.len());
    Ok(out)
}

// ── Merge ─────────────────────────────────────────────────────────────────────

/// Join the two summaries into one record per key, sorted by key.
///
/// Fields missing on one side default to zero.
pub fn merge(
    spend: &BTreeMap<String, SpendSummary>,
    leads: &BTreeMap<String, LeadSummary>,
    policy: JoinPolicy,
) -> Vec<AggregatedRecord> {
    let keys: Vec<&String> = match policy {
        JoinPolicy::Outer => {
            let mut all: Vec<&String> = spend.keys().chain(leads.keys()).collect();
            all.sort();
            all.dedup();
            all
        }
        JoinPolicy::Left => spend.keys().collect(),
        JoinPolicy::Inner => spend.keys().filter(|k| leads.contains_key(*k)).collect(),
    };

    let records: Vec<AggregatedRecord> = keys
        .into_iter()
        .map(|key| {
            let mut record = AggregatedRecord::new(key.as_str());
            if let Some(s) = spend.get(key) {
                record.spend = s.spend;
                record.reported_results = s.reported_results;
            }
            if let Some(l) = leads.get(key) {
                record.lead_count = l.lead_count;
                record.connect_count = l.connect_count;
                record.deal_done_count = l.deal_done_count;
                record.deal_scheduled_count = l.deal_scheduled_count;
                record.corporate_count = l.corporate_count;
            }
            record
        })
        .collect();

    debug!(
        "{:?} join of {} spend keys and {} lead keys → {} records",
        policy,
        spend.len(),
        leads.len(),
        records.len()
    );
    records
}

// ── Tests ─────────────────────────────────────────────────────────────────────
