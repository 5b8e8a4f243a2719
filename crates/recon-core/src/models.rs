use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};

// ── CellValue ─────────────────────────────────────────────────────────────────

/// A single scalar read from a source table.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDateTime),
}

impl CellValue {
    /// Render the cell as text the way a spreadsheet would display it.
    ///
    /// Whole numbers lose their fractional part (`42.0` → `"42"`), dates use
    /// `%Y-%m-%d %H:%M:%S`, and empty cells become `""`.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Date(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Whether the cell carries no usable content.
    ///
    /// Blank text and the literal `nan` left behind by spreadsheet exports
    /// count as empty.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => {
                let t = s.trim();
                t.is_empty() || t.eq_ignore_ascii_case("nan")
            }
            CellValue::Number(n) => n.is_nan(),
            CellValue::Date(_) => false,
        }
    }

    /// Coerce the cell to a number; anything non-numeric becomes `0.0`.
    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Number(n) if n.is_finite() => *n,
            CellValue::Text(s) => parse_numeric_text(s),
            _ => 0.0,
        }
    }
}

/// Parse a loosely formatted amount such as `"¥12,000"` or `"3,500円"`.
///
/// Currency symbols, thousands separators and whitespace are ignored.
/// Returns `0.0` when nothing numeric remains or the result is not finite.
pub fn parse_numeric_text(s: &str) -> f64 {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '¥' | '￥' | '円' | '$' | ',' | '，') && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

// ── RawTable ──────────────────────────────────────────────────────────────────

/// One row of a source table, positional against [`RawTable::columns`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub cells: Vec<CellValue>,
}

impl RawRecord {
    pub fn new(cells: Vec<CellValue>) -> Self {
        Self { cells }
    }

    /// Cell at column `index`; short rows read as [`CellValue::Empty`].
    pub fn get(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&EMPTY_CELL)
    }
}

/// An already-decoded source table: ordered column names plus rows.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Where the table came from (usually the file name).
    pub label: String,
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(label: impl Into<String>, columns: Vec<String>, rows: Vec<RawRecord>) -> Self {
        Self {
            label: label.into(),
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── Table kinds and roles ─────────────────────────────────────────────────────

/// Which of the two source exports a table is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Advertising-platform spend report.
    Spend,
    /// CRM lead export.
    Leads,
}

impl TableKind {
    /// Roles the resolver looks for in this kind of table.
    pub fn roles(self) -> &'static [ColumnRole] {
        match self {
            TableKind::Spend => &[
                ColumnRole::EntityName,
                ColumnRole::SpendAmount,
                ColumnRole::ResultCount,
                ColumnRole::Date,
            ],
            TableKind::Leads => &[
                ColumnRole::JoinKeySource,
                ColumnRole::ConnectFlag,
                ColumnRole::DealFlag,
                ColumnRole::DealScheduledFlag,
                ColumnRole::Attribute,
                ColumnRole::Stage,
                ColumnRole::Date,
                ColumnRole::FirstMeetingDate,
                ColumnRole::FollowUpMeetingDate,
            ],
        }
    }

    /// Roles without which a run cannot proceed.
    pub fn required_roles(self) -> &'static [ColumnRole] {
        match self {
            TableKind::Spend => &[ColumnRole::EntityName, ColumnRole::SpendAmount],
            TableKind::Leads => &[ColumnRole::JoinKeySource],
        }
    }

    /// The role whose column yields the join key for this table.
    pub fn key_source_role(self) -> ColumnRole {
        match self {
            TableKind::Spend => ColumnRole::EntityName,
            TableKind::Leads => ColumnRole::JoinKeySource,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Spend => f.write_str("spend"),
            TableKind::Leads => f.write_str("leads"),
        }
    }
}

/// Semantic meaning a loosely named column can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    EntityName,
    SpendAmount,
    ResultCount,
    JoinKeySource,
    ConnectFlag,
    DealFlag,
    DealScheduledFlag,
    Attribute,
    Stage,
    Date,
    FirstMeetingDate,
    FollowUpMeetingDate,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 12] = [
        ColumnRole::EntityName,
        ColumnRole::SpendAmount,
        ColumnRole::ResultCount,
        ColumnRole::JoinKeySource,
        ColumnRole::ConnectFlag,
        ColumnRole::DealFlag,
        ColumnRole::DealScheduledFlag,
        ColumnRole::Attribute,
        ColumnRole::Stage,
        ColumnRole::Date,
        ColumnRole::FirstMeetingDate,
        ColumnRole::FollowUpMeetingDate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ColumnRole::EntityName => "entity_name",
            ColumnRole::SpendAmount => "spend_amount",
            ColumnRole::ResultCount => "result_count",
            ColumnRole::JoinKeySource => "join_key_source",
            ColumnRole::ConnectFlag => "connect_flag",
            ColumnRole::DealFlag => "deal_flag",
            ColumnRole::DealScheduledFlag => "deal_scheduled_flag",
            ColumnRole::Attribute => "attribute",
            ColumnRole::Stage => "stage",
            ColumnRole::Date => "date",
            ColumnRole::FirstMeetingDate => "first_meeting_date",
            ColumnRole::FollowUpMeetingDate => "follow_up_meeting_date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── ColumnRoleMap ─────────────────────────────────────────────────────────────

/// A column that was matched to a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedColumn {
    /// Position of the column in [`RawTable::columns`].
    pub index: usize,
    pub name: String,
}

/// Role → column assignment for one table.  Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnRoleMap {
    kind: TableKind,
    resolved: BTreeMap<ColumnRole, ResolvedColumn>,
    detected: Vec<String>,
}

impl ColumnRoleMap {
    pub fn new(
        kind: TableKind,
        resolved: BTreeMap<ColumnRole, ResolvedColumn>,
        detected: Vec<String>,
    ) -> Self {
        Self {
            kind,
            resolved,
            detected,
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn get(&self, role: ColumnRole) -> Option<&ResolvedColumn> {
        self.resolved.get(&role)
    }

    pub fn index(&self, role: ColumnRole) -> Option<usize> {
        self.resolved.get(&role).map(|c| c.index)
    }

    pub fn column_name(&self, role: ColumnRole) -> Option<&str> {
        self.resolved.get(&role).map(|c| c.name.as_str())
    }

    pub fn has(&self, role: ColumnRole) -> bool {
        self.resolved.contains_key(&role)
    }

    /// Required roles of this table's kind that did not resolve.
    pub fn missing_required(&self) -> Vec<ColumnRole> {
        self.kind
            .required_roles()
            .iter()
            .copied()
            .filter(|r| !self.has(*r))
            .collect()
    }

    /// Fail with a single [`ReconError::MissingColumns`] naming every missing
    /// required role together with the columns that were detected instead.
    pub fn require(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            return Ok(());
        }
        Err(ReconError::MissingColumns {
            table: self.kind,
            missing,
            detected: self.detected.clone(),
        })
    }
}

// ── Run policies ──────────────────────────────────────────────────────────────

/// What to do with a spend row whose name does not contain a banner id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum KeyFallback {
    /// Exclude the row from aggregation.
    #[default]
    Drop,
    /// Use the trimmed raw text as the key.
    RawText,
}

/// How the per-key spend and lead summaries are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Union of keys from both tables.
    #[default]
    Outer,
    /// Keys from the spend table only.
    Left,
    /// Keys present in both tables.
    Inner,
}

/// Which lead columns count as evidence of a sales meeting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MeetingSource {
    /// Deal flag and stage text only.
    Status,
    /// A parseable first-meeting or follow-up meeting date.
    Dates,
    /// Status first, meeting dates as additional scheduled evidence.
    #[default]
    Combined,
}

// ── Aggregated and scored records ─────────────────────────────────────────────

/// Per-key totals after joining the spend and lead summaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub key: String,
    /// Sum of the spend column for this key.
    pub spend: f64,
    /// Result count reported by the ad platform itself.
    pub reported_results: f64,
    /// Number of CRM rows carrying this key.
    pub lead_count: u64,
    pub connect_count: u64,
    pub deal_done_count: u64,
    pub deal_scheduled_count: u64,
    pub corporate_count: u64,
}

impl AggregatedRecord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    /// Completed plus scheduled meetings.
    pub fn meeting_count(&self) -> u64 {
        self.deal_done_count + self.deal_scheduled_count
    }
}

/// Rates and cost derived from an [`AggregatedRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// `floor(spend / lead_count)`, zero when there are no leads.
    pub cost_per_result: i64,
    /// Percentage of leads that were connected.
    pub connect_rate: f64,
    /// Percentage of leads with a completed or scheduled meeting.
    pub meeting_rate: f64,
    /// Percentage of corporate leads; `None` when no attribute column resolved.
    pub corporate_rate: Option<f64>,
}

/// Configured limits a banner is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Highest acceptable cost per lead.
    pub cpa_limit: f64,
    /// Minimum connect rate in percent.
    pub connect_target: f64,
    /// Minimum meeting rate in percent.
    pub meeting_target: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpa_limit: 15_000.0,
            connect_target: 50.0,
            meeting_target: 10.0,
        }
    }
}

/// The three independent threshold comparisons behind a [`Tier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdChecks {
    pub cost_ok: bool,
    pub connect_ok: bool,
    pub meeting_ok: bool,
}

impl ThresholdChecks {
    pub fn passed(&self) -> u8 {
        u8::from(self.cost_ok) + u8::from(self.connect_ok) + u8::from(self.meeting_ok)
    }
}

/// Ordinal performance tier of a banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Top,
    High,
    NeedsImprovement,
    StopRecommended,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Top,
        Tier::High,
        Tier::NeedsImprovement,
        Tier::StopRecommended,
    ];

    /// 1 for the best tier, 4 for the worst.
    pub fn rank(self) -> u8 {
        match self {
            Tier::Top => 1,
            Tier::High => 2,
            Tier::NeedsImprovement => 3,
            Tier::StopRecommended => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Top => "Top",
            Tier::High => "High",
            Tier::NeedsImprovement => "Needs improvement",
            Tier::StopRecommended => "Stop recommended",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal output of the engine: one per join key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: AggregatedRecord,
    #[serde(flatten)]
    pub metrics: Metrics,
    #[serde(flatten)]
    pub checks: ThresholdChecks,
    pub tier: Tier,
}

impl ScoredRecord {
    pub fn key(&self) -> &str {
        &self.record.key
    }
}
