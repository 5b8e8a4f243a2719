//! Heuristic mapping of loosely named columns to semantic roles.
//!
//! Each role owns an ordered list of [`ColumnMatcher`]s.  Matchers are tried
//! in declaration order and, for each matcher, columns in table order; the
//! first hit wins.  Adding a naming convention means adding a pattern, either
//! to the built-in defaults or through a JSON overrides file.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use recon_core::error::{ReconError, Result};
use recon_core::models::{ColumnRole, ColumnRoleMap, ResolvedColumn, TableKind};
use tracing::{debug, warn};

// ── ColumnMatcher ─────────────────────────────────────────────────────────────

/// One way a column name can match a role.  Comparison is case-insensitive
/// on the trimmed column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnMatcher {
    Exact(String),
    Contains(String),
}

impl ColumnMatcher {
    /// Parse the textual form used in override files: a leading `=` means
    /// exact match, anything else is a substring.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_prefix('=') {
            Some(exact) => ColumnMatcher::Exact(exact.trim().to_lowercase()),
            None => ColumnMatcher::Contains(pattern.trim().to_lowercase()),
        }
    }

    pub fn matches(&self, column: &str) -> bool {
        let column = column.trim().to_lowercase();
        match self {
            ColumnMatcher::Exact(p) => column == *p,
            ColumnMatcher::Contains(p) => !p.is_empty() && column.contains(p.as_str()),
        }
    }
}

// ── RoleStrategy ──────────────────────────────────────────────────────────────

/// Ordered matchers for one role plus substrings that disqualify a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleStrategy {
    pub role: ColumnRole,
    pub matchers: Vec<ColumnMatcher>,
    pub exclude: Vec<String>,
}

impl RoleStrategy {
    fn new(role: ColumnRole, patterns: &[&str], exclude: &[&str]) -> Self {
        Self {
            role,
            matchers: patterns.iter().map(|p| ColumnMatcher::parse(p)).collect(),
            exclude: exclude.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn is_excluded(&self, column: &str) -> bool {
        let column = column.to_lowercase();
        self.exclude.iter().any(|e| column.contains(e.as_str()))
    }

    /// First column matching this strategy, as `(index, name)`.
    pub fn find<'a>(&self, columns: &'a [String]) -> Option<(usize, &'a str)> {
        self.matchers.iter().find_map(|matcher| {
            columns
                .iter()
                .enumerate()
                .filter(|(_, col)| !self.is_excluded(col))
                .find(|(_, col)| matcher.matches(col))
                .map(|(i, col)| (i, col.as_str()))
        })
    }
}

// ── ResolverRules ─────────────────────────────────────────────────────────────

/// The complete set of role strategies used for one run.
#[derive(Debug, Clone)]
pub struct ResolverRules {
    strategies: HashMap<ColumnRole, RoleStrategy>,
}

impl Default for ResolverRules {
    fn default() -> Self {
        use ColumnRole::*;

        let strategies = [
            RoleStrategy::new(
                EntityName,
                &["広告の名前", "広告名", "Ad name", "名前", "Name"],
                &[],
            ),
            RoleStrategy::new(
                SpendAmount,
                &["消化金額", "Amount spent", "Spend", "Amount", "費用", "Cost"],
                &["単価", "per "],
            ),
            RoleStrategy::new(ResultCount, &["=結果", "=Results", "結果", "Results"], &["単価", "per "]),
            RoleStrategy::new(
                JoinKeySource,
                &["UTM Content", "utm_content", "UTM", "Content"],
                &[],
            ),
            RoleStrategy::new(
                ConnectFlag,
                &["通電", "接続", "Connected", "Connect", "Call result"],
                &["日", "date"],
            ),
            RoleStrategy::new(
                DealFlag,
                &["商談実施", "商談有無", "Deal done", "Meeting held", "商談", "Deal"],
                &["日", "予定", "date", "scheduled", "stage", "ステージ", "ステータス"],
            ),
            RoleStrategy::new(
                DealScheduledFlag,
                &["商談予定", "Meeting scheduled", "Scheduled"],
                &["日", "date"],
            ),
            RoleStrategy::new(
                Attribute,
                &["法人/個人", "法人", "属性", "Attribute", "Company type", "Customer type"],
                &[],
            ),
            RoleStrategy::new(
                Stage,
                &[
                    "商談ステータス",
                    "ライフサイクルステージ",
                    "取引ステージ",
                    "Deal stage",
                    "Lifecycle stage",
                    "ステータス",
                    "Stage",
                    "Status",
                ],
                &[],
            ),
            RoleStrategy::new(
                Date,
                &[
                    "レポート開始日",
                    "Reporting starts",
                    "作成日",
                    "Create date",
                    "Created",
                    "登録日",
                    "日付",
                    "=Date",
                    "=Day",
                    "Date",
                ],
                &["商談", "meeting", "終了", "ends"],
            ),
            RoleStrategy::new(
                FirstMeetingDate,
                &["初回商談日", "商談日", "First meeting date", "Meeting date"],
                &["次回", "next", "follow"],
            ),
            RoleStrategy::new(
                FollowUpMeetingDate,
                &["次回商談日", "2回目商談日", "Follow-up meeting", "Next meeting"],
                &[],
            ),
        ];

        Self {
            strategies: strategies.into_iter().map(|s| (s.role, s)).collect(),
        }
    }
}

impl ResolverRules {
    /// Default rules with extra patterns taking priority over the built-ins.
    ///
    /// `overrides` maps role names (e.g. `"spend_amount"`) to pattern lists in
    /// the [`ColumnMatcher::parse`] syntax.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut rules = Self::default();
        for (role_name, patterns) in overrides {
            let role = ColumnRole::from_name(role_name)
                .ok_or_else(|| ReconError::Config(format!("unknown column role \"{role_name}\"")))?;
            let strategy = rules
                .strategies
                .entry(role)
                .or_insert_with(|| RoleStrategy::new(role, &[], &[]));
            let mut matchers: Vec<ColumnMatcher> =
                patterns.iter().map(|p| ColumnMatcher::parse(p)).collect();
            matchers.append(&mut strategy.matchers);
            strategy.matchers = matchers;
        }
        Ok(rules)
    }

    /// Load overrides from a JSON object of `role → [patterns]`.
    pub fn from_overrides_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ReconError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let overrides: BTreeMap<String, Vec<String>> = serde_json::from_str(&content)?;
        debug!(
            "Loaded column pattern overrides for {} role(s) from {}",
            overrides.len(),
            path.display()
        );
        Self::with_overrides(&overrides)
    }

    pub fn strategy(&self, role: ColumnRole) -> Option<&RoleStrategy> {
        self.strategies.get(&role)
    }
}

// ── resolve ───────────────────────────────────────────────────────────────────

/// Map the roles of `kind` to columns of a table.
///
/// Never fails: unresolved roles are simply absent from the map.  Callers
/// check required roles with [`ColumnRoleMap::require`].
pub fn resolve(columns: &[String], kind: TableKind, rules: &ResolverRules) -> ColumnRoleMap {
    let mut resolved = BTreeMap::new();

    for &role in kind.roles() {
        let Some(strategy) = rules.strategy(role) else {
            continue;
        };
        match strategy.find(columns) {
            Some((index, name)) => {
                debug!("{} table: {} → \"{}\"", kind, role, name);
                resolved.insert(
                    role,
                    ResolvedColumn {
                        index,
                        name: name.to_string(),
                    },
                );
            }
            None if kind.required_roles().contains(&role) => {
                warn!("{} table: required role {} not found", kind, role);
            }
            None => debug!("{} table: optional role {} not found", kind, role),
        }
    }

    ColumnRoleMap::new(kind, resolved, columns.to_vec())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
