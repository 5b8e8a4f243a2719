use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};
use crate::models::{JoinPolicy, KeyFallback, MeetingSource, Thresholds};
use crate::time_utils::{parse_cli_date, DateRange};

/// Banner ids such as `bn042`, anywhere in the text.
pub const DEFAULT_KEY_PATTERN: &str = r"(bn\d+)";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Reconcile ad spend with CRM leads and rank banners by performance
#[derive(Parser, Debug, Clone)]
#[command(
    name = "banner-recon",
    about = "Reconcile ad spend with CRM leads and rank banners by performance",
    version
)]
pub struct Settings {
    /// Advertising spend export (.csv, .xlsx, .xls)
    #[arg(long)]
    pub spend: PathBuf,

    /// CRM lead export (.csv, .xlsx, .xls)
    #[arg(long)]
    pub leads: PathBuf,

    /// Highest acceptable cost per lead
    #[arg(long, default_value_t = 15_000.0)]
    pub cpa_limit: f64,

    /// Target connect rate in percent (0-100)
    #[arg(long, default_value_t = 50.0)]
    pub connect_target: f64,

    /// Target meeting rate in percent (0-100)
    #[arg(long, default_value_t = 10.0)]
    pub meeting_target: f64,

    /// First day of the analysis period (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date, requires = "end_date")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the analysis period, inclusive (YYYY-MM-DD)
    #[arg(long, value_parser = parse_cli_date, requires = "start_date")]
    pub end_date: Option<NaiveDate>,

    /// Regular expression locating the banner id inside spend-row names;
    /// the first capture group is used when present
    #[arg(long, default_value = DEFAULT_KEY_PATTERN)]
    pub key_pattern: String,

    /// What to do with spend rows whose name holds no banner id
    #[arg(long, value_enum, default_value_t = KeyFallback::Drop)]
    pub key_fallback: KeyFallback,

    /// How spend and lead summaries are joined
    #[arg(long, value_enum, default_value_t = JoinPolicy::Outer)]
    pub join: JoinPolicy,

    /// Which lead columns count as meeting evidence
    #[arg(long, value_enum, default_value_t = MeetingSource::Combined)]
    pub meeting_source: MeetingSource,

    /// JSON file with extra column-name patterns per role
    #[arg(long)]
    pub roles: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,

    /// Append a one-line run summary to this CSV file
    #[arg(long)]
    pub summary_log: Option<PathBuf>,

    /// Timezone for summary-log timestamps (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── RunConfig ──────────────────────────────────────────────────────────────────

/// Everything one reconciliation run needs, passed explicitly through the
/// pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub thresholds: Thresholds,
    pub key_pattern: String,
    pub key_fallback: KeyFallback,
    pub join: JoinPolicy,
    pub meeting_source: MeetingSource,
    pub period: Option<DateRange>,
    pub roles_file: Option<PathBuf>,
    /// Resolved IANA timezone for summary-log timestamps.
    pub timezone: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            key_pattern: DEFAULT_KEY_PATTERN.to_string(),
            key_fallback: KeyFallback::default(),
            join: JoinPolicy::default(),
            meeting_source: MeetingSource::default(),
            period: None,
            roles_file: None,
            timezone: "UTC".to_string(),
        }
    }
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.banner-recon/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpa_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_target: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_fallback: Option<KeyFallback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_source: Option<MeetingSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl LastUsedParams {
    /// Default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".banner-recon").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with an explicit argument
    /// list and config path so tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; clap keys arg ids by field name.
        if !is_arg_explicitly_set(&matches, "cpa_limit") {
            if let Some(v) = last.cpa_limit {
                settings.cpa_limit = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "connect_target") {
            if let Some(v) = last.connect_target {
                settings.connect_target = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "meeting_target") {
            if let Some(v) = last.meeting_target {
                settings.meeting_target = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "key_fallback") {
            if let Some(v) = last.key_fallback {
                settings.key_fallback = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "join") {
            if let Some(v) = last.join {
                settings.join = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "meeting_source") {
            if let Some(v) = last.meeting_source {
                settings.meeting_source = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            cpa_limit: self.cpa_limit,
            connect_target: self.connect_target,
            meeting_target: self.meeting_target,
        }
    }

    /// Build the per-run configuration, validating the period.
    pub fn run_config(&self) -> Result<RunConfig> {
        let period = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)?),
            (None, None) => None,
            _ => {
                return Err(ReconError::Config(
                    "--start-date and --end-date must be given together".to_string(),
                ))
            }
        };

        Ok(RunConfig {
            thresholds: self.thresholds(),
            key_pattern: self.key_pattern.clone(),
            key_fallback: self.key_fallback,
            join: self.join,
            meeting_source: self.meeting_source,
            period,
            roles_file: self.roles.clone(),
            timezone: self.timezone.clone(),
        })
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            cpa_limit: Some(s.cpa_limit),
            connect_target: Some(s.connect_target),
            meeting_target: Some(s.meeting_target),
            key_fallback: Some(s.key_fallback),
            join: Some(s.join),
            meeting_source: Some(s.meeting_source),
            timezone: Some(s.timezone.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
