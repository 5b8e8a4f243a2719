use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{ReconError, Result};
use crate::models::CellValue;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Format `now` in `tz_name` as `%Y-%m-%d %H:%M:%S` for the summary log.
///
/// Unknown timezone names fall back to UTC with a warning.
pub fn format_log_timestamp(now: DateTime<Utc>, tz_name: &str) -> String {
    let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!("unrecognised timezone \"{}\", falling back to UTC", tz_name);
        Tz::UTC
    });
    now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}

// ── Cell date parsing ─────────────────────────────────────────────────────────

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y年%m月%d日", "%Y.%m.%d"];

/// Parse a cell into a naive local datetime.
///
/// Date cells pass through.  Text is tried as RFC 3339 (offset dropped,
/// wall-clock time kept), then common datetime and date-only layouts.
/// Anything else, including numbers, yields `None`.
pub fn parse_cell_datetime(value: &CellValue) -> Option<NaiveDateTime> {
    match value {
        CellValue::Date(dt) => Some(*dt),
        CellValue::Text(s) => parse_datetime_str(s.trim()),
        _ => None,
    }
}

fn parse_datetime_str(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }

    let normalised = match s.strip_suffix('Z') {
        Some(stripped) => format!("{}+00:00", stripped),
        None => s.to_string(),
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
        return Some(dt.naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

// ── DateRange ─────────────────────────────────────────────────────────────────

/// Inclusive day-level range: `start 00:00:00` through `end 23:59:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ReconError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `dt` falls on any day from `start` to `end`, inclusive.
    pub fn contains(&self, dt: NaiveDateTime) -> bool {
        let day = dt.date();
        day >= self.start && day <= self.end
    }
}

/// Parse a `YYYY-MM-DD` command-line date.
pub fn parse_cli_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got \"{s}\": {e}"))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    // ── parse_cell_datetime ──────────────────────────────────────────────────

    #[test]
    fn test_parse_iso_date() {
        let dt = parse_cell_datetime(&text("2024-03-05")).unwrap();
        assert_eq!(dt, ymd(2024, 3, 5).and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_slash_datetime() {
        let dt = parse_cell_datetime(&text("2024/03/05 14:30")).unwrap();
        assert_eq!(dt, ymd(2024, 3, 5).and_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_japanese_date() {
        let dt = parse_cell_datetime(&text("2024年3月5日")).unwrap();
        assert_eq!(dt.date(), ymd(2024, 3, 5));
    }

    #[test]
    fn test_parse_rfc3339_keeps_wall_clock() {
        let dt = parse_cell_datetime(&text("2024-03-05T23:10:00+09:00")).unwrap();
        assert_eq!(dt, ymd(2024, 3, 5).and_hms_opt(23, 10, 0).unwrap());
    }

    #[test]
    fn test_parse_date_cell_passthrough() {
        let naive = ymd(2024, 1, 1).and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(parse_cell_datetime(&CellValue::Date(naive)), Some(naive));
    }

    #[test]
    fn test_parse_unparseable_is_none() {
        assert_eq!(parse_cell_datetime(&text("next week")), None);
        assert_eq!(parse_cell_datetime(&text("")), None);
        assert_eq!(parse_cell_datetime(&CellValue::Number(45_000.0)), None);
        assert_eq!(parse_cell_datetime(&CellValue::Empty), None);
    }

    // ── DateRange ────────────────────────────────────────────────────────────

    #[test]
    fn test_date_range_inclusive_bounds() {
        let range = DateRange::new(ymd(2024, 3, 1), ymd(2024, 3, 31)).unwrap();
        assert!(range.contains(ymd(2024, 3, 1).and_hms_opt(0, 0, 0).unwrap()));
        assert!(range.contains(ymd(2024, 3, 31).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!range.contains(ymd(2024, 2, 29).and_hms_opt(23, 59, 59).unwrap()));
        assert!(!range.contains(ymd(2024, 4, 1).and_hms_opt(0, 0, 0).unwrap()));
    }

    #[test]
    fn test_date_range_single_day() {
        let range = DateRange::new(ymd(2024, 3, 5), ymd(2024, 3, 5)).unwrap();
        assert!(range.contains(ymd(2024, 3, 5).and_hms_opt(12, 0, 0).unwrap()));
    }

    #[test]
    fn test_date_range_rejects_reversed() {
        let err = DateRange::new(ymd(2024, 3, 5), ymd(2024, 3, 1)).unwrap_err();
        assert!(matches!(err, ReconError::InvalidDateRange { .. }));
    }

    #[test]
    fn test_parse_cli_date() {
        assert_eq!(parse_cli_date("2024-03-05"), Ok(ymd(2024, 3, 5)));
        assert!(parse_cli_date("05/03/2024").is_err());
    }

    // ── format_log_timestamp ─────────────────────────────────────────────────

    #[test]
    fn test_format_log_timestamp_in_tokyo() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 15, 30, 0).unwrap();
        assert_eq!(format_log_timestamp(now, "Asia/Tokyo"), "2024-03-06 00:30:00");
    }

    #[test]
    fn test_format_log_timestamp_unknown_tz_is_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 15, 30, 0).unwrap();
        assert_eq!(format_log_timestamp(now, "Mars/Olympus"), "2024-03-05 15:30:00");
    }
}
