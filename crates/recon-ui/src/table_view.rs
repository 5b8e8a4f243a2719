//! Per-banner result table.
//!
//! Renders one row per banner plus a totals row as aligned plain text.
//! Widths are measured in terminal columns so Japanese banner names line up.

use crossterm::style::{Color, Stylize};
use recon_core::formatting::{format_number, format_rate, format_yen};
use recon_core::models::{ColumnRole, ScoredRecord, Tier};
use recon_data::analysis::AnalysisResult;
use unicode_width::UnicodeWidthStr;

/// Placeholder for metrics whose source column was not found.
pub const UNAVAILABLE: &str = "-";

const HEADERS: [&str; 8] = [
    "Banner", "Spend", "Leads", "CPA", "Connect", "Meeting", "Corporate", "Tier",
];

/// Lead-table roles any of which makes the meeting rate meaningful.
const MEETING_ROLES: [ColumnRole; 5] = [
    ColumnRole::DealFlag,
    ColumnRole::DealScheduledFlag,
    ColumnRole::Stage,
    ColumnRole::FirstMeetingDate,
    ColumnRole::FollowUpMeetingDate,
];

// ── Row data ──────────────────────────────────────────────────────────────────

/// Display strings for one table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRowData {
    pub cells: [String; 8],
    /// `None` for the totals row.
    pub tier: Option<Tier>,
}

/// Which optional lead features were resolved for this run.
#[derive(Debug, Clone, Copy)]
struct Features {
    connect: bool,
    meeting: bool,
    corporate: bool,
}

impl Features {
    fn of(result: &AnalysisResult) -> Self {
        Self {
            connect: result.lead_feature(ColumnRole::ConnectFlag),
            meeting: MEETING_ROLES.iter().any(|r| result.lead_feature(*r)),
            corporate: result.lead_feature(ColumnRole::Attribute),
        }
    }
}

fn or_unavailable(available: bool, value: impl FnOnce() -> String) -> String {
    if available {
        value()
    } else {
        UNAVAILABLE.to_string()
    }
}

fn record_row(scored: &ScoredRecord, features: Features) -> TableRowData {
    let r = &scored.record;
    let m = &scored.metrics;
    TableRowData {
        cells: [
            r.key.clone(),
            format_yen(r.spend),
            format_number(r.lead_count as f64, 0),
            format_yen(m.cost_per_result as f64),
            or_unavailable(features.connect, || format_rate(m.connect_rate)),
            or_unavailable(features.meeting, || format_rate(m.meeting_rate)),
            match m.corporate_rate {
                Some(rate) if features.corporate => format_rate(rate),
                _ => UNAVAILABLE.to_string(),
            },
            scored.tier.label().to_string(),
        ],
        tier: Some(scored.tier),
    }
}

fn totals_row(result: &AnalysisResult, features: Features) -> TableRowData {
    let t = &result.totals;
    let corporate_rate = recon_core::calculations::rate(t.corporate, t.leads);
    TableRowData {
        cells: [
            "TOTAL".to_string(),
            format_yen(t.spend),
            format_number(t.leads as f64, 0),
            format_yen(t.cost_per_result as f64),
            or_unavailable(features.connect, || format_rate(t.connect_rate)),
            or_unavailable(features.meeting, || format_rate(t.meeting_rate)),
            or_unavailable(features.corporate, || format_rate(corporate_rate)),
            format!("{} banners", t.banners),
        ],
        tier: None,
    }
}

/// Build display rows for every record followed by the totals row.
pub fn build_rows(result: &AnalysisResult) -> Vec<TableRowData> {
    let features = Features::of(result);
    let mut rows: Vec<TableRowData> = result
        .records
        .iter()
        .map(|scored| record_row(scored, features))
        .collect();
    rows.push(totals_row(result, features));
    rows
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Tier colour used for the tier cell and highlighted rows.
pub fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::Top => Color::Green,
        Tier::High => Color::Cyan,
        Tier::NeedsImprovement => Color::Yellow,
        Tier::StopRecommended => Color::Red,
    }
}

/// Pad `text` to `width` terminal columns.
fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.width()));
    if right_align {
        format!("{fill}{text}")
    } else {
        format!("{text}{fill}")
    }
}

/// Render the full table.  With `color`, Top-tier rows are highlighted and
/// every tier cell is coloured.
pub fn render_table(result: &AnalysisResult, color: bool) -> String {
    let rows = build_rows(result);

    let mut widths: [usize; 8] = HEADERS.map(|h| h.width());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(&row.cells) {
            *w = (*w).max(cell.width());
        }
    }
    // Banner, tier: left; numbers: right.
    let right_align = |i: usize| !(i == 0 || i == HEADERS.len() - 1);

    let join = |cells: Vec<String>| cells.join("  ").trim_end().to_string();
    let header = join(
        HEADERS
            .iter()
            .enumerate()
            .map(|(i, h)| pad(h, widths[i], right_align(i)))
            .collect(),
    );
    let rule = "─".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1));

    let mut out = String::new();
    out.push_str(&if color { header.bold().to_string() } else { header });
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');

    for row in &rows {
        if row.tier.is_none() {
            out.push_str(&rule);
            out.push('\n');
        }
        let cells: Vec<String> = row
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let padded = pad(cell, widths[i], right_align(i));
                match row.tier {
                    Some(tier) if color && i == HEADERS.len() - 1 => {
                        padded.with(tier_color(tier)).to_string()
                    }
                    _ => padded,
                }
            })
            .collect();
        let line = join(cells);
        let line = match row.tier {
            Some(Tier::Top) if color => line.bold().to_string(),
            None if color => line.bold().to_string(),
            _ => line,
        };
        out.push_str(&line);
        out.push('\n');
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::models::{CellValue, RawRecord, RawTable};
    use recon_core::settings::RunConfig;
    use recon_data::analysis::analyze;

    fn table(columns: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            "t",
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| RawRecord::new(r.iter().map(|s| CellValue::Text(s.to_string())).collect()))
                .collect(),
        )
    }

    fn sample(lead_columns: &[&str], lead_rows: &[&[&str]]) -> AnalysisResult {
        let spend = table(
            &["広告の名前", "消化金額"],
            &[&["春_bn001", "20000"], &["春_bn002", "9000"]],
        );
        analyze(&spend, &table(lead_columns, lead_rows), &RunConfig::default()).unwrap()
    }

    #[test]
    fn test_unresolved_features_show_placeholder() {
        let result = sample(&["utm_content"], &[&["bn001"]]);
        let rows = build_rows(&result);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cells[4], UNAVAILABLE);
        assert_eq!(rows[0].cells[5], UNAVAILABLE);
        assert_eq!(rows[0].cells[6], UNAVAILABLE);
        assert_eq!(rows[0].cells[3], "¥20,000");
    }

    #[test]
    fn test_resolved_features_show_rates() {
        let result = sample(
            &["utm_content", "通電", "商談実施", "法人/個人"],
            &[&["bn001", "あり", "実施", "法人"], &["bn001", "なし", "", "個人"]],
        );
        let rows = build_rows(&result);
        assert_eq!(rows[0].cells[4], "50.0%");
        assert_eq!(rows[0].cells[5], "50.0%");
        assert_eq!(rows[0].cells[6], "50.0%");
        assert_eq!(rows[2].cells[0], "TOTAL");
        assert_eq!(rows[2].cells[7], "2 banners");
    }

    #[test]
    fn test_plain_render_aligns_wide_characters() {
        let result = sample(&["utm_content"], &[&["bn001"]]);
        let text = render_table(&result, false);
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[0].starts_with("Banner"));
        assert!(text.contains("Stop recommended"));
        assert!(!text.contains('\u{1b}'));
        // Right-aligned Spend column ends at the same display width on every line.
        let end_of = |line: &str, token: &str| {
            let idx = line.find(token).unwrap() + token.len();
            line[..idx].width()
        };
        assert_eq!(end_of(lines[0], "Spend"), end_of(lines[2], "¥20,000"));
        assert_eq!(end_of(lines[2], "¥20,000"), end_of(lines[3], "¥9,000"));
    }

    #[test]
    fn test_colour_render_emits_escape_codes() {
        let result = sample(&["utm_content"], &[&["bn001"]]);
        assert!(render_table(&result, true).contains('\u{1b}'));
    }

    #[test]
    fn test_pad_uses_display_width() {
        assert_eq!(pad("広告", 6, false), "広告  ");
        assert_eq!(pad("42", 4, true), "  42");
    }
}
