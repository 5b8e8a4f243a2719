//! Summary cards shown above the result table.

use recon_core::calculations::SummaryTotals;
use recon_core::formatting::{format_number, format_rate, format_yen};
use recon_core::models::Tier;
use unicode_width::UnicodeWidthStr;

/// Render run totals as `label  value` lines.
pub fn render_summary(totals: &SummaryTotals) -> String {
    let tiers = Tier::ALL
        .iter()
        .map(|tier| {
            let count = totals.tier_counts.get(tier).copied().unwrap_or(0);
            format!("{} {}", tier.label(), count)
        })
        .collect::<Vec<_>>()
        .join(" · ");

    let cards: Vec<(&str, String)> = vec![
        ("Banners", totals.banners.to_string()),
        ("Spend", format_yen(totals.spend)),
        ("Leads", format_number(totals.leads as f64, 0)),
        ("CPA", format_yen(totals.cost_per_result as f64)),
        (
            "Connects",
            format!(
                "{} ({})",
                format_number(totals.connects as f64, 0),
                format_rate(totals.connect_rate)
            ),
        ),
        (
            "Meetings",
            format!(
                "{} ({}) done {} / scheduled {}",
                format_number(totals.deals() as f64, 0),
                format_rate(totals.meeting_rate),
                totals.deals_done,
                totals.deals_scheduled
            ),
        ),
        ("Corporate", format_number(totals.corporate as f64, 0)),
        ("Tiers", tiers),
    ];

    let label_width = cards.iter().map(|(label, _)| label.width()).max().unwrap_or(0);
    cards
        .into_iter()
        .map(|(label, value)| {
            let fill = " ".repeat(label_width - label.width());
            format!("{label}{fill}  {value}\n")
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
