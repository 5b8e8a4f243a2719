//! Presentation layer for banner reconciliation.
//!
//! Renders summary cards and the per-banner result table as terminal text,
//! or the whole result as JSON.

pub mod summary_view;
pub mod table_view;

use recon_data::analysis::AnalysisResult;

pub use recon_core as core;

/// Summary cards followed by the result table.
pub fn render_report(result: &AnalysisResult, color: bool) -> String {
    format!(
        "{}\n{}",
        summary_view::render_summary(&result.totals),
        table_view::render_table(result, color)
    )
}

/// Pretty-printed JSON of records, totals, resolved columns and metadata.
pub fn render_json(result: &AnalysisResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use recon_core::models::{CellValue, RawRecord, RawTable};
    use recon_core::settings::RunConfig;
    use recon_data::analysis::analyze;

    fn result() -> AnalysisResult {
        let spend = RawTable::new(
            "meta",
            vec!["Ad name".to_string(), "Amount spent".to_string()],
            vec![RawRecord::new(vec![
                CellValue::Text("x_bn001".to_string()),
                CellValue::Number(4_000.0),
            ])],
        );
        let leads = RawTable::new(
            "crm",
            vec!["utm_content".to_string()],
            vec![RawRecord::new(vec![CellValue::Text("bn001".to_string())])],
        );
        analyze(&spend, &leads, &RunConfig::default()).unwrap()
    }

    #[test]
    fn test_render_report_has_summary_and_table() {
        let text = render_report(&result(), false);
        assert!(text.starts_with("Banners"));
        assert!(text.contains("TOTAL"));
    }

    #[test]
    fn test_render_json_flattens_records() {
        let json: serde_json::Value = serde_json::from_str(&render_json(&result()).unwrap()).unwrap();
        let record = &json["records"][0];
        assert_eq!(record["key"], "bn001");
        assert_eq!(record["cost_per_result"], 4000);
        assert_eq!(record["tier"], "stop_recommended");
        assert_eq!(json["metadata"]["join"], "outer");
        assert_eq!(json["spend_roles"]["kind"], "spend");
    }
}
