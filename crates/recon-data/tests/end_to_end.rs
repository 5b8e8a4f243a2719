use std::path::PathBuf;

use chrono::NaiveDate;
use recon_core::error::ReconError;
use recon_core::models::{ColumnRole, JoinPolicy, TableKind, Tier};
use recon_core::settings::RunConfig;
use recon_core::time_utils::DateRange;
use recon_data::analysis::analyze;
use recon_data::reader::{load_table, parse_csv_text};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn config(cpa_limit: f64) -> RunConfig {
    let mut config = RunConfig::default();
    config.thresholds.cpa_limit = cpa_limit;
    config.thresholds.connect_target = 50.0;
    config.thresholds.meeting_target = 10.0;
    config
}

#[test]
fn two_leads_half_connected_needs_improvement() {
    let dir = TempDir::new().unwrap();
    let spend = load_table(&write(&dir, "meta.csv", "広告の名前,消化金額\nad_bn007_x,10000\n")).unwrap();
    let leads = load_table(&write(
        &dir,
        "hubspot.csv",
        "UTM Content,Connected\nbn007,yes\nbn007,no\n",
    ))
    .unwrap();

    let result = analyze(&spend, &leads, &config(6_000.0)).unwrap();
    assert_eq!(result.records.len(), 1);

    let scored = &result.records[0];
    assert_eq!(scored.key(), "bn007");
    assert_eq!(scored.record.lead_count, 2);
    assert_eq!(scored.metrics.cost_per_result, 5_000);
    assert_eq!(scored.metrics.connect_rate, 50.0);
    assert_eq!(scored.metrics.meeting_rate, 0.0);
    assert!(scored.checks.cost_ok);
    assert!(scored.checks.connect_ok);
    assert!(!scored.checks.meeting_ok);
    assert_eq!(scored.tier, Tier::NeedsImprovement);
}

#[test]
fn outer_join_keeps_orphans_on_both_sides() {
    let spend = parse_csv_text(
        "meta",
        "Ad name,Amount spent\nspring_bn001,3000\nspring_bn002,8000\n",
    )
    .unwrap();
    let leads = parse_csv_text("hubspot", "utm_content\nbn001\nbn003\nbn003\n").unwrap();

    let result = analyze(&spend, &leads, &config(15_000.0)).unwrap();
    let keys: Vec<&str> = result.records.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["bn001", "bn002", "bn003"]);

    let orphan_spend = &result.records[1];
    assert_eq!(orphan_spend.record.spend, 8_000.0);
    assert_eq!(orphan_spend.record.lead_count, 0);
    assert_eq!(orphan_spend.metrics.cost_per_result, 0);
    assert_eq!(orphan_spend.metrics.connect_rate, 0.0);
    assert_eq!(orphan_spend.metrics.meeting_rate, 0.0);
    assert_eq!(orphan_spend.tier, Tier::StopRecommended);

    let orphan_leads = &result.records[2];
    assert_eq!(orphan_leads.record.spend, 0.0);
    assert_eq!(orphan_leads.record.lead_count, 2);
}

#[test]
fn left_join_drops_lead_only_keys() {
    let spend = parse_csv_text("meta", "Ad name,Amount spent\nspring_bn001,3000\n").unwrap();
    let leads = parse_csv_text("hubspot", "utm_content\nbn001\nbn003\n").unwrap();
    let mut config = config(15_000.0);
    config.join = JoinPolicy::Left;

    let result = analyze(&spend, &leads, &config).unwrap();
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.metadata.leads.keys, 2);
}

#[test]
fn repeated_runs_are_identical() {
    let spend = parse_csv_text(
        "meta",
        "広告名,消化金額,結果\nz_bn010,12000,3\na_bn002,4000,1\nm_bn005,0,0\n",
    )
    .unwrap();
    let leads = parse_csv_text(
        "hubspot",
        "UTM Content,通電,商談実施,法人/個人\n\
         bn010,通電あり,実施,法人\n\
         bn002,なし,,個人\n\
         bn010,あり,,法人\n\
         bn005,あり,予定,個人\n",
    )
    .unwrap();

    let first = analyze(&spend, &leads, &RunConfig::default()).unwrap();
    let second = analyze(&spend, &leads, &RunConfig::default()).unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(first.totals, second.totals);

    let keys: Vec<&str> = first.records.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec!["bn002", "bn005", "bn010"]);
}

#[test]
fn meeting_counts_are_independent_and_dates_collapse_per_row() {
    let spend = parse_csv_text("meta", "Ad name,Amount spent\nx_bn001,1000\n").unwrap();
    let leads = parse_csv_text(
        "hubspot",
        "utm_content,商談実施,初回商談日,次回商談日\n\
         bn001,実施,2024-03-01,2024-03-08\n\
         bn001,,2024-03-02,2024-03-09\n",
    )
    .unwrap();

    let result = analyze(&spend, &leads, &RunConfig::default()).unwrap();
    let scored = &result.records[0];
    // Two dated columns on one row still count as one scheduled meeting.
    assert_eq!(scored.record.deal_done_count, 1);
    assert_eq!(scored.record.deal_scheduled_count, 2);
    assert_eq!(scored.metrics.meeting_rate, 150.0);
}

#[test]
fn period_filter_applies_to_both_tables() {
    let spend = parse_csv_text(
        "meta",
        "Ad name,Amount spent,Reporting starts\n\
         x_bn001,1000,2024-03-10\n\
         x_bn001,9000,2024-02-10\n",
    )
    .unwrap();
    let leads = parse_csv_text(
        "hubspot",
        "utm_content,Create date\n\
         bn001,2024-03-31 23:59:59\n\
         bn001,2024-04-01 00:00:00\n\
         bn001,unknown\n",
    )
    .unwrap();
    let mut config = RunConfig::default();
    config.period = Some(
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
        .unwrap(),
    );

    let result = analyze(&spend, &leads, &config).unwrap();
    let scored = &result.records[0];
    assert_eq!(scored.record.spend, 1_000.0);
    assert_eq!(scored.record.lead_count, 1);
    assert_eq!(result.metadata.leads.rows_out_of_period, 2);
}

#[test]
fn missing_spend_column_reports_detected_columns() {
    let spend = parse_csv_text("meta", "Ad name,Impressions\nx_bn001,100\n").unwrap();
    let leads = parse_csv_text("hubspot", "utm_content\nbn001\n").unwrap();

    let err = analyze(&spend, &leads, &RunConfig::default()).unwrap_err();
    match &err {
        ReconError::MissingColumns {
            table,
            missing,
            detected,
        } => {
            assert_eq!(*table, TableKind::Spend);
            assert_eq!(missing, &vec![ColumnRole::SpendAmount]);
            assert_eq!(detected, &vec!["Ad name".to_string(), "Impressions".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    let message = err.to_string();
    assert!(message.contains("Impressions"), "{message}");
}

#[test]
fn missing_key_column_in_leads_aborts() {
    let spend = parse_csv_text("meta", "Ad name,Amount spent\nx_bn001,100\n").unwrap();
    let leads = parse_csv_text("hubspot", "氏名,メール\n山田,a@example.com\n").unwrap();

    assert!(matches!(
        analyze(&spend, &leads, &RunConfig::default()),
        Err(ReconError::MissingColumns {
            table: TableKind::Leads,
            ..
        })
    ));
}
