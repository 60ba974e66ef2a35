//! Integration tests for chargestat
//!
//! These tests verify complete workflows from session-log loading through
//! filtering and billing to the summary metrics and formatted output.

use approx::assert_relative_eq;
use chargestat::{
    aggregation::{Aggregator, BillingConfig},
    cli::parse_date_filter,
    cost_allocator::CostAllocator,
    data_loader::DataLoader,
    filters::SessionFilter,
    output::get_formatter,
    tariff::ContractType,
    types::{LoadTier, SalePrice},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// A January (winter tariff) batch: one off-peak hour, one span crossing
/// mid-peak into peak, one session under both filter floors, one bad row.
const JANUARY_CSV: &str = "\
start,end,energy_kwh,unit_price
2024-01-15 02:00,2024-01-15 03:00,10.0,310
2024-01-15 08:00,2024-01-15 10:00,12.0,
2024-01-15 12:00,2024-01-15 12:02,0.2,300
2024-01-15 14:00,not-a-time,5.0,300
";

async fn write_fixture(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    tokio::fs::write(&path, contents).await.unwrap();
    path
}

fn build_aggregator(weekend_rule: bool, config: BillingConfig) -> Aggregator {
    let schedule = Arc::new(ContractType::HighVoltage.schedule());
    let allocator = Arc::new(CostAllocator::new(schedule).with_weekend_rule(weekend_rule));
    Aggregator::new(allocator, config)
}

#[tokio::test]
async fn test_csv_billing_workflow() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "january.csv", JANUARY_CSV).await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let aggregator = build_aggregator(true, BillingConfig::default());

    let batch = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();

    // Two billable sessions; the 2-minute session and the bad row are counted out
    assert_eq!(batch.sessions.len(), 2);
    assert_eq!(batch.rows_excluded, 2);

    // 02:00-03:00, 10 kWh: purchased 10.5 kWh, winter off-peak 95.2
    let off_peak = &batch.sessions[0];
    assert_relative_eq!(off_peak.purchased_kwh, 10.5, epsilon = 1e-9);
    assert_relative_eq!(off_peak.energy_cost, 999.6, epsilon = 1e-6);
    assert_relative_eq!(off_peak.tariff_rate, 95.2, epsilon = 1e-9);
    assert_relative_eq!(off_peak.revenue, 3000.0, epsilon = 1e-9);

    // 08:00-10:00, 12 kWh: one mid-peak hour (105.5) + one peak hour (172.4)
    let crossing = &batch.sessions[1];
    assert_relative_eq!(crossing.energy_cost, 6.3 * 105.5 + 6.3 * 172.4, epsilon = 1e-6);
    assert_relative_eq!(crossing.tariff_rate, 138.95, epsilon = 1e-9);

    let summary = aggregator.summarize(&batch);
    assert_eq!(summary.session_count, 2);
    assert_eq!(summary.rows_excluded, 2);
    assert_relative_eq!(summary.total_sold_kwh, 22.0, epsilon = 1e-9);
    assert_relative_eq!(summary.total_purchased_kwh, 23.1, epsilon = 1e-9);
    assert_relative_eq!(summary.total_energy_cost, 2750.37, epsilon = 1e-6);

    // Variable cost carries the fuel/climate surcharge and the tax multiplier
    let expected_variable = (999.6 + 10.5 * 14.0) * 1.127 + (1750.77 + 12.6 * 14.0) * 1.127;
    assert_relative_eq!(summary.total_variable_cost, expected_variable, epsilon = 1e-6);

    // Base charge: 100 kW x 2580 KRW/kW, taxed
    assert_relative_eq!(summary.base_charge, 290_766.0, epsilon = 1e-6);
    assert_relative_eq!(
        summary.total_cost,
        expected_variable + 290_766.0,
        epsilon = 1e-6
    );

    // Fixed 300 KRW/kWh sale price ignores the per-session column
    assert_relative_eq!(summary.total_revenue, 6600.0, epsilon = 1e-9);
    assert_relative_eq!(
        summary.operating_profit,
        6600.0 - summary.total_cost,
        epsilon = 1e-6
    );

    // Weighted average rate, numerator surfaced for the derivation panel
    assert_relative_eq!(summary.weighted_rate_numerator, 2619.4, epsilon = 1e-6);
    assert_relative_eq!(summary.weighted_avg_rate, 2619.4 / 22.0, epsilon = 1e-9);
    assert_relative_eq!(
        summary.break_even_price,
        summary.total_cost / 22.0,
        epsilon = 1e-6
    );
    assert_relative_eq!(summary.max_session_rate, 138.95, epsilon = 1e-9);
    assert_relative_eq!(summary.min_session_rate, 95.2, epsilon = 1e-9);
}

#[tokio::test]
async fn test_per_session_pricing_workflow() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "january.csv", JANUARY_CSV).await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let config = BillingConfig {
        sale_price: SalePrice::PerSession,
        ..Default::default()
    };
    let aggregator = build_aggregator(true, config);

    let batch = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();
    let summary = aggregator.summarize(&batch);

    // 10 kWh at the recorded 310; the priceless session earns nothing
    assert_relative_eq!(summary.total_revenue, 3100.0, epsilon = 1e-9);
}

#[tokio::test]
async fn test_weekend_rule_workflow() {
    // Saturday 2024-01-06, 11:00 is a winter base-peak hour
    let csv = "\
start,end,energy_kwh
2024-01-06 11:00,2024-01-06 12:00,10.0
";
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "saturday.csv", csv).await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let with_rule = build_aggregator(true, BillingConfig::default());
    let batch = with_rule
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();
    // Saturday downgrades peak to mid-peak: 10.5 kWh x 105.5
    assert_relative_eq!(batch.sessions[0].energy_cost, 1107.75, epsilon = 1e-6);

    let without_rule = build_aggregator(false, BillingConfig::default());
    let batch = without_rule
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();
    assert_relative_eq!(batch.sessions[0].energy_cost, 1810.2, epsilon = 1e-6);
}

#[tokio::test]
async fn test_date_filtering_workflow() {
    let csv = "\
start,end,energy_kwh
2024-01-05 10:00,2024-01-05 11:00,5.0
2024-02-10 10:00,2024-02-10 11:00,5.0
2024-03-20 10:00,2024-03-20 11:00,5.0
";
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "quarter.csv", csv).await;

    let filter = SessionFilter::new()
        .with_since(parse_date_filter("2024-02").unwrap())
        .with_until(parse_date_filter("2024-02-28").unwrap());

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let aggregator = build_aggregator(true, BillingConfig::default());
    let batch = aggregator
        .aggregate(loader.load_sessions(), &filter)
        .await
        .unwrap();

    assert_eq!(batch.sessions.len(), 1);
    assert_eq!(batch.rows_excluded, 2);
    assert_eq!(
        batch.sessions[0].start.date(),
        chrono::NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    );
}

#[tokio::test]
async fn test_mixed_format_directory_workflow() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(
        temp_dir.path(),
        "a.csv",
        "start,end,energy_kwh\n2024-01-15 02:00,2024-01-15 03:00,10.0\n",
    )
    .await;
    write_fixture(
        temp_dir.path(),
        "b.jsonl",
        r#"{"start":"2024-01-15T04:00:00","end":"2024-01-15T04:30:00","delivered_kwh":4.0}"#,
    )
    .await;
    write_fixture(temp_dir.path(), "notes.txt", "ignored").await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let aggregator = build_aggregator(true, BillingConfig::default());
    let batch = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();

    assert_eq!(batch.sessions.len(), 2);
    assert_eq!(batch.rows_excluded, 0);
    let summary = aggregator.summarize(&batch);
    assert_relative_eq!(summary.total_sold_kwh, 14.0, epsilon = 1e-9);
}

#[tokio::test]
async fn test_hourly_profile_workflow() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "january.csv", JANUARY_CSV).await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let aggregator = build_aggregator(true, BillingConfig::default());
    let batch = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();
    let profile = aggregator.hourly_profile(&batch);

    assert_eq!(profile.buckets.len(), 24);

    let two_am = &profile.buckets[2];
    assert_eq!(two_am.session_count, 1);
    assert_relative_eq!(two_am.sold_kwh, 10.0, epsilon = 1e-9);
    assert_eq!(two_am.base_tier, LoadTier::OffPeak);

    // January profile labels 08:00 with the winter pattern
    let eight_am = &profile.buckets[8];
    assert_eq!(eight_am.base_tier, LoadTier::MidPeak);
    assert_relative_eq!(eight_am.sold_kwh, 12.0, epsilon = 1e-9);

    let idle = &profile.buckets[20];
    assert_eq!(idle.session_count, 0);
    assert_relative_eq!(idle.sold_kwh, 0.0, epsilon = 1e-12);
}

#[tokio::test]
async fn test_parallel_matches_sequential_workflow() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "january.csv", JANUARY_CSV).await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let aggregator = build_aggregator(true, BillingConfig::default());

    let sequential = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();
    let parallel = aggregator
        .aggregate_parallel(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();

    assert_eq!(sequential.sessions.len(), parallel.sessions.len());
    assert_eq!(sequential.rows_excluded, parallel.rows_excluded);

    let seq_summary = aggregator.summarize(&sequential);
    let par_summary = aggregator.summarize(&parallel);
    assert_relative_eq!(
        seq_summary.total_cost,
        par_summary.total_cost,
        epsilon = 1e-9
    );
    assert_relative_eq!(
        seq_summary.weighted_avg_rate,
        par_summary.weighted_avg_rate,
        epsilon = 1e-9
    );
}

#[tokio::test]
async fn test_output_format_workflow() {
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "january.csv", JANUARY_CSV).await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    let aggregator = build_aggregator(true, BillingConfig::default());
    let batch = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await
        .unwrap();
    let summary = aggregator.summarize(&batch);

    // Table output carries the headline metrics
    let table_formatter = get_formatter(false);
    let table_output = table_formatter.format_summary(&summary);
    assert!(table_output.contains("Sessions billed"));
    assert!(table_output.contains("Break-even price"));
    assert!(table_output.contains("₩290,766"));

    // JSON output is valid and structured
    let json_formatter = get_formatter(true);
    let json_output = json_formatter.format_summary(&summary);
    let parsed: serde_json::Value =
        serde_json::from_str(&json_output).expect("Output should be valid JSON");
    assert_eq!(parsed["summary"]["session_count"], 2);
    assert_eq!(parsed["summary"]["rows_excluded"], 2);
    assert!(parsed["summary"]["break_even_price"].is_number());

    // Per-session JSON includes one object per billed session
    let sessions_output = json_formatter.format_sessions(&batch.sessions, &summary);
    let parsed: serde_json::Value = serde_json::from_str(&sessions_output).unwrap();
    assert_eq!(parsed["sessions"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_error_handling_workflow() {
    // Invalid date filters
    assert!(parse_date_filter("not-a-date").is_err());
    assert!(parse_date_filter("2024-13").is_err());

    // A directory with no session files is fatal
    let temp_dir = TempDir::new().unwrap();
    write_fixture(temp_dir.path(), "notes.txt", "ignored").await;

    let loader = DataLoader::new(vec![temp_dir.path().to_path_buf()]);
    assert!(loader.find_session_files().is_err());

    let aggregator = build_aggregator(true, BillingConfig::default());
    let result = aggregator
        .aggregate(loader.load_sessions(), &SessionFilter::default())
        .await;
    assert!(result.is_err());

    // A nonexistent input path is skipped, leaving nothing to bill
    let loader = DataLoader::new(vec![PathBuf::from("/nonexistent/chargestat-logs")]);
    assert!(loader.find_session_files().is_err());
}
