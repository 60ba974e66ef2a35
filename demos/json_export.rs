//! Example of exporting billing data to JSON format
//!
//! Bills a synthetic month of charging sessions and writes the summary and
//! the hourly demand profile to JSON files, the same documents `--json`
//! prints on the command line.

use chargestat::aggregation::{Aggregator, BillingConfig};
use chargestat::cost_allocator::CostAllocator;
use chargestat::filters::SessionFilter;
use chargestat::output::get_formatter;
use chargestat::tariff::ContractType;
use chargestat::types::ChargingSession;
use chargestat::Result;
use chrono::{Duration, NaiveDate};
use futures::stream;
use std::sync::Arc;

/// Generate a month of overnight and daytime charging sessions
fn synthetic_month() -> Vec<ChargingSession> {
    let mut sessions = Vec::new();
    for day in 1..=28 {
        let date = NaiveDate::from_ymd_opt(2024, 7, day).unwrap();

        // Overnight fleet charge in the off-peak window
        let overnight = date.and_hms_opt(1, 30, 0).unwrap();
        sessions.push(ChargingSession::new(
            overnight,
            overnight + Duration::minutes(150),
            32.0,
        ));

        // Midday top-up that straddles the peak hours
        let midday = date.and_hms_opt(10, 45, 0).unwrap();
        sessions.push(ChargingSession::new(
            midday,
            midday + Duration::minutes(80),
            18.5,
        ));
    }
    sessions
}

#[tokio::main]
async fn main() -> Result<()> {
    let schedule = Arc::new(ContractType::HighVoltage.schedule());
    let allocator = Arc::new(CostAllocator::new(schedule));
    let aggregator = Aggregator::new(allocator, BillingConfig::default());

    let sessions = synthetic_month();
    println!("Billing {} synthetic sessions...", sessions.len());

    let batch = aggregator
        .aggregate(stream::iter(sessions.into_iter().map(Ok)), &SessionFilter::default())
        .await?;
    let summary = aggregator.summarize(&batch);

    let formatter = get_formatter(true);

    // Export the batch summary
    let report = formatter.format_summary(&summary);
    std::fs::write("billing_report.json", &report)?;
    println!("Exported billing summary to billing_report.json");

    // Export the hourly demand profile
    let profile = aggregator.hourly_profile(&batch);
    let hourly = formatter.format_hourly(&profile, &summary);
    std::fs::write("hourly_profile.json", &hourly)?;
    println!("Exported hourly profile to hourly_profile.json");

    println!("\nSummary:");
    println!("========");
    println!("Sessions billed: {}", summary.session_count);
    println!("Energy sold: {:.2} kWh", summary.total_sold_kwh);
    println!("Total cost: {:.0} KRW", summary.total_cost);
    println!("Revenue: {:.0} KRW", summary.total_revenue);
    println!("Break-even price: {:.2} KRW/kWh", summary.break_even_price);

    Ok(())
}
