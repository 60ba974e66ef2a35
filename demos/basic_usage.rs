//! Basic usage example for the chargestat library
//!
//! This example bills a small in-memory batch of charging sessions under the
//! high-voltage contract and prints the per-session allocations along with
//! the batch profitability metrics. The [`SessionSource`] implementation
//! shows how to feed the aggregation layer from something other than log
//! files on disk.

use chargestat::aggregation::{Aggregator, BillingConfig};
use chargestat::cost_allocator::CostAllocator;
use chargestat::data_loader::SessionSource;
use chargestat::filters::SessionFilter;
use chargestat::tariff::ContractType;
use chargestat::types::ChargingSession;
use chargestat::Result;
use chrono::{Duration, NaiveDate};
use futures::stream::Stream;
use std::pin::Pin;
use std::sync::Arc;

/// A fixed batch of sessions held in memory
struct InMemorySessions {
    sessions: Vec<ChargingSession>,
}

impl SessionSource for InMemorySessions {
    fn session_stream(&self) -> Pin<Box<dyn Stream<Item = Result<ChargingSession>> + Send + '_>> {
        Box::pin(futures::stream::iter(self.sessions.iter().cloned().map(Ok)))
    }
}

fn winter_session(day: u32, hour: u32, minutes: i64, kwh: f64) -> ChargingSession {
    let start = NaiveDate::from_ymd_opt(2024, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap();
    ChargingSession::new(start, start + Duration::minutes(minutes), kwh)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // A winter week of charging, including a Saturday peak-hour session that
    // the weekend rule bills at the mid-peak rate
    let source = InMemorySessions {
        sessions: vec![
            winter_session(15, 2, 60, 10.0),
            winter_session(15, 8, 120, 12.0),
            winter_session(16, 22, 45, 7.5),
            winter_session(20, 11, 90, 20.0),
        ],
    };

    let schedule = Arc::new(ContractType::HighVoltage.schedule());
    let allocator = Arc::new(CostAllocator::new(schedule));
    let aggregator = Aggregator::new(allocator, BillingConfig::default());

    let batch = aggregator
        .aggregate(source.session_stream(), &SessionFilter::default())
        .await?;

    println!("Per-session billing:");
    println!("====================");
    for billed in &batch.sessions {
        println!(
            "{}  {:>4} min  {:>6.2} kWh at {:>6.2} KRW/kWh  cost {:>9.1} KRW  profit {:>9.1} KRW",
            billed.start.format("%Y-%m-%d %H:%M"),
            billed.duration_minutes,
            billed.sold_kwh,
            billed.tariff_rate,
            billed.variable_cost,
            billed.profit
        );
    }

    let summary = aggregator.summarize(&batch);

    println!("\nBatch summary:");
    println!("==============");
    println!("Sessions billed: {}", summary.session_count);
    println!("Energy sold: {:.2} kWh", summary.total_sold_kwh);
    println!("Energy purchased: {:.2} kWh", summary.total_purchased_kwh);
    println!("Total cost: {:.0} KRW", summary.total_cost);
    println!("Revenue: {:.0} KRW", summary.total_revenue);
    println!("Operating profit: {:.0} KRW", summary.operating_profit);
    println!(
        "Weighted average rate: {:.2} KRW/kWh",
        summary.weighted_avg_rate
    );
    println!("Break-even price: {:.2} KRW/kWh", summary.break_even_price);

    Ok(())
}
