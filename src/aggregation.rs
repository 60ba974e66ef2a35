//! Aggregation module for billing batches of charging sessions
//!
//! This module turns a stream of charging sessions into money: each session
//! is billed individually (loss markup, tariff allocation, surcharges,
//! taxes, revenue), then the batch is rolled up into a [`BillingSummary`]
//! with the derived unit metrics an operator actually steers by — the
//! weighted average tariff rate and the break-even sale price.
//!
//! Row-level problems never abort a batch. Malformed rows arriving as
//! errors in the stream and sessions rejected by the [`SessionFilter`] are
//! counted in [`BilledBatch::rows_excluded`] so reports can show how much
//! of the log was dropped.
//!
//! # Examples
//!
//! ```no_run
//! use chargestat::{
//!     aggregation::{Aggregator, BillingConfig},
//!     cost_allocator::CostAllocator,
//!     data_loader::DataLoader,
//!     filters::SessionFilter,
//!     tariff::ContractType,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> chargestat::Result<()> {
//! let schedule = Arc::new(ContractType::HighVoltage.schedule());
//! let allocator = Arc::new(CostAllocator::new(schedule));
//! let aggregator = Aggregator::new(allocator, BillingConfig::default());
//!
//! let loader = DataLoader::new(vec!["sessions.csv".into()]);
//! let batch = aggregator
//!     .aggregate(loader.load_sessions(), &SessionFilter::new())
//!     .await?;
//! let summary = aggregator.summarize(&batch);
//! println!("break-even at {:.1} KRW/kWh", summary.break_even_price);
//! # Ok(())
//! # }
//! ```

use crate::cost_allocator::CostAllocator;
use crate::error::Result;
use crate::filters::SessionFilter;
use crate::types::{ChargingSession, LoadTier, SalePrice, Season};
use chrono::{Datelike, NaiveDateTime, Timelike};
use futures::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Batch-level billing configuration
///
/// Rates are fractions, not percents: a `loss_rate` of `0.05` marks
/// purchased energy up 5% over delivered energy. The defaults mirror the
/// terms commonly attached to an EV-charging supply contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Grid loss rate as a fraction of delivered energy
    pub loss_rate: f64,
    /// Fuel-cost adjustment in KRW/kWh on purchased energy
    pub fuel_adjustment: f64,
    /// Climate/environment surcharge in KRW/kWh on purchased energy
    pub climate_surcharge: f64,
    /// Value-added tax as a fraction
    pub vat_rate: f64,
    /// Electric power industry fund levy as a fraction
    pub fund_rate: f64,
    /// Contracted power in kW, billed monthly at the schedule's base rate
    pub contract_power_kw: f64,
    /// Flat adjustment added to the batch cost in KRW
    pub fixed_adjustment: f64,
    /// How session revenue is priced
    pub sale_price: SalePrice,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.05,
            fuel_adjustment: 5.0,
            climate_surcharge: 9.0,
            vat_rate: 0.10,
            fund_rate: 0.027,
            contract_power_kw: 100.0,
            fixed_adjustment: 0.0,
            sale_price: SalePrice::default(),
        }
    }
}

impl BillingConfig {
    /// Combined tax-and-levy multiplier applied to energy charges
    pub fn tax_multiplier(&self) -> f64 {
        1.0 + self.vat_rate + self.fund_rate
    }

    /// Monthly base charge for the contracted power, taxes included
    pub fn base_charge(&self, base_rate_per_kw: f64) -> f64 {
        self.contract_power_kw * base_rate_per_kw * self.tax_multiplier()
    }
}

/// One session, fully billed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionBilling {
    /// When charging started
    pub start: NaiveDateTime,
    /// When charging ended
    pub end: NaiveDateTime,
    /// Whole-minute duration
    pub duration_minutes: i64,
    /// Energy sold to the vehicle in kWh
    pub sold_kwh: f64,
    /// Energy purchased from the grid in kWh, loss included
    pub purchased_kwh: f64,
    /// Time-weighted average tariff rate over the session in KRW/kWh
    pub tariff_rate: f64,
    /// Raw tariff cost of the purchased energy in KRW
    pub energy_cost: f64,
    /// Energy cost plus surcharges, taxes applied, in KRW
    pub variable_cost: f64,
    /// Session revenue in KRW
    pub revenue: f64,
    /// Revenue minus variable cost in KRW; the base charge is batch-level
    pub profit: f64,
}

/// A fully billed batch: per-session rows plus the count of rows that
/// fell out along the way
#[derive(Debug, Clone, Default)]
pub struct BilledBatch {
    /// Billed sessions, sorted by start time
    pub sessions: Vec<SessionBilling>,
    /// Malformed rows and filter rejections
    pub rows_excluded: usize,
}

/// Batch-level billing summary
///
/// `weighted_avg_rate` is the sold-energy-weighted mean of the per-session
/// tariff rates; its numerator is surfaced separately so the derivation can
/// be shown alongside the result. `break_even_price` spreads the full cost
/// (variable, base, and fixed) over every sold kWh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingSummary {
    /// Sessions billed into the batch
    pub session_count: usize,
    /// Malformed rows and filter rejections
    pub rows_excluded: usize,
    /// Total energy sold in kWh
    pub total_sold_kwh: f64,
    /// Total energy purchased in kWh, loss included
    pub total_purchased_kwh: f64,
    /// Total raw tariff cost in KRW
    pub total_energy_cost: f64,
    /// Total variable cost in KRW, surcharges and taxes included
    pub total_variable_cost: f64,
    /// Monthly base charge in KRW, taxes included
    pub base_charge: f64,
    /// Flat adjustment in KRW
    pub fixed_adjustment: f64,
    /// Variable cost + base charge + fixed adjustment in KRW
    pub total_cost: f64,
    /// Total revenue in KRW
    pub total_revenue: f64,
    /// Revenue minus total cost in KRW
    pub operating_profit: f64,
    /// Sold-energy-weighted mean tariff rate in KRW/kWh
    pub weighted_avg_rate: f64,
    /// Numerator of the weighted mean: sum of rate times sold kWh
    pub weighted_rate_numerator: f64,
    /// Sale price at which the batch breaks even, in KRW/kWh
    pub break_even_price: f64,
    /// Operating profit per sold kWh
    pub profit_per_kwh: f64,
    /// Highest per-session tariff rate in the batch
    pub max_session_rate: f64,
    /// Lowest positive per-session tariff rate in the batch
    pub min_session_rate: f64,
}

/// Sold energy grouped by session start hour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyBucket {
    /// Hour of day, 0-23
    pub hour: u32,
    /// Energy sold by sessions starting in this hour, in kWh
    pub sold_kwh: f64,
    /// Sessions starting in this hour
    pub session_count: usize,
    /// Tier the day pattern assigns this hour in the profile's month
    pub base_tier: LoadTier,
}

/// 24-hour usage profile of a billed batch
///
/// Sessions are attributed whole to their start hour. Tier labels come
/// from the base day pattern for the month of the batch's first session,
/// so the profile shows where usage sits relative to the tariff bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyProfile {
    /// One bucket per hour of day, in order
    pub buckets: Vec<HourlyBucket>,
}

/// Main billing engine
pub struct Aggregator {
    allocator: Arc<CostAllocator>,
    config: BillingConfig,
    show_progress: bool,
}

impl Aggregator {
    /// Create a new Aggregator
    pub fn new(allocator: Arc<CostAllocator>, config: BillingConfig) -> Self {
        Self {
            allocator,
            config,
            show_progress: false,
        }
    }

    /// Enable or disable progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Get the billing configuration
    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// The allocator this engine bills with
    pub fn allocator(&self) -> &CostAllocator {
        &self.allocator
    }

    /// Bill a single session
    ///
    /// Purchased energy is the delivered energy marked up by the loss rate;
    /// the tariff allocation runs on purchased energy since that is what the
    /// grid bills for. Only an incomplete tariff table can make this fail.
    pub fn bill_session(&self, session: &ChargingSession) -> Result<SessionBilling> {
        let purchased_kwh = session.purchased_kwh(self.config.loss_rate);
        let allocation = self
            .allocator
            .allocate(session.start, session.end, purchased_kwh)?;

        let surcharge =
            purchased_kwh * (self.config.fuel_adjustment + self.config.climate_surcharge);
        let variable_cost = (allocation.energy_cost + surcharge) * self.config.tax_multiplier();
        let revenue = session.delivered_kwh * self.config.sale_price.for_session(session);

        Ok(SessionBilling {
            start: session.start,
            end: session.end,
            duration_minutes: session.duration_minutes(),
            sold_kwh: session.delivered_kwh,
            purchased_kwh,
            tariff_rate: allocation.avg_rate,
            energy_cost: allocation.energy_cost,
            variable_cost,
            revenue,
            profit: revenue - variable_cost,
        })
    }

    /// Bill a stream of sessions into a batch
    ///
    /// Row-level errors in the stream and sessions the filter rejects are
    /// counted and skipped; any other error aborts the batch.
    pub async fn aggregate(
        &self,
        sessions: impl Stream<Item = Result<ChargingSession>>,
        filter: &SessionFilter,
    ) -> Result<BilledBatch> {
        // Create progress spinner if enabled
        let progress = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} rows processed")
                    .unwrap(),
            );
            pb.set_message("Billing charging sessions");
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let mut billed = Vec::new();
        let mut rows_excluded = 0usize;
        let mut count = 0u64;

        tokio::pin!(sessions);
        while let Some(result) = sessions.next().await {
            match result {
                Ok(session) => {
                    if filter.matches(&session) {
                        billed.push(self.bill_session(&session)?);
                    } else {
                        debug!("Filtered out session starting {}", session.start);
                        rows_excluded += 1;
                    }
                }
                Err(e) if e.is_row_level() => {
                    rows_excluded += 1;
                }
                Err(e) => return Err(e),
            }

            count += 1;
            if let Some(ref pb) = progress {
                pb.set_position(count);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!(
                "Billed {} rows into {} sessions",
                count,
                billed.len()
            ));
        }

        billed.sort_by_key(|b| b.start);

        Ok(BilledBatch {
            sessions: billed,
            rows_excluded,
        })
    }

    /// Bill a stream of sessions into a batch, allocating in parallel
    ///
    /// Sessions are billed independently and the rollup is a plain sum, so
    /// the result is identical to [`aggregate`](Self::aggregate). The stream
    /// is drained first; worth it only for large batches.
    pub async fn aggregate_parallel(
        &self,
        sessions: impl Stream<Item = Result<ChargingSession>>,
        filter: &SessionFilter,
    ) -> Result<BilledBatch> {
        // Create progress spinner if enabled
        let progress = if self.show_progress {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} rows processed")
                    .unwrap(),
            );
            pb.set_message("Collecting charging sessions");
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            Some(pb)
        } else {
            None
        };

        let mut kept = Vec::new();
        let mut rows_excluded = 0usize;
        let mut count = 0u64;

        tokio::pin!(sessions);
        while let Some(result) = sessions.next().await {
            match result {
                Ok(session) => {
                    if filter.matches(&session) {
                        kept.push(session);
                    } else {
                        rows_excluded += 1;
                    }
                }
                Err(e) if e.is_row_level() => {
                    rows_excluded += 1;
                }
                Err(e) => return Err(e),
            }

            count += 1;
            if let Some(ref pb) = progress {
                pb.set_position(count);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!("Billing {} sessions in parallel", kept.len()));
        }

        let mut billed = kept
            .par_iter()
            .map(|session| self.bill_session(session))
            .collect::<Result<Vec<_>>>()?;
        billed.sort_by_key(|b| b.start);

        Ok(BilledBatch {
            sessions: billed,
            rows_excluded,
        })
    }

    /// Roll a billed batch up into the batch-level summary
    pub fn summarize(&self, batch: &BilledBatch) -> BillingSummary {
        let mut total_sold_kwh = 0.0;
        let mut total_purchased_kwh = 0.0;
        let mut total_energy_cost = 0.0;
        let mut total_variable_cost = 0.0;
        let mut total_revenue = 0.0;
        let mut weighted_rate_numerator = 0.0;
        let mut max_session_rate = 0.0f64;
        let mut min_session_rate = f64::INFINITY;

        for session in &batch.sessions {
            total_sold_kwh += session.sold_kwh;
            total_purchased_kwh += session.purchased_kwh;
            total_energy_cost += session.energy_cost;
            total_variable_cost += session.variable_cost;
            total_revenue += session.revenue;
            weighted_rate_numerator += session.tariff_rate * session.sold_kwh;

            max_session_rate = max_session_rate.max(session.tariff_rate);
            // Degenerate sessions carry a zero rate; they don't set the floor
            if session.tariff_rate > 0.0 {
                min_session_rate = min_session_rate.min(session.tariff_rate);
            }
        }
        if !min_session_rate.is_finite() {
            min_session_rate = 0.0;
        }

        let base_charge = self
            .config
            .base_charge(self.allocator.schedule().base_rate_per_kw());
        let total_cost = total_variable_cost + base_charge + self.config.fixed_adjustment;
        let operating_profit = total_revenue - total_cost;

        // A batch with no sold energy has no per-kWh metrics, not NaN ones;
        // the rate extremes are zeroed with them
        let (weighted_avg_rate, break_even_price, profit_per_kwh) = if total_sold_kwh > 0.0 {
            (
                weighted_rate_numerator / total_sold_kwh,
                total_cost / total_sold_kwh,
                operating_profit / total_sold_kwh,
            )
        } else {
            max_session_rate = 0.0;
            min_session_rate = 0.0;
            (0.0, 0.0, 0.0)
        };

        BillingSummary {
            session_count: batch.sessions.len(),
            rows_excluded: batch.rows_excluded,
            total_sold_kwh,
            total_purchased_kwh,
            total_energy_cost,
            total_variable_cost,
            base_charge,
            fixed_adjustment: self.config.fixed_adjustment,
            total_cost,
            total_revenue,
            operating_profit,
            weighted_avg_rate,
            weighted_rate_numerator,
            break_even_price,
            profit_per_kwh,
            max_session_rate,
            min_session_rate,
        }
    }

    /// Build the 24-hour usage profile of a billed batch
    pub fn hourly_profile(&self, batch: &BilledBatch) -> HourlyProfile {
        let profile_month = batch
            .sessions
            .first()
            .map(|s| s.start.month())
            .unwrap_or(1);
        let pattern = self
            .allocator
            .schedule()
            .pattern_for(Season::from_month(profile_month));

        let mut buckets: Vec<HourlyBucket> = (0u32..24)
            .map(|hour| HourlyBucket {
                hour,
                sold_kwh: 0.0,
                session_count: 0,
                base_tier: pattern.tier_at_hour(hour),
            })
            .collect();

        for session in &batch.sessions {
            let bucket = &mut buckets[session.start.hour() as usize];
            bucket.sold_kwh += session.sold_kwh;
            bucket.session_count += 1;
        }

        HourlyProfile { buckets }
    }
}
