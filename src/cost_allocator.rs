//! Pro-rata cost allocation across tariff periods
//!
//! Billing works at minute resolution: a session's energy is spread evenly
//! over the whole minutes it spans, and each minute is priced at the tariff
//! rate in effect at that instant. [`CostAllocator::allocate`] walks the span
//! in hour-aligned runs of minutes rather than minute by minute; the two give
//! identical results because the tier can only change when the wall-clock
//! minute rolls over to zero.

use chrono::{Duration, NaiveDateTime, Timelike};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::tariff::TariffSchedule;

/// The outcome of allocating one span's energy across tariff periods
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Allocation {
    /// Energy cost over the span in KRW
    pub energy_cost: f64,
    /// Time-weighted mean tariff rate over the span in KRW/kWh
    pub avg_rate: f64,
}

/// Prices energy spans against a tariff schedule
pub struct CostAllocator {
    /// Shared tariff schedule
    schedule: Arc<TariffSchedule>,
    /// Whether weekend overrides apply
    weekend_rule: bool,
}

impl CostAllocator {
    /// Create a new CostAllocator with the weekend rule enabled
    pub fn new(schedule: Arc<TariffSchedule>) -> Self {
        Self {
            schedule,
            weekend_rule: true,
        }
    }

    /// Enable or disable the weekend overrides
    pub fn with_weekend_rule(mut self, enabled: bool) -> Self {
        self.weekend_rule = enabled;
        self
    }

    /// The tariff schedule this allocator prices against
    pub fn schedule(&self) -> &TariffSchedule {
        &self.schedule
    }

    /// Whether weekend overrides apply
    pub fn weekend_rule(&self) -> bool {
        self.weekend_rule
    }

    /// Allocate a span's energy across the tariff periods it touches
    ///
    /// Energy is spread evenly over the span's whole minutes and priced per
    /// minute; a trailing fraction of a minute carries no extra minutes but
    /// the full energy still gets billed. Spans shorter than one whole minute
    /// (including empty and inverted ones) allocate to zero rather than
    /// erroring, so degenerate log rows never poison a batch.
    ///
    /// The walk visits one hour-aligned run of minutes at a time, classifying
    /// each run at its first minute.
    pub fn allocate(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        energy_kwh: f64,
    ) -> Result<Allocation> {
        let total_minutes = (end - start).num_minutes();
        if total_minutes <= 0 {
            return Ok(Allocation::default());
        }

        let energy_per_minute = energy_kwh / total_minutes as f64;
        let start_minute = start.minute() as i64;

        let mut energy_cost = 0.0;
        let mut rate_minutes = 0.0;
        let mut offset = 0i64;
        while offset < total_minutes {
            // Minutes left in the wall-clock hour at this offset; the tier is
            // constant until the minute-of-hour next rolls over to zero.
            let left_in_hour = 60 - (start_minute + offset) % 60;
            let run = left_in_hour.min(total_minutes - offset);
            let rate = self
                .schedule
                .rate_at(start + Duration::minutes(offset), self.weekend_rule)?;
            energy_cost += rate * energy_per_minute * run as f64;
            rate_minutes += rate * run as f64;
            offset += run;
        }

        let avg_rate = rate_minutes / total_minutes as f64;
        debug!(
            "Allocated {:.2} KRW over {} minutes at {:.2} KRW/kWh average",
            energy_cost, total_minutes, avg_rate
        );

        Ok(Allocation {
            energy_cost,
            avg_rate,
        })
    }

    /// Allocate by visiting every minute individually
    ///
    /// Reference implementation of [`allocate`](Self::allocate); linear in
    /// the span's length instead of the hours it touches. Kept for
    /// equivalence tests and benchmarks.
    pub fn allocate_per_minute(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        energy_kwh: f64,
    ) -> Result<Allocation> {
        let total_minutes = (end - start).num_minutes();
        if total_minutes <= 0 {
            return Ok(Allocation::default());
        }

        let energy_per_minute = energy_kwh / total_minutes as f64;
        let mut energy_cost = 0.0;
        let mut rate_minutes = 0.0;
        for minute in 0..total_minutes {
            let rate = self
                .schedule
                .rate_at(start + Duration::minutes(minute), self.weekend_rule)?;
            energy_cost += rate * energy_per_minute;
            rate_minutes += rate;
        }

        Ok(Allocation {
            energy_cost,
            avg_rate: rate_minutes / total_minutes as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariff::ContractType;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn allocator() -> CostAllocator {
        CostAllocator::new(Arc::new(ContractType::HighVoltage.schedule()))
    }

    #[test]
    fn test_flat_hour_in_one_tier() {
        // Winter weekday 02:00-03:00 is off-peak at 95.2 KRW/kWh
        let alloc = allocator()
            .allocate(dt(2024, 1, 15, 2, 0), dt(2024, 1, 15, 3, 0), 10.0)
            .unwrap();
        assert!((alloc.energy_cost - 952.0).abs() < 1e-9);
        assert!((alloc.avg_rate - 95.2).abs() < 1e-9);
    }

    #[test]
    fn test_span_crossing_tiers() {
        // Winter weekday 08:00-10:00: one hour mid-peak (105.5),
        // one hour peak (172.4); 12 kWh -> 0.1 kWh per minute
        let alloc = allocator()
            .allocate(dt(2024, 1, 15, 8, 0), dt(2024, 1, 15, 10, 0), 12.0)
            .unwrap();
        let expected = 60.0 * 0.1 * 105.5 + 60.0 * 0.1 * 172.4;
        assert!((alloc.energy_cost - expected).abs() < 1e-6);
        assert!((alloc.avg_rate - (105.5 + 172.4) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_span_crossing_midnight() {
        // 23:30 Monday to 00:30 Tuesday in winter stays off-peak throughout
        let alloc = allocator()
            .allocate(dt(2024, 1, 15, 23, 30), dt(2024, 1, 16, 0, 30), 10.0)
            .unwrap();
        assert!((alloc.energy_cost - 952.0).abs() < 1e-9);
        assert!((alloc.avg_rate - 95.2).abs() < 1e-9);
    }

    #[test]
    fn test_span_crossing_seasons() {
        // 2023-05-31 23:00 (spring off-peak 80.2) to 2023-06-01 01:00
        // (summer off-peak 78.2), both weekdays; 12 kWh over 120 minutes
        let alloc = allocator()
            .allocate(dt(2023, 5, 31, 23, 0), dt(2023, 6, 1, 1, 0), 12.0)
            .unwrap();
        let expected = 6.0 * 80.2 + 6.0 * 78.2;
        assert!((alloc.energy_cost - expected).abs() < 1e-6);
        assert!((alloc.avg_rate - (80.2 + 78.2) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_start_mid_hour() {
        // 10:59 to 11:01 in spring: one minute mid-peak (91.0) then one
        // minute peak (94.9); 2 kWh -> 1 kWh per minute
        let alloc = allocator()
            .allocate(dt(2024, 4, 10, 10, 59), dt(2024, 4, 10, 11, 1), 2.0)
            .unwrap();
        assert!((alloc.energy_cost - (91.0 + 94.9)).abs() < 1e-9);
        assert!((alloc.avg_rate - (91.0 + 94.9) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_saturday_peak_bills_mid_peak() {
        // 2024-01-06 was a Saturday; 11:00 winter is base peak
        let alloc = allocator()
            .allocate(dt(2024, 1, 6, 11, 0), dt(2024, 1, 6, 12, 0), 10.0)
            .unwrap();
        assert!((alloc.energy_cost - 1055.0).abs() < 1e-9);
    }

    #[test]
    fn test_weekend_rule_disabled() {
        let alloc = allocator()
            .with_weekend_rule(false)
            .allocate(dt(2024, 1, 6, 11, 0), dt(2024, 1, 6, 12, 0), 10.0)
            .unwrap();
        assert!((alloc.energy_cost - 1724.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_spans_allocate_zero() {
        let a = allocator();
        let start = dt(2024, 1, 15, 10, 0);

        let empty = a.allocate(start, start, 5.0).unwrap();
        assert_eq!(empty, Allocation::default());

        let inverted = a.allocate(start, start - Duration::hours(1), 5.0).unwrap();
        assert_eq!(inverted, Allocation::default());

        let sub_minute = a.allocate(start, start + Duration::seconds(45), 5.0).unwrap();
        assert_eq!(sub_minute, Allocation::default());
    }

    #[test]
    fn test_trailing_fraction_bills_full_energy() {
        // 2 minutes 40 seconds truncates to 2 whole minutes, but the full
        // 3 kWh is billed across them
        let start = dt(2024, 1, 15, 2, 0);
        let end = start + Duration::seconds(160);
        let alloc = allocator().allocate(start, end, 3.0).unwrap();
        assert!((alloc.energy_cost - 3.0 * 95.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_energy_span() {
        let alloc = allocator()
            .allocate(dt(2024, 1, 15, 2, 0), dt(2024, 1, 15, 3, 0), 0.0)
            .unwrap();
        assert_eq!(alloc.energy_cost, 0.0);
        // The average rate is a property of the span, not the energy
        assert!((alloc.avg_rate - 95.2).abs() < 1e-9);
    }

    #[test]
    fn test_interval_walk_matches_minute_walk() {
        let a = allocator();
        let spans = [
            (dt(2024, 1, 15, 10, 59), dt(2024, 1, 15, 11, 1)),
            (dt(2024, 1, 5, 23, 45), dt(2024, 1, 8, 0, 15)),
            (dt(2023, 5, 31, 22, 7), dt(2023, 6, 1, 9, 41)),
            (dt(2024, 8, 31, 12, 0), dt(2024, 9, 1, 12, 0)),
        ];
        for (start, end) in spans {
            let fast = a.allocate(start, end, 42.0).unwrap();
            let slow = a.allocate_per_minute(start, end, 42.0).unwrap();
            assert!((fast.energy_cost - slow.energy_cost).abs() < 1e-6);
            assert!((fast.avg_rate - slow.avg_rate).abs() < 1e-9);
        }
    }

    #[test]
    fn test_additivity_at_minute_boundary() {
        let a = allocator();
        let start = dt(2024, 1, 15, 7, 30);
        let mid = dt(2024, 1, 15, 8, 45);
        let end = dt(2024, 1, 15, 10, 0);
        let total_minutes = (end - start).num_minutes() as f64;

        let whole = a.allocate(start, end, 15.0).unwrap();
        // Split the same energy pro-rata at an interior minute boundary
        let first_share = 15.0 * (mid - start).num_minutes() as f64 / total_minutes;
        let first = a.allocate(start, mid, first_share).unwrap();
        let second = a.allocate(mid, end, 15.0 - first_share).unwrap();

        assert!((whole.energy_cost - (first.energy_cost + second.energy_cost)).abs() < 1e-6);
    }
}
