//! Time-of-use tariff tables and period classification
//!
//! A [`TariffSchedule`] bundles the per-(season, tier) energy rates, the
//! 24-hour load patterns, and the base demand rate into one immutable value.
//! The built-in [`ContractType`] presets carry the published KEPCO EV-charging
//! tables; callers with a negotiated contract can build their own schedule
//! through [`TariffSchedule::new`], which rejects incomplete rate tables up
//! front so a missing rate can never surface mid-batch.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ChargestatError, Result};
use crate::types::{LoadTier, Season};

/// A 24-hour load-tier pattern, indexed by hour of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayPattern {
    hours: [LoadTier; 24],
}

impl DayPattern {
    /// Build a pattern from an explicit hour table
    pub const fn new(hours: [LoadTier; 24]) -> Self {
        Self { hours }
    }

    /// The tier in effect at the given hour of day
    pub fn tier_at_hour(&self, hour: u32) -> LoadTier {
        self.hours[(hour % 24) as usize]
    }

    /// Weekday pattern shared by the spring/fall and summer tables
    pub const fn spring_summer() -> Self {
        use LoadTier::{MidPeak as M, OffPeak as O, Peak as P};
        Self::new([
            O, O, O, O, O, O, O, O, // 00-07
            M, M, M, // 08-10
            P, // 11
            M, // 12
            P, P, P, P, P, // 13-17
            M, M, M, M, // 18-21
            O, O, // 22-23
        ])
    }

    /// Winter weekday pattern
    pub const fn winter() -> Self {
        use LoadTier::{MidPeak as M, OffPeak as O, Peak as P};
        Self::new([
            O, O, O, O, O, O, O, O, // 00-07
            M, // 08
            P, P, P, // 09-11
            M, M, M, M, // 12-15
            P, P, P, // 16-18
            M, M, M, // 19-21
            O, O, // 22-23
        ])
    }
}

/// Which published rate table a charging contract is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractType {
    /// High-voltage supply contract
    HighVoltage,
    /// Low-voltage supply contract
    LowVoltage,
}

impl ContractType {
    /// The published tariff schedule for this contract
    pub fn schedule(&self) -> TariffSchedule {
        match self {
            Self::HighVoltage => TariffSchedule::from_rate_rows(
                2580.0,
                [
                    (Season::SpringFall, [80.2, 91.0, 94.9]),
                    (Season::Summer, [78.2, 113.0, 198.6]),
                    (Season::Winter, [95.2, 105.5, 172.4]),
                ],
            ),
            Self::LowVoltage => TariffSchedule::from_rate_rows(
                2390.0,
                [
                    (Season::SpringFall, [85.4, 97.2, 102.1]),
                    (Season::Summer, [83.1, 140.0, 270.8]),
                    (Season::Winter, [105.8, 126.7, 227.0]),
                ],
            ),
        }
    }
}

impl Default for ContractType {
    fn default() -> Self {
        Self::HighVoltage
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighVoltage => write!(f, "high-voltage"),
            Self::LowVoltage => write!(f, "low-voltage"),
        }
    }
}

impl std::str::FromStr for ContractType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high-voltage" | "high" => Ok(Self::HighVoltage),
            "low-voltage" | "low" => Ok(Self::LowVoltage),
            _ => Err(format!("Invalid contract type: {s}")),
        }
    }
}

/// An immutable time-of-use tariff: energy rates per (season, tier),
/// the day patterns that assign tiers to hours, and the base demand rate
///
/// # Examples
/// ```
/// use chargestat::tariff::ContractType;
/// use chargestat::types::{LoadTier, Season};
///
/// let schedule = ContractType::HighVoltage.schedule();
/// assert_eq!(schedule.rate(Season::Winter, LoadTier::OffPeak).unwrap(), 95.2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TariffSchedule {
    /// KRW per contracted kW per month, before taxes
    base_rate_per_kw: f64,
    /// Weekday pattern used in spring/fall and summer
    spring_summer_pattern: DayPattern,
    /// Weekday pattern used in winter
    winter_pattern: DayPattern,
    /// KRW/kWh by season and tier
    rates: BTreeMap<Season, BTreeMap<LoadTier, f64>>,
}

impl TariffSchedule {
    /// Build a schedule from explicit rates, validating completeness
    ///
    /// Every (season, tier) pair must carry a rate; an incomplete table is a
    /// configuration error, not a per-row one.
    pub fn new(
        base_rate_per_kw: f64,
        spring_summer_pattern: DayPattern,
        winter_pattern: DayPattern,
        rates: BTreeMap<Season, BTreeMap<LoadTier, f64>>,
    ) -> Result<Self> {
        for season in Season::ALL {
            for tier in LoadTier::ALL {
                if rates.get(&season).and_then(|r| r.get(&tier)).is_none() {
                    return Err(ChargestatError::MissingRate { season, tier });
                }
            }
        }
        Ok(Self {
            base_rate_per_kw,
            spring_summer_pattern,
            winter_pattern,
            rates,
        })
    }

    /// Build a complete schedule from one rate row per season
    /// (off-peak, mid-peak, peak), using the standard day patterns
    fn from_rate_rows(base_rate_per_kw: f64, rows: [(Season, [f64; 3]); 3]) -> Self {
        let mut rates = BTreeMap::new();
        for (season, [off, mid, peak]) in rows {
            let mut by_tier = BTreeMap::new();
            by_tier.insert(LoadTier::OffPeak, off);
            by_tier.insert(LoadTier::MidPeak, mid);
            by_tier.insert(LoadTier::Peak, peak);
            rates.insert(season, by_tier);
        }
        Self {
            base_rate_per_kw,
            spring_summer_pattern: DayPattern::spring_summer(),
            winter_pattern: DayPattern::winter(),
            rates,
        }
    }

    /// KRW per contracted kW per month, before taxes
    pub fn base_rate_per_kw(&self) -> f64 {
        self.base_rate_per_kw
    }

    /// The day pattern in effect for a season
    pub fn pattern_for(&self, season: Season) -> &DayPattern {
        match season {
            Season::SpringFall | Season::Summer => &self.spring_summer_pattern,
            Season::Winter => &self.winter_pattern,
        }
    }

    /// The tier the day pattern assigns to an instant, before any
    /// weekend override
    pub fn base_tier(&self, ts: NaiveDateTime) -> LoadTier {
        let season = Season::from_month(ts.month());
        self.pattern_for(season).tier_at_hour(ts.hour())
    }

    /// The tier in effect at an instant
    ///
    /// With the weekend rule enabled, Sundays bill off-peak at every hour
    /// and Saturday peak hours bill mid-peak.
    pub fn tier_at(&self, ts: NaiveDateTime, weekend_rule: bool) -> LoadTier {
        let tier = self.base_tier(ts);
        if !weekend_rule {
            return tier;
        }
        match ts.weekday() {
            Weekday::Sun => LoadTier::OffPeak,
            Weekday::Sat if tier == LoadTier::Peak => LoadTier::MidPeak,
            _ => tier,
        }
    }

    /// The energy rate for a (season, tier) pair in KRW/kWh
    pub fn rate(&self, season: Season, tier: LoadTier) -> Result<f64> {
        self.rates
            .get(&season)
            .and_then(|r| r.get(&tier))
            .copied()
            .ok_or(ChargestatError::MissingRate { season, tier })
    }

    /// The energy rate in effect at an instant in KRW/kWh
    pub fn rate_at(&self, ts: NaiveDateTime, weekend_rule: bool) -> Result<f64> {
        let season = Season::from_month(ts.month());
        let tier = self.tier_at(ts, weekend_rule);
        self.rate(season, tier)
    }
}
