//! Core domain types for chargestat
//!
//! This module contains the fundamental types used throughout the chargestat
//! library: tariff seasons, load tiers, charging sessions, and the sale-price
//! policy. These types provide strong typing for the billing pipeline so that
//! raw spreadsheet-ish values never travel past the ingestion boundary.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tariff season derived from the calendar month
///
/// The rate tables price spring and fall identically, so they share a single
/// variant. Every month maps to exactly one season.
///
/// # Examples
/// ```
/// use chargestat::types::Season;
///
/// assert_eq!(Season::from_month(4), Season::SpringFall);
/// assert_eq!(Season::from_month(7), Season::Summer);
/// assert_eq!(Season::from_month(12), Season::Winter);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// March through May, plus September and October
    SpringFall,
    /// June through August
    Summer,
    /// November through February
    Winter,
}

impl Season {
    /// All seasons in table order
    pub const ALL: [Season; 3] = [Season::SpringFall, Season::Summer, Season::Winter];

    /// Derive the season from a calendar month (1-12)
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 | 9 | 10 => Self::SpringFall,
            6..=8 => Self::Summer,
            _ => Self::Winter,
        }
    }

    /// Derive the season a date falls in
    pub fn from_date(date: NaiveDate) -> Self {
        Self::from_month(date.month())
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpringFall => write!(f, "spring/fall"),
            Self::Summer => write!(f, "summer"),
            Self::Winter => write!(f, "winter"),
        }
    }
}

/// Load tier within a tariff day
///
/// Ordered from cheapest to most expensive band. The ordering is the
/// conventional price ordering; the rate tables themselves are free to
/// price tiers however they like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTier {
    /// Off-peak (light load) hours
    OffPeak,
    /// Mid-peak (medium load) hours
    MidPeak,
    /// Peak (maximum load) hours
    Peak,
}

impl LoadTier {
    /// All tiers in ascending price order
    pub const ALL: [LoadTier; 3] = [LoadTier::OffPeak, LoadTier::MidPeak, LoadTier::Peak];
}

impl fmt::Display for LoadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OffPeak => write!(f, "off-peak"),
            Self::MidPeak => write!(f, "mid-peak"),
            Self::Peak => write!(f, "peak"),
        }
    }
}

/// A single charging session from the input log
///
/// Timestamps are local wall-clock time with no zone attached; the tariff
/// bills by wall-clock instant. `delivered_kwh` is the energy sold to the
/// vehicle, before grid-loss markup.
///
/// # Examples
/// ```
/// use chargestat::types::ChargingSession;
/// use chrono::{Duration, NaiveDate};
///
/// let start = NaiveDate::from_ymd_opt(2024, 1, 15)
///     .unwrap()
///     .and_hms_opt(2, 0, 0)
///     .unwrap();
/// let session = ChargingSession::new(start, start + Duration::hours(1), 10.0);
/// assert_eq!(session.duration_minutes(), 60);
/// assert_eq!(session.purchased_kwh(0.05), 10.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSession {
    /// When charging started
    pub start: NaiveDateTime,
    /// When charging ended
    pub end: NaiveDateTime,
    /// Energy delivered to the vehicle in kWh
    pub delivered_kwh: f64,
    /// Per-session sale price in KRW/kWh, when the log carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
}

impl ChargingSession {
    /// Create a new session without a per-session price
    pub fn new(start: NaiveDateTime, end: NaiveDateTime, delivered_kwh: f64) -> Self {
        Self {
            start,
            end,
            delivered_kwh,
            unit_price: None,
        }
    }

    /// Attach a per-session sale price
    pub fn with_unit_price(mut self, price: f64) -> Self {
        self.unit_price = Some(price);
        self
    }

    /// Whole minutes between start and end, truncating any trailing
    /// fraction of a minute. Never negative; a session that ends at or
    /// before its start has zero duration.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes().max(0)
    }

    /// Energy purchased from the grid to deliver this session,
    /// i.e. delivered energy marked up by the loss rate.
    pub fn purchased_kwh(&self, loss_rate: f64) -> f64 {
        self.delivered_kwh * (1.0 + loss_rate)
    }

    /// Calendar date the session started on
    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }
}

/// How session revenue is priced
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SalePrice {
    /// Same KRW/kWh price for every session
    Fixed(f64),
    /// Each session's own `unit_price` column; sessions without one earn 0
    PerSession,
}

impl Default for SalePrice {
    fn default() -> Self {
        Self::Fixed(300.0)
    }
}

impl SalePrice {
    /// The KRW/kWh price a session sells at under this policy
    pub fn for_session(&self, session: &ChargingSession) -> f64 {
        match self {
            Self::Fixed(price) => *price,
            Self::PerSession => session.unit_price.unwrap_or(0.0),
        }
    }
}
