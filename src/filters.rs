//! Filtering module for charging sessions
//!
//! Charging logs carry noise: aborted plug-ins a few seconds long, test
//! sessions that moved no energy. [`SessionFilter`] drops those below
//! configurable duration and energy floors and optionally restricts the
//! batch to a date range. Sessions that fail the filter are counted by the
//! aggregator, never silently lost.
//!
//! # Examples
//!
//! ```
//! use chargestat::filters::SessionFilter;
//! use chrono::NaiveDate;
//!
//! // January 2024 only, with the standard noise floors
//! let filter = SessionFilter::new()
//!     .with_since(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
//!     .with_until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
//! ```

use crate::types::ChargingSession;
use chrono::NaiveDate;

/// Filter configuration for charging sessions
///
/// The duration and energy floors default to the values used for outlier
/// removal in practice: 3 minutes and 0.5 kWh. Date bounds are inclusive
/// and compare against the session's start date.
#[derive(Debug, Clone)]
pub struct SessionFilter {
    /// Minimum whole-minute duration (inclusive)
    pub min_duration_minutes: i64,
    /// Minimum delivered energy in kWh (inclusive)
    pub min_energy_kwh: f64,
    /// Start date filter (inclusive)
    pub since_date: Option<NaiveDate>,
    /// End date filter (inclusive)
    pub until_date: Option<NaiveDate>,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            min_duration_minutes: 3,
            min_energy_kwh: 0.5,
            since_date: None,
            until_date: None,
        }
    }
}

impl SessionFilter {
    /// Create a filter with the default noise floors and no date bounds
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum session duration in whole minutes
    pub fn with_min_duration(mut self, minutes: i64) -> Self {
        self.min_duration_minutes = minutes;
        self
    }

    /// Set the minimum delivered energy in kWh
    pub fn with_min_energy(mut self, kwh: f64) -> Self {
        self.min_energy_kwh = kwh;
        self
    }

    /// Set the start date filter
    pub fn with_since(mut self, date: NaiveDate) -> Self {
        self.since_date = Some(date);
        self
    }

    /// Set the end date filter
    pub fn with_until(mut self, date: NaiveDate) -> Self {
        self.until_date = Some(date);
        self
    }

    /// Check if a session passes the filter
    pub fn matches(&self, session: &ChargingSession) -> bool {
        if session.duration_minutes() < self.min_duration_minutes {
            return false;
        }

        if session.delivered_kwh < self.min_energy_kwh {
            return false;
        }

        let date = session.start_date();
        if let Some(since) = self.since_date {
            if date < since {
                return false;
            }
        }

        if let Some(until) = self.until_date {
            if date > until {
                return false;
            }
        }

        true
    }
}
