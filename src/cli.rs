//! CLI interface for chargestat
//!
//! This module defines the command-line interface using clap. Tariff, cost
//! and filter flags are global, so they can be placed before or after the
//! report subcommand.
//!
//! # Example
//!
//! ```bash
//! # Batch summary for January 2024 under the high-voltage contract
//! chargestat summary logs/ --since 2024-01-01 --until 2024-01-31
//!
//! # Per-session rows, billed at each session's recorded price
//! chargestat sessions logs/ --session-price --json
//!
//! # Inspect the effective low-voltage tariff tables
//! chargestat tariff --contract low-voltage
//! ```

use crate::aggregation::BillingConfig;
use crate::error::{ChargestatError, Result};
use crate::filters::SessionFilter;
use crate::tariff::ContractType;
use crate::types::SalePrice;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bill EV charging sessions against a time-of-use tariff
#[derive(Parser, Debug, Clone)]
#[command(name = "chargestat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Supply contract the tariff tables are read from
    #[arg(long, default_value = "high-voltage", global = true)]
    pub contract: ContractType,

    /// Contracted power in kW, used for the monthly base charge
    #[arg(long, default_value = "100", allow_negative_numbers = true, global = true)]
    pub contract_power: f64,

    /// Bill weekends like weekdays instead of applying the off-peak discount
    #[arg(long, global = true)]
    pub no_weekend_rule: bool,

    /// Fuel cost adjustment in KRW per purchased kWh
    #[arg(long, default_value = "5.0", allow_negative_numbers = true, global = true)]
    pub fuel_adjustment: f64,

    /// Climate/environment surcharge in KRW per purchased kWh
    #[arg(long, default_value = "9.0", allow_negative_numbers = true, global = true)]
    pub climate_surcharge: f64,

    /// Value-added tax in percent
    #[arg(long, default_value = "10", allow_negative_numbers = true, global = true)]
    pub vat_percent: f64,

    /// Electric industry fund levy in percent
    #[arg(long, default_value = "2.7", allow_negative_numbers = true, global = true)]
    pub fund_percent: f64,

    /// Charger conversion loss in percent of delivered energy
    #[arg(long, default_value = "5", allow_negative_numbers = true, global = true)]
    pub loss_percent: f64,

    /// Fixed monthly adjustment in KRW added to the total cost
    #[arg(long, default_value = "0", global = true)]
    pub fixed_adjustment: f64,

    /// Fixed sale price in KRW per kWh applied to every session
    #[arg(long, default_value = "300", allow_negative_numbers = true, global = true)]
    pub sale_price: f64,

    /// Bill each session at its own recorded unit price instead
    #[arg(long, conflicts_with = "sale_price", global = true)]
    pub session_price: bool,

    /// Drop sessions shorter than this many minutes
    #[arg(long, default_value = "3", global = true)]
    pub min_minutes: i64,

    /// Drop sessions that delivered less than this many kWh
    #[arg(long, default_value = "0.5", global = true)]
    pub min_energy: f64,

    /// Keep only sessions starting on or after this date (YYYY-MM-DD or YYYY-MM)
    #[arg(long, global = true)]
    pub since: Option<String>,

    /// Keep only sessions starting on or before this date (YYYY-MM-DD or YYYY-MM)
    #[arg(long, global = true)]
    pub until: Option<String>,

    /// Bill sessions on the rayon thread pool after loading
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Arguments shared by the reports that read session logs
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// Session log files or directories to scan (CSV or JSONL)
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

/// Available reports
///
/// When the subcommand is omitted, `summary` over the current directory
/// is assumed.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the batch billing summary
    Summary(InputArgs),
    /// Show per-session billing rows
    Sessions(InputArgs),
    /// Show the 24-hour charging profile
    Hourly(InputArgs),
    /// Show the effective tariff tables without reading any logs
    Tariff,
}

// ---------------------------------------------------------------------------
// Flag translation
// ---------------------------------------------------------------------------

/// Build the billing configuration from parsed flags.
///
/// Percent flags become fractions here; the rest of the crate never sees
/// percent values.
pub fn build_billing_config(cli: &Cli) -> Result<BillingConfig> {
    for (flag, value) in [
        ("--loss-percent", cli.loss_percent),
        ("--vat-percent", cli.vat_percent),
        ("--fund-percent", cli.fund_percent),
        ("--fuel-adjustment", cli.fuel_adjustment),
        ("--climate-surcharge", cli.climate_surcharge),
        ("--sale-price", cli.sale_price),
    ] {
        if value < 0.0 {
            return Err(ChargestatError::InvalidArgument(format!(
                "{flag} must be non-negative, got {value}"
            )));
        }
    }
    if cli.contract_power <= 0.0 {
        return Err(ChargestatError::InvalidArgument(format!(
            "--contract-power must be positive, got {}",
            cli.contract_power
        )));
    }

    let sale_price = if cli.session_price {
        SalePrice::PerSession
    } else {
        SalePrice::Fixed(cli.sale_price)
    };

    Ok(BillingConfig {
        loss_rate: cli.loss_percent / 100.0,
        fuel_adjustment: cli.fuel_adjustment,
        climate_surcharge: cli.climate_surcharge,
        vat_rate: cli.vat_percent / 100.0,
        fund_rate: cli.fund_percent / 100.0,
        contract_power_kw: cli.contract_power,
        fixed_adjustment: cli.fixed_adjustment,
        sale_price,
    })
}

/// Build the session filter from parsed flags.
pub fn build_session_filter(cli: &Cli) -> Result<SessionFilter> {
    let mut filter = SessionFilter::new()
        .with_min_duration(cli.min_minutes)
        .with_min_energy(cli.min_energy);

    if let Some(since) = &cli.since {
        filter = filter.with_since(parse_date_filter(since)?);
    }
    if let Some(until) = &cli.until {
        filter = filter.with_until(parse_date_filter(until)?);
    }

    Ok(filter)
}

// ---------------------------------------------------------------------------
// Date parsing
// ---------------------------------------------------------------------------

/// Parse date filter from string
///
/// Accepts dates in YYYY-MM-DD or YYYY-MM format.
/// For YYYY-MM format, defaults to the first day of the month.
///
/// # Arguments
///
/// * `date_str` - Date string to parse
///
/// # Returns
///
/// A parsed `NaiveDate` or an error if the format is invalid
///
/// # Example
///
/// ```
/// use chargestat::cli::parse_date_filter;
/// use chrono::Datelike;
///
/// let date = parse_date_filter("2024-01-15").unwrap();
/// assert_eq!(date.year(), 2024);
/// assert_eq!(date.day(), 15);
///
/// let date = parse_date_filter("2024-01").unwrap();
/// assert_eq!(date.year(), 2024);
/// assert_eq!(date.month(), 1);
/// assert_eq!(date.day(), 1);
/// ```
pub fn parse_date_filter(date_str: &str) -> Result<chrono::NaiveDate> {
    // Try YYYY-MM-DD format first
    if let Ok(date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Ok(date);
    }

    // Try YYYY-MM format (convert to first day of month)
    let parts: Vec<&str> = date_str.split('-').collect();
    if parts.len() == 2 {
        let year = parts[0]
            .parse::<i32>()
            .map_err(|_| ChargestatError::InvalidDate(format!("Invalid year in '{date_str}'")))?;
        let month = parts[1]
            .parse::<u32>()
            .map_err(|_| ChargestatError::InvalidDate(format!("Invalid month in '{date_str}'")))?;

        if !(1..=12).contains(&month) {
            return Err(ChargestatError::InvalidDate(format!(
                "Month must be between 1-12, got {month}"
            )));
        }

        chrono::NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ChargestatError::InvalidDate(format!("Invalid date: {date_str}")))
    } else {
        Err(ChargestatError::InvalidDate(format!(
            "Invalid date format '{}', expected YYYY-MM-DD or YYYY-MM",
            date_str
        )))
    }
}
