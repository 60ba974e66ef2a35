//! Output formatting module for chargestat
//!
//! This module provides formatters for displaying billing results in
//! different formats:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output and integration with other tools
//!
//! # Examples
//!
//! ```
//! use chargestat::output::get_formatter;
//! use chargestat::tariff::ContractType;
//!
//! let schedule = ContractType::HighVoltage.schedule();
//!
//! // Table formatter for human-readable output
//! let formatter = get_formatter(false);
//! println!("{}", formatter.format_tariff(&schedule, true));
//!
//! // JSON formatter for machine-readable output
//! let json_formatter = get_formatter(true);
//! println!("{}", json_formatter.format_tariff(&schedule, true));
//! ```

use crate::aggregation::{BillingSummary, HourlyProfile, SessionBilling};
use crate::tariff::TariffSchedule;
use crate::types::{LoadTier, Season};
use prettytable::{Cell, Row, Table, format, row};
use serde_json::json;

/// Trait for output formatters
///
/// This trait defines the interface for formatting billing results.
/// Implementations can provide different output formats.
///
/// # Example Implementation
///
/// ```
/// use chargestat::output::OutputFormatter;
/// use chargestat::aggregation::{BillingSummary, HourlyProfile, SessionBilling};
/// use chargestat::tariff::TariffSchedule;
///
/// struct CountFormatter;
///
/// impl OutputFormatter for CountFormatter {
///     fn format_summary(&self, summary: &BillingSummary) -> String {
///         format!("{} sessions billed", summary.session_count)
///     }
///
///     fn format_sessions(&self, data: &[SessionBilling], _summary: &BillingSummary) -> String {
///         format!("{} rows", data.len())
///     }
///
///     fn format_hourly(&self, profile: &HourlyProfile, _summary: &BillingSummary) -> String {
///         format!("{} buckets", profile.buckets.len())
///     }
///
///     fn format_tariff(&self, _schedule: &TariffSchedule, weekend_rule: bool) -> String {
///         format!("weekend rule enabled: {}", weekend_rule)
///     }
/// }
/// ```
pub trait OutputFormatter {
    /// Format the batch-level billing summary
    fn format_summary(&self, summary: &BillingSummary) -> String;

    /// Format the per-session billing rows with batch totals
    fn format_sessions(&self, data: &[SessionBilling], summary: &BillingSummary) -> String;

    /// Format the 24-hour usage profile
    fn format_hourly(&self, profile: &HourlyProfile, summary: &BillingSummary) -> String;

    /// Format the effective tariff tables
    fn format_tariff(&self, schedule: &TariffSchedule, weekend_rule: bool) -> String;
}

/// Table formatter for human-readable output
///
/// Produces ASCII tables suitable for terminal display. Won amounts are
/// rounded to whole KRW with thousands separators; rates keep two decimals.
pub struct TableFormatter;

impl TableFormatter {
    /// Create a new TableFormatter
    pub fn new() -> Self {
        Self
    }

    /// Format an unsigned number with thousands separators
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();

        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }

        result.chars().rev().collect()
    }

    /// Format a KRW amount, rounded to whole won
    fn format_currency(amount: f64) -> String {
        let rounded = amount.round() as i64;
        if rounded < 0 {
            format!("-₩{}", Self::format_number(rounded.unsigned_abs()))
        } else {
            format!("₩{}", Self::format_number(rounded as u64))
        }
    }

    /// Format a KRW/kWh rate
    fn format_rate(rate: f64) -> String {
        format!("{rate:.2}")
    }

    /// Format an energy quantity in kWh
    fn format_energy(kwh: f64) -> String {
        format!("{kwh:.2}")
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TableFormatter {
    fn format_summary(&self, summary: &BillingSummary) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![b -> "Metric", b -> "Value"]);

        table.add_row(row!["Sessions billed", r -> summary.session_count]);
        table.add_row(row!["Rows excluded", r -> summary.rows_excluded]);
        table.add_row(row![
            "Energy sold (kWh)",
            r -> Self::format_energy(summary.total_sold_kwh)
        ]);
        table.add_row(row![
            "Energy purchased (kWh)",
            r -> Self::format_energy(summary.total_purchased_kwh)
        ]);
        table.add_row(row![
            "Tariff energy cost",
            r -> Self::format_currency(summary.total_energy_cost)
        ]);
        table.add_row(row![
            "Variable cost (taxed)",
            r -> Self::format_currency(summary.total_variable_cost)
        ]);
        table.add_row(row![
            "Base charge",
            r -> Self::format_currency(summary.base_charge)
        ]);
        table.add_row(row![
            "Fixed adjustment",
            r -> Self::format_currency(summary.fixed_adjustment)
        ]);
        table.add_row(row![
            b -> "Total cost",
            br -> Self::format_currency(summary.total_cost)
        ]);
        table.add_row(row![
            "Revenue",
            r -> Self::format_currency(summary.total_revenue)
        ]);
        table.add_row(row![
            b -> "Operating profit",
            br -> Self::format_currency(summary.operating_profit)
        ]);
        table.add_row(Row::new(vec![Cell::new(""); 2]));
        table.add_row(row![
            "Weighted avg tariff (KRW/kWh)",
            r -> Self::format_rate(summary.weighted_avg_rate)
        ]);
        table.add_row(row![
            "  = rate·kWh sum / kWh sold",
            r -> format!(
                "{} / {}",
                Self::format_currency(summary.weighted_rate_numerator),
                Self::format_energy(summary.total_sold_kwh)
            )
        ]);
        table.add_row(row![
            "Session rate range (KRW/kWh)",
            r -> format!(
                "{} - {}",
                Self::format_rate(summary.min_session_rate),
                Self::format_rate(summary.max_session_rate)
            )
        ]);
        table.add_row(row![
            b -> "Break-even price (KRW/kWh)",
            br -> Self::format_rate(summary.break_even_price)
        ]);
        table.add_row(row![
            "Profit per kWh (KRW)",
            r -> Self::format_rate(summary.profit_per_kwh)
        ]);

        table.to_string()
    }

    fn format_sessions(&self, data: &[SessionBilling], summary: &BillingSummary) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Start",
            b -> "End",
            b -> "Min",
            b -> "Sold kWh",
            b -> "Bought kWh",
            b -> "Rate",
            b -> "Energy Cost",
            b -> "Variable Cost",
            b -> "Revenue",
            b -> "Profit"
        ]);

        for session in data {
            table.add_row(row![
                session.start.format("%Y-%m-%d %H:%M"),
                session.end.format("%Y-%m-%d %H:%M"),
                r -> session.duration_minutes,
                r -> Self::format_energy(session.sold_kwh),
                r -> Self::format_energy(session.purchased_kwh),
                r -> Self::format_rate(session.tariff_rate),
                r -> Self::format_currency(session.energy_cost),
                r -> Self::format_currency(session.variable_cost),
                r -> Self::format_currency(session.revenue),
                r -> Self::format_currency(session.profit)
            ]);
        }

        // Add separator
        table.add_row(Row::new(vec![Cell::new(""); 10]));

        // Add totals row; the profit column stays per-session because the
        // base charge only exists at batch level
        table.add_row(row![
            b -> "TOTAL",
            "",
            "",
            b -> Self::format_energy(summary.total_sold_kwh),
            b -> Self::format_energy(summary.total_purchased_kwh),
            b -> Self::format_rate(summary.weighted_avg_rate),
            b -> Self::format_currency(summary.total_energy_cost),
            b -> Self::format_currency(summary.total_variable_cost),
            b -> Self::format_currency(summary.total_revenue),
            ""
        ]);

        table.to_string()
    }

    fn format_hourly(&self, profile: &HourlyProfile, summary: &BillingSummary) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Hour",
            b -> "Tier",
            b -> "Sessions",
            b -> "Sold kWh",
            b -> "Share"
        ]);

        for bucket in &profile.buckets {
            let share = if summary.total_sold_kwh > 0.0 {
                bucket.sold_kwh / summary.total_sold_kwh * 100.0
            } else {
                0.0
            };
            table.add_row(row![
                format!("{:02}:00", bucket.hour),
                bucket.base_tier,
                r -> bucket.session_count,
                r -> Self::format_energy(bucket.sold_kwh),
                r -> format!("{share:.1}%")
            ]);
        }

        // Add separator
        table.add_row(Row::new(vec![Cell::new(""); 5]));

        // Add totals row
        table.add_row(row![
            b -> "TOTAL",
            "",
            b -> summary.session_count,
            b -> Self::format_energy(summary.total_sold_kwh),
            b -> "100.0%"
        ]);

        table.to_string()
    }

    fn format_tariff(&self, schedule: &TariffSchedule, weekend_rule: bool) -> String {
        let mut output = String::new();

        let mut rates = Table::new();
        rates.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        rates.set_titles(row![
            b -> "Season",
            b -> "Off-peak",
            b -> "Mid-peak",
            b -> "Peak"
        ]);
        for season in Season::ALL {
            let mut cells = vec![Cell::new(&season.to_string())];
            for tier in LoadTier::ALL {
                let value = match schedule.rate(season, tier) {
                    Ok(rate) => Self::format_rate(rate),
                    Err(_) => "-".to_string(),
                };
                cells.push(Cell::new(&value).style_spec("r"));
            }
            rates.add_row(Row::new(cells));
        }
        output.push_str("Energy rates (KRW/kWh)\n");
        output.push_str(&rates.to_string());

        let mut hours = Table::new();
        hours.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        hours.set_titles(row![
            b -> "Hour",
            b -> "Spring/Summer",
            b -> "Winter"
        ]);
        for hour in 0..24u32 {
            hours.add_row(row![
                format!("{hour:02}:00"),
                schedule.pattern_for(Season::Summer).tier_at_hour(hour),
                schedule.pattern_for(Season::Winter).tier_at_hour(hour)
            ]);
        }
        output.push_str("\nDay patterns\n");
        output.push_str(&hours.to_string());

        output.push_str(&format!(
            "\nBase charge: {} per contracted kW per month (before taxes)\n",
            Self::format_currency(schedule.base_rate_per_kw())
        ));
        if weekend_rule {
            output.push_str("Weekend rule: Sundays off-peak, Saturday peak billed mid-peak\n");
        } else {
            output.push_str("Weekend rule: disabled\n");
        }

        output
    }
}

/// JSON formatter for machine-readable output
///
/// Produces structured JSON output that can be easily parsed by other tools
/// or used in automation pipelines.
pub struct JsonFormatter;

impl JsonFormatter {
    fn summary_json(summary: &BillingSummary) -> serde_json::Value {
        json!({
            "session_count": summary.session_count,
            "rows_excluded": summary.rows_excluded,
            "total_sold_kwh": summary.total_sold_kwh,
            "total_purchased_kwh": summary.total_purchased_kwh,
            "total_energy_cost": summary.total_energy_cost,
            "total_variable_cost": summary.total_variable_cost,
            "base_charge": summary.base_charge,
            "fixed_adjustment": summary.fixed_adjustment,
            "total_cost": summary.total_cost,
            "total_revenue": summary.total_revenue,
            "operating_profit": summary.operating_profit,
            "weighted_avg_rate": summary.weighted_avg_rate,
            "weighted_rate_numerator": summary.weighted_rate_numerator,
            "break_even_price": summary.break_even_price,
            "profit_per_kwh": summary.profit_per_kwh,
            "max_session_rate": summary.max_session_rate,
            "min_session_rate": summary.min_session_rate,
        })
    }

    fn season_key(season: Season) -> &'static str {
        match season {
            Season::SpringFall => "spring_fall",
            Season::Summer => "summer",
            Season::Winter => "winter",
        }
    }

    fn tier_key(tier: LoadTier) -> &'static str {
        match tier {
            LoadTier::OffPeak => "off_peak",
            LoadTier::MidPeak => "mid_peak",
            LoadTier::Peak => "peak",
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_summary(&self, summary: &BillingSummary) -> String {
        let output = json!({
            "summary": Self::summary_json(summary),
        });

        serde_json::to_string_pretty(&output).unwrap()
    }

    fn format_sessions(&self, data: &[SessionBilling], summary: &BillingSummary) -> String {
        let output = json!({
            "sessions": data.iter().map(|s| json!({
                "start": s.start.format("%Y-%m-%d %H:%M:%S").to_string(),
                "end": s.end.format("%Y-%m-%d %H:%M:%S").to_string(),
                "duration_minutes": s.duration_minutes,
                "sold_kwh": s.sold_kwh,
                "purchased_kwh": s.purchased_kwh,
                "tariff_rate": s.tariff_rate,
                "energy_cost": s.energy_cost,
                "variable_cost": s.variable_cost,
                "revenue": s.revenue,
                "profit": s.profit,
            })).collect::<Vec<_>>(),
            "summary": Self::summary_json(summary),
        });

        serde_json::to_string_pretty(&output).unwrap()
    }

    fn format_hourly(&self, profile: &HourlyProfile, summary: &BillingSummary) -> String {
        let output = json!({
            "hourly": profile.buckets.iter().map(|b| json!({
                "hour": b.hour,
                "base_tier": Self::tier_key(b.base_tier),
                "session_count": b.session_count,
                "sold_kwh": b.sold_kwh,
            })).collect::<Vec<_>>(),
            "totals": {
                "session_count": summary.session_count,
                "total_sold_kwh": summary.total_sold_kwh,
            }
        });

        serde_json::to_string_pretty(&output).unwrap()
    }

    fn format_tariff(&self, schedule: &TariffSchedule, weekend_rule: bool) -> String {
        let mut rates = serde_json::Map::new();
        for season in Season::ALL {
            let mut by_tier = serde_json::Map::new();
            for tier in LoadTier::ALL {
                if let Ok(rate) = schedule.rate(season, tier) {
                    by_tier.insert(Self::tier_key(tier).to_string(), json!(rate));
                }
            }
            rates.insert(Self::season_key(season).to_string(), json!(by_tier));
        }

        let pattern_hours = |season: Season| -> Vec<&'static str> {
            (0..24u32)
                .map(|h| Self::tier_key(schedule.pattern_for(season).tier_at_hour(h)))
                .collect()
        };

        let output = json!({
            "base_rate_per_kw": schedule.base_rate_per_kw(),
            "rates": rates,
            "patterns": {
                "spring_summer": pattern_hours(Season::Summer),
                "winter": pattern_hours(Season::Winter),
            },
            "weekend_rule": weekend_rule,
        });

        serde_json::to_string_pretty(&output).unwrap()
    }
}

/// Get the appropriate formatter based on the JSON flag
///
/// # Arguments
///
/// * `json` - If true, returns a JSON formatter; otherwise a table formatter
///
/// # Returns
///
/// A boxed trait object implementing the OutputFormatter trait
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter::new())
    }
}
