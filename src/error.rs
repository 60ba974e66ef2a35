//! Error types for chargestat
//!
//! This module defines the error types used throughout the chargestat library.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! Row-level errors ([`ChargestatError::Row`], [`ChargestatError::InvalidTimestamp`])
//! are recoverable: the ingestion pipeline counts and skips them. Everything
//! else is fatal and propagates to the caller.
//!
//! # Example
//!
//! ```
//! use chargestat::error::{ChargestatError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to ChargestatError
//!     let _file = std::fs::read_to_string("nonexistent.csv")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{LoadTier, Season};

/// Main error type for chargestat operations
///
/// This enum encompasses all possible errors that can occur during
/// chargestat operations, from IO errors to malformed session rows and
/// incomplete tariff tables.
#[derive(Error, Debug)]
pub enum ChargestatError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// No session files found under the given inputs
    #[error("No session files found")]
    NoSessionFiles,

    /// Tariff table has no rate for a (season, tier) pair
    #[error("No tariff rate configured for {season} {tier}")]
    MissingRate {
        /// Season whose rate is missing
        season: Season,
        /// Load tier whose rate is missing
        tier: LoadTier,
    },

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Timestamp that matches none of the accepted formats
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Malformed session row with file context
    #[error("Bad row in {file} line {line}: {reason}")]
    Row {
        /// The file that contained the row
        file: PathBuf,
        /// 1-based line number of the row
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ChargestatError {
    /// Whether this error is a per-row data-quality problem that the
    /// pipeline should count and skip rather than abort on.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            ChargestatError::Row { .. } | ChargestatError::InvalidTimestamp(_)
        )
    }
}

/// Convenience type alias for Results in chargestat
///
/// This type alias makes it easier to work with Results throughout
/// the codebase by providing a default error type.
///
/// # Example
///
/// ```
/// use chargestat::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, ChargestatError>;
