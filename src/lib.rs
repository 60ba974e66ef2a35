//! chargestat - Bill EV charging session logs against a time-of-use tariff
//!
//! This library provides functionality to:
//! - Parse CSV and JSONL charging session logs from files or directories
//! - Classify every billed minute into a KEPCO-style season/load-tier period
//! - Allocate session energy pro-rata across tariff periods and price it
//! - Roll sessions up into billing totals and per-kWh profitability metrics
//! - Generate reports in table and JSON formats
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
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> chargestat::Result<()> {
//!     // Initialize components
//!     let loader = DataLoader::new(vec![PathBuf::from("logs")]);
//!     let schedule = Arc::new(ContractType::HighVoltage.schedule());
//!     let allocator = Arc::new(CostAllocator::new(schedule));
//!     let aggregator = Aggregator::new(allocator, BillingConfig::default());
//!
//!     // Load, filter and bill the sessions
//!     let sessions = loader.load_sessions();
//!     let batch = aggregator.aggregate(sessions, &SessionFilter::default()).await?;
//!     let summary = aggregator.summarize(&batch);
//!     println!("break-even price: {:.2} KRW/kWh", summary.break_even_price);
//!
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod cost_allocator;
pub mod data_loader;
pub mod error;
pub mod filters;
pub mod output;
pub mod tariff;
pub mod types;

// Re-export commonly used types
pub use error::{ChargestatError, Result};
pub use types::{ChargingSession, LoadTier, SalePrice, Season};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
