//! Data loader module for discovering and parsing session log files
//!
//! Charging logs arrive as CSV exports (`start,end,energy_kwh[,unit_price]`)
//! or as JSONL with one session object per line. The loader expands the given
//! files and directories, streams typed [`ChargingSession`] values out of
//! them, and turns malformed rows into inline row-level errors that the
//! aggregation layer counts and skips. Only schema-level problems (a missing
//! required column, an unreadable file) abort the batch.
//!
//! Numeric cells are sanitized before parsing: every character other than
//! digits and the decimal point is stripped, so currency-formatted values
//! like `"1,234.5"` or `"12.5 kWh"` survive the trip through a spreadsheet.
//!
//! # Examples
//!
//! ```no_run
//! use chargestat::data_loader::DataLoader;
//! use futures::StreamExt;
//!
//! # async fn example() -> chargestat::Result<()> {
//! let loader = DataLoader::new(vec!["sessions.csv".into()]);
//!
//! let sessions = loader.load_sessions();
//! tokio::pin!(sessions);
//! while let Some(result) = sessions.next().await {
//!     let session = result?;
//!     println!("{} kWh starting {}", session.delivered_kwh, session.start);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{ChargestatError, Result};
use crate::types::ChargingSession;
use chrono::NaiveDateTime;
use futures::StreamExt;
use futures::stream::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// A source of charging sessions
///
/// Anything that can stream typed sessions into the billing pipeline.
/// File loading is the built-in implementation; sessions held in memory or
/// fetched from elsewhere can implement this to reuse the aggregation layer.
pub trait SessionSource {
    /// Stream sessions, yielding row-level errors inline
    fn session_stream(&self) -> Pin<Box<dyn Stream<Item = Result<ChargingSession>> + Send + '_>>;
}

/// Data loader for discovering and streaming session log files
pub struct DataLoader {
    /// Files and directories to read sessions from
    inputs: Vec<PathBuf>,
}

impl DataLoader {
    /// Create a new DataLoader over the given files and directories
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self { inputs }
    }

    /// Find all session files under the configured inputs
    ///
    /// Directories are walked recursively for `.csv` and `.jsonl` files;
    /// explicitly named files are taken as-is. The result is sorted and
    /// de-duplicated so runs are deterministic.
    ///
    /// # Errors
    ///
    /// Returns [`ChargestatError::NoSessionFiles`] when nothing usable is
    /// found under any input.
    pub fn find_session_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in &self.inputs {
            if input.is_file() {
                if Self::is_session_file(input) {
                    files.push(input.clone());
                } else {
                    warn!("Skipping {}: not a .csv or .jsonl file", input.display());
                }
            } else if input.is_dir() {
                for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
                    let path = entry.path();
                    if path.is_file() && Self::is_session_file(path) {
                        files.push(path.to_path_buf());
                    }
                }
            } else {
                warn!("Input {} does not exist", input.display());
            }
        }

        files.sort();
        files.dedup();

        if files.is_empty() {
            return Err(ChargestatError::NoSessionFiles);
        }

        debug!("Found {} session files", files.len());
        Ok(files)
    }

    fn is_session_file(path: &Path) -> bool {
        matches!(
            path.extension()
                .and_then(|s| s.to_str())
                .map(|s| s.to_ascii_lowercase())
                .as_deref(),
            Some("csv") | Some("jsonl")
        )
    }

    /// Load charging sessions as an async stream
    ///
    /// Sessions from all discovered files are streamed in file order.
    /// Malformed rows appear as [`ChargestatError::Row`] items so the
    /// consumer can count them; they never stop the stream.
    pub fn load_sessions(&self) -> impl Stream<Item = Result<ChargingSession>> + '_ {
        async_stream::stream! {
            let files = match self.find_session_files() {
                Ok(files) => files,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for file_path in files {
                let is_jsonl = file_path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case("jsonl"));

                if is_jsonl {
                    let sessions = Self::parse_jsonl_stream(file_path);
                    tokio::pin!(sessions);
                    while let Some(result) = sessions.next().await {
                        yield result;
                    }
                } else {
                    let sessions = Self::parse_csv_stream(file_path);
                    tokio::pin!(sessions);
                    while let Some(result) = sessions.next().await {
                        yield result;
                    }
                }
            }
        }
    }

    /// Parse a single CSV file as a stream of sessions
    fn parse_csv_stream(path: PathBuf) -> impl Stream<Item = Result<ChargingSession>> {
        async_stream::stream! {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let mut reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .trim(csv::Trim::All)
                .from_reader(content.as_bytes());

            let headers = match reader.headers() {
                Ok(h) => h.clone(),
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };
            let columns = match CsvColumns::from_headers(&headers) {
                Ok(c) => c,
                Err(missing) => {
                    yield Err(ChargestatError::Config(format!(
                        "{}: missing required column '{missing}'",
                        path.display()
                    )));
                    return;
                }
            };

            for (index, record) in reader.records().enumerate() {
                let record = match record {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("Bad CSV record in {}: {}", path.display(), e);
                        yield Err(ChargestatError::Row {
                            file: path.clone(),
                            line: index + 2,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
                let line = record
                    .position()
                    .map(|p| p.line() as usize)
                    .unwrap_or(index + 2);

                match columns.parse_record(&record, &path, line) {
                    Ok(session) => yield Ok(session),
                    Err(e) => {
                        warn!("Skipping row: {}", e);
                        yield Err(e);
                    }
                }
            }
        }
    }

    /// Parse a single JSONL file as a stream of sessions
    fn parse_jsonl_stream(path: PathBuf) -> impl Stream<Item = Result<ChargingSession>> {
        async_stream::stream! {
            let file = match tokio::fs::File::open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            };

            let reader = BufReader::new(file);
            let mut lines = reader.lines();
            let mut line_number = 0;

            while let Ok(Some(line)) = lines.next_line().await {
                line_number += 1;

                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<ChargingSession>(&line) {
                    Ok(session) => yield Ok(session),
                    Err(e) => {
                        warn!(
                            "Failed to parse line {} in {}: {}",
                            line_number,
                            path.display(),
                            e
                        );
                        yield Err(ChargestatError::Row {
                            file: path.clone(),
                            line: line_number,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

impl SessionSource for DataLoader {
    fn session_stream(&self) -> Pin<Box<dyn Stream<Item = Result<ChargingSession>> + Send + '_>> {
        Box::pin(self.load_sessions())
    }
}

/// Resolved column indices for the CSV header contract
struct CsvColumns {
    start: usize,
    end: usize,
    energy: usize,
    unit_price: Option<usize>,
}

impl CsvColumns {
    /// Resolve the required columns from a header row, returning the name
    /// of the first missing one
    fn from_headers(headers: &csv::StringRecord) -> std::result::Result<Self, &'static str> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };

        Ok(Self {
            start: find("start").ok_or("start")?,
            end: find("end").ok_or("end")?,
            energy: find("energy_kwh").ok_or("energy_kwh")?,
            unit_price: find("unit_price"),
        })
    }

    /// Parse one CSV record into a session
    fn parse_record(
        &self,
        record: &csv::StringRecord,
        file: &Path,
        line: usize,
    ) -> Result<ChargingSession> {
        let start_cell = record
            .get(self.start)
            .ok_or_else(|| row_error(file, line, "missing start cell"))?;
        let end_cell = record
            .get(self.end)
            .ok_or_else(|| row_error(file, line, "missing end cell"))?;
        let energy_cell = record
            .get(self.energy)
            .ok_or_else(|| row_error(file, line, "missing energy_kwh cell"))?;

        let start = parse_timestamp(start_cell)
            .map_err(|_| row_error(file, line, format!("bad start timestamp '{start_cell}'")))?;
        let end = parse_timestamp(end_cell)
            .map_err(|_| row_error(file, line, format!("bad end timestamp '{end_cell}'")))?;
        let delivered_kwh = sanitize_number(energy_cell)
            .ok_or_else(|| row_error(file, line, format!("bad energy value '{energy_cell}'")))?;

        // A malformed price cell costs that session its revenue, not
        // its place in the batch
        let unit_price = self
            .unit_price
            .and_then(|i| record.get(i))
            .and_then(sanitize_number);

        Ok(ChargingSession {
            start,
            end,
            delivered_kwh,
            unit_price,
        })
    }
}

fn row_error(file: &Path, line: usize, reason: impl Into<String>) -> ChargestatError {
    ChargestatError::Row {
        file: file.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

/// Parse a numeric cell after stripping everything but digits and the
/// decimal point
///
/// `"1,234.5"` parses to `1234.5` and `"12.5 kWh"` to `12.5`; a cell with
/// no usable digits returns `None`.
pub fn sanitize_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parse a session timestamp in any of the accepted local formats
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]` with either a space or a `T` separator.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];

    let trimmed = raw.trim();
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    Err(ChargestatError::InvalidTimestamp(raw.to_string()))
}
