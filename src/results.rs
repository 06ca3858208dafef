//! # Measurement Records and Result Files
//!
//! A benchmark run produces one [`MeasurementRecord`] per completed trial and
//! appends it to a CSV file with a fixed, fully quoted header. This module
//! owns that format in both directions: [`ResultsManager`] is the single
//! writer used by the driver, [`load`] rehydrates records for analysis.
//!
//! It also carries the [`RunSummary`] that closes a run, which can be written
//! as JSON next to the data file for bookkeeping.

use crate::error::{BenchError, Result};
use crate::metrics::LatencySummary;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Column names of the persisted record format, in file order
pub const LOG_HEADER: [&str; 11] = [
    "Machine Tag",
    "Experiment Tag",
    "Document Path",
    "Failed requests",
    "Concurrency Level",
    "Total transferred",
    "Time per request",
    "Transfer rate",
    "Requests per second",
    "Retries",
    "Response Code",
];

/// One trial's reduced measurement, immutable once written
///
/// `time_per_request` is in milliseconds and `transfer_rate` in bytes per
/// second. Records with a non-positive `time_per_request` are kept on disk
/// but dropped by the dataset filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "Machine Tag")]
    pub machine_tag: String,
    #[serde(rename = "Experiment Tag")]
    pub experiment_tag: String,
    #[serde(rename = "Document Path")]
    pub document: String,
    #[serde(rename = "Failed requests", deserialize_with = "truncating_u64")]
    pub failed_count: u64,
    #[serde(rename = "Concurrency Level", deserialize_with = "truncating_u64")]
    pub concurrency: u64,
    #[serde(rename = "Total transferred", deserialize_with = "truncating_u64")]
    pub total_transferred: u64,
    #[serde(rename = "Time per request")]
    pub time_per_request: f64,
    #[serde(rename = "Transfer rate")]
    pub transfer_rate: f64,
    #[serde(rename = "Requests per second")]
    pub requests_per_second: f64,
    #[serde(rename = "Retries", deserialize_with = "truncating_u64")]
    pub retries: u64,
    #[serde(rename = "Response Code")]
    pub response_code: u16,
}

/// Integer columns written by older tooling may carry a fractional median
/// (e.g. `"1234.5"`); such values are truncated.
fn truncating_u64<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<u64>() {
        return Ok(v);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.trunc() as u64)
        .ok_or_else(|| serde::de::Error::custom(format!("not an unsigned integer: {:?}", raw)))
}

/// Single writer for a run's output file
///
/// The file must not exist beforehand; it is opened with `create_new` so a
/// concurrent creator is refused as well. Each appended record is flushed
/// immediately so an interrupted run keeps everything collected so far.
pub struct ResultsManager {
    output_file: PathBuf,
    writer: csv::Writer<File>,
    records_written: usize,
}

impl ResultsManager {
    /// Create the output file and write the header
    pub fn create(output_file: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(output_file)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => BenchError::OutputConflict {
                    path: output_file.to_path_buf(),
                },
                _ => BenchError::Io(e),
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(file);
        writer.write_record(LOG_HEADER)?;
        writer.flush()?;

        debug!("Created result file {:?}", output_file);
        Ok(Self {
            output_file: output_file.to_path_buf(),
            writer,
            records_written: 0,
        })
    }

    /// Append one record and flush it to disk
    pub fn append(&mut self, record: &MeasurementRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn output_file(&self) -> &Path {
        &self.output_file
    }

    /// Flush and close the file, returning the number of records written
    pub fn finalize(mut self) -> Result<usize> {
        self.writer.flush()?;
        info!(
            "Results written to: {:?} ({} records)",
            self.output_file, self.records_written
        );
        Ok(self.records_written)
    }
}

/// Refuse to run when the output file is already present
///
/// Called before any trial is scheduled so that a conflict is reported
/// without generating load.
pub fn ensure_output_available(output_file: &Path) -> Result<()> {
    if output_file.exists() {
        return Err(BenchError::OutputConflict {
            path: output_file.to_path_buf(),
        });
    }
    Ok(())
}

/// Read records from any CSV source carrying the standard header
pub fn read_records<R: Read>(reader: R) -> Result<Vec<MeasurementRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Load and concatenate the records of several result files, in order
pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<MeasurementRecord>> {
    let mut records = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let file = File::open(path)?;
        let loaded = read_records(file)?;
        debug!("Loaded {} records from {:?}", loaded.len(), path);
        records.extend(loaded);
    }
    Ok(records)
}

/// System information for reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub architecture: String,
    pub cpu_cores: usize,
    pub benchmark_version: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_cores: num_cpus::get(),
            benchmark_version: crate::VERSION.to_string(),
        }
    }
}

/// Bookkeeping for one completed benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub output_file: PathBuf,
    pub machine_tag: String,
    pub experiment_tag: String,
    pub trials: usize,
    pub records_written: usize,
    pub trials_skipped: usize,
    pub failed_attempts: u64,
    pub retries: u64,
    pub time_per_request: Option<LatencySummary>,
    pub wall_time: Duration,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub system_info: SystemInfo,
}

impl RunSummary {
    /// Write the summary as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Run summary written to: {:?}", path);
        Ok(())
    }
}
