//! # Ping Pong Benchmark Library
//!
//! Generates request/response load between a benchmark client and a minimal
//! HTTP "pong" service, records latency, throughput and reliability for
//! varying message sizes, and turns the raw measurements into comparable
//! statistical summaries and plots.
//!
//! ## Architecture Overview
//!
//! Data flows one way:
//!
//! ```text
//! collector -> benchmark -> CSV file -> results::load -> dataset
//!   -> statistics -> plot -> render
//! ```
//!
//! - `collector`: Endpoint abstraction and per-trial reduction
//! - `benchmark`: Concurrent driver that owns the result file of a run
//! - `results`: Record format, single writer, loader, run summary
//! - `dataset`: Filtering and grouping by experiment and machine
//! - `statistics`: Percentiles, bucketing and size-aligned comparisons
//! - `plot`: Renderer-neutral plot descriptors
//! - `render`: R script and JSON renderers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ppbench::{aggregate, filter, load, AnalysisConfig, FilterConfig, PlotBuilder, PlotOptions};
//! use ppbench::render::{PlotRenderer, RScriptRenderer};
//!
//! fn main() -> anyhow::Result<()> {
//!     let records = load(&["bare.csv", "weave.csv"])?;
//!     let data = aggregate(&filter(&records, &FilterConfig::default()));
//!
//!     let config = AnalysisConfig::default();
//!     let options = PlotOptions { with_bands: true, ..Default::default() };
//!     let plot = PlotBuilder::new(&config).absolute(&data, &options)?;
//!
//!     println!("{}", RScriptRenderer::new().render(&plot)?);
//!     Ok(())
//! }
//! ```

/// Concurrent benchmark driver
///
/// Schedules `floor((max - min) * coverage)` trials with random message sizes
/// over a fixed pool of tokio workers and appends one record per trial to
/// the run's CSV file.
pub mod benchmark;

/// Command-line interface and metric presets
///
/// Provides argument parsing using clap, duration parsing with
/// human-readable formats (e.g., "500ms", "60s") and the [`cli::Metric`]
/// presets shared by plots and statistics.
pub mod cli;

/// Ping endpoints and per-trial sample collection
///
/// Contains the `Endpoint` trait with direct, self-measuring and retrying
/// HTTP implementations, and the reduction of a trial's attempts into a
/// measurement record.
pub mod collector;

/// Filtering and grouping of loaded records
pub mod dataset;

pub mod error;

pub mod logging;

/// Run-level metrics
///
/// HDR histogram of per-trial latency plus failure and retry counters,
/// summarized at the end of a run.
pub mod metrics;

pub mod naming;

/// Plot descriptor builder
///
/// Computes every band and ratio line up front so that analysis errors
/// surface before anything is rendered.
pub mod plot;

pub mod render;

/// Record format, result files and run summaries
pub mod results;

/// Percentiles, size buckets and reference comparisons
pub mod statistics;

pub mod utils;

// Re-export key types for convenient library usage

pub use benchmark::{BenchmarkConfig, BenchmarkRunner};
pub use cli::{Args, Metric};
pub use collector::{collect, Endpoint, HttpEndpoint, MeasuredEndpoint, RetryingEndpoint};
pub use dataset::{aggregate, filter, Aggregate, FilterConfig};
pub use error::{BenchError, Result};
pub use plot::{AnalysisConfig, PlotBuilder, PlotDescriptor, PlotOptions};
pub use results::{load, MeasurementRecord, ResultsManager, RunSummary};

/// The current version of ppbench
///
/// Stored in run summaries for reproducibility.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    /// Document path prefix of the ping service
    pub const DOCUMENT_PATH: &str = "/mping";

    /// Smallest message size in bytes
    pub const MIN_SIZE: u64 = 1;

    /// Largest message size in bytes
    ///
    /// Large enough to cross several TCP receive windows.
    pub const MAX_SIZE: u64 = 500_000;

    /// Fraction of the size range sampled as trials
    pub const COVERAGE: f64 = 0.1;

    /// Number of concurrent workers
    pub const CONCURRENCY: usize = 10;

    /// Sequential requests per trial
    pub const REPETITIONS: usize = 10;

    /// Tries per attempt in retrying mode
    pub const MAX_TRIES: u32 = crate::collector::MAX_TRIES;

    /// Number of size buckets for bands and comparisons
    pub const PRECISION: usize = 20;

    /// Opacity of scatter points
    pub const ALPHA: f64 = 0.05;

    /// Confidence level of the outer band in percent
    pub const CONFIDENCE: f64 = 90.0;

    /// Default Linux TCP receive window (`net.ipv4.tcp_rmem` default) in bytes
    pub const RECEIVE_WINDOW: u64 = 87380;

    /// Ticks per axis
    pub const AXIS_STEPS: u32 = 10;

    /// Upper limit of the ratio axis of comparison plots
    pub const COMPARISON_Y_MAX: f64 = 2.0;

    /// Ticks of the ratio axis (one every 10%)
    pub const COMPARISON_Y_STEPS: u32 = 20;

    /// Size of exported figures
    pub const EXPORT_WIDTH_CM: f64 = 20.0;
    pub const EXPORT_HEIGHT_CM: f64 = 12.0;
}
