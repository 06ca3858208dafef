use crate::results::MeasurementRecord;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ping pong benchmark - measure HTTP round trips and plot the results
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// Number of size buckets used for bands and comparisons
    #[clap(long, global = true, default_value_t = crate::defaults::PRECISION)]
    pub precision: usize,

    /// Opacity of scatter points (0..1)
    #[clap(long, global = true, default_value_t = crate::defaults::ALPHA)]
    pub alpha: f64,

    /// JSON file mapping machine and experiment tags to display names
    #[clap(long, global = true)]
    pub naming: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Additionally write plain log lines to this file
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a ping pong benchmark and store the measurements as CSV
    Run(RunArgs),

    /// Plot absolute values (scatter points and optional confidence bands)
    Plot(PlotArgs),

    /// Plot the performance of several series relative to a reference
    Compare(CompareArgs),

    /// Print a per experiment and machine overview of result files
    Summary(SummaryArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    /// Result file to create (must not exist)
    pub output: PathBuf,

    /// Base URL of the ping endpoint (e.g. http://1.2.3.4:8080)
    #[clap(long, help_heading = "Endpoint")]
    pub host: String,

    /// Document path prefix; the message size is appended
    #[clap(long, default_value = crate::defaults::DOCUMENT_PATH, help_heading = "Endpoint")]
    pub path: String,

    /// How an attempt is measured
    #[clap(long, value_enum, default_value_t = EndpointMode::Measured, help_heading = "Endpoint")]
    pub mode: EndpointMode,

    /// Tries per attempt in retrying mode
    #[clap(long, default_value_t = crate::defaults::MAX_TRIES, help_heading = "Endpoint")]
    pub max_tries: u32,

    /// Machine tag stored with every record
    #[clap(long, default_value = "")]
    pub machine: String,

    /// Experiment tag stored with every record
    #[clap(long, default_value = "")]
    pub experiment: String,

    /// Minimum message size in bytes
    #[clap(long, default_value_t = crate::defaults::MIN_SIZE)]
    pub min: u64,

    /// Maximum message size in bytes
    #[clap(long, default_value_t = crate::defaults::MAX_SIZE)]
    pub max: u64,

    /// Fraction of the size range to sample as trials
    #[clap(long, default_value_t = crate::defaults::COVERAGE)]
    pub coverage: f64,

    /// Number of concurrent workers
    #[clap(short = 'c', long, default_value_t = crate::defaults::CONCURRENCY)]
    pub concurrency: usize,

    /// Requests per trial
    #[clap(short = 'r', long, default_value_t = crate::defaults::REPETITIONS)]
    pub repetitions: usize,

    /// Timeout of a single request (e.g. "500ms", "60s", "1m")
    #[clap(long, value_parser = parse_duration, default_value = "60s")]
    pub timeout: Duration,

    /// Write a JSON run summary to this file
    #[clap(long)]
    pub summary_output: Option<PathBuf>,
}

/// Which records take part in an analysis
#[derive(ClapArgs, Debug, Clone)]
pub struct SelectionArgs {
    /// Result files to analyze
    #[clap(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Experiment tags to include, in legend order (default: all)
    #[clap(long, num_args = 1.., value_delimiter = ',', help_heading = "Selection")]
    pub experiments: Vec<String>,

    /// Machine tags to include, in legend order (default: all)
    #[clap(long, num_args = 1.., value_delimiter = ',', help_heading = "Selection")]
    pub machines: Vec<String>,

    /// Ignore records with larger messages
    #[clap(long, help_heading = "Selection")]
    pub max_size: Option<u64>,

    /// Ignore records with more failed requests than this
    #[clap(long, default_value_t = 0, help_heading = "Selection")]
    pub max_failed: u64,
}

/// Axis layout and output of a generated plot
#[derive(ClapArgs, Debug, Clone)]
pub struct ChartArgs {
    /// Upper limit of the x axis in bytes (default: next multiple of
    /// --precision above the largest message)
    #[clap(long, help_heading = "Chart")]
    pub x_max: Option<u64>,

    /// Upper limit of the y axis (default: largest value, 2.0 for comparisons)
    #[clap(long, help_heading = "Chart")]
    pub y_max: Option<f64>,

    /// Number of x axis ticks
    #[clap(long, default_value_t = crate::defaults::AXIS_STEPS, help_heading = "Chart")]
    pub x_steps: u32,

    /// Number of y axis ticks (default: 10, 20 for comparisons)
    #[clap(long, help_heading = "Chart")]
    pub y_steps: Option<u32>,

    /// Draw dashed guides at multiples of the TCP receive window (0 disables)
    #[clap(long, default_value_t = crate::defaults::RECEIVE_WINDOW, help_heading = "Chart")]
    pub receive_window: u64,

    /// Plot title (default depends on the metric)
    #[clap(long, help_heading = "Chart")]
    pub title: Option<String>,

    #[clap(long, default_value = "", help_heading = "Chart")]
    pub subtitle: String,

    #[clap(long, value_enum, default_value_t = LegendPosition::TopRight, help_heading = "Chart")]
    pub legend: LegendPosition,

    /// Output format of the generated plot
    #[clap(long, value_enum, default_value_t = OutputFormat::R, help_heading = "Output")]
    pub format: OutputFormat,

    /// Make the R script render a PDF file
    #[clap(long, conflicts_with = "png", help_heading = "Output")]
    pub pdf: Option<PathBuf>,

    /// Make the R script render a PNG file
    #[clap(long, help_heading = "Output")]
    pub png: Option<PathBuf>,

    /// Width of the exported figure in centimeters
    #[clap(long, default_value_t = crate::defaults::EXPORT_WIDTH_CM, help_heading = "Output")]
    pub width: f64,

    /// Height of the exported figure in centimeters
    #[clap(long, default_value_t = crate::defaults::EXPORT_HEIGHT_CM, help_heading = "Output")]
    pub height: f64,

    /// Write the plot to this file instead of stdout
    #[clap(short = 'o', long, help_heading = "Output")]
    pub output: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlotArgs {
    #[clap(flatten)]
    pub selection: SelectionArgs,

    #[clap(flatten)]
    pub chart: ChartArgs,

    /// Value to plot
    #[clap(long, value_enum, default_value_t = Metric::Latency)]
    pub metric: Metric,

    /// Draw median lines with confidence bands
    #[clap(long)]
    pub with_bands: bool,

    /// Do not draw the scatter points
    #[clap(long)]
    pub no_points: bool,

    /// Confidence level of the outer band in percent
    #[clap(long, default_value_t = crate::defaults::CONFIDENCE)]
    pub confidence: f64,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CompareArgs {
    #[clap(flatten)]
    pub selection: SelectionArgs,

    #[clap(flatten)]
    pub chart: ChartArgs,

    /// Value to compare
    #[clap(long, value_enum, default_value_t = Metric::TransferRate)]
    pub metric: Metric,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SummaryArgs {
    #[clap(flatten)]
    pub selection: SelectionArgs,
}

/// How the collector obtains the figures of one attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum EndpointMode {
    /// The endpoint measures itself and answers with JSON
    #[clap(name = "measured")]
    Measured,

    /// Plain GET, timed on the client
    #[clap(name = "direct")]
    Direct,

    /// Plain GET retried until success, timed on the client
    #[clap(name = "retrying")]
    Retrying,
}

impl std::fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointMode::Measured => write!(f, "Measured"),
            EndpointMode::Direct => write!(f, "Direct"),
            EndpointMode::Retrying => write!(f, "Retrying"),
        }
    }
}

/// A plottable column of a measurement record, with its presentation preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum Metric {
    /// Time per request
    #[clap(name = "latency")]
    Latency,

    /// Transfer rate
    #[clap(name = "transfer-rate")]
    TransferRate,

    /// Requests per second
    #[clap(name = "requests")]
    Requests,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Latency => write!(f, "Round-trip latency"),
            Metric::TransferRate => write!(f, "Transfer Rate"),
            Metric::Requests => write!(f, "Requests per second"),
        }
    }
}

impl Metric {
    /// The record column this metric reads
    pub fn value(self, record: &MeasurementRecord) -> f64 {
        match self {
            Metric::Latency => record.time_per_request,
            Metric::TransferRate => record.transfer_rate,
            Metric::Requests => record.requests_per_second,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Metric::Latency => "Round-trip latency",
            Metric::TransferRate => "Data Transfer Rates",
            Metric::Requests => "Requests per second",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Latency => "ms",
            Metric::TransferRate => "MB/s",
            Metric::Requests => "req/s",
        }
    }

    /// Axis values are divided by this before labelling
    pub fn divisor(self) -> f64 {
        match self {
            Metric::Latency | Metric::Requests => 1.0,
            Metric::TransferRate => 1_000_000.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    /// R script
    #[clap(name = "r")]
    R,

    /// Plot descriptor as JSON
    #[clap(name = "json")]
    Json,
}

/// Legend placement keywords understood by R
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegendPosition {
    #[clap(name = "topright")]
    TopRight,
    #[clap(name = "topleft")]
    TopLeft,
    #[clap(name = "bottomright")]
    BottomRight,
    #[clap(name = "bottomleft")]
    BottomLeft,
    #[clap(name = "top")]
    Top,
    #[clap(name = "bottom")]
    Bottom,
    #[clap(name = "left")]
    Left,
    #[clap(name = "right")]
    Right,
    #[clap(name = "center")]
    Center,
}

impl std::fmt::Display for LegendPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keyword = match self {
            LegendPosition::TopRight => "topright",
            LegendPosition::TopLeft => "topleft",
            LegendPosition::BottomRight => "bottomright",
            LegendPosition::BottomLeft => "bottomleft",
            LegendPosition::Top => "top",
            LegendPosition::Bottom => "bottom",
            LegendPosition::Left => "left",
            LegendPosition::Right => "right",
            LegendPosition::Center => "center",
        };
        write!(f, "{}", keyword)
    }
}

/// Parse duration from string (e.g., "500ms", "10s", "5m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // plain numbers are seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    if !num.is_finite() || num < 0.0 {
        return Err(format!("Duration must be a positive number: {}", s));
    }

    let seconds = match unit {
        "ms" => num / 1000.0,
        "s" => num,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Duration::try_from_secs_f64(seconds).map_err(|_| format!("Duration is too large: {}", s))
}
