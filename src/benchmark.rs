//! # Benchmark Driver Module
//!
//! This module runs a complete ping pong benchmark: it draws random message
//! sizes, lets a fixed pool of workers collect one measurement record per
//! trial, and appends every record to the run's result file.
//!
//! ## Key Components
//!
//! - **BenchmarkConfig**: Validated parameters of one run
//! - **BenchmarkRunner**: Owns the worker pool and the single result writer
//!
//! ## Run Lifecycle
//!
//! 1. **Preflight**: Refuse to start when the result file already exists
//! 2. **Scheduling**: `floor((max - min) * coverage)` trials, each with a
//!    uniformly drawn size in `[min, max]`
//! 3. **Collection**: `concurrency` tokio tasks pull trial indices from a
//!    shared counter until all trials are taken
//! 4. **Recording**: Each non-empty result is appended under one writer lock
//!    and flushed immediately
//! 5. **Summary**: Counters and the latency distribution become a
//!    [`RunSummary`]
//!
//! Trials complete in no particular order. A trial whose attempts all failed
//! leaves no record; it is counted as skipped.

use crate::{
    cli::{EndpointMode, RunArgs},
    collector::{collect, Endpoint, RecordTags, TrialRequest},
    metrics::RunMetrics,
    results::{ensure_output_available, ResultsManager, RunSummary, SystemInfo},
    utils::{self, create_progress_indicator},
};
use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Percentiles reported in the run summary
const SUMMARY_PERCENTILES: [f64; 4] = [50.0, 95.0, 99.0, 99.9];

/// Number of progress reports over a run (one every 5%)
const PROGRESS_REPORTS: usize = 20;

/// Single source of truth for the run banner
struct BenchmarkConfigDisplay<'a> {
    config: &'a BenchmarkConfig,
}

impl<'a> std::fmt::Display for BenchmarkConfigDisplay<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config;
        writeln!(
            f,
            "-----------------------------------------------------------------"
        )?;
        writeln!(f, "Starting Ping Pong Benchmark against: {}", config.host)?;
        writeln!(f, "  Mode:               {}", config.mode)?;
        writeln!(f, "  Document Path:      {}/<size>", config.path)?;
        writeln!(
            f,
            "  Message Sizes:      {} .. {}",
            utils::format_bytes(config.min),
            utils::format_bytes(config.max)
        )?;
        writeln!(
            f,
            "  Trials:             {} (coverage {})",
            config.trial_count(),
            config.coverage
        )?;
        writeln!(f, "  Repetitions:        {}", config.repetitions)?;
        writeln!(f, "  Concurrency:        {}", config.concurrency)?;
        writeln!(
            f,
            "  Timeout:            {}",
            utils::format_duration(config.timeout)
        )?;
        if config.mode == EndpointMode::Retrying {
            writeln!(f, "  Max Tries:          {}", config.max_tries)?;
        }
        writeln!(f, "  Machine Tag:        {:?}", config.machine_tag)?;
        writeln!(f, "  Experiment Tag:     {:?}", config.experiment_tag)?;
        writeln!(f, "  Output:             {}", config.output.display())?;
        write!(
            f,
            "-----------------------------------------------------------------"
        )
    }
}

/// Configuration for one benchmark run
///
/// Built once from the command line by [`BenchmarkConfig::from_args`], which
/// validates every value; the runner relies on that.
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    /// Result file to create
    pub output: PathBuf,

    /// Base URL of the ping service
    pub host: String,

    /// Document path prefix, the size is appended
    pub path: String,

    pub mode: EndpointMode,

    /// Tries per attempt in retrying mode
    pub max_tries: u32,

    /// Smallest message size in bytes
    pub min: u64,

    /// Largest message size in bytes (inclusive)
    pub max: u64,

    /// Fraction of the size range sampled as trials
    pub coverage: f64,

    /// Number of concurrent workers
    pub concurrency: usize,

    /// Sequential requests per trial
    pub repetitions: usize,

    /// Bound of a single request
    pub timeout: Duration,

    pub machine_tag: String,
    pub experiment_tag: String,
}

impl BenchmarkConfig {
    /// Create a validated configuration from the `run` arguments
    pub fn from_args(args: &RunArgs) -> Result<Self> {
        utils::validate_size_range(args.min, args.max)?;
        utils::validate_coverage(args.coverage)?;
        utils::validate_concurrency(args.concurrency)?;
        utils::validate_repetitions(args.repetitions)?;
        utils::validate_timeout(args.timeout)?;
        if args.max_tries == 0 {
            return Err(anyhow!("--max-tries must be at least 1"));
        }
        let host = reqwest::Url::parse(&args.host)
            .with_context(|| format!("Invalid host URL {:?}", args.host))?;
        if !matches!(host.scheme(), "http" | "https") {
            return Err(anyhow!("Host URL {:?} must use http or https", args.host));
        }

        Ok(Self {
            output: args.output.clone(),
            host: args.host.clone(),
            path: args.path.clone(),
            mode: args.mode,
            max_tries: args.max_tries,
            min: args.min,
            max: args.max,
            coverage: args.coverage,
            concurrency: args.concurrency,
            repetitions: args.repetitions,
            timeout: args.timeout,
            machine_tag: args.machine.clone(),
            experiment_tag: args.experiment.clone(),
        })
    }

    /// Number of trials of the run, `floor((max - min) * coverage)`
    pub fn trial_count(&self) -> usize {
        ((self.max - self.min) as f64 * self.coverage).floor() as usize
    }

    fn record_tags(&self) -> RecordTags {
        RecordTags {
            machine_tag: self.machine_tag.clone(),
            experiment_tag: self.experiment_tag.clone(),
            concurrency: self.concurrency as u64,
        }
    }
}

/// State shared by all workers behind the writer lock
struct RunState {
    writer: ResultsManager,
    metrics: RunMetrics,
}

/// Benchmark runner
///
/// ```rust,no_run
/// # use ppbench::benchmark::{BenchmarkConfig, BenchmarkRunner};
/// # use ppbench::cli::{Args, Command};
/// # use ppbench::collector::create_endpoint;
/// # use clap::Parser;
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let args = Args::parse_from(["ppbench", "run", "log.csv", "--host", "http://10.0.0.2:8080"]);
/// let Command::Run(run) = args.command else { unreachable!() };
/// let config = BenchmarkConfig::from_args(&run)?;
/// let endpoint = create_endpoint(config.mode, &config.host, &config.path, config.max_tries)?;
/// let summary = BenchmarkRunner::new(config).run(endpoint).await?;
/// println!("{} records written", summary.records_written);
/// # Ok(())
/// # }
/// ```
pub struct BenchmarkRunner {
    config: BenchmarkConfig,
}

impl BenchmarkRunner {
    pub fn new(config: BenchmarkConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run all trials against `endpoint` and write the result file
    ///
    /// Fails before any request is sent when the output file exists.
    pub async fn run(&self, endpoint: Arc<dyn Endpoint>) -> Result<RunSummary> {
        ensure_output_available(&self.config.output)?;

        info!("\n{}", BenchmarkConfigDisplay { config: &self.config });

        let trials = self.config.trial_count();
        let writer = ResultsManager::create(&self.config.output)?;
        let state = Arc::new(Mutex::new(RunState {
            writer,
            metrics: RunMetrics::new()?,
        }));
        let next_trial = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let tags = Arc::new(self.config.record_tags());

        let workers = self.config.concurrency.min(trials);
        let start_time = Instant::now();
        let mut pool = JoinSet::new();

        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                endpoint: Arc::clone(&endpoint),
                state: Arc::clone(&state),
                next_trial: Arc::clone(&next_trial),
                completed: Arc::clone(&completed),
                tags: Arc::clone(&tags),
                trials,
                min: self.config.min,
                max: self.config.max,
                repetitions: self.config.repetitions,
                timeout: self.config.timeout,
            };
            pool.spawn(worker.run());
        }

        // The first failing worker ends the run; the rest are cancelled and
        // joined so that none of them still holds the writer afterwards.
        let mut first_error = None;
        while let Some(joined) = pool.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) if e.is_cancelled() => Ok(()),
                Err(e) => Err(anyhow::Error::new(e).context("Benchmark worker panicked")),
            };
            if let Err(e) = outcome {
                if first_error.is_none() {
                    next_trial.store(trials, Ordering::Relaxed);
                    pool.abort_all();
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        let wall_time = start_time.elapsed();

        let RunState { writer, metrics } = Arc::try_unwrap(state)
            .map_err(|_| anyhow!("Result writer is still shared after all workers finished"))?
            .into_inner();
        let records_written = writer.finalize()?;

        let summary = RunSummary {
            output_file: self.config.output.clone(),
            machine_tag: self.config.machine_tag.clone(),
            experiment_tag: self.config.experiment_tag.clone(),
            trials,
            records_written,
            trials_skipped: metrics.skipped(),
            failed_attempts: metrics.failed_attempts(),
            retries: metrics.retries(),
            time_per_request: metrics.latency_summary(&SUMMARY_PERCENTILES),
            wall_time,
            timestamp: chrono::Utc::now(),
            system_info: SystemInfo::default(),
        };

        info!(
            "Benchmark finished in {}: {} of {} trials recorded, {} skipped, {} failed requests",
            utils::format_duration(wall_time),
            summary.records_written,
            trials,
            summary.trials_skipped,
            summary.failed_attempts
        );
        Ok(summary)
    }
}

/// One member of the worker pool
struct Worker {
    id: usize,
    endpoint: Arc<dyn Endpoint>,
    state: Arc<Mutex<RunState>>,
    next_trial: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
    tags: Arc<RecordTags>,
    trials: usize,
    min: u64,
    max: u64,
    repetitions: usize,
    timeout: Duration,
}

impl Worker {
    async fn run(self) -> Result<()> {
        let report_every = (self.trials / PROGRESS_REPORTS).max(1);
        let mut handled = 0usize;

        while self.next_trial.fetch_add(1, Ordering::Relaxed) < self.trials {
            let size = rand::thread_rng().gen_range(self.min..=self.max);
            let trial = TrialRequest {
                size,
                timeout: self.timeout,
            };

            let record = collect(self.endpoint.as_ref(), trial, self.repetitions, &self.tags).await;

            {
                let mut state = self.state.lock();
                match record {
                    Some(record) => {
                        state
                            .writer
                            .append(&record)
                            .with_context(|| format!("Failed to append record for size {}", size))?;
                        state.metrics.record(&record)?;
                    }
                    None => state.metrics.record_skipped(self.repetitions as u64),
                }
            }
            handled += 1;

            let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % report_every == 0 || done == self.trials {
                info!(
                    "Running {} {:>3}% ({}/{})",
                    create_progress_indicator(done, self.trials, 40),
                    done * 100 / self.trials,
                    done,
                    self.trials
                );
            }
        }

        debug!("Worker {} finished after {} trials", self.id, handled);
        Ok(())
    }
}
