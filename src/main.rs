//! # Ping Pong Benchmark - Main Entry Point
//!
//! The binary has four subcommands:
//!
//! 1. **run**: Benchmark a ping service and write one CSV result file
//! 2. **plot**: Render absolute values of one or more result files
//! 3. **compare**: Render every series relative to a reference series
//! 4. **summary**: Print a per experiment and machine overview
//!
//! Plots are written to stdout (or `-o FILE`) while all logging goes to
//! stderr, so `ppbench plot ... | Rscript -` works. Fatal errors are logged
//! and the process exits with status 1; nothing is rendered once an analysis
//! step has failed.

use anyhow::{Context, Result};
use clap::Parser;
use ppbench::{
    benchmark::{BenchmarkConfig, BenchmarkRunner},
    cli::{Args, ChartArgs, Command, CompareArgs, Metric, OutputFormat, PlotArgs, RunArgs, SelectionArgs, SummaryArgs},
    collector::create_endpoint,
    dataset::{aggregate, filter, Aggregate, FilterConfig},
    logging::init_logging,
    naming::Naming,
    plot::{AnalysisConfig, PlotBuilder, PlotOptions},
    render::{Export, ExportFormat, JsonRenderer, PlotRenderer, RScriptRenderer},
    results::{self, RunSummary},
    statistics, utils,
};
use std::path::Path;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let guard = init_logging(args.verbose, args.quiet, args.log_file.as_deref())?;
    debug!("Arguments: {:?}", args);

    if let Err(e) = dispatch(args).await {
        error!("{:#}", e);
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(args: Args) -> Result<()> {
    match &args.command {
        Command::Run(run) => run_benchmark(run).await,
        Command::Plot(plot) => plot_absolute(&args, plot),
        Command::Compare(compare) => plot_comparison(&args, compare),
        Command::Summary(summary) => print_summary(summary),
    }
}

async fn run_benchmark(run: &RunArgs) -> Result<()> {
    let config = BenchmarkConfig::from_args(run)?;
    let endpoint = create_endpoint(config.mode, &config.host, &config.path, config.max_tries)?;

    let summary = BenchmarkRunner::new(config).run(endpoint).await?;
    report_run(&summary);

    if let Some(path) = &run.summary_output {
        summary
            .write_json(path)
            .with_context(|| format!("Failed to write run summary to {:?}", path))?;
    }
    Ok(())
}

fn report_run(summary: &RunSummary) {
    let widths = [24, 16];
    utils::print_table_separator(&widths);
    utils::print_table_row(&["Run", &summary.output_file.display().to_string()], &widths);
    utils::print_table_separator(&widths);
    utils::print_table_row(&["Trials", &summary.trials.to_string()], &widths);
    utils::print_table_row(&["Records written", &summary.records_written.to_string()], &widths);
    utils::print_table_row(&["Trials skipped", &summary.trials_skipped.to_string()], &widths);
    utils::print_table_row(&["Failed requests", &summary.failed_attempts.to_string()], &widths);
    utils::print_table_row(&["Retries", &summary.retries.to_string()], &widths);
    utils::print_table_row(&["Wall time", &utils::format_duration(summary.wall_time)], &widths);
    if let Some(latency) = &summary.time_per_request {
        utils::print_table_row(&["Mean time per request", &utils::format_millis(latency.mean_ms)], &widths);
        for p in &latency.percentiles {
            let label = format!("P{} time per request", p.percentile);
            utils::print_table_row(&[&label, &utils::format_millis(p.value_ms)], &widths);
        }
    }
    utils::print_table_separator(&widths);
}

fn analysis_config(args: &Args) -> Result<AnalysisConfig> {
    let naming = match &args.naming {
        Some(path) => Naming::load(path)
            .with_context(|| format!("Failed to load naming overlay {:?}", path))?,
        None => Naming::default(),
    };
    Ok(AnalysisConfig::new(args.precision, args.alpha, naming)?)
}

fn load_dataset(selection: &SelectionArgs) -> Result<Aggregate> {
    let records = results::load(&selection.files)
        .with_context(|| format!("Failed to load result files {:?}", selection.files))?;

    let config = FilterConfig {
        max_size: selection.max_size.unwrap_or(u64::MAX),
        experiments: selection.experiments.clone(),
        machines: selection.machines.clone(),
        max_failed: selection.max_failed,
    };
    let kept = filter(&records, &config);
    info!(
        "Loaded {} records from {} files, {} pass the filter",
        records.len(),
        selection.files.len(),
        kept.len()
    );
    if kept.is_empty() {
        warn!("No records left after filtering");
    }
    Ok(aggregate(&kept))
}

fn plot_options(selection: &SelectionArgs, chart: &ChartArgs, metric: Metric) -> PlotOptions {
    PlotOptions {
        metric,
        experiments: selection.experiments.clone(),
        machines: selection.machines.clone(),
        x_max: chart.x_max,
        y_max: chart.y_max,
        x_steps: chart.x_steps,
        y_steps: chart.y_steps,
        receive_window: chart.receive_window,
        title: chart.title.clone(),
        subtitle: chart.subtitle.clone(),
        legend: chart.legend,
        ..Default::default()
    }
}

fn renderer(chart: &ChartArgs) -> Result<Box<dyn PlotRenderer>> {
    let export = match (&chart.pdf, &chart.png) {
        (Some(file), _) => Some((ExportFormat::Pdf, file)),
        (None, Some(file)) => Some((ExportFormat::Png, file)),
        (None, None) => None,
    };

    match chart.format {
        OutputFormat::Json => {
            if export.is_some() {
                warn!("--pdf/--png only apply to R output, ignored for JSON");
            }
            Ok(Box::new(JsonRenderer))
        }
        OutputFormat::R => match export {
            Some((format, file)) => {
                if chart.width <= 0.0 || chart.height <= 0.0 {
                    anyhow::bail!("Figure size {}x{} cm must be positive", chart.width, chart.height);
                }
                Ok(Box::new(RScriptRenderer::with_export(Export {
                    format,
                    width_cm: chart.width,
                    height_cm: chart.height,
                    file: file.clone(),
                })))
            }
            None => Ok(Box::new(RScriptRenderer::new())),
        },
    }
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Plot written to {:?}", path);
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn plot_absolute(args: &Args, plot: &PlotArgs) -> Result<()> {
    let config = analysis_config(args)?;
    let data = load_dataset(&plot.selection)?;
    let options = PlotOptions {
        confidence: plot.confidence,
        with_bands: plot.with_bands,
        no_points: plot.no_points,
        ..plot_options(&plot.selection, &plot.chart, plot.metric)
    };

    let descriptor = PlotBuilder::new(&config).absolute(&data, &options)?;
    let text = renderer(&plot.chart)?.render(&descriptor)?;
    write_output(&text, plot.chart.output.as_deref())
}

fn plot_comparison(args: &Args, compare: &CompareArgs) -> Result<()> {
    let config = analysis_config(args)?;
    let data = load_dataset(&compare.selection)?;
    let options = plot_options(&compare.selection, &compare.chart, compare.metric);

    let descriptor = PlotBuilder::new(&config).comparison(&data, &options)?;
    let text = renderer(&compare.chart)?.render(&descriptor)?;
    write_output(&text, compare.chart.output.as_deref())
}

fn print_summary(summary: &SummaryArgs) -> Result<()> {
    let data = load_dataset(&summary.selection)?;
    let widths = [16, 16, 8, 22, 12, 14, 12];

    utils::print_table_separator(&widths);
    utils::print_table_row(
        &["Experiment", "Machine", "Records", "Message sizes", "Latency", "Transfer rate", "Requests"],
        &widths,
    );
    utils::print_table_separator(&widths);

    for (experiment, machine, series) in data.select(&summary.selection.experiments, &summary.selection.machines) {
        let median_of = |metric: Metric| {
            let values: Vec<f64> = series.iter().map(|r| metric.value(r)).collect();
            statistics::median(&values)
        };
        let sizes = match (series.first(), series.last()) {
            (Some(first), Some(last)) => format!(
                "{} - {}",
                utils::format_bytes(first.total_transferred),
                utils::format_bytes(last.total_transferred)
            ),
            _ => String::from("-"),
        };

        utils::print_table_row(
            &[
                experiment,
                machine,
                &series.len().to_string(),
                &sizes,
                &utils::format_millis(median_of(Metric::Latency)),
                &utils::format_rate(median_of(Metric::TransferRate)),
                &utils::format_request_rate(median_of(Metric::Requests)),
            ],
            &widths,
        );
    }
    utils::print_table_separator(&widths);
    Ok(())
}
