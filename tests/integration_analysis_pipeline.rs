use anyhow::Result;
use ppbench::cli::Metric;
use ppbench::render::{JsonRenderer, PlotRenderer, RScriptRenderer};
use ppbench::{
    aggregate, filter, load, AnalysisConfig, BenchError, FilterConfig, MeasurementRecord, PlotBuilder,
    PlotOptions, ResultsManager,
};
use std::path::Path;
use tempfile::TempDir;

fn record(experiment: &str, machine: &str, size: u64, tpr: f64) -> MeasurementRecord {
    MeasurementRecord {
        machine_tag: machine.to_string(),
        experiment_tag: experiment.to_string(),
        document: format!("/mping/{}", size),
        failed_count: 0,
        concurrency: 10,
        total_transferred: size,
        time_per_request: tpr,
        transfer_rate: size as f64 * 1000.0 / tpr,
        requests_per_second: 1000.0 / tpr,
        retries: 0,
        response_code: 200,
    }
}

/// Write `count` records spread over 1..500000 bytes
fn write_run(path: &Path, experiment: &str, machine: &str, count: u64, tpr: f64) -> Result<()> {
    let mut writer = ResultsManager::create(path)?;
    for i in 0..count {
        writer.append(&record(experiment, machine, 1 + i * (500_000 / count), tpr))?;
    }
    writer.finalize()?;
    Ok(())
}

/// Two runs loaded together are grouped per experiment and plotted with bands.
#[test]
fn absolute_plot_from_result_files() -> Result<()> {
    let dir = TempDir::new()?;
    let bare = dir.path().join("bare.csv");
    let weave = dir.path().join("weave.csv");
    write_run(&bare, "bare", "m3.large", 200, 2.0)?;
    write_run(&weave, "weave", "m3.large", 200, 4.0)?;

    let records = load(&[&bare, &weave])?;
    assert_eq!(records.len(), 400);

    let data = aggregate(&filter(&records, &FilterConfig::default()));
    assert_eq!(data.experiments().collect::<Vec<_>>(), vec!["bare", "weave"]);

    let config = AnalysisConfig::new(10, 0.05, Default::default())?;
    let options = PlotOptions {
        metric: Metric::Latency,
        with_bands: true,
        ..Default::default()
    };
    let plot = PlotBuilder::new(&config).absolute(&data, &options)?;
    assert_eq!(plot.series.len(), 2);
    assert_eq!(plot.series[0].name, "bare on m3.large");
    assert_eq!(plot.series[0].band.as_ref().map(|b| b.len()), Some(10));

    let script = RScriptRenderer::new().render(&plot)?;
    assert!(script.starts_with("plot("));
    assert!(script.contains("smooth.spline"));
    assert!(script.contains("'weave on m3.large'"));

    let json: serde_json::Value = serde_json::from_str(&JsonRenderer.render(&plot)?)?;
    assert_eq!(json["kind"], "absolute");
    assert_eq!(json["series"].as_array().map(|s| s.len()), Some(2));
    Ok(())
}

/// Ratios are computed bucket by bucket against the first selected series.
#[test]
fn comparison_against_reference_run() -> Result<()> {
    let dir = TempDir::new()?;
    let bare = dir.path().join("bare.csv");
    let weave = dir.path().join("weave.csv");
    write_run(&bare, "bare", "m3.large", 200, 2.0)?;
    write_run(&weave, "weave", "m3.large", 200, 4.0)?;

    let data = aggregate(&load(&[&bare, &weave])?);
    let config = AnalysisConfig::new(10, 0.05, Default::default())?;
    let options = PlotOptions {
        metric: Metric::Requests,
        experiments: vec!["bare".to_string(), "weave".to_string()],
        x_max: Some(500_000),
        ..Default::default()
    };
    let plot = PlotBuilder::new(&config).comparison(&data, &options)?;

    assert_eq!(plot.series[0].name, "Reference: bare on m3.large");
    let ratios = plot.series[1].line.as_ref().expect("comparison line");
    assert_eq!(ratios.len(), 10);
    for (_, ratio) in ratios {
        assert!((ratio - 0.5).abs() < 1e-12);
    }

    let script = RScriptRenderer::new().render(&plot)?;
    assert!(script.contains("labels = paste(ya/0.01, '%', sep = '')"));
    Ok(())
}

/// A sparse series leaves buckets empty and the comparison is refused.
#[test]
fn comparison_with_sparse_series_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let bare = dir.path().join("bare.csv");
    let sparse = dir.path().join("sparse.csv");
    write_run(&bare, "bare", "m3.large", 200, 2.0)?;
    write_run(&sparse, "sparse", "m3.large", 3, 2.0)?;

    let data = aggregate(&load(&[&bare, &sparse])?);
    let config = AnalysisConfig::new(20, 0.05, Default::default())?;
    let options = PlotOptions {
        x_max: Some(500_000),
        ..Default::default()
    };

    let result = PlotBuilder::new(&config).comparison(&data, &options);
    assert!(matches!(result, Err(BenchError::InsufficientData { .. })));
    Ok(())
}

/// Records above the size limit or with too many failures are dropped before grouping.
#[test]
fn filter_applies_to_loaded_files() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("mixed.csv");
    let mut writer = ResultsManager::create(&path)?;
    writer.append(&record("bare", "m1", 1000, 1.0))?;
    writer.append(&record("bare", "m1", 1001, 1.0))?;
    let mut failing = record("bare", "m2", 500, 1.0);
    failing.failed_count = 3;
    writer.append(&failing)?;
    writer.finalize()?;

    let records = load(&[&path])?;
    let config = FilterConfig {
        max_size: 1000,
        ..Default::default()
    };
    let kept = filter(&records, &config);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].total_transferred, 1000);

    // same file twice yields duplicated records
    assert_eq!(load(&[&path, &path])?.len(), 6);
    Ok(())
}
