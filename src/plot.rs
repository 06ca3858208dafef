//! # Plot Descriptors
//!
//! Turns aggregated series into a renderer-neutral [`PlotDescriptor`]: axes,
//! receive-window markers, and one [`SeriesSpec`] per experiment and machine
//! pair with its color, symbol, raw points, confidence band or ratio line.
//!
//! Building a descriptor runs every statistic up front, so an
//! [`BenchError::InsufficientData`] surfaces before anything is rendered.

use crate::cli::{LegendPosition, Metric};
use crate::dataset::{Aggregate, Series};
use crate::error::{BenchError, Result};
use crate::naming::Naming;
use crate::statistics::{self, BucketSummary, ConfidenceLevels};
use crate::utils;
use serde::Serialize;
use tracing::debug;

/// Series colors as R `rgb()` components, assigned in order and cycled
pub const PALETTE: [&str; 10] = [
    "0.5,0.5,0.5",
    "0.96,0.26,0.21",
    "0.25,0.31,0.71",
    "0.13,0.59,0.95",
    "0,0.59,0.53",
    "0.30,0.69,0.31",
    "0.8,0.86,0.22",
    "1,0.6,0.03",
    "1,0.6,0",
    "1,0.34,0.13",
];

/// Legend prefix of the series every comparison is relative to
pub const REFERENCE_PREFIX: &str = "Reference: ";

/// Analysis-wide settings shared by every plot of an invocation
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Number of size buckets for bands and comparisons
    pub precision: usize,
    /// Opacity of scatter points
    pub alpha: f64,
    pub naming: Naming,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            precision: crate::defaults::PRECISION,
            alpha: crate::defaults::ALPHA,
            naming: Naming::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn new(precision: usize, alpha: f64, naming: Naming) -> Result<Self> {
        if precision == 0 {
            return Err(BenchError::invalid("Precision cannot be zero"));
        }
        utils::validate_alpha(alpha)?;
        Ok(Self {
            precision,
            alpha,
            naming,
        })
    }
}

/// Per-plot options; `None` maxima fall back to the observed data
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub metric: Metric,
    /// Experiment order of the legend (empty: first-seen order)
    pub experiments: Vec<String>,
    /// Machine order of the legend (empty: first-seen order)
    pub machines: Vec<String>,
    pub x_max: Option<u64>,
    pub y_max: Option<f64>,
    pub x_steps: u32,
    pub y_steps: Option<u32>,
    /// TCP receive window in bytes, 0 disables the markers
    pub receive_window: u64,
    pub confidence: f64,
    pub with_bands: bool,
    pub no_points: bool,
    pub title: Option<String>,
    pub subtitle: String,
    pub legend: LegendPosition,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Latency,
            experiments: Vec::new(),
            machines: Vec::new(),
            x_max: None,
            y_max: None,
            x_steps: crate::defaults::AXIS_STEPS,
            y_steps: None,
            receive_window: crate::defaults::RECEIVE_WINDOW,
            confidence: crate::defaults::CONFIDENCE,
            with_bands: false,
            no_points: false,
            title: None,
            subtitle: String::new(),
            legend: LegendPosition::TopRight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    Absolute,
    Comparison,
}

/// One axis from 0 to `max`; tick labels show `value / divisor` and `unit`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
    pub unit: String,
    pub max: f64,
    pub steps: u32,
    pub divisor: f64,
}

impl Axis {
    /// Tick positions `0, max/steps, ..., max`
    pub fn ticks(&self) -> Vec<f64> {
        if self.steps == 0 {
            return vec![0.0, self.max];
        }
        let step = self.max / self.steps as f64;
        (0..=self.steps).map(|i| i as f64 * step).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSpec {
    /// Legend text
    pub name: String,
    pub experiment: String,
    pub machine: String,
    /// R `rgb()` components from [`PALETTE`]
    pub color: String,
    /// Point symbol, counting from 1
    pub symbol: u32,
    /// Raw `(size, value)` scatter points
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<(u64, f64)>>,
    /// Bucketed median and confidence percentiles
    #[serde(skip_serializing_if = "Option::is_none")]
    pub band: Option<Vec<BucketSummary>>,
    /// Bucketed ratio against the reference series
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Vec<(u64, f64)>>,
}

/// Everything a renderer needs, with all statistics already computed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotDescriptor {
    pub kind: PlotKind,
    pub title: String,
    pub subtitle: String,
    pub x: Axis,
    pub y: Axis,
    /// Vertical guide positions
    pub markers: Vec<u64>,
    pub legend_position: LegendPosition,
    /// Opacity of scatter points
    pub alpha: f64,
    /// Spline knots used to smooth bands and lines
    pub smoothing_knots: usize,
    /// Whether the legend shows per-series point symbols
    pub legend_symbols: bool,
    pub series: Vec<SeriesSpec>,
}

/// Multiples of the receive window up to `x_max`
pub fn receive_window_markers(receive_window: u64, x_max: u64) -> Vec<u64> {
    if receive_window == 0 || receive_window >= x_max {
        return Vec::new();
    }
    (1..)
        .map(|k| k * receive_window)
        .take_while(|&x| x <= x_max)
        .collect()
}

fn message_length_axis(x_max: u64, steps: u32) -> Axis {
    Axis {
        title: "Message Length".to_string(),
        unit: "kB".to_string(),
        max: x_max as f64,
        steps,
        divisor: 1000.0,
    }
}

pub struct PlotBuilder<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> PlotBuilder<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    fn selected<'d>(
        &self,
        aggregate: &'d Aggregate,
        options: &PlotOptions,
    ) -> Result<Vec<(&'d str, &'d str, &'d Series)>> {
        let selected = aggregate.select(&options.experiments, &options.machines);
        if selected.is_empty() {
            return Err(BenchError::invalid(
                "no series left to plot; check the experiment and machine selection",
            ));
        }
        Ok(selected)
    }

    /// Supplied x range, or the next multiple of the precision above the
    /// largest size so that the largest records fall into the last bucket
    fn x_max(&self, aggregate: &Aggregate, options: &PlotOptions) -> u64 {
        options.x_max.unwrap_or_else(|| {
            let precision = self.config.precision.max(1) as u64;
            (aggregate.max_size() / precision + 1) * precision
        })
    }

    /// Scatter points and optional confidence bands of absolute values
    pub fn absolute(&self, aggregate: &Aggregate, options: &PlotOptions) -> Result<PlotDescriptor> {
        let metric = options.metric;
        let selected = self.selected(aggregate, options)?;
        let x_max = self.x_max(aggregate, options);
        let y_max = options.y_max.unwrap_or_else(|| aggregate.maximum(metric));

        let levels = if options.with_bands {
            utils::validate_confidence(options.confidence)?;
            utils::validate_precision(self.config.precision, x_max)?;
            Some(ConfidenceLevels::from_confidence(options.confidence))
        } else {
            None
        };

        let mut series = Vec::with_capacity(selected.len());
        for (i, (experiment, machine, records)) in selected.into_iter().enumerate() {
            let points = (!options.no_points).then(|| {
                records
                    .iter()
                    .map(|r| (r.total_transferred, metric.value(r)))
                    .collect()
            });
            let band = match levels {
                Some(levels) => Some(statistics::bin(
                    records,
                    metric,
                    self.config.precision,
                    x_max,
                    levels,
                )?),
                None => None,
            };

            debug!(
                "Series {} on {}: {} records, band {}",
                experiment,
                machine,
                records.len(),
                band.is_some()
            );
            series.push(SeriesSpec {
                name: self.config.naming.series_name(experiment, machine),
                experiment: experiment.to_string(),
                machine: machine.to_string(),
                color: PALETTE[i % PALETTE.len()].to_string(),
                symbol: i as u32 + 1,
                points,
                band,
                line: None,
            });
        }

        Ok(PlotDescriptor {
            kind: PlotKind::Absolute,
            title: options
                .title
                .clone()
                .unwrap_or_else(|| metric.title().to_string()),
            subtitle: options.subtitle.clone(),
            x: message_length_axis(x_max, options.x_steps),
            y: Axis {
                title: metric.to_string(),
                unit: metric.unit().to_string(),
                max: y_max,
                steps: options.y_steps.unwrap_or(crate::defaults::AXIS_STEPS),
                divisor: metric.divisor(),
            },
            markers: receive_window_markers(options.receive_window, x_max),
            legend_position: options.legend,
            alpha: self.config.alpha,
            smoothing_knots: self.config.precision,
            legend_symbols: !options.no_points,
            series,
        })
    }

    /// Ratio lines of every selected series against the first one
    pub fn comparison(&self, aggregate: &Aggregate, options: &PlotOptions) -> Result<PlotDescriptor> {
        let metric = options.metric;
        let selected = self.selected(aggregate, options)?;
        let x_max = self.x_max(aggregate, options);
        utils::validate_precision(self.config.precision, x_max)?;

        let reference = selected[0].2;
        let mut series = Vec::with_capacity(selected.len());
        for (i, (experiment, machine, records)) in selected.iter().enumerate() {
            let line = statistics::compare(reference, records, metric, self.config.precision, x_max)?;
            let name = self.config.naming.series_name(experiment, machine);

            series.push(SeriesSpec {
                name: if i == 0 {
                    format!("{}{}", REFERENCE_PREFIX, name)
                } else {
                    name
                },
                experiment: experiment.to_string(),
                machine: machine.to_string(),
                color: PALETTE[i % PALETTE.len()].to_string(),
                symbol: i as u32 + 1,
                points: None,
                band: None,
                line: Some(line),
            });
        }

        Ok(PlotDescriptor {
            kind: PlotKind::Comparison,
            title: options
                .title
                .clone()
                .unwrap_or_else(|| format!("Relative performance ({})", metric)),
            subtitle: options.subtitle.clone(),
            x: message_length_axis(x_max, options.x_steps),
            y: Axis {
                title: "Relative performance compared with reference experiment".to_string(),
                unit: "%".to_string(),
                max: options.y_max.unwrap_or(crate::defaults::COMPARISON_Y_MAX),
                steps: options
                    .y_steps
                    .unwrap_or(crate::defaults::COMPARISON_Y_STEPS),
                divisor: 0.01,
            },
            markers: receive_window_markers(options.receive_window, x_max),
            legend_position: options.legend,
            alpha: self.config.alpha,
            smoothing_knots: self.config.precision,
            legend_symbols: false,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::aggregate;
    use crate::results::MeasurementRecord;

    fn record(experiment: &str, machine: &str, size: u64, tpr: f64) -> MeasurementRecord {
        MeasurementRecord {
            machine_tag: machine.to_string(),
            experiment_tag: experiment.to_string(),
            document: format!("/mping/{}", size),
            failed_count: 0,
            concurrency: 1,
            total_transferred: size,
            time_per_request: tpr,
            transfer_rate: size as f64 * 1000.0 / tpr,
            requests_per_second: 1000.0 / tpr,
            retries: 0,
            response_code: 200,
        }
    }

    /// Two experiments on one machine, 100 records each over 1..500000
    fn data() -> Aggregate {
        let mut records = Vec::new();
        for i in 0..100 {
            let size = 1 + i * 5000;
            records.push(record("bare", "m3.large", size, 2.0));
            records.push(record("docker", "m3.large", size, 3.0));
        }
        aggregate(&records)
    }

    fn config(precision: usize) -> AnalysisConfig {
        AnalysisConfig::new(precision, 0.05, Naming::default()).unwrap()
    }

    #[test]
    fn test_receive_window_markers() {
        assert_eq!(receive_window_markers(87380, 500000).len(), 5);
        assert_eq!(receive_window_markers(87380, 500000)[1], 174760);
        assert!(receive_window_markers(0, 500000).is_empty());
        assert!(receive_window_markers(87380, 50000).is_empty());
    }

    #[test]
    fn test_axis_ticks() {
        let axis = message_length_axis(500000, 10);
        let ticks = axis.ticks();
        assert_eq!(ticks.len(), 11);
        assert_eq!(ticks[1], 50000.0);
        assert_eq!(ticks[10], 500000.0);
    }

    #[test]
    fn test_absolute_defaults_follow_data() {
        let config = config(10);
        let plot = PlotBuilder::new(&config)
            .absolute(&data(), &PlotOptions::default())
            .unwrap();

        assert_eq!(plot.kind, PlotKind::Absolute);
        assert_eq!(plot.x.max, 495010.0);
        assert_eq!(plot.y.max, 3.0);
        assert_eq!(plot.y.unit, "ms");
        assert_eq!(plot.series.len(), 2);
        assert_eq!(plot.series[0].name, "bare on m3.large");
        assert_eq!(plot.series[0].color, PALETTE[0]);
        assert_eq!(plot.series[1].symbol, 2);
        assert_eq!(plot.series[0].points.as_ref().unwrap().len(), 100);
        assert!(plot.series[0].band.is_none());
        assert!(plot.legend_symbols);
    }

    #[test]
    fn test_absolute_with_bands() {
        let config = config(10);
        let options = PlotOptions {
            with_bands: true,
            no_points: true,
            x_max: Some(500000),
            ..Default::default()
        };
        let plot = PlotBuilder::new(&config).absolute(&data(), &options).unwrap();

        let band = plot.series[1].band.as_ref().unwrap();
        assert_eq!(band.len(), 10);
        assert!(band.iter().all(|b| (b.median - 3.0).abs() < 1e-9));
        assert!(plot.series[1].points.is_none());
        assert!(!plot.legend_symbols);
    }

    #[test]
    fn test_default_range_bins_largest_records() {
        let mut records: Vec<MeasurementRecord> =
            (0..100).map(|i| record("bare", "m3.large", 1 + i * 5000, 2.0)).collect();
        records.push(record("bare", "m3.large", 600000, 8.0));

        let config = config(10);
        let options = PlotOptions {
            with_bands: true,
            ..Default::default()
        };
        let plot = PlotBuilder::new(&config)
            .absolute(&aggregate(&records), &options)
            .unwrap();

        assert_eq!(plot.x.max, 600010.0);
        let band = plot.series[0].band.as_ref().unwrap();
        assert_eq!(band.len(), 10);
        assert_eq!(band[9].x, 600010);
        assert_eq!(band[9].median, 8.0);
    }

    #[test]
    fn test_bands_with_too_high_precision_fail() {
        let config = config(200);
        let options = PlotOptions {
            with_bands: true,
            x_max: Some(500000),
            ..Default::default()
        };
        assert!(matches!(
            PlotBuilder::new(&config).absolute(&data(), &options),
            Err(BenchError::InsufficientData { precision: 200, .. })
        ));
    }

    #[test]
    fn test_comparison_marks_reference() {
        let config = config(10);
        let options = PlotOptions {
            metric: Metric::Latency,
            experiments: vec!["docker".to_string(), "bare".to_string()],
            x_max: Some(500000),
            ..Default::default()
        };
        let plot = PlotBuilder::new(&config).comparison(&data(), &options).unwrap();

        assert_eq!(plot.kind, PlotKind::Comparison);
        assert_eq!(plot.series[0].name, "Reference: docker on m3.large");
        assert_eq!(plot.series[1].name, "bare on m3.large");
        assert_eq!(plot.y.max, 2.0);
        assert_eq!(plot.y.steps, 20);
        for (_, ratio) in plot.series[0].line.as_ref().unwrap() {
            assert!((ratio - 1.0).abs() < 1e-12);
        }
        for (_, ratio) in plot.series[1].line.as_ref().unwrap() {
            assert!((ratio - 2.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let config = config(10);
        let options = PlotOptions {
            machines: vec!["unknown".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            PlotBuilder::new(&config).absolute(&data(), &options),
            Err(BenchError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_naming_overlay_is_used_for_legend() {
        let naming = Naming::from_json(r#"{"experiments": {"bare": "Bare metal"}}"#).unwrap();
        let config = AnalysisConfig::new(10, 0.1, naming).unwrap();
        let plot = PlotBuilder::new(&config)
            .absolute(&data(), &PlotOptions::default())
            .unwrap();
        assert_eq!(plot.series[0].name, "Bare metal on m3.large");
        assert_eq!(plot.alpha, 0.1);
    }
}
