use anyhow::Result;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

use crate::results::MeasurementRecord;

/// Percentile value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value_ms: f64,
}

/// Distribution of per-trial time per request over a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencySummary {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
    pub std_dev_ms: f64,
    pub percentiles: Vec<PercentileValue>,
    pub total_samples: u64,
}

/// Run-level collector fed by the driver for every finished trial
///
/// Latencies are kept in an HDR histogram at microsecond resolution, which
/// is plenty for millisecond-scale HTTP round trips.
pub struct RunMetrics {
    histogram: Histogram<u64>,
    records: usize,
    skipped: usize,
    failed_attempts: u64,
    retries: u64,
}

impl RunMetrics {
    /// Create a new collector
    pub fn new() -> Result<Self> {
        // 3 significant figures, auto-resizing
        let histogram = Histogram::<u64>::new(3)?;

        Ok(Self {
            histogram,
            records: 0,
            skipped: 0,
            failed_attempts: 0,
            retries: 0,
        })
    }

    /// Account for a record that was written
    pub fn record(&mut self, record: &MeasurementRecord) -> Result<()> {
        let micros = (record.time_per_request * 1000.0).round().max(1.0) as u64;
        self.histogram.record(micros)?;
        self.records += 1;
        self.failed_attempts += record.failed_count;
        self.retries += record.retries;
        Ok(())
    }

    /// Account for a trial whose attempts all failed
    pub fn record_skipped(&mut self, failed_attempts: u64) {
        self.skipped += 1;
        self.failed_attempts += failed_attempts;
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    /// Summarize the recorded latencies, `None` when nothing was recorded
    pub fn latency_summary(&self, percentiles: &[f64]) -> Option<LatencySummary> {
        if self.histogram.len() == 0 {
            return None;
        }

        let to_ms = |micros: u64| micros as f64 / 1000.0;
        let percentiles = percentiles
            .iter()
            .map(|&p| PercentileValue {
                percentile: p,
                value_ms: to_ms(self.histogram.value_at_percentile(p)),
            })
            .collect();

        Some(LatencySummary {
            min_ms: to_ms(self.histogram.min()),
            max_ms: to_ms(self.histogram.max()),
            mean_ms: self.histogram.mean() / 1000.0,
            median_ms: to_ms(self.histogram.value_at_percentile(50.0)),
            std_dev_ms: self.histogram.stdev() / 1000.0,
            percentiles,
            total_samples: self.histogram.len(),
        })
    }
}
