//! # Statistics Engine
//!
//! Bins a series by message size into fixed-width buckets and summarizes
//! each bucket by its median and four confidence percentiles, or aligns two
//! series bucket by bucket and reports the ratio of their medians.
//!
//! Every operation here is a pure function over borrowed records. An empty
//! bucket is never skipped: downstream smoothing needs a complete, evenly
//! spaced series, so it aborts the whole call with
//! [`BenchError::InsufficientData`].

use crate::cli::Metric;
use crate::error::{BenchError, Result};
use crate::results::MeasurementRecord;
use serde::{Deserialize, Serialize};

/// Percentile of an ascending slice using linear interpolation between the
/// closest ranks (`index = p/100 * (n-1)`), the R type 7 / NumPy default.
///
/// Returns `NaN` for an empty slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }

    let index = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower_index = index.floor() as usize;
    let upper_index = index.ceil() as usize;

    if lower_index == upper_index {
        sorted[lower_index]
    } else {
        let lower_value = sorted[lower_index];
        let upper_value = sorted[upper_index];
        let weight = index - lower_index as f64;
        lower_value + weight * (upper_value - lower_value)
    }
}

/// Median of unsorted values; `NaN` when empty
pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile(&sorted, 50.0)
}

/// Arithmetic mean; `NaN` when empty
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// The four percentiles that outline a confidence band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceLevels {
    pub low: f64,
    pub semi_low: f64,
    pub semi_high: f64,
    pub high: f64,
}

impl ConfidenceLevels {
    /// Derive the band percentiles from a confidence level in percent
    ///
    /// For the default of 90 this yields 5, 27.5, 72.5 and 95.
    pub fn from_confidence(confidence: f64) -> Self {
        let low = (100.0 - confidence) / 2.0;
        let semi_low = (100.0 - confidence / 2.0) / 2.0;
        Self {
            low,
            semi_low,
            semi_high: 100.0 - semi_low,
            high: 100.0 - low,
        }
    }
}

impl Default for ConfidenceLevels {
    fn default() -> Self {
        Self::from_confidence(crate::defaults::CONFIDENCE)
    }
}

/// Median and band percentiles of one size bucket
///
/// `x` is the bucket's upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    pub x: u64,
    pub median: f64,
    pub p_low: f64,
    pub p_semi_low: f64,
    pub p_semi_high: f64,
    pub p_high: f64,
}

/// Width of each of `bucket_count` buckets spanning `[0, max_x)`
pub fn bucket_width(bucket_count: usize, max_x: u64) -> Result<u64> {
    if bucket_count == 0 {
        return Err(BenchError::invalid("bucket count cannot be zero"));
    }
    let width = max_x / bucket_count as u64;
    if width == 0 {
        return Err(BenchError::invalid(format!(
            "{} buckets do not fit into an x range of {}",
            bucket_count, max_x
        )));
    }
    Ok(width)
}

/// Sorted metric values per bucket; bucket `i` (0-based) holds sizes in
/// `[i*width, (i+1)*width)`. Sizes at or beyond `bucket_count*width` are
/// ignored.
fn bucket_values(
    series: &[MeasurementRecord],
    metric: Metric,
    bucket_count: usize,
    width: u64,
) -> Vec<Vec<f64>> {
    let mut buckets = vec![Vec::new(); bucket_count];
    for record in series {
        let index = record.total_transferred / width;
        if let Some(bucket) = buckets.get_mut(index as usize) {
            bucket.push(metric.value(record));
        }
    }
    for bucket in &mut buckets {
        bucket.sort_by(f64::total_cmp);
    }
    buckets
}

/// Bin a series and summarize every bucket
///
/// Fails with [`BenchError::InsufficientData`] naming the upper bound of the
/// first empty bucket.
pub fn bin(
    series: &[MeasurementRecord],
    metric: Metric,
    bucket_count: usize,
    max_x: u64,
    levels: ConfidenceLevels,
) -> Result<Vec<BucketSummary>> {
    let width = bucket_width(bucket_count, max_x)?;

    bucket_values(series, metric, bucket_count, width)
        .into_iter()
        .enumerate()
        .map(|(i, values)| {
            let x = (i as u64 + 1) * width;
            if values.is_empty() {
                return Err(BenchError::InsufficientData {
                    bound: x,
                    precision: bucket_count,
                });
            }
            Ok(BucketSummary {
                x,
                median: percentile(&values, 50.0),
                p_low: percentile(&values, levels.low),
                p_semi_low: percentile(&values, levels.semi_low),
                p_semi_high: percentile(&values, levels.semi_high),
                p_high: percentile(&values, levels.high),
            })
        })
        .collect()
}

/// Median per bucket as `(upper bound, median)` pairs
pub fn bucket_medians(
    series: &[MeasurementRecord],
    metric: Metric,
    bucket_count: usize,
    max_x: u64,
) -> Result<Vec<(u64, f64)>> {
    let width = bucket_width(bucket_count, max_x)?;

    bucket_values(series, metric, bucket_count, width)
        .into_iter()
        .enumerate()
        .map(|(i, values)| {
            let x = (i as u64 + 1) * width;
            if values.is_empty() {
                return Err(BenchError::InsufficientData {
                    bound: x,
                    precision: bucket_count,
                });
            }
            Ok((x, percentile(&values, 50.0)))
        })
        .collect()
}

/// Size-aligned ratio `median(other) / median(reference)` per bucket
///
/// Both series are binned with the same width. An empty bucket in either
/// series fails exactly like [`bin`]; a zero reference median fails with
/// [`BenchError::DegenerateReference`].
pub fn compare(
    reference: &[MeasurementRecord],
    other: &[MeasurementRecord],
    metric: Metric,
    bucket_count: usize,
    max_x: u64,
) -> Result<Vec<(u64, f64)>> {
    let reference = bucket_medians(reference, metric, bucket_count, max_x)?;
    let other = bucket_medians(other, metric, bucket_count, max_x)?;

    reference
        .into_iter()
        .zip(other)
        .map(|((x, base), (_, value))| {
            if base == 0.0 {
                return Err(BenchError::DegenerateReference { bound: x });
            }
            Ok((x, value / base))
        })
        .collect()
}
