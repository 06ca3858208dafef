//! Console formatting, option validation and table helpers
//!
//! The `validate_*` functions are called once while the typed configuration
//! structs are built from the command line. Code past that point assumes
//! valid parameters.
//!
//! ```rust
//! use ppbench::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(format_rate(1048576.0), "1.00 MB/s");
//! assert!(validate_coverage(0.0).is_err());
//! ```

use crate::error::{BenchError, Result};
use std::time::Duration;

/// Format a duration with the largest fitting unit, from `ns` up to `h m s`
///
/// ```rust
/// # use ppbench::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Format a latency given in (fractional) milliseconds
pub fn format_millis(ms: f64) -> String {
    if !ms.is_finite() || ms <= 0.0 {
        return format!("{:.2}ms", ms.max(0.0));
    }
    match Duration::try_from_secs_f64(ms / 1000.0) {
        Ok(duration) => format_duration(duration),
        Err(_) => format!("{:.3e}ms", ms),
    }
}

/// Format bytes in a human-readable way (binary scaling)
///
/// ```rust
/// # use ppbench::utils::format_bytes;
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    format_bytes_f64(bytes as f64)
}

pub fn format_bytes_f64(bytes: f64) -> String {
    if bytes < 1024.0 {
        format!("{:.0} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a transfer rate (bytes per second)
pub fn format_rate(bytes_per_second: f64) -> String {
    format!("{}/s", format_bytes_f64(bytes_per_second))
}

/// Format a request rate
pub fn format_request_rate(requests_per_second: f64) -> String {
    if requests_per_second < 1_000.0 {
        format!("{:.1} req/s", requests_per_second)
    } else {
        format!("{:.2}K req/s", requests_per_second / 1_000.0)
    }
}

/// Validate the concurrency level (1..=1024 workers)
pub fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        return Err(BenchError::invalid("Concurrency cannot be zero"));
    }
    if concurrency > 1024 {
        return Err(BenchError::invalid(format!(
            "Concurrency {} is too high (maximum 1024)",
            concurrency
        )));
    }
    Ok(())
}

/// Validate the message size range; `min` must be at least 1 and below `max`
pub fn validate_size_range(min: u64, max: u64) -> Result<()> {
    if min == 0 {
        return Err(BenchError::invalid("Minimum message size cannot be zero"));
    }
    if min >= max {
        return Err(BenchError::invalid(format!(
            "Minimum message size {} must be below maximum {}",
            min, max
        )));
    }
    Ok(())
}

/// Validate the sampled fraction of the size range
pub fn validate_coverage(coverage: f64) -> Result<()> {
    if !coverage.is_finite() || coverage <= 0.0 {
        return Err(BenchError::invalid(format!(
            "Coverage {} must be a positive fraction",
            coverage
        )));
    }
    Ok(())
}

pub fn validate_repetitions(repetitions: usize) -> Result<()> {
    if repetitions == 0 {
        return Err(BenchError::invalid("Repetitions cannot be zero"));
    }
    Ok(())
}

pub fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(BenchError::invalid("Timeout cannot be zero"));
    }
    Ok(())
}

/// Validate a confidence level in percent, `(0, 100]`
pub fn validate_confidence(confidence: f64) -> Result<()> {
    if !confidence.is_finite() || confidence <= 0.0 || confidence > 100.0 {
        return Err(BenchError::invalid(format!(
            "Confidence {} must be within (0, 100]",
            confidence
        )));
    }
    Ok(())
}

/// Validate the bucket count against the x range it subdivides
pub fn validate_precision(precision: usize, max_x: u64) -> Result<()> {
    if precision == 0 {
        return Err(BenchError::invalid("Precision cannot be zero"));
    }
    if max_x / precision as u64 == 0 {
        return Err(BenchError::invalid(format!(
            "Precision {} is too high for an x range of {} (bucket width would be zero)",
            precision, max_x
        )));
    }
    Ok(())
}

/// Validate a point transparency value
pub fn validate_alpha(alpha: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&alpha) {
        return Err(BenchError::invalid(format!(
            "Alpha {} must be within [0, 1]",
            alpha
        )));
    }
    Ok(())
}

/// Print one `|`-separated row, padding each column to its width
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    println!("{}", format_table_row(columns, widths));
}

pub fn format_table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        row.push_str(&format!(" {:width$} |", column, width = width));
    }
    row
}

pub fn print_table_separator(widths: &[usize]) {
    println!("{}", format_table_separator(widths));
}

pub fn format_table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

/// Fixed-width text progress bar; a zero total renders as complete
pub fn create_progress_indicator(current: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return "█".repeat(width);
    }

    let progress = (current as f64 / total as f64).min(1.0);
    let filled = ((progress * width as f64) as usize).min(width);
    let empty = width - filled;

    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
