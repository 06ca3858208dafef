//! Error taxonomy for the benchmark driver and the analysis pipeline.
//!
//! Per-attempt failures ([`TransientRequestFailure`]) never leave the sample
//! collector; they are folded into the counters of a measurement record.
//! Everything in [`BenchError`] aborts the current operation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias for the library's fallible operations
pub type Result<T, E = BenchError> = std::result::Result<T, E>;

/// A single request attempt that did not produce a usable answer
#[derive(Error, Debug)]
pub enum TransientRequestFailure {
    #[error("request exceeded timeout of {0:?}")]
    Timeout(Duration),

    #[error("endpoint answered with status {0}")]
    Status(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed measure answer: {0}")]
    MalformedAnswer(#[from] serde_json::Error),

    #[error("measure answer reports an unrepresentable duration of {0} ms")]
    InvalidDuration(f64),
}

/// Fatal errors of a benchmark run or an analysis invocation
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(
        "not enough data for messages of about {bound} bytes length \
         (precision is {precision}); collect more data (preferred) or reduce --precision"
    )]
    InsufficientData { bound: u64, precision: usize },

    #[error("reference series has a zero median for messages of about {bound} bytes length")]
    DegenerateReference { bound: u64 },

    #[error("output file {} already exists; refusing to overwrite benchmark data", .path.display())]
    OutputConflict { path: PathBuf },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to format plot output")]
    Fmt(#[from] std::fmt::Error),
}

impl BenchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        BenchError::InvalidParameter(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_mentions_remedy() {
        let err = BenchError::InsufficientData {
            bound: 50000,
            precision: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("50000"));
        assert!(msg.contains("precision is 10"));
        assert!(msg.contains("--precision"));
    }

    #[test]
    fn test_output_conflict_names_path() {
        let err = BenchError::OutputConflict {
            path: PathBuf::from("/tmp/run.csv"),
        };
        assert!(err.to_string().contains("/tmp/run.csv"));
    }
}
