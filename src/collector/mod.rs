use crate::cli::EndpointMode;
use crate::error::TransientRequestFailure;
use crate::results::MeasurementRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub mod http;

pub use http::{HttpEndpoint, MeasuredEndpoint};

/// Upper bound of tries a measured ping spends on one request
pub const MAX_TRIES: u32 = 100;

/// Status reported by a measured ping that never saw a success
pub const EXHAUSTED_STATUS: u16 = 503;

/// Figures of a single request attempt
///
/// `retries` is the number of extra tries the attempt needed: always 0 for a
/// direct request, reported by the endpoint in measured mode, counted on the
/// client in retrying mode.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub success: bool,
    pub status_code: u16,
    pub payload_length: u64,
    pub latency: Duration,
    pub retries: u32,
}

/// One trial: a message size and the per-attempt timeout
#[derive(Debug, Clone, Copy)]
pub struct TrialRequest {
    pub size: u64,
    pub timeout: Duration,
}

/// Tags copied into every record of a run
#[derive(Debug, Clone, Default)]
pub struct RecordTags {
    pub machine_tag: String,
    pub experiment_tag: String,
    pub concurrency: u64,
}

/// Something that answers ping requests of a given size
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Document path requested for `size`, e.g. `/mping/1024`
    fn document(&self, size: u64) -> String;

    /// Perform one attempt
    ///
    /// A non-2xx answer is a completed attempt with `success == false`; an
    /// attempt that never produced a response is an error.
    async fn request(&self, size: u64) -> Result<AttemptResult, TransientRequestFailure>;
}

/// Retry one request until it succeeds, at most `max_tries` times
///
/// The latency covers every try. On success `retries` is the index of the
/// successful try; when all tries fail the result carries
/// [`EXHAUSTED_STATUS`], no payload and `retries == max_tries`.
pub async fn measured_ping<E: Endpoint + ?Sized>(
    endpoint: &E,
    size: u64,
    max_tries: u32,
) -> AttemptResult {
    let start = Instant::now();

    for attempt in 0..max_tries {
        match endpoint.request(size).await {
            Ok(result) if result.success => {
                return AttemptResult {
                    latency: start.elapsed(),
                    retries: attempt,
                    ..result
                };
            }
            Ok(result) => debug!("Try {} for {} answered {}", attempt, size, result.status_code),
            Err(e) => debug!("Try {} for {} failed: {}", attempt, size, e),
        }
    }

    AttemptResult {
        success: false,
        status_code: EXHAUSTED_STATUS,
        payload_length: 0,
        latency: start.elapsed(),
        retries: max_tries,
    }
}

/// Wraps an endpoint so that every attempt is a [`measured_ping`]
pub struct RetryingEndpoint<E> {
    inner: E,
    max_tries: u32,
}

impl<E: Endpoint> RetryingEndpoint<E> {
    pub fn new(inner: E, max_tries: u32) -> Self {
        Self { inner, max_tries }
    }
}

#[async_trait]
impl<E: Endpoint> Endpoint for RetryingEndpoint<E> {
    fn document(&self, size: u64) -> String {
        self.inner.document(size)
    }

    async fn request(&self, size: u64) -> Result<AttemptResult, TransientRequestFailure> {
        Ok(measured_ping(&self.inner, size, self.max_tries).await)
    }
}

/// Build the endpoint for a collection mode
pub fn create_endpoint(
    mode: EndpointMode,
    host: &str,
    path: &str,
    max_tries: u32,
) -> crate::error::Result<Arc<dyn Endpoint>> {
    let http = HttpEndpoint::new(host, path)?;
    let endpoint: Arc<dyn Endpoint> = match mode {
        EndpointMode::Measured => Arc::new(MeasuredEndpoint::new(http)),
        EndpointMode::Direct => Arc::new(http),
        EndpointMode::Retrying => Arc::new(RetryingEndpoint::new(http, max_tries)),
    };
    Ok(endpoint)
}

/// Run `repetitions` sequential attempts of one trial and reduce them
///
/// Failed attempts are counted, never fatal. Returns `None` when not a
/// single attempt succeeded.
pub async fn collect<E: Endpoint + ?Sized>(
    endpoint: &E,
    trial: TrialRequest,
    repetitions: usize,
    tags: &RecordTags,
) -> Option<MeasurementRecord> {
    let mut attempts = Vec::with_capacity(repetitions);

    for _ in 0..repetitions {
        let outcome = match tokio::time::timeout(trial.timeout, endpoint.request(trial.size)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransientRequestFailure::Timeout(trial.timeout)),
        };
        match &outcome {
            Ok(result) if !result.success => {
                debug!(
                    "Attempt for {} failed: {}",
                    trial.size,
                    TransientRequestFailure::Status(result.status_code)
                );
            }
            Err(e) => debug!("Attempt for {} failed: {}", trial.size, e),
            Ok(_) => {}
        }
        attempts.push(outcome);
    }

    let record = reduce(endpoint.document(trial.size), &attempts, tags);
    if record.is_none() {
        warn!(
            "All {} attempts for message size {} failed, trial skipped",
            repetitions, trial.size
        );
    }
    record
}

/// Reduce the attempts of one trial to a measurement record
///
/// Latency, payload and transfer figures come from the successful attempts
/// only. `retries` and `response_code` also look at failed answers: every
/// answer's retries are added up, and `response_code` is the status of the
/// first attempt that got a response at all.
pub fn reduce(
    document: String,
    attempts: &[Result<AttemptResult, TransientRequestFailure>],
    tags: &RecordTags,
) -> Option<MeasurementRecord> {
    let successes: Vec<&AttemptResult> = attempts
        .iter()
        .filter_map(|a| a.as_ref().ok())
        .filter(|a| a.success)
        .collect();
    if successes.is_empty() {
        return None;
    }

    let response_code = attempts
        .iter()
        .find_map(|a| a.as_ref().ok().map(|r| r.status_code))
        .unwrap_or_default();

    let latencies_ms: Vec<f64> = successes
        .iter()
        .map(|a| a.latency.as_secs_f64() * 1000.0)
        .collect();
    let lengths: Vec<f64> = successes.iter().map(|a| a.payload_length as f64).collect();

    let latency_sum: f64 = latencies_ms.iter().sum();
    let payload_sum: f64 = lengths.iter().sum();
    let time_per_request = crate::statistics::mean(&latencies_ms);

    Some(MeasurementRecord {
        machine_tag: tags.machine_tag.clone(),
        experiment_tag: tags.experiment_tag.clone(),
        document,
        failed_count: (attempts.len() - successes.len()) as u64,
        concurrency: tags.concurrency,
        total_transferred: crate::statistics::median(&lengths) as u64,
        time_per_request,
        transfer_rate: if latency_sum > 0.0 {
            payload_sum * 1000.0 / latency_sum
        } else {
            0.0
        },
        requests_per_second: if time_per_request > 0.0 {
            1000.0 / time_per_request
        } else {
            0.0
        },
        retries: attempts
            .iter()
            .filter_map(|a| a.as_ref().ok())
            .map(|a| a.retries as u64)
            .sum(),
        response_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted answers; `None` stands for a connection failure
    struct ScriptedEndpoint {
        answers: Mutex<VecDeque<Option<AttemptResult>>>,
        delay: Duration,
    }

    impl ScriptedEndpoint {
        fn new(answers: Vec<Option<AttemptResult>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Endpoint for ScriptedEndpoint {
        fn document(&self, size: u64) -> String {
            format!("/mping/{}", size)
        }

        async fn request(&self, _size: u64) -> Result<AttemptResult, TransientRequestFailure> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let answer = self.answers.lock().pop_front().flatten();
            answer.ok_or(TransientRequestFailure::Status(0))
        }
    }

    fn ok(ms: u64, length: u64, retries: u32) -> Option<AttemptResult> {
        Some(AttemptResult {
            success: true,
            status_code: 200,
            payload_length: length,
            latency: Duration::from_millis(ms),
            retries,
        })
    }

    fn status(code: u16) -> Option<AttemptResult> {
        Some(AttemptResult {
            success: false,
            status_code: code,
            payload_length: 0,
            latency: Duration::from_millis(1),
            retries: 0,
        })
    }

    fn tags() -> RecordTags {
        RecordTags {
            machine_tag: "m3.large".to_string(),
            experiment_tag: "bare".to_string(),
            concurrency: 4,
        }
    }

    fn trial(size: u64) -> TrialRequest {
        TrialRequest {
            size,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_collect_reduces_successful_attempts() {
        let endpoint = ScriptedEndpoint::new(vec![
            ok(1, 10, 0),
            None,
            ok(2, 20, 1),
            status(500),
            ok(3, 31, 2),
        ]);

        let record = collect(&endpoint, trial(20), 5, &tags()).await.unwrap();

        assert_eq!(record.document, "/mping/20");
        assert_eq!(record.machine_tag, "m3.large");
        assert_eq!(record.concurrency, 4);
        assert_eq!(record.failed_count, 2);
        assert_eq!(record.total_transferred, 20);
        assert!((record.time_per_request - 2.0).abs() < 1e-9);
        assert!((record.transfer_rate - 61.0 * 1000.0 / 6.0).abs() < 1e-6);
        assert!((record.requests_per_second - 500.0).abs() < 1e-9);
        assert_eq!(record.retries, 3);
        assert_eq!(record.response_code, 200);
    }

    #[tokio::test]
    async fn test_collect_all_failed_emits_nothing() {
        let endpoint = ScriptedEndpoint::new(vec![None, status(503), None]);
        assert!(collect(&endpoint, trial(1), 3, &tags()).await.is_none());
    }

    #[tokio::test]
    async fn test_collect_counts_timeouts_as_failures() {
        let mut endpoint = ScriptedEndpoint::new(vec![ok(1, 5, 0), ok(1, 5, 0)]);
        endpoint.delay = Duration::from_millis(200);

        let slow = TrialRequest {
            size: 5,
            timeout: Duration::from_millis(20),
        };
        assert!(collect(&endpoint, slow, 2, &tags()).await.is_none());
    }

    #[test]
    fn test_reduce_response_code_is_first_answer() {
        let attempts = vec![
            Err(TransientRequestFailure::Timeout(Duration::from_secs(1))),
            Ok(status(502).unwrap()),
            Ok(ok(4, 8, 0).unwrap()),
        ];
        let record = reduce("/mping/8".to_string(), &attempts, &tags()).unwrap();
        assert_eq!(record.response_code, 502);
        assert_eq!(record.failed_count, 2);
    }

    #[test]
    fn test_reduce_counts_retries_of_failed_answers() {
        let exhausted = AttemptResult {
            retries: 100,
            ..status(503).unwrap()
        };
        let attempts = vec![
            Ok(exhausted),
            Ok(ok(2, 8, 1).unwrap()),
            Err(TransientRequestFailure::Timeout(Duration::from_secs(1))),
        ];
        let record = reduce("/mping/8".to_string(), &attempts, &tags()).unwrap();
        assert_eq!(record.retries, 101);
        assert_eq!(record.failed_count, 2);
    }

    #[test]
    fn test_reduce_zero_latency_has_zero_rates() {
        let attempts = vec![Ok(ok(0, 100, 0).unwrap())];
        let record = reduce("/mping/100".to_string(), &attempts, &tags()).unwrap();
        assert_eq!(record.time_per_request, 0.0);
        assert_eq!(record.transfer_rate, 0.0);
        assert_eq!(record.requests_per_second, 0.0);
    }

    #[test]
    fn test_reduce_truncates_median_length() {
        let attempts = vec![Ok(ok(1, 10, 0).unwrap()), Ok(ok(1, 15, 0).unwrap())];
        let record = reduce("/mping/12".to_string(), &attempts, &tags()).unwrap();
        assert_eq!(record.total_transferred, 12);
    }

    #[tokio::test]
    async fn test_measured_ping_counts_retries() {
        let endpoint = ScriptedEndpoint::new(vec![None, status(500), None, ok(1, 42, 0)]);
        let result = measured_ping(&endpoint, 42, MAX_TRIES).await;

        assert!(result.success);
        assert_eq!(result.retries, 3);
        assert_eq!(result.payload_length, 42);
    }

    #[tokio::test]
    async fn test_measured_ping_gives_up() {
        let endpoint = ScriptedEndpoint::new(vec![status(500); 10]);
        let result = measured_ping(&endpoint, 42, 5).await;

        assert!(!result.success);
        assert_eq!(result.retries, 5);
        assert_eq!(result.status_code, EXHAUSTED_STATUS);
        assert_eq!(result.payload_length, 0);
    }

    #[tokio::test]
    async fn test_retrying_endpoint_wraps_inner() {
        let inner = ScriptedEndpoint::new(vec![None, ok(2, 7, 0)]);
        let endpoint = RetryingEndpoint::new(inner, 3);

        assert_eq!(endpoint.document(7), "/mping/7");
        let result = endpoint.request(7).await.unwrap();
        assert!(result.success);
        assert_eq!(result.retries, 1);
    }
}
