//! HTTP endpoints for the sample collector.
//!
//! Both variants issue `GET <base><path>/<size>`. [`HttpEndpoint`] times the
//! round trip itself; [`MeasuredEndpoint`] trusts the figures the ping
//! service reports in its JSON answer.

use super::{AttemptResult, Endpoint};
use crate::error::TransientRequestFailure;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// Plain GET against the ping service, timed on the client
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    client: reqwest::Client,
    base_url: String,
    path: String,
}

impl HttpEndpoint {
    pub fn new(base_url: &str, path: &str) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            path: format!("/{}", path.trim_matches('/')),
        })
    }

    pub fn url(&self, size: u64) -> String {
        format!("{}{}", self.base_url, self.document(size))
    }

    /// Status, body and client-side elapsed time of one GET
    async fn fetch(
        &self,
        size: u64,
    ) -> Result<(reqwest::StatusCode, Vec<u8>, Duration), TransientRequestFailure> {
        let start = Instant::now();
        let response = self.client.get(self.url(size)).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        let elapsed = start.elapsed();
        Ok((status, body.to_vec(), elapsed))
    }
}

#[async_trait]
impl Endpoint for HttpEndpoint {
    fn document(&self, size: u64) -> String {
        if self.path == "/" {
            format!("/{}", size)
        } else {
            format!("{}/{}", self.path, size)
        }
    }

    async fn request(&self, size: u64) -> Result<AttemptResult, TransientRequestFailure> {
        let (status, body, latency) = self.fetch(size).await?;
        Ok(AttemptResult {
            success: status.is_success(),
            status_code: status.as_u16(),
            payload_length: body.len() as u64,
            latency,
            retries: 0,
        })
    }
}

/// Answer of a self-measuring ping service
///
/// `duration` is in milliseconds. Older services name the status field
/// `status` instead of `code`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasureAnswer {
    pub duration: f64,
    pub length: f64,
    #[serde(alias = "status")]
    pub code: u16,
    #[serde(default)]
    pub retries: u32,
}

impl MeasureAnswer {
    pub fn into_attempt(self) -> Result<AttemptResult, TransientRequestFailure> {
        let latency = Duration::try_from_secs_f64(self.duration.max(0.0) / 1000.0)
            .map_err(|_| TransientRequestFailure::InvalidDuration(self.duration))?;
        Ok(AttemptResult {
            success: (200..300).contains(&self.code),
            status_code: self.code,
            payload_length: self.length.max(0.0) as u64,
            latency,
            retries: self.retries,
        })
    }
}

/// GET against a measure endpoint that reports its own figures
#[derive(Debug, Clone)]
pub struct MeasuredEndpoint {
    http: HttpEndpoint,
}

impl MeasuredEndpoint {
    pub fn new(http: HttpEndpoint) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Endpoint for MeasuredEndpoint {
    fn document(&self, size: u64) -> String {
        self.http.document(size)
    }

    async fn request(&self, size: u64) -> Result<AttemptResult, TransientRequestFailure> {
        let (status, body, latency) = self.http.fetch(size).await?;
        if !status.is_success() {
            return Ok(AttemptResult {
                success: false,
                status_code: status.as_u16(),
                payload_length: 0,
                latency,
                retries: 0,
            });
        }

        let answer: MeasureAnswer = serde_json::from_slice(&body)?;
        answer.into_attempt()
    }
}
