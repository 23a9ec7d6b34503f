use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::error::LoadError;

/// What came back from one GET, with the probe's own timing of it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
    /// Time from sending the request to reading the full body.
    pub duration: Duration,
}

impl ProbeResponse {
    /// Stand-in for a request that never produced a response.
    pub fn transport_failure(duration: Duration) -> Self {
        Self {
            status: 0,
            body: String::new(),
            duration,
        }
    }

    /// Statuses outside 200..=399, and transport failures, count as failed requests.
    pub fn is_failed(&self) -> bool {
        !(200..400).contains(&self.status)
    }
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ProbeError {
    pub message: String,
    pub duration: Duration,
}

/// Issues the single GET of an iteration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}

/// Probe backed by a shared, pooled `reqwest` client.
#[derive(Clone)]
pub struct ReqwestProbe {
    client: reqwest::Client,
}

impl ReqwestProbe {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, LoadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| LoadError::Config(format!("invalid user agent: {e}")))?,
        );
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProbe for ReqwestProbe {
    async fn get(&self, url: &str) -> Result<ProbeResponse, ProbeError> {
        let start = Instant::now();
        let failed = |e: reqwest::Error| {
            let message = if e.is_connect() {
                "connection refused or host unreachable".to_string()
            } else if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            ProbeError {
                message,
                duration: start.elapsed(),
            }
        };

        let resp = self.client.get(url).send().await.map_err(failed)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(failed)?;

        Ok(ProbeResponse {
            status,
            body,
            duration: start.elapsed(),
        })
    }
}
