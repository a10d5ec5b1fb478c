//! Delivery of packets to the distributor.
//!
//! A send is one JSON POST with no retry. The distributor signals acceptance
//! with `202 Accepted`, anything else is a failure. Failures are values, not
//! errors: the caller counts them and moves on.

use std::time::Duration;

use async_trait::async_trait;
use emitter_payload::LogPacket;
use reqwest::{StatusCode, Url};

/// The limit on a single send, connection included.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`HttpTransport`].
pub enum Error {
    /// Wrapper around [`reqwest::Error`].
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The outcome of one send.
pub enum SendResult {
    /// The distributor accepted the packet.
    Success,
    /// The distributor answered with something other than `202 Accepted`.
    HttpFailure {
        /// The response status code.
        status: u16,
        /// The response body, possibly empty.
        body: String,
    },
    /// The request never completed: refused, timed out, unresolvable.
    NetworkFailure(String),
}

impl SendResult {
    /// Whether the packet was accepted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// A short label for metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::HttpFailure { .. } => "http",
            Self::NetworkFailure(_) => "network",
        }
    }
}

#[async_trait]
/// Something that can deliver a packet.
pub trait Transport {
    /// Deliver `packet` once. Never panics, never retries.
    async fn send(&self, packet: &LogPacket) -> SendResult;
}

#[derive(Debug, Clone)]
/// Delivers packets as JSON over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Create a new [`HttpTransport`] posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(endpoint: Url) -> Result<Self, Error> {
        Self::with_timeout(endpoint, SEND_TIMEOUT)
    }

    /// Create a new [`HttpTransport`] whose sends give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// The URL packets are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, packet: &LogPacket) -> SendResult {
        let response = match self
            .client
            .post(self.endpoint.clone())
            .json(packet)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return SendResult::NetworkFailure(err.to_string()),
        };

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return SendResult::Success;
        }
        // The body only decorates the diagnostic; a failure to read it is not
        // worth distinguishing.
        let body = response.text().await.unwrap_or_default();
        SendResult::HttpFailure {
            status: status.as_u16(),
            body,
        }
    }
}
