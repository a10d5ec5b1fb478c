//! Distributor readiness probe.
//!
//! Emission does not start until the distributor answers its health endpoint
//! with `200 OK`. Each attempt is bounded by [`ATTEMPT_TIMEOUT`]; failed
//! attempts are separated by a fixed delay and the number of attempts is
//! capped.

use std::{num::NonZeroU32, time::Duration};

use emitter_pacing::Clock;
use reqwest::{StatusCode, Url};
use tracing::{debug, info, warn};

/// The limit on a single probe request.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Probe`].
pub enum Error {
    /// Wrapper around [`reqwest::Error`].
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The distributor never reported healthy.
    #[error("distributor at {url} not healthy after {attempts} attempts")]
    Exhausted {
        /// The probed URL.
        url: Url,
        /// The attempts made.
        attempts: u32,
    },
}

/// Derive the health endpoint from the log ingestion endpoint by replacing
/// `/logs` in the path with `/health`.
#[must_use]
pub fn health_url(distributor: &Url) -> Url {
    let mut url = distributor.clone();
    let path = url.path().replace("/logs", "/health");
    url.set_path(&path);
    url
}

#[derive(Debug, Clone)]
/// Polls a health endpoint until it reports healthy.
pub struct Probe {
    client: reqwest::Client,
    url: Url,
    max_attempts: NonZeroU32,
    retry_delay: Duration,
}

impl Probe {
    /// Create a new [`Probe`] against `url`.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(url: Url, max_attempts: NonZeroU32, retry_delay: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url,
            max_attempts,
            retry_delay,
        })
    }

    /// The probed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Poll until the endpoint answers `200 OK`, returning the attempt that
    /// succeeded, counted from one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] once every attempt has failed.
    pub async fn wait_until_healthy<C>(&self, clock: &C) -> Result<u32, Error>
    where
        C: Clock + Sync,
    {
        let max_attempts = self.max_attempts.get();
        for attempt in 1..=max_attempts {
            match self.client.get(self.url.clone()).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    info!("connected to distributor after {attempt} attempts");
                    return Ok(attempt);
                }
                Ok(response) => {
                    debug!(status = response.status().as_u16(), "distributor not healthy");
                }
                Err(err) => {
                    debug!("distributor unreachable: {err}");
                }
            }
            if attempt < max_attempts {
                info!("waiting for distributor (attempt {attempt}/{max_attempts})");
                clock.wait(self.retry_delay).await;
            }
        }

        warn!(
            "failed to connect to distributor at {url} after {max_attempts} attempts",
            url = self.url
        );
        Err(Error::Exhausted {
            url: self.url.clone(),
            attempts: max_attempts,
        })
    }
}
