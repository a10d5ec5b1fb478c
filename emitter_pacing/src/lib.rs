//! Pacing for the emitter run loop.
//!
//! The continuous emitter sends one packet per iteration, or a burst of
//! several, and then sleeps. The sleep is derived from the configured packet
//! rate divided by the number of packets the iteration sent, never dropping
//! below [`MINIMUM_INTERVAL`]. The division keeps the long-run average near
//! the configured rate without accounting for the time spent sending, so
//! sustained bursts may exceed the nominal rate.
//!
//! Time is consumed through the [`Clock`] trait so that schedules can be run
//! against a virtual clock in tests. That clock is compiled only for this
//! crate's tests or with the `test-util` feature.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

use std::{num::NonZeroU32, time::Duration};

use async_trait::async_trait;
use tokio::time::{self, Instant};

/// The floor applied to every inter-iteration interval.
pub const MINIMUM_INTERVAL: Duration = Duration::from_millis(100);

/// Errors produced by [`Pacer`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The packet rate must be finite and strictly positive.
    #[error("emission rate must be a finite, positive number of packets per second, got {0}")]
    Rate(f64),
}

#[async_trait]
/// The `Clock` used by every emitter schedule
pub trait Clock {
    /// Time elapsed since the clock was created.
    fn elapsed(&self) -> Duration;
    /// Wait for `duration` to pass.
    async fn wait(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy)]
/// A clock that operates with respect to real-clock time.
pub struct RealClock {
    start: Instant,
}

impl Default for RealClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for RealClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    async fn wait(&self, duration: Duration) {
        time::sleep(duration).await;
    }
}

#[cfg(any(test, feature = "test-util"))]
mod virtual_clock;
#[cfg(any(test, feature = "test-util"))]
pub use virtual_clock::VirtualClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Computes the pause between emitter iterations.
pub struct Pacer {
    /// The interval between packets at the configured rate, `1 / rate`.
    nominal: Duration,
}

impl Pacer {
    /// Create a new [`Pacer`] for `packets_per_second`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rate`] if the rate is not finite and positive, or is so
    /// small its interval does not fit a `Duration`.
    pub fn new(packets_per_second: f64) -> Result<Self, Error> {
        if !packets_per_second.is_finite() || packets_per_second <= 0.0 {
            return Err(Error::Rate(packets_per_second));
        }
        let nominal = Duration::try_from_secs_f64(packets_per_second.recip())
            .map_err(|_| Error::Rate(packets_per_second))?;
        Ok(Self { nominal })
    }

    /// The interval between packets at the configured rate.
    #[must_use]
    pub fn nominal(&self) -> Duration {
        self.nominal
    }

    /// The pause to take after an iteration that sent `packets` packets.
    #[must_use]
    pub fn interval(&self, packets: NonZeroU32) -> Duration {
        (self.nominal / packets.get()).max(MINIMUM_INTERVAL)
    }
}
