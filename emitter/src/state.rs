//! Emission counters.

use std::fmt;

use crate::transport::SendResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// The tally of one emitter's sends.
///
/// Every send lands in exactly one of the two counters. Counters only grow.
pub struct EmitterState {
    packets_sent: u64,
    packets_failed: u64,
}

impl EmitterState {
    /// Count the outcome of one send.
    pub fn record(&mut self, result: &SendResult) {
        if result.is_success() {
            self.packets_sent += 1;
        } else {
            self.packets_failed += 1;
        }
    }

    /// Packets accepted by the distributor.
    #[must_use]
    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Packets that were rejected or never arrived.
    #[must_use]
    pub fn packets_failed(&self) -> u64 {
        self.packets_failed
    }

    /// Every send attempted.
    #[must_use]
    pub fn attempted(&self) -> u64 {
        self.packets_sent + self.packets_failed
    }

    /// The percentage of attempts that succeeded, zero when nothing was
    /// attempted.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        match self.attempted() {
            0 => 0.0,
            total => self.packets_sent as f64 / total as f64 * 100.0,
        }
    }

    /// Fold another emitter's counts into this one.
    pub fn merge(&mut self, other: EmitterState) {
        self.packets_sent += other.packets_sent;
        self.packets_failed += other.packets_failed;
    }

    /// The end-of-run report.
    #[must_use]
    pub fn summary(&self) -> Summary {
        Summary {
            sent: self.packets_sent,
            failed: self.packets_failed,
            success_rate: self.success_rate(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Emission statistics reported at the end of every run.
pub struct Summary {
    /// Packets accepted.
    pub sent: u64,
    /// Packets not accepted.
    pub failed: u64,
    /// `sent` as a percentage of all attempts.
    pub success_rate: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets sent: {}, packets failed: {}, success rate: {:.1}%",
            self.sent, self.failed, self.success_rate
        )
    }
}
