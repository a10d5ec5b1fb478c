//! A clock for tests, compiled with the `test-util` feature.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;

use crate::Clock;

#[derive(Debug, Default)]
struct Timeline {
    now: Duration,
    waits: Vec<Duration>,
}

#[derive(Debug, Clone, Default)]
/// A clock whose time moves only when it is waited on.
///
/// Every call to [`Clock::wait`] completes immediately, advances the clock by
/// the requested amount and is recorded. Clones share one timeline.
pub struct VirtualClock {
    timeline: Arc<Mutex<Timeline>>,
}

impl VirtualClock {
    /// Every wait requested of this clock, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .waits
            .clone()
    }

    /// Move time forward without recording a wait.
    pub fn advance(&self, duration: Duration) {
        self.timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .now += duration;
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn elapsed(&self) -> Duration {
        self.timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .now
    }

    async fn wait(&self, duration: Duration) {
        let mut timeline = self
            .timeline
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        timeline.now += duration;
        timeline.waits.push(duration);
    }
}
