//! Stop signal for emitter run loops.
//!
//! An emitter runs until its schedule completes or until an operator asks it to
//! stop. The request to stop travels through a pair of types: one
//! `Broadcaster` and any number of `Watcher` instances. The `Broadcaster`
//! fires exactly once. Every `Watcher` observes the firing, either by polling
//! at a loop boundary with [`Watcher::try_recv`] or by awaiting
//! [`Watcher::recv`] inside a `select!` alongside a sleep.
//!
//! Unlike a process signal handler nothing here is global: each emitter or
//! swarm agent is handed its own `Watcher`, which keeps run loops testable
//! without delivering real signals.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

use tokio::sync::watch;
use tracing::debug;

/// Construct a `Watcher` and `Broadcaster` pair.
#[must_use]
pub fn signal() -> (Watcher, Broadcaster) {
    let (sender, receiver) = watch::channel(false);
    (
        Watcher {
            receiver,
            signal_received: false,
        },
        Broadcaster { sender },
    )
}

#[derive(Debug)]
/// Fires the stop signal to every `Watcher` derived from the same pair.
///
/// Dropping a `Broadcaster` without calling [`Broadcaster::signal`] does not
/// fire the signal. Watchers of a dropped `Broadcaster` wait forever, which is
/// the behavior wanted when a stop source, say ctrl-c handling, is
/// unavailable.
pub struct Broadcaster {
    sender: watch::Sender<bool>,
}

impl Broadcaster {
    /// Send the signal through to any `Watcher` instances.
    ///
    /// Function will NOT block until watchers have observed the signal.
    pub fn signal(self) {
        // `send_replace` stores the value even when every watcher is gone.
        self.sender.send_replace(true);
        debug!("stop signal broadcast");
    }
}

#[derive(Debug, Clone)]
/// Observes the stop signal fired by a `Broadcaster`.
///
/// Clones observe the same `Broadcaster` and are independent of each other.
pub struct Watcher {
    receiver: watch::Receiver<bool>,
    signal_received: bool,
}

impl Watcher {
    /// Check whether the signal has fired without blocking.
    ///
    /// Once this returns true it returns true on every later call.
    pub fn try_recv(&mut self) -> bool {
        if !self.signal_received && *self.receiver.borrow() {
            self.signal_received = true;
        }
        self.signal_received
    }

    /// Wait for the signal to fire. Returns immediately if it already has.
    ///
    /// This future is cancel safe, it may be raced against a sleep in a
    /// `select!` and re-created on the next loop iteration.
    pub async fn recv(&mut self) {
        if self.signal_received {
            return;
        }
        if self.receiver.wait_for(|fired| *fired).await.is_ok() {
            self.signal_received = true;
        } else {
            // The broadcaster dropped without firing. It never will.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::signal;

    #[test]
    fn try_recv_before_and_after_signal() {
        let (mut watcher, broadcaster) = signal();
        assert!(!watcher.try_recv());
        broadcaster.signal();
        assert!(watcher.try_recv());
        // The signal is sticky.
        assert!(watcher.try_recv());
    }

    #[test]
    fn clones_observe_the_same_broadcaster() {
        let (mut first, broadcaster) = signal();
        let mut second = first.clone();
        broadcaster.signal();
        assert!(first.try_recv());
        assert!(second.try_recv());
    }

    #[test]
    fn clone_after_signal_sees_signal() {
        let (mut watcher, broadcaster) = signal();
        broadcaster.signal();
        assert!(watcher.try_recv());
        let mut late = watcher.clone();
        assert!(late.try_recv());
    }

    #[test]
    fn dropped_broadcaster_does_not_fire() {
        let (mut watcher, broadcaster) = signal();
        drop(broadcaster);
        assert!(!watcher.try_recv());
    }

    #[tokio::test]
    async fn recv_wakes_on_signal() {
        let (mut watcher, broadcaster) = signal();
        let handle = tokio::spawn(async move {
            watcher.recv().await;
            watcher.try_recv()
        });
        broadcaster.signal();
        let observed = timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher did not wake")
            .expect("watcher task panicked");
        assert!(observed);
    }

    #[tokio::test]
    async fn recv_after_signal_returns_immediately() {
        let (mut watcher, broadcaster) = signal();
        broadcaster.signal();
        timeout(Duration::from_millis(100), watcher.recv())
            .await
            .expect("recv blocked after signal");
        timeout(Duration::from_millis(100), watcher.recv())
            .await
            .expect("second recv blocked after signal");
    }

    #[tokio::test]
    async fn recv_pends_when_broadcaster_dropped() {
        let (mut watcher, broadcaster) = signal();
        drop(broadcaster);
        let waited = timeout(Duration::from_millis(50), watcher.recv()).await;
        assert!(waited.is_err());
    }
}
