//! The emission control loop.
//!
//! A [`Controller`] owns one agent's synthesizer, transport and counters and
//! drives them according to a [`Mode`]:
//!
//! * single: one packet, then stop.
//! * burst: a fixed number of packets back to back, pausing only after a
//!   failed send that is not the last.
//! * continuous: one packet per iteration, or with the configured
//!   probability a burst of three to eight, then a pause computed by
//!   [`Pacer`]. Runs until the optional duration elapses or the shutdown
//!   signal fires.
//!
//! Every mode ends by reporting the accumulated [`EmitterState`].
//!
//! ## Metrics
//!
//! `packets_sent`: Packets accepted by the distributor
//! `packets_failed`: Packets not accepted, labelled by `reason`
//! `messages_sent`: Messages inside accepted packets
//! `bursts`: Continuous iterations that sent a burst
//! `emission_rate`: Configured packets per second
//!

use std::{num::NonZeroU32, time::Duration};

use emitter_pacing::{Clock, Pacer};
use emitter_payload::{LogPacket, PacketSynthesizer};
use emitter_signal::Watcher;
use metrics::{counter, gauge};
use rand::{
    Rng,
    distr::{Bernoulli, BernoulliError, Distribution},
    rngs::StdRng,
};
use tracing::{debug, info, warn};

use crate::{
    config::Mode,
    state::EmitterState,
    transport::{SendResult, Transport},
};

/// Smallest burst a continuous iteration may send.
pub const MIN_BURST: u32 = 3;
/// Largest burst a continuous iteration may send.
pub const MAX_BURST: u32 = 8;

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Controller`] construction.
pub enum Error {
    /// See [`emitter_pacing::Error`].
    #[error(transparent)]
    Pacing(#[from] emitter_pacing::Error),
    /// The burst probability is not a probability.
    #[error("invalid burst probability: {0}")]
    Probability(#[from] BernoulliError),
    /// See [`emitter_payload::Error`].
    #[error(transparent)]
    Payload(#[from] emitter_payload::Error),
}

#[derive(Debug, Clone, Copy)]
/// The continuous-mode schedule: rate and burst chance.
pub struct Schedule {
    emission_rate: f64,
    pacer: Pacer,
    bursts: Bernoulli,
}

impl Schedule {
    /// Create a new [`Schedule`].
    ///
    /// # Errors
    ///
    /// Fails if `emission_rate` is not finite and positive or if
    /// `burst_probability` lies outside `[0, 1]`.
    pub fn new(emission_rate: f64, burst_probability: f64) -> Result<Self, Error> {
        Ok(Self {
            emission_rate,
            pacer: Pacer::new(emission_rate)?,
            bursts: Bernoulli::new(burst_probability)?,
        })
    }
}

#[derive(Debug)]
/// Drives one agent's emission.
pub struct Controller<T, C> {
    synthesizer: PacketSynthesizer,
    transport: T,
    clock: C,
    rng: StdRng,
    schedule: Schedule,
    tally: Tally,
    shutdown: Watcher,
}

impl<T, C> Controller<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Create a new [`Controller`] emitting as `agent_id`.
    ///
    /// # Errors
    ///
    /// Only fails if the payload weights are invalid.
    pub fn new(
        agent_id: &str,
        transport: T,
        clock: C,
        rng: StdRng,
        schedule: Schedule,
        shutdown: Watcher,
    ) -> Result<Self, Error> {
        Ok(Self {
            synthesizer: PacketSynthesizer::new(agent_id)?,
            transport,
            clock,
            rng,
            schedule,
            tally: Tally::new("emitter", agent_id),
            shutdown,
        })
    }

    /// Run `mode` to completion or until the shutdown signal fires, report,
    /// and return the final counters.
    pub async fn run(mut self, mode: Mode) -> EmitterState {
        match mode {
            Mode::Single => self.run_single().await,
            Mode::Burst {
                packets,
                failure_delay,
            } => self.run_burst(packets, failure_delay).await,
            Mode::Continuous { duration } => self.run_continuous(duration).await,
        }
        let state = self.tally.state();
        info!("emission statistics: {}", state.summary());
        state
    }

    async fn run_single(&mut self) {
        self.emit_one().await;
    }

    async fn run_burst(&mut self, packets: u32, failure_delay: Duration) {
        info!("sending burst of {packets} packets");
        for sent in 1..=packets {
            if self.shutdown.try_recv() {
                info!("shutdown signal received");
                return;
            }
            let result = self.emit_one().await;
            if !result.is_success() && sent < packets && self.pause(failure_delay).await {
                return;
            }
        }
    }

    async fn run_continuous(&mut self, duration: Option<Duration>) {
        let rate = self.schedule.emission_rate;
        gauge!("emission_rate", &self.tally.labels).set(rate);
        match duration {
            Some(duration) => info!(
                "starting continuous emission at {rate} packets/second for {}s",
                duration.as_secs()
            ),
            None => info!("starting continuous emission at {rate} packets/second until stopped"),
        }

        let start = self.clock.elapsed();
        loop {
            if self.shutdown.try_recv() {
                info!("shutdown signal received");
                return;
            }
            let elapsed = self.clock.elapsed().saturating_sub(start);
            if duration.is_some_and(|duration| elapsed >= duration) {
                info!("emission duration reached");
                return;
            }

            let packets = if self.schedule.bursts.sample(&mut self.rng) {
                let packets = self.rng.random_range(MIN_BURST..=MAX_BURST);
                info!("burst: sending {packets} packets");
                counter!("bursts", &self.tally.labels).increment(1);
                packets
            } else {
                1
            };
            // A burst runs to completion; shutdown is observed in the pause.
            for _ in 0..packets {
                self.emit_one().await;
            }

            let packets = NonZeroU32::new(packets).unwrap_or(NonZeroU32::MIN);
            if self.pause(self.schedule.pacer.interval(packets)).await {
                return;
            }
        }
    }

    /// Wait for `duration`, returning early and `true` if the shutdown signal
    /// fires first.
    async fn pause(&mut self, duration: Duration) -> bool {
        tokio::select! {
            biased;

            () = self.shutdown.recv() => {
                info!("shutdown signal received");
                true
            }
            () = self.clock.wait(duration) => false,
        }
    }

    async fn emit_one(&mut self) -> SendResult {
        let packet = self.synthesizer.synthesize(&mut self.rng, None);
        self.tally.deliver(&self.transport, &packet).await
    }
}

#[derive(Debug, Clone)]
/// One agent's counters together with the metric labels they are mirrored
/// under.
pub(crate) struct Tally {
    state: EmitterState,
    labels: Vec<(String, String)>,
}

impl Tally {
    pub(crate) fn new(component: &str, agent_id: &str) -> Self {
        Self {
            state: EmitterState::default(),
            labels: crate::metric_labels(component, agent_id),
        }
    }

    pub(crate) fn state(&self) -> EmitterState {
        self.state
    }

    /// Send `packet` once, count the outcome and log a diagnostic line.
    pub(crate) async fn deliver<T>(&mut self, transport: &T, packet: &LogPacket) -> SendResult
    where
        T: Transport + ?Sized,
    {
        let result = transport.send(packet).await;
        self.state.record(&result);

        match &result {
            SendResult::Success => {
                counter!("packets_sent", &self.labels).increment(1);
                counter!("messages_sent", &self.labels)
                    .increment(packet.total_messages() as u64);
                debug!(
                    "sent packet {}... ({} messages), total sent: {}",
                    packet.short_id(),
                    packet.total_messages(),
                    self.state.packets_sent()
                );
            }
            SendResult::HttpFailure { status, body } => {
                warn!(
                    "failed to send packet {}...: HTTP {status}: {body}",
                    packet.short_id()
                );
            }
            SendResult::NetworkFailure(cause) => {
                warn!(
                    "network error sending packet {}...: {cause}",
                    packet.short_id()
                );
            }
        }
        if !result.is_success() {
            let mut labels = self.labels.clone();
            labels.push(("reason".to_string(), result.reason().to_string()));
            counter!("packets_failed", &labels).increment(1);
        }

        result
    }
}
