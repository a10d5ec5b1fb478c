//! The swarm load driver.
//!
//! Where the emitter is one agent sending at a steady rate, the swarm runs
//! many independent agents at once, each choosing a weighted traffic
//! [`Scenario`] per packet and pausing for a short random think time in
//! between. Regular agents draw from the four regular scenarios; stress
//! agents fire single-message packets with much shorter pauses.
//!
//! Agents share nothing mutable. Each keeps its own [`EmitterState`] and the
//! states are merged once every agent has stopped.
//!
//! ## Metrics
//!
//! Agents record the same counters as the emitter, under
//! `component = "swarm"`.
//!

use std::{net::SocketAddr, num::NonZeroU32, time::Duration};

use clap::Parser;
use emitter_pacing::{Clock, RealClock};
use emitter_payload::{Level, LogPacket, MessageSynthesizer, Weighted, catalog};
use emitter_signal::Watcher;
use rand::{Rng, SeedableRng, distr::Distribution, rngs::StdRng};
use reqwest::Url;
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, info_span, warn};

use crate::{
    controller::Tally,
    health::{self, Probe},
    state::EmitterState,
    transport::{self, HttpTransport, Transport},
};

/// Path, relative to the base URL, that packets are posted to.
pub const DISTRIBUTE_PATH: &str = "api/v1/distribute";
/// Path, relative to the base URL, of the health endpoint.
pub const HEALTH_PATH: &str = "api/v1/health";

#[derive(thiserror::Error, Debug)]
/// Errors produced while setting up the swarm.
pub enum Error {
    /// The base URL is not http or https.
    #[error("base URL must be http or https: {0}")]
    Scheme(Url),
    /// The swarm has no agents.
    #[error("at least one agent is required")]
    NoAgents,
    /// See [`transport::Error`].
    #[error(transparent)]
    Transport(#[from] transport::Error),
    /// See [`health::Error`].
    #[error(transparent)]
    Health(#[from] health::Error),
    /// See [`emitter_payload::Error`].
    #[error(transparent)]
    Payload(#[from] emitter_payload::Error),
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Drive a log distributor with a swarm of emitting agents")]
/// Command-line arguments of the swarm driver.
pub struct Args {
    /// The distributor's base URL
    #[arg(long, env = "SWARM_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: Url,
    /// Regular agents to run
    #[arg(long, default_value_t = 10)]
    pub agents: u32,
    /// Stress agents to run
    #[arg(long, default_value_t = 0)]
    pub stress_agents: u32,
    /// Run time; zero runs until interrupted
    #[arg(long, default_value_t = 60)]
    pub duration_seconds: u64,
    /// Seed for every random choice; unset draws from the OS
    #[arg(long)]
    pub seed: Option<u64>,
    /// Address to expose Prometheus metrics on
    #[arg(long)]
    pub prometheus_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Validated swarm configuration.
pub struct Config {
    /// The distributor's base URL.
    pub base_url: Url,
    /// Regular agents to run.
    pub agents: u32,
    /// Stress agents to run.
    pub stress_agents: u32,
    /// Stop after this long; `None` runs until interrupted.
    pub duration: Option<Duration>,
    /// Seed for every random choice.
    pub seed: Option<u64>,
    /// Address to expose Prometheus metrics on.
    pub prometheus_addr: Option<SocketAddr>,
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        if !matches!(args.base_url.scheme(), "http" | "https") {
            return Err(Error::Scheme(args.base_url));
        }
        if args.agents == 0 && args.stress_agents == 0 {
            return Err(Error::NoAgents);
        }
        Ok(Self {
            base_url: args.base_url,
            agents: args.agents,
            stress_agents: args.stress_agents,
            duration: (args.duration_seconds > 0)
                .then_some(Duration::from_secs(args.duration_seconds)),
            seed: args.seed,
            prometheus_addr: args.prometheus_addr,
        })
    }
}

/// Resolve `path` beneath `base`, keeping any path prefix `base` carries.
#[must_use]
pub fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}/{path}"));
    url
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// A shape of traffic an agent may send.
pub enum Scenario {
    /// Two INFO messages.
    InfoOnly,
    /// Two messages at INFO, WARN or ERROR.
    MixedLevels,
    /// Two messages at ERROR or FATAL.
    ErrorHeavy,
    /// Five to ten messages at any level.
    LargeBatch,
    /// One WARN message. Stress agents only.
    RapidFire,
}

impl Scenario {
    /// The scenarios of regular agents and their relative weights.
    pub const REGULAR_WEIGHTS: [(Scenario, f64); 4] = [
        (Scenario::InfoOnly, 8.0),
        (Scenario::MixedLevels, 4.0),
        (Scenario::ErrorHeavy, 2.0),
        (Scenario::LargeBatch, 1.0),
    ];

    /// Levels the scenario's messages are drawn from, uniformly.
    #[must_use]
    pub fn levels(self) -> &'static [Level] {
        match self {
            Self::InfoOnly => &[Level::Info],
            Self::MixedLevels => &[Level::Info, Level::Warn, Level::Error],
            Self::ErrorHeavy => &[Level::Error, Level::Fatal],
            Self::LargeBatch => &Level::ALL,
            Self::RapidFire => &[Level::Warn],
        }
    }

    fn message_count<R>(self, rng: &mut R) -> usize
    where
        R: Rng + ?Sized,
    {
        match self {
            Self::LargeBatch => rng.random_range(5..=10),
            Self::RapidFire => 1,
            Self::InfoOnly | Self::MixedLevels | Self::ErrorHeavy => 2,
        }
    }

    /// Build one packet of this scenario.
    pub fn packet<R>(self, messages: &MessageSynthesizer, rng: &mut R) -> LogPacket
    where
        R: Rng + ?Sized,
    {
        let count = self.message_count(rng);
        let context = catalog::choose(rng);
        let levels = self.levels();
        let batch = (0..count)
            .map(|_| {
                let level = levels[rng.random_range(0..levels.len())];
                messages.synthesize_at(context, level, rng)
            })
            .collect();
        LogPacket::new(messages.agent_id(), batch, rng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The kind of agent.
pub enum Profile {
    /// Weighted scenarios with a think time of 0.1 to 0.5 seconds.
    Regular,
    /// Rapid-fire packets with a think time of 0.01 to 0.1 seconds.
    Stress,
}

impl Profile {
    /// The identity of the `index`th agent of this profile.
    #[must_use]
    pub fn agent_id(self, index: u32) -> String {
        match self {
            Self::Regular => format!("swarm-agent-{index}"),
            Self::Stress => format!("swarm-stress-{index}"),
        }
    }

    /// Draw a pause between two packets.
    pub fn think_time<R>(self, rng: &mut R) -> Duration
    where
        R: Rng + ?Sized,
    {
        let seconds = match self {
            Self::Regular => rng.random_range(0.1..=0.5),
            Self::Stress => rng.random_range(0.01..=0.1),
        };
        Duration::from_secs_f64(seconds)
    }
}

#[derive(Debug)]
/// One member of the swarm.
pub struct Agent<T, C> {
    profile: Profile,
    messages: MessageSynthesizer,
    scenarios: Weighted<Scenario>,
    transport: T,
    clock: C,
    rng: StdRng,
    tally: Tally,
    shutdown: Watcher,
}

impl<T, C> Agent<T, C>
where
    T: Transport,
    C: Clock,
{
    /// Create a new [`Agent`].
    ///
    /// # Errors
    ///
    /// Only fails if the built-in weights are invalid.
    pub fn new(
        profile: Profile,
        index: u32,
        transport: T,
        clock: C,
        rng: StdRng,
        shutdown: Watcher,
    ) -> Result<Self, Error> {
        let agent_id = profile.agent_id(index);
        Ok(Self {
            profile,
            messages: MessageSynthesizer::new(agent_id.as_str())?,
            scenarios: Weighted::new(Scenario::REGULAR_WEIGHTS)?,
            transport,
            clock,
            rng,
            tally: Tally::new("swarm", &agent_id),
            shutdown,
        })
    }

    /// The agent's identity.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        self.messages.agent_id()
    }

    /// Send until the shutdown signal fires, returning the agent's counters.
    pub async fn spin(mut self) -> EmitterState {
        loop {
            if self.shutdown.try_recv() {
                break;
            }
            let scenario = match self.profile {
                Profile::Regular => self.scenarios.sample(&mut self.rng),
                Profile::Stress => Scenario::RapidFire,
            };
            let packet = scenario.packet(&self.messages, &mut self.rng);
            self.tally.deliver(&self.transport, &packet).await;
            if self.shutdown.try_recv() {
                break;
            }

            let think_time = self.profile.think_time(&mut self.rng);
            tokio::select! {
                () = self.clock.wait(think_time) => {},
                () = self.shutdown.recv() => break,
            }
        }
        self.tally.state()
    }
}

/// Check the distributor once before an agent starts. A failed check is
/// reported but does not hold the agent back.
async fn preflight(probe: &Probe, clock: &RealClock) {
    if probe.wait_until_healthy(clock).await.is_err() {
        warn!("health check of {url} failed, sending anyway", url = probe.url());
    }
}

fn agent_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_os_rng(),
    }
}

/// Run the swarm until `shutdown` fires, returning the merged counters of
/// every agent.
///
/// # Errors
///
/// Fails if an agent's HTTP client cannot be built.
pub async fn run(config: &Config, shutdown: Watcher) -> Result<EmitterState, Error> {
    let distribute = endpoint(&config.base_url, DISTRIBUTE_PATH);
    let health = endpoint(&config.base_url, HEALTH_PATH);
    info!(
        "starting swarm of {} regular and {} stress agents against {distribute}",
        config.agents, config.stress_agents
    );

    let transport = HttpTransport::new(distribute)?;
    let probe = Probe::new(health, NonZeroU32::MIN, Duration::ZERO)?;
    let clock = RealClock::default();

    let regular = (1..=config.agents).map(|index| (Profile::Regular, index));
    let stress = (1..=config.stress_agents).map(|index| (Profile::Stress, index));
    let mut agents = JoinSet::new();
    for (stream, (profile, index)) in regular.chain(stress).enumerate() {
        let agent = Agent::new(
            profile,
            index,
            transport.clone(),
            clock,
            agent_rng(config.seed, stream as u64),
            shutdown.clone(),
        )?;
        let probe = probe.clone();
        let span = info_span!("agent", id = agent.agent_id());
        agents.spawn(
            async move {
                preflight(&probe, &clock).await;
                agent.spin().await
            }
            .instrument(span),
        );
    }

    let mut total = EmitterState::default();
    while let Some(result) = agents.join_next().await {
        match result {
            Ok(state) => total.merge(state),
            Err(err) => error!("could not join agent task: {err}"),
        }
    }
    info!("swarm statistics: {}", total.summary());
    Ok(total)
}
