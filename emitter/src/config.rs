//! Emitter configuration.
//!
//! Every setting may be given as a command-line flag or through the process
//! environment. The raw [`Args`] are validated once into an immutable
//! [`Config`].

use std::{env, fmt, net::SocketAddr, num::NonZeroU32, time::Duration};

use clap::Parser;
use emitter_pacing::Pacer;
use reqwest::Url;

/// The distributor's log ingestion endpoint when none is configured.
pub const DEFAULT_DISTRIBUTOR_URL: &str = "http://distributor:8080/api/v1/logs";

#[derive(thiserror::Error, Debug)]
/// Errors produced by [`Config`] validation.
pub enum Error {
    /// The emission mode is not one of `continuous`, `burst` or `single`.
    #[error("unknown emission mode: {0}")]
    UnknownMode(String),
    /// See [`emitter_pacing::Error`].
    #[error(transparent)]
    Rate(#[from] emitter_pacing::Error),
    /// The burst probability lies outside `[0, 1]`.
    #[error("burst probability must lie in [0, 1], got {0}")]
    Probability(f64),
    /// The distributor URL is not http or https.
    #[error("distributor URL must be http or https: {0}")]
    Scheme(Url),
    /// The agent identifier is empty.
    #[error("agent id must not be empty")]
    AgentId,
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Emit synthetic log packets at a log distributor")]
/// Command-line arguments, each with an environment fallback.
pub struct Args {
    /// The distributor's log ingestion endpoint
    #[arg(long, env = "DISTRIBUTOR_URL", default_value = DEFAULT_DISTRIBUTOR_URL)]
    pub distributor_url: Url,
    /// The identity stamped on every packet, by default derived from the host
    #[arg(long, env = "AGENT_ID")]
    pub agent_id: Option<String>,
    /// Packets per second in continuous mode
    #[arg(long, env = "EMISSION_RATE", default_value_t = 1.0)]
    pub emission_rate: f64,
    /// Chance that a continuous iteration sends a burst
    #[arg(long, env = "BURST_PROBABILITY", default_value_t = 0.1)]
    pub burst_probability: f64,
    /// One of continuous, burst or single
    #[arg(long, env = "EMISSION_MODE", default_value = "continuous")]
    pub mode: String,
    /// Continuous mode run time; zero runs until interrupted
    #[arg(long, env = "EMISSION_DURATION", default_value_t = 0)]
    pub duration_seconds: u64,
    /// Packets sent in burst mode
    #[arg(long, env = "BURST_SIZE", default_value_t = 10)]
    pub burst_size: u32,
    /// Pause after a failed send in burst mode
    #[arg(long, env = "BURST_FAILURE_DELAY_MS", default_value_t = 100)]
    pub burst_failure_delay_ms: u64,
    /// Health probe attempts before giving up
    #[arg(long, env = "HEALTH_MAX_ATTEMPTS", default_value = "30")]
    pub health_max_attempts: NonZeroU32,
    /// Pause between health probe attempts
    #[arg(long, env = "HEALTH_RETRY_DELAY_MS", default_value_t = 2000)]
    pub health_retry_delay_ms: u64,
    /// Seed for every random choice; unset draws from the OS
    #[arg(long, env = "EMISSION_SEED")]
    pub seed: Option<u64>,
    /// Address to expose Prometheus metrics on
    #[arg(long, env = "PROMETHEUS_ADDR")]
    pub prometheus_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How the emitter schedules its sends.
pub enum Mode {
    /// Send at the configured rate, with occasional bursts.
    Continuous {
        /// Stop once this much time has passed; `None` runs until
        /// interrupted.
        duration: Option<Duration>,
    },
    /// Send a fixed number of packets back to back.
    Burst {
        /// Packets to send.
        packets: u32,
        /// Pause after a failed send, skipped after the final one.
        failure_delay: Duration,
    },
    /// Send one packet.
    Single,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous { duration: None } => write!(f, "continuous, unbounded"),
            Self::Continuous {
                duration: Some(duration),
            } => write!(f, "continuous for {}s", duration.as_secs()),
            Self::Burst { packets, .. } => write!(f, "burst of {packets}"),
            Self::Single => write!(f, "single"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Settings of the distributor health probe.
pub struct Health {
    /// Attempts before the probe is declared exhausted.
    pub max_attempts: NonZeroU32,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
/// Validated emitter configuration.
pub struct Config {
    /// The distributor's log ingestion endpoint.
    pub distributor_url: Url,
    /// The identity stamped on every packet.
    pub agent_id: String,
    /// Packets per second, finite and positive.
    pub emission_rate: f64,
    /// Chance that a continuous iteration sends a burst, in `[0, 1]`.
    pub burst_probability: f64,
    /// The emission schedule.
    pub mode: Mode,
    /// Health probe settings.
    pub health: Health,
    /// Seed for every random choice.
    pub seed: Option<u64>,
    /// Address to expose Prometheus metrics on.
    pub prometheus_addr: Option<SocketAddr>,
}

/// The agent identity used when none is configured.
#[must_use]
pub fn default_agent_id(hostname: Option<&str>) -> String {
    format!("emitter-{}", hostname.unwrap_or("local"))
}

impl Config {
    fn resolve(args: Args, hostname: Option<&str>) -> Result<Self, Error> {
        let mode = match args.mode.as_str() {
            "continuous" => Mode::Continuous {
                duration: (args.duration_seconds > 0)
                    .then_some(Duration::from_secs(args.duration_seconds)),
            },
            "burst" => Mode::Burst {
                packets: args.burst_size,
                failure_delay: Duration::from_millis(args.burst_failure_delay_ms),
            },
            "single" => Mode::Single,
            other => return Err(Error::UnknownMode(other.to_string())),
        };

        Pacer::new(args.emission_rate)?;
        if !(0.0..=1.0).contains(&args.burst_probability) {
            return Err(Error::Probability(args.burst_probability));
        }
        if !matches!(args.distributor_url.scheme(), "http" | "https") {
            return Err(Error::Scheme(args.distributor_url));
        }
        let agent_id = args
            .agent_id
            .unwrap_or_else(|| default_agent_id(hostname));
        if agent_id.is_empty() {
            return Err(Error::AgentId);
        }

        Ok(Self {
            distributor_url: args.distributor_url,
            agent_id,
            emission_rate: args.emission_rate,
            burst_probability: args.burst_probability,
            mode,
            health: Health {
                max_attempts: args.health_max_attempts,
                retry_delay: Duration::from_millis(args.health_retry_delay_ms),
            },
            seed: args.seed,
            prometheus_addr: args.prometheus_addr,
        })
    }
}

impl TryFrom<Args> for Config {
    type Error = Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let hostname = env::var("HOSTNAME").ok();
        Self::resolve(args, hostname.as_deref())
    }
}

#[cfg(test)]
mod test {
    use std::{num::NonZeroU32, time::Duration};

    use clap::Parser;

    use super::{Args, Config, DEFAULT_DISTRIBUTOR_URL, Error, Mode};

    fn parse(flags: &[&str]) -> Result<Config, Error> {
        let args = Args::try_parse_from(std::iter::once("emitter").chain(flags.iter().copied()))
            .expect("parsable arguments");
        Config::resolve(args, Some("host-1"))
    }

    #[test]
    fn defaults() {
        let config = parse(&["--agent-id", "emitter-a"]).expect("valid config");
        assert_eq!(config.distributor_url.as_str(), DEFAULT_DISTRIBUTOR_URL);
        assert_eq!(config.agent_id, "emitter-a");
        assert!((config.emission_rate - 1.0).abs() < f64::EPSILON);
        assert!((config.burst_probability - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.mode, Mode::Continuous { duration: None });
        assert_eq!(
            config.health.max_attempts,
            NonZeroU32::new(30).expect("non-zero")
        );
        assert_eq!(config.health.retry_delay, Duration::from_secs(2));
        assert_eq!(config.seed, None);
    }

    #[test]
    fn agent_id_from_hostname() {
        let args = Args::try_parse_from(["emitter"]).expect("parsable arguments");
        if args.agent_id.is_none() {
            let config = Config::resolve(args.clone(), Some("host-1")).expect("valid config");
            assert_eq!(config.agent_id, "emitter-host-1");
            let config = Config::resolve(args, None).expect("valid config");
            assert_eq!(config.agent_id, "emitter-local");
        }
    }

    #[test]
    fn modes() {
        let config = parse(&["--mode", "continuous", "--duration-seconds", "30"])
            .expect("valid config");
        assert_eq!(
            config.mode,
            Mode::Continuous {
                duration: Some(Duration::from_secs(30))
            }
        );

        let config = parse(&["--mode", "burst", "--burst-size", "5"]).expect("valid config");
        assert_eq!(
            config.mode,
            Mode::Burst {
                packets: 5,
                failure_delay: Duration::from_millis(100)
            }
        );

        let config = parse(&["--mode", "single"]).expect("valid config");
        assert_eq!(config.mode, Mode::Single);
    }

    #[test]
    fn unknown_mode_rejected() {
        let result = parse(&["--mode", "trickle"]);
        assert!(matches!(result, Err(Error::UnknownMode(mode)) if mode == "trickle"));
    }

    #[test]
    fn invalid_rate_rejected() {
        assert!(matches!(
            parse(&["--emission-rate", "0"]),
            Err(Error::Rate(_))
        ));
        assert!(matches!(
            parse(&["--emission-rate=-2.5"]),
            Err(Error::Rate(_))
        ));
    }

    #[test]
    fn invalid_probability_rejected() {
        assert!(matches!(
            parse(&["--burst-probability", "1.5"]),
            Err(Error::Probability(_))
        ));
        assert!(parse(&["--burst-probability", "0"]).is_ok());
        assert!(parse(&["--burst-probability", "1"]).is_ok());
    }

    #[test]
    fn invalid_url_rejected() {
        assert!(Args::try_parse_from(["emitter", "--distributor-url", "not a url"]).is_err());
        assert!(matches!(
            parse(&["--distributor-url", "ftp://distributor/api/v1/logs"]),
            Err(Error::Scheme(_))
        ));
    }

    #[test]
    fn zero_health_attempts_rejected() {
        assert!(Args::try_parse_from(["emitter", "--health-max-attempts", "0"]).is_err());
    }
}
