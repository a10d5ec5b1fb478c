//! Emit synthetic log packets at a log distributor.
//!
//! The emitter waits for the distributor to report healthy, then runs one of
//! the single, burst or continuous schedules and reports its statistics.
//! Ctrl-c stops a run early; the statistics are still reported.

use clap::Parser;
use emitter::{
    config::{self, Args, Config},
    controller::{self, Controller, Schedule},
    health::{self, Probe, health_url},
    transport::{self, HttpTransport},
};
use emitter_pacing::RealClock;
use metrics_exporter_prometheus::PrometheusBuilder;
use rand::{SeedableRng, rngs::StdRng};
use tokio::{runtime::Builder, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] config::Error),
    #[error(transparent)]
    Controller(#[from] controller::Error),
    #[error(transparent)]
    Transport(#[from] transport::Error),
    #[error(transparent)]
    Health(#[from] health::Error),
    #[error("failed to install prometheus recorder: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
}

async fn inner_main(config: Config) -> Result<(), Error> {
    let (shutdown_watcher, shutdown_broadcast) = emitter_signal::signal();

    if let Some(addr) = config.prometheus_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .add_global_label("agent_id", config.agent_id.clone())
            .install()?;
        info!("serving prometheus metrics on {addr}");
    }

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("received ctrl-c");
                shutdown_broadcast.signal();
            }
            Err(err) => error!("unable to listen for ctrl-c: {err}"),
        }
    });

    let clock = RealClock::default();
    let probe = Probe::new(
        health_url(&config.distributor_url),
        config.health.max_attempts,
        config.health.retry_delay,
    )?;
    let mut probe_watcher = shutdown_watcher.clone();
    tokio::select! {
        result = probe.wait_until_healthy(&clock) => {
            result?;
        }
        () = probe_watcher.recv() => {
            info!("stopped before the distributor became healthy");
            return Ok(());
        }
    }

    let rng = config
        .seed
        .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
    let controller = Controller::new(
        &config.agent_id,
        HttpTransport::new(config.distributor_url.clone())?,
        clock,
        rng,
        Schedule::new(config.emission_rate, config.burst_probability)?,
        shutdown_watcher,
    )?;
    controller.run(config.mode).await;
    Ok(())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("starting emitter {version}");

    let config = Config::try_from(Args::parse()).inspect_err(|err| error!("{err}"))?;
    info!("distributor url: {}", config.distributor_url);
    info!("agent id: {}", config.agent_id);
    info!("emission rate: {} packets/second", config.emission_rate);
    info!("burst probability: {}", config.burst_probability);
    info!("mode: {}", config.mode);

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let res = runtime.block_on(inner_main(config));
    if let Err(err) = &res {
        error!("emitter failed: {err}");
    }
    res
}
