//! Drive a log distributor with a swarm of emitting agents.
//!
//! The swarm runs until its duration elapses or ctrl-c is received, then
//! reports the statistics merged across every agent.

use std::future;

use clap::Parser;
use emitter::swarm::{self, Args, Config};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::{runtime::Builder, signal, time::sleep};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Swarm(#[from] swarm::Error),
    #[error("failed to install prometheus recorder: {0}")]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
}

async fn inner_main(config: Config) -> Result<(), Error> {
    let (shutdown_watcher, shutdown_broadcast) = emitter_signal::signal();

    if let Some(addr) = config.prometheus_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("serving prometheus metrics on {addr}");
    }

    let duration = config.duration;
    tokio::spawn(async move {
        let timer = async {
            match duration {
                Some(duration) => sleep(duration).await,
                None => future::pending().await,
            }
        };
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => info!("received ctrl-c"),
                Err(err) => {
                    error!("unable to listen for ctrl-c: {err}");
                    future::pending::<()>().await;
                }
            }
        };
        tokio::select! {
            () = ctrl_c => {},
            () = timer => info!("swarm duration reached"),
        }
        shutdown_broadcast.signal();
    });

    swarm::run(&config, shutdown_watcher).await?;
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
    info!("starting emitter swarm {version}");

    let config = Config::try_from(Args::parse()).inspect_err(|err| error!("{err}"))?;

    let runtime = Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()?;
    runtime.block_on(inner_main(config))
}
