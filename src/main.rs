//! CLI for PingPong
//!
//! Subcommands:
//! - `api`: run the embedded broker and the HTTP API
//! - `worker`: connect to a broker and serve start commands
//! - `probe`: run a single timing probe and print its metrics

use clap::Parser;
use pingpong::api::{self, AppState};
use pingpong::broker::Broker;
use pingpong::bus::{Bus, LocalBus};
use pingpong::config::{Settings, load_config};
use pingpong::ping::{Probe, Sampler, TimingProbe, Worker};
use pingpong::transport::{RemoteBus, start_websocket_server};
use pingpong::utils::error::PingError;
use pingpong::utils::logging;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pingpong")]
enum Command {
    /// Run the WebSocket broker and the HTTP API
    Api {
        /// Also run a worker inside this process
        #[arg(long)]
        local_worker: bool,
    },
    /// Run a worker that probes targets on request
    Worker {
        /// Worker id reported with every sample (default: worker.name)
        #[arg(long)]
        name: Option<String>,
        /// Broker to connect to (default: worker.broker_url)
        #[arg(long)]
        broker_url: Option<String>,
    },
    /// Probe a target once and print the timings as JSON
    Probe {
        /// Absolute http or https URL
        target: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&config.log.level);

    let outcome = match cmd {
        Command::Api { local_worker } => run_api(config, local_worker).await,
        Command::Worker { name, broker_url } => run_worker(config, name, broker_url).await,
        Command::Probe { target } => run_probe(config, &target).await,
    };

    if let Err(e) = outcome {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_api(config: Settings, local_worker: bool) -> Result<(), PingError> {
    let broker = Arc::new(Mutex::new(Broker::new()));
    let bus = Arc::new(LocalBus::with_broker(broker.clone()));

    if local_worker {
        let sampler = build_sampler(&config, bus.clone(), &config.worker.name)?;
        Worker::new(bus.clone(), sampler).start().await?;
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    let state = AppState::new(bus, &config.ping);

    tokio::select! {
        res = start_websocket_server(broker, config.broker.clone()) => {
            error!("WebSocket broker exited unexpectedly.");
            res?;
        }
        res = api::serve(listener, state) => {
            error!("HTTP API exited unexpectedly.");
            res?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_worker(
    config: Settings,
    name: Option<String>,
    broker_url: Option<String>,
) -> Result<(), PingError> {
    let name = name.unwrap_or_else(|| config.worker.name.clone());
    let url = broker_url.unwrap_or_else(|| config.worker.broker_url.clone());

    let bus = Arc::new(RemoteBus::connect(&url).await?);
    info!("Worker [{name}] connected to {url}");
    let sampler = build_sampler(&config, bus.clone(), &name)?;

    tokio::select! {
        res = Worker::new(bus, sampler).run() => {
            res?;
            info!("Broker connection closed. Exiting.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_probe(config: Settings, target: &str) -> Result<(), PingError> {
    let probe = TimingProbe::new(config.ping.attempt_timeout())?;
    let (metrics, failure) = match probe.measure(target).await {
        Ok(metrics) => (metrics, None),
        Err(failure) => (failure.metrics, Some(failure.error.to_string())),
    };

    let report = serde_json::json!({
        "target": target,
        "success": failure.is_none(),
        "metrics": metrics,
        "error": failure,
    });
    println!("{report:#}");
    Ok(())
}

fn build_sampler(
    config: &Settings,
    bus: Arc<dyn Bus>,
    worker_id: &str,
) -> Result<Arc<Sampler>, PingError> {
    let probe = Arc::new(TimingProbe::new(config.ping.attempt_timeout())?);
    Ok(Arc::new(Sampler::new(
        bus,
        probe,
        worker_id,
        config.ping.sample_interval(),
    )))
}
