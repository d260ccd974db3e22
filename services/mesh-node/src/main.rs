use anyhow::{bail, Context, Result};
use himesh_core::config::LedgerBackend;
use himesh_core::{current_timestamp_ms, logging, Config, EventBus, MeshEvent};
use himesh_crypto::KeyVault;
use himesh_mesh::{BatteryDrain, NodeRegistry};
use himesh_messaging::{InMemoryLedger, MeshService, MessageStore, SqliteLedger};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

const NODE_PROTOCOL_VERSION: u32 = 1;
const NODE_RUNTIME_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    runtime_version: u32,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            runtime_version: NODE_RUNTIME_VERSION,
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config = match parse_config_path(&args)? {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default_config(),
    };

    if config.logging.json {
        logging::init_json();
    } else {
        logging::init();
    }

    let events = EventBus::new(config.node.event_capacity);
    let vault = Arc::new(KeyVault::new());
    let registry = Arc::new(NodeRegistry::from_config(&config, vault, events.clone()));
    let ledger = open_ledger(&config)?;
    let service = Arc::new(MeshService::from_config(&config, registry.clone(), ledger));

    info!(
        mesh_id = %config.node.mesh_id,
        ledger = ?config.ledger.backend,
        rsa_bits = config.crypto.rsa_bits,
        "Mesh node started"
    );

    tokio::spawn(log_events(events.subscribe()));

    if config.drain.enabled {
        let drain = BatteryDrain::from_config(registry.clone(), &config.drain);
        tokio::spawn(drain.run());
    }

    let purge_interval = Duration::from_secs(config.ledger.purge_interval_secs.max(1));
    tokio::spawn(purge_expired(service.clone(), purge_interval));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!(nodes = registry.len(), "Mesh node shutting down");
    Ok(())
}

fn open_ledger(config: &Config) -> Result<Arc<dyn MessageStore>> {
    Ok(match config.ledger.backend {
        LedgerBackend::Memory => Arc::new(InMemoryLedger::new()),
        LedgerBackend::Sqlite => Arc::new(
            SqliteLedger::open(&config.ledger.path)
                .with_context(|| format!("failed to open ledger at {}", config.ledger.path))?,
        ),
    })
}

async fn purge_expired(service: Arc<MeshService>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = service.purge_expired(current_timestamp_ms()) {
            error!(error = %e, "Expiry purge failed");
        }
    }
}

async fn log_events(mut rx: tokio::sync::broadcast::Receiver<MeshEvent>) {
    loop {
        match rx.recv().await {
            Ok(MeshEvent::TopologyChanged { nodes, connections, .. }) => {
                debug!(nodes = nodes.len(), connections = connections.len(), "Topology changed");
            }
            Ok(event) => info!(event = event.kind(), "Mesh event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event logger lagging"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn parse_config_path(args: &[String]) -> Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            if let Some(path) = args_iter.next() {
                return Ok(Some(PathBuf::from(path)));
            }
            bail!("--config was provided without a path");
        }
    }
    Ok(None)
}
