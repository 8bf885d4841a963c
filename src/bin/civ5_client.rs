use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use civ5_client::catalog::Catalog;
use civ5_client::host::run_bridge;
use civ5_client::{ClientConfig, ClientSession, HostSession, SharedHost};

/// Time the client gets to finish its current cycle after exit is signalled
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "civ5-client")]
#[command(about = "Civilization V randomizer client - relays items and checks through the Tuner port")]
struct Args {
    /// Client config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Item and location tables exported by the world (see civ5-catalog/tables.example.json)
    #[arg(long)]
    catalog: PathBuf,

    /// Tuner host
    #[arg(long)]
    host: Option<IpAddr>,

    /// Tuner port
    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    tick_ms: Option<u64>,

    #[arg(long)]
    settle_ms: Option<u64>,

    /// Multiworld server, handled by the launcher
    #[arg(long)]
    connect: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Slot name, handled by the launcher
    #[arg(long)]
    name: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut ClientConfig) {
        let host = self.host.unwrap_or(config.tuner_addr.ip());
        let port = self.port.unwrap_or(config.tuner_addr.port());
        config.tuner_addr = SocketAddr::new(host, port);
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval_ms = tick_ms;
        }
        if let Some(settle_ms) = self.settle_ms {
            config.settle_delay_ms = settle_ms;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the launcher bridge, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("civ5_client=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    let catalog = Arc::new(Catalog::from_json_file(&args.catalog)?);
    tracing::debug!(
        items = catalog.items().len(),
        locations = catalog.locations().len(),
        tuner = %config.tuner_addr,
        server = ?args.connect,
        slot = ?args.name,
        password = args.password.is_some(),
        "starting client"
    );

    let (host, outbox) = SharedHost::new();
    let bridge = tokio::spawn(run_bridge(host.clone(), outbox, tokio::io::stdin(), tokio::io::stdout()));
    let client = tokio::spawn(ClientSession::new(config, host.clone(), catalog).run());

    let mut exit = host.subscribe_exit();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::debug!("interrupted"),
        _ = async { exit.wait_for(|&stop| stop).await.is_ok() } => tracing::debug!("exit requested by host"),
    }
    host.request_exit();

    if tokio::time::timeout(SHUTDOWN_GRACE, client).await.is_err() {
        tracing::warn!("client did not stop within {:?}", SHUTDOWN_GRACE);
    }
    match tokio::time::timeout(SHUTDOWN_GRACE, bridge).await {
        Ok(Ok(Err(e))) => tracing::warn!(error = %e, "host bridge failed"),
        Ok(_) => {}
        Err(_) => tracing::warn!("host bridge did not stop within {:?}", SHUTDOWN_GRACE),
    }

    // The stdin reader can stay blocked on a read the runtime cannot cancel
    std::process::exit(0);
}
