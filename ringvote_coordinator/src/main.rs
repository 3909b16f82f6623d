//! The coordinator binary: hosts the membership, mailbox, leader, and
//! election services that every node in the ring talks to.

use clap::Parser;
use ringvote::{logger_init, set_me, CoordinatorConfig, CoordinatorServer};
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(about = "Ring cluster coordinator")]
struct Cli {
    /// Address to listen on; overrides the config file's `listen_addr`.
    #[arg(long)]
    listen: Option<String>,

    /// Optional TOML config file overriding the hardcoded defaults.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger_init();
    set_me("coordinator");

    let cli = Cli::parse();
    let config_str = match &cli.config {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };
    let mut config = CoordinatorConfig::load(config_str.as_deref())?;
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }

    let listener = TcpListener::bind(&config.listen_addr).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })?;

    let coord = CoordinatorServer::new();
    coord.serve(listener, shutdown_rx).await?;
    Ok(())
}
