//! The node binary: runs the heartbeat, gossip, and candidacy task chains
//! against one ring position.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ringvote::{gossip, heartbeat, logger_init, set_me, NodeConfig, NodeState, Request, RpcClient};
use tokio::sync::{watch, Mutex};

const KILL_TIME: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(about = "Ring cluster node")]
struct Cli {
    /// This node's id, in `1..=population`.
    id: u8,

    /// Coordinator address.
    #[arg(long, default_value = "127.0.0.1:9005")]
    coordinator: String,

    /// Optional TOML config file overriding the hardcoded defaults.
    #[arg(long)]
    config: Option<String>,

    /// Test-only: exit(1) at `KILL_TIME` if this node's id is 4.
    #[arg(long)]
    kill_hook: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger_init();

    let cli = Cli::parse();
    let config_str = match &cli.config {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => None,
    };
    let config = NodeConfig::load(config_str.as_deref())?;
    config.validate_id(cli.id)?;
    set_me(format!("node {}", cli.id));

    let state = Arc::new(Mutex::new(NodeState::new(cli.id)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let shutdown_tx = shutdown_tx.clone();
        ctrlc::set_handler(move || {
            let _ = shutdown_tx.send(true);
        })?;
    }

    let self_node = state
        .lock()
        .await
        .membership
        .get(cli.id)
        .copied()
        .expect("NodeState::new seeds the self record");
    let mut registration = RpcClient::new(
        cli.coordinator.clone(),
        Duration::from_millis(config.rpc_timeout_ms),
    );
    registration
        .call(Request::MembershipAdd(self_node))
        .await?;

    if cli.kill_hook && cli.id == 4 {
        tokio::spawn(async move {
            tokio::time::sleep(KILL_TIME).await;
            std::process::exit(1);
        });
    }

    let heartbeat_task = tokio::spawn(heartbeat::run(
        Arc::clone(&state),
        config.clone(),
        cli.coordinator.clone(),
        shutdown_rx.clone(),
    ));
    let gossip_task = tokio::spawn(gossip::run(
        Arc::clone(&state),
        config,
        cli.coordinator,
        shutdown_rx,
    ));

    let _ = tokio::join!(heartbeat_task, gossip_task);
    Ok(())
}
