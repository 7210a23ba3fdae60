//! Coordinator process.
//!
//! Listens for participant calls and runs the 2PC rounds.

use anyhow::Context;
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use twophase_coordinator::CoordinatorState;
use twophase_production::{serve, telemetry, CoordinatorService, FileConfig, Runner, Transport};

#[derive(Parser)]
#[command(name = "twophase-coordinator")]
#[command(about = "Two-phase commit coordinator")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "6000")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the vote window (e.g., "1s", "500ms")
    #[arg(long)]
    vote_timeout: Option<humantime::Duration>,

    /// Override the ack window
    #[arg(long)]
    ack_timeout: Option<humantime::Duration>,

    /// Override how long a round may go without any vote or ack
    #[arg(long)]
    round_deadline: Option<humantime::Duration>,

    /// Override the delay before a returning participant is synced
    #[arg(long)]
    recovery_delay: Option<humantime::Duration>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init();

    let mut file = match &args.config {
        Some(path) => FileConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => FileConfig::default(),
    };
    if let Some(timeout) = args.vote_timeout {
        file.vote_timeout_ms = timeout.as_millis() as u64;
    }
    if let Some(timeout) = args.ack_timeout {
        file.ack_timeout_ms = timeout.as_millis() as u64;
    }
    if let Some(deadline) = args.round_deadline {
        file.round_deadline_ms = deadline.as_millis() as u64;
    }
    if let Some(delay) = args.recovery_delay {
        file.recovery_settle_delay_ms = delay.as_millis() as u64;
    }
    let config = file.coordinator()?;

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        %addr,
        vote_timeout = ?config.vote_timeout,
        ack_timeout = ?config.ack_timeout,
        "Coordinator listening"
    );

    let runner = Runner::new(CoordinatorState::new(config), Transport::new(file.transport()), None);
    let service = Arc::new(CoordinatorService::new(runner.sender()));
    tokio::spawn(serve(listener, service));

    tokio::select! {
        _ = runner.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("Shutting down");
        }
    }
    Ok(())
}
