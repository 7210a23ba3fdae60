//! Participant process.
//!
//! Holds one replica of the store and serves clients. Exits if the
//! coordinator cannot be reached at startup.

use anyhow::{bail, Context};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::{lookup_host, TcpListener};
use tracing::{error, info};
use twophase_core::Event;
use twophase_participant::ParticipantState;
use twophase_production::{serve, telemetry, ParticipantService, Runner, Transport, TransportConfig};
use twophase_types::KvStore;

#[derive(Parser)]
#[command(name = "twophase-participant")]
#[command(about = "Two-phase commit participant replica")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7000")]
    port: u16,

    /// Coordinator address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6000")]
    coordinator: String,

    /// IP the coordinator and clients use to reach this participant
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    advertise: IpAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init();

    let Some(coordinator) = lookup_host(&args.coordinator)
        .await
        .with_context(|| format!("resolving {}", args.coordinator))?
        .next()
    else {
        bail!("{} did not resolve to any address", args.coordinator);
    };

    let transport = Transport::new(TransportConfig::default());
    if let Err(e) = transport.check_reachable(coordinator).await {
        error!(%coordinator, error = %e, "Coordinator unreachable");
        bail!("coordinator {coordinator} unreachable: {e}");
    }

    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.port))
        .await
        .with_context(|| format!("binding port {}", args.port))?;
    let address = SocketAddr::new(args.advertise, listener.local_addr()?.port());

    let store = Arc::new(KvStore::new());
    let state = ParticipantState::with_store(address, Arc::clone(&store));
    let id = state.id().clone();
    info!(participant = id.short(), %address, %coordinator, "Participant listening");

    let runner = Runner::new(state, transport, Some(coordinator));
    let events = runner.sender();
    let service = Arc::new(ParticipantService::new(id, store, events.clone()));
    tokio::spawn(serve(listener, service));
    events.send(Event::Started).await.context("queueing start")?;

    tokio::select! {
        _ = runner.run() => {}
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for ctrl-c")?;
            info!("Shutting down");
        }
    }
    Ok(())
}
