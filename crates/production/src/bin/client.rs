//! Interactive client.
//!
//! Talks to up to five participants and listens for write results on a
//! callback port. Reads commands from stdin:
//!
//! ```text
//! 0 put color blue
//! 1 get color
//! 2 delete color
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{lookup_host, TcpListener};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use twophase_messages::{ParticipantRequest, Request, Response};
use twophase_production::client::prepopulation;
use twophase_production::{
    serve, telemetry, ClientService, Command, DeliveredResult, ResultMonitor, Transport, TransportConfig,
};
use twophase_types::{ClientEndpoint, MessageId, TransactionMessage};

const MAX_PARTICIPANTS: usize = 5;

const HELP: &str = "\
commands:
  <server> get <key>
  <server> put <key> <value>
  <server> delete <key>
  help
  quit";

#[derive(Parser)]
#[command(name = "twophase-client")]
#[command(about = "Console client for the replicated store")]
#[command(version)]
struct Args {
    /// Participant addresses (host:port, comma-separated, up to five)
    #[arg(short, long = "participant", value_delimiter = ',', required = true)]
    participants: Vec<String>,

    /// Port the result callback service listens on
    #[arg(long, default_value = "9000")]
    callback_port: u16,

    /// IP participants use to reach the callback service
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    advertise: IpAddr,

    /// Number of random keys to write before the console starts
    #[arg(long, default_value = "0")]
    prepopulate: usize,

    /// Report writes with no result after this long
    #[arg(long, default_value = "5s")]
    timeout: humantime::Duration,
}

struct Client {
    endpoint: ClientEndpoint,
    participants: Vec<SocketAddr>,
    transport: Transport,
    monitor: Arc<ResultMonitor>,
}

impl Client {
    fn participant(&self, server: usize) -> Option<SocketAddr> {
        self.participants.get(server).copied()
    }

    async fn get(&self, participant: SocketAddr, key: String) {
        let request = Request::from(ParticipantRequest::Get {
            client_id: self.endpoint.client_id,
            key: key.clone(),
        });
        match self.transport.request(participant, &request).await {
            Ok(Response::Value(Some(value))) => println!("key: {key} value: {value}"),
            Ok(Response::Value(None)) => println!("key: {key} is not found"),
            Ok(other) => warn!(%participant, response = ?other, "Unexpected response"),
            Err(e) => error!(%participant, error = %e, "Get failed"),
        }
    }

    /// Send a write and start tracking it. The outcome arrives on the
    /// callback service.
    async fn write(&self, participant: SocketAddr, message: TransactionMessage) {
        self.monitor.track(&message, participant);
        let id = message.id();
        let request = if message.is_put() {
            ParticipantRequest::Put {
                message,
                client: self.endpoint,
            }
        } else {
            ParticipantRequest::Delete {
                message,
                client: self.endpoint,
            }
        };
        match self.transport.request(participant, &Request::from(request)).await {
            Ok(_) => debug!(tx = %id, %participant, "Write submitted"),
            Err(e) => {
                self.monitor.complete(id);
                error!(tx = %id, %participant, error = %e, "Write failed");
            }
        }
    }

    async fn execute(&self, command: Command) {
        let server = match &command {
            Command::Get { server, .. } | Command::Put { server, .. } | Command::Delete { server, .. } => *server,
            Command::Help | Command::Quit => return,
        };
        let Some(participant) = self.participant(server) else {
            println!("no participant {server}, have {}", self.participants.len());
            return;
        };
        let origin = self.endpoint.client_id;
        match command {
            Command::Get { key, .. } => self.get(participant, key).await,
            Command::Put { key, value, .. } => {
                let message = TransactionMessage::put(MessageId::random(), key, value, origin);
                self.write(participant, message).await;
            }
            Command::Delete { key, .. } => {
                let message = TransactionMessage::delete(MessageId::random(), key, origin);
                self.write(participant, message).await;
            }
            Command::Help | Command::Quit => {}
        }
    }
}

async fn resolve(target: &str) -> anyhow::Result<SocketAddr> {
    match lookup_host(target)
        .await
        .with_context(|| format!("resolving {target}"))?
        .next()
    {
        Some(addr) => Ok(addr),
        None => bail!("{target} did not resolve to any address"),
    }
}

fn print_result(delivered: &DeliveredResult) {
    match delivered.latency() {
        Some(latency) => println!(
            "[{}] {} ({} ms)",
            delivered.participant_id.short(),
            delivered.result,
            latency.as_millis()
        ),
        None => println!("[{}] {} (late)", delivered.participant_id.short(), delivered.result),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init();

    if args.participants.len() > MAX_PARTICIPANTS {
        bail!("at most {MAX_PARTICIPANTS} participants are supported");
    }

    let transport = Transport::new(TransportConfig::default());
    let mut participants = Vec::with_capacity(args.participants.len());
    for target in &args.participants {
        let addr = resolve(target).await?;
        transport
            .check_reachable(addr)
            .await
            .with_context(|| format!("participant {addr} unreachable"))?;
        participants.push(addr);
    }

    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), args.callback_port))
        .await
        .with_context(|| format!("binding port {}", args.callback_port))?;
    let callback = SocketAddr::new(args.advertise, listener.local_addr()?.port());
    let endpoint = ClientEndpoint::new(twophase_types::ClientId::random(), callback);
    info!(client = %endpoint, participants = participants.len(), "Client ready");

    let monitor = Arc::new(ResultMonitor::new(Duration::from(args.timeout)));
    let (results, mut delivered) = mpsc::unbounded_channel();
    tokio::spawn(serve(listener, Arc::new(ClientService::new(Arc::clone(&monitor), results))));
    tokio::spawn(async move {
        while let Some(result) = delivered.recv().await {
            print_result(&result);
        }
    });

    let expiry = Arc::clone(&monitor);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            for (id, request) in expiry.expire() {
                println!(
                    "no result for {} {} sent to {} (tx {id}) after {:?}",
                    request.operation,
                    request.key,
                    request.participant,
                    expiry.timeout()
                );
            }
        }
    });

    let client = Client {
        endpoint,
        participants,
        transport,
        monitor,
    };

    if args.prepopulate > 0 {
        let pairs = prepopulation(&mut rand::thread_rng(), args.prepopulate);
        info!(count = pairs.len(), "Prepopulating");
        for (i, (key, value)) in pairs.into_iter().enumerate() {
            let participant = client.participants[i % client.participants.len()];
            let message = TransactionMessage::put(MessageId::random(), key, value, endpoint.client_id);
            client.write(participant, message).await;
        }
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(Command::Help) => println!("{HELP}"),
            Ok(command) => client.execute(command).await,
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
