//! Client-side pieces: the console command parser, the result monitor and
//! random key generation for prepopulation.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use twophase_types::{MessageId, ParticipantId, TransactionMessage};

/// Characters used for generated keys and values.
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz1234567890";

/// Length of generated keys and values.
pub const GENERATED_LEN: usize = 5;

/// A line typed at the console.
///
/// ```text
/// <server> get <key>
/// <server> put <key> <value>
/// <server> delete <key>
/// help
/// quit
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { server: usize, key: String },
    Put { server: usize, key: String, value: String },
    Delete { server: usize, key: String },
    Help,
    Quit,
}

/// Malformed console input. Reported and the console keeps going.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty input")]
    Empty,

    #[error("invalid server index: {0}")]
    InvalidServer(String),

    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let first = words.next().ok_or(CommandError::Empty)?;

        if first.eq_ignore_ascii_case("quit") || first.eq_ignore_ascii_case("exit") {
            return Ok(Command::Quit);
        }
        if first.eq_ignore_ascii_case("help") {
            return Ok(Command::Help);
        }

        let server = first
            .parse::<usize>()
            .map_err(|_| CommandError::InvalidServer(first.to_string()))?;
        let operation = words.next().ok_or(CommandError::Usage("<server> get|put|delete <key> [value]"))?;

        match operation.to_ascii_lowercase().as_str() {
            "get" => match (words.next(), words.next()) {
                (Some(key), None) => Ok(Command::Get {
                    server,
                    key: key.to_string(),
                }),
                _ => Err(CommandError::Usage("<server> get <key>")),
            },
            "put" => {
                let key = words.next().ok_or(CommandError::Usage("<server> put <key> <value>"))?;
                let value = words.collect::<Vec<_>>().join(" ");
                if value.is_empty() {
                    return Err(CommandError::Usage("<server> put <key> <value>"));
                }
                Ok(Command::Put {
                    server,
                    key: key.to_string(),
                    value,
                })
            }
            "delete" => match (words.next(), words.next()) {
                (Some(key), None) => Ok(Command::Delete {
                    server,
                    key: key.to_string(),
                }),
                _ => Err(CommandError::Usage("<server> delete <key>")),
            },
            other => Err(CommandError::UnknownOperation(other.to_string())),
        }
    }
}

/// A write the client is waiting on.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub operation: &'static str,
    pub key: String,
    pub participant: SocketAddr,
    pub sent_at: Instant,
}

/// A result pushed to the client's callback service.
#[derive(Debug, Clone)]
pub struct DeliveredResult {
    pub participant_id: ParticipantId,
    pub result: String,
    pub message_id: MessageId,
    /// The matching request, if it was still being tracked.
    pub pending: Option<PendingRequest>,
}

impl DeliveredResult {
    /// Time between sending the request and receiving the result.
    pub fn latency(&self) -> Option<Duration> {
        self.pending.as_ref().map(|pending| pending.sent_at.elapsed())
    }
}

/// Tracks outstanding writes and reports those never answered.
#[derive(Debug)]
pub struct ResultMonitor {
    pending: Mutex<HashMap<MessageId, PendingRequest>>,
    timeout: Duration,
}

impl ResultMonitor {
    /// Create a monitor. Requests older than `timeout` are reported as lost.
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start tracking a write sent to `participant`.
    pub fn track(&self, message: &TransactionMessage, participant: SocketAddr) {
        self.pending.lock().insert(
            message.id(),
            PendingRequest {
                operation: message.operation().label(),
                key: message.key().to_string(),
                participant,
                sent_at: Instant::now(),
            },
        );
    }

    /// Stop tracking `id`. Returns the request if it was still pending.
    pub fn complete(&self, id: MessageId) -> Option<PendingRequest> {
        self.pending.lock().remove(&id)
    }

    /// Remove and return every request older than the timeout.
    pub fn expire(&self) -> Vec<(MessageId, PendingRequest)> {
        self.expire_at(Instant::now())
    }

    fn expire_at(&self, now: Instant) -> Vec<(MessageId, PendingRequest)> {
        let mut pending = self.pending.lock();
        let expired: Vec<MessageId> = pending
            .iter()
            .filter(|(_, request)| now.saturating_duration_since(request.sent_at) > self.timeout)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| pending.remove(&id).map(|request| (id, request)))
            .collect()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

/// Random lowercase alphanumeric string of [`GENERATED_LEN`] characters.
pub fn random_string<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// `count` distinct random key/value pairs.
pub fn prepopulation<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<(String, String)> {
    let mut pairs: HashMap<String, String> = HashMap::with_capacity(count);
    while pairs.len() < count {
        pairs.insert(random_string(rng), random_string(rng));
    }
    let mut pairs: Vec<_> = pairs.into_iter().collect();
    pairs.sort();
    pairs
}
