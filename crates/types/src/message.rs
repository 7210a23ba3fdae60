//! Transaction message carried through the whole 2PC round.

use crate::{ClientId, MessageId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of mutation a transaction performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Store `value` under the key. Only legal when the key is absent.
    Put { value: String },
    /// Remove the key. Only legal when the key is present.
    Delete,
}

impl Operation {
    /// Short uppercase label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Put { .. } => "PUT",
            Operation::Delete => "DELETE",
        }
    }
}

/// One client-initiated operation.
///
/// Created once by the participant that receives the client request and
/// never mutated afterwards. Equality and hashing use only the `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionMessage {
    id: MessageId,
    operation: Operation,
    key: String,
    origin: ClientId,
}

impl TransactionMessage {
    /// Create a PUT message.
    pub fn put(
        id: MessageId,
        key: impl Into<String>,
        value: impl Into<String>,
        origin: ClientId,
    ) -> Self {
        Self {
            id,
            operation: Operation::Put {
                value: value.into(),
            },
            key: key.into(),
            origin,
        }
    }

    /// Create a DELETE message.
    pub fn delete(id: MessageId, key: impl Into<String>, origin: ClientId) -> Self {
        Self {
            id,
            operation: Operation::Delete,
            key: key.into(),
            origin,
        }
    }

    /// Get the message id.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Get the operation.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Get the key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value (PUT only).
    pub fn value(&self) -> Option<&str> {
        match &self.operation {
            Operation::Put { value } => Some(value),
            Operation::Delete => None,
        }
    }

    /// Get the client that issued the request.
    pub fn origin(&self) -> ClientId {
        self.origin
    }

    /// Check if this is a PUT.
    pub fn is_put(&self) -> bool {
        matches!(self.operation, Operation::Put { .. })
    }
}

impl PartialEq for TransactionMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TransactionMessage {}

impl Hash for TransactionMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TransactionMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operation {
            Operation::Put { value } => {
                write!(f, "{} PUT {}={} from {}", self.id, self.key, value, self.origin)
            }
            Operation::Delete => write!(f, "{} DELETE {} from {}", self.id, self.key, self.origin),
        }
    }
}
