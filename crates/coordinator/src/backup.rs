//! Coordinator-side backup log.

use twophase_types::{Dataset, Decision, KvStore, Operation, TransactionMessage};

/// Shadow copy of the replicated data, kept only to resynchronize
/// participants that missed transactions.
#[derive(Debug, Default)]
pub struct BackupLog {
    store: KvStore,
}

impl BackupLog {
    /// Create an empty backup log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a transaction.
    ///
    /// Only commits change the log: a committed PUT stores its value, a
    /// committed DELETE removes the key. Returns true if the log changed.
    pub fn record(&self, message: &TransactionMessage, decision: Decision) -> bool {
        if decision != Decision::Commit {
            return false;
        }
        match message.operation() {
            Operation::Put { value } => {
                self.store.put(message.key(), value.as_str()).as_deref() != Some(value.as_str())
            }
            Operation::Delete => self.store.delete(message.key()).is_some(),
        }
    }

    /// Get the logged value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Copy the whole log, as pushed to a recovering participant.
    pub fn snapshot(&self) -> Dataset {
        self.store.snapshot()
    }

    /// Number of keys logged.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twophase_types::{ClientId, MessageId};

    #[test]
    fn test_commits_update_log() {
        let log = BackupLog::new();
        let client = ClientId::from_u128(1);

        let put = TransactionMessage::put(MessageId::from_u128(1), "a", "1", client);
        assert!(log.record(&put, Decision::Commit));
        assert_eq!(log.get("a").as_deref(), Some("1"));

        let delete = TransactionMessage::delete(MessageId::from_u128(2), "a", client);
        assert!(log.record(&delete, Decision::Commit));
        assert!(log.is_empty());
    }

    #[test]
    fn test_aborts_leave_log_untouched() {
        let log = BackupLog::new();
        let client = ClientId::from_u128(1);
        log.record(
            &TransactionMessage::put(MessageId::from_u128(1), "a", "1", client),
            Decision::Commit,
        );

        let overwrite = TransactionMessage::put(MessageId::from_u128(2), "a", "2", client);
        assert!(!log.record(&overwrite, Decision::Abort));
        assert_eq!(log.get("a").as_deref(), Some("1"));
    }
}
