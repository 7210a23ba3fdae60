//! Legality rule and client-facing result texts.

use twophase_types::{Decision, KvStore, Operation, TransactionMessage};

/// Check if `message` may be applied to `store`.
///
/// A PUT needs the key absent (values are immutable once written), a DELETE
/// needs it present.
pub fn is_legal(store: &KvStore, message: &TransactionMessage) -> bool {
    match message.operation() {
        Operation::Put { .. } => !store.contains(message.key()),
        Operation::Delete => store.contains(message.key()),
    }
}

/// Human-readable result for the client that issued `message`.
///
/// For an abort the local store is consulted to explain the rejection; it
/// has not been modified by the aborted transaction.
pub fn result_text(store: &KvStore, message: &TransactionMessage, decision: Decision) -> String {
    let key = message.key();
    match (decision, message.operation()) {
        (Decision::Commit, Operation::Put { value }) => {
            format!("key: {key} value: {value} has been stored")
        }
        (Decision::Commit, Operation::Delete) => format!("key: {key} has been deleted"),
        (Decision::Abort, Operation::Put { .. }) => match store.get(key) {
            Some(existing) => format!("key: {key} value: {existing} is immutable"),
            None => format!("key: {key} was rejected by another replica"),
        },
        (Decision::Abort, Operation::Delete) => {
            if store.contains(key) {
                format!("key: {key} was rejected by another replica")
            } else {
                format!("key: {key} is not found")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twophase_types::{ClientId, MessageId};

    fn put(key: &str, value: &str) -> TransactionMessage {
        TransactionMessage::put(MessageId::from_u128(1), key, value, ClientId::from_u128(1))
    }

    fn delete(key: &str) -> TransactionMessage {
        TransactionMessage::delete(MessageId::from_u128(2), key, ClientId::from_u128(1))
    }

    #[test]
    fn test_legality() {
        let store = KvStore::new();
        assert!(is_legal(&store, &put("a", "1")));
        assert!(!is_legal(&store, &delete("a")));

        store.put("a", "1");
        assert!(!is_legal(&store, &put("a", "2")));
        assert!(is_legal(&store, &delete("a")));
    }

    #[test]
    fn test_commit_texts() {
        let store = KvStore::new();
        assert_eq!(
            result_text(&store, &put("a", "1"), Decision::Commit),
            "key: a value: 1 has been stored"
        );
        assert_eq!(
            result_text(&store, &delete("a"), Decision::Commit),
            "key: a has been deleted"
        );
    }

    #[test]
    fn test_abort_texts_explain_local_state() {
        let store = KvStore::new();
        assert_eq!(
            result_text(&store, &delete("a"), Decision::Abort),
            "key: a is not found"
        );
        assert_eq!(
            result_text(&store, &put("a", "2"), Decision::Abort),
            "key: a was rejected by another replica"
        );

        store.put("a", "1");
        assert_eq!(
            result_text(&store, &put("a", "2"), Decision::Abort),
            "key: a value: 1 is immutable"
        );
        assert_eq!(
            result_text(&store, &delete("a"), Decision::Abort),
            "key: a was rejected by another replica"
        );
    }
}
