//! Bounded memory of closed transactions.

use std::collections::{HashSet, VecDeque};
use twophase_types::MessageId;

/// Remembers the most recent closed transaction ids.
///
/// Votes and acks that arrive after their window closed must not reopen the
/// transaction; this is how the coordinator recognises them. Oldest ids are
/// forgotten first once `capacity` is reached.
#[derive(Debug)]
pub struct DecidedHistory {
    capacity: usize,
    order: VecDeque<MessageId>,
    ids: HashSet<MessageId>,
}

impl DecidedHistory {
    /// Create a history holding at most `capacity` ids.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    /// Remember `id`. Returns false if it was already remembered.
    pub fn insert(&mut self, id: MessageId) -> bool {
        if !self.ids.insert(id) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.ids.remove(&evicted);
            }
        }
        true
    }

    /// Check if `id` is remembered.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Number of remembered ids.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_oldest() {
        let mut history = DecidedHistory::new(2);
        assert!(history.insert(MessageId::from_u128(1)));
        assert!(history.insert(MessageId::from_u128(2)));
        assert!(!history.insert(MessageId::from_u128(2)));

        history.insert(MessageId::from_u128(3));
        assert!(!history.contains(&MessageId::from_u128(1)));
        assert!(history.contains(&MessageId::from_u128(2)));
        assert!(history.contains(&MessageId::from_u128(3)));
        assert_eq!(history.len(), 2);
    }
}
