//! Protocol vocabulary: participant votes and coordinator decisions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A participant's answer to `prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Vote {
    /// Applying the operation is legal on this replica.
    Accept,
    /// Applying the operation would violate the presence rule.
    Reject,
}

impl Vote {
    /// Build a vote from a legality check result.
    pub fn from_legal(legal: bool) -> Self {
        if legal {
            Vote::Accept
        } else {
            Vote::Reject
        }
    }

    /// Check if this is an accept vote.
    pub fn is_accept(self) -> bool {
        matches!(self, Vote::Accept)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vote::Accept => write!(f, "accept"),
            Vote::Reject => write!(f, "reject"),
        }
    }
}

/// The coordinator's outcome for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Commit,
    Abort,
}

impl Decision {
    /// Strict 2PC: commit only if no collected vote is a reject.
    ///
    /// An empty vote set commits.
    pub fn from_votes<I: IntoIterator<Item = Vote>>(votes: I) -> Self {
        if votes.into_iter().all(Vote::is_accept) {
            Decision::Commit
        } else {
            Decision::Abort
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Commit => write!(f, "COMMIT"),
            Decision::Abort => write!(f, "ABORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_reject_aborts() {
        assert_eq!(
            Decision::from_votes([Vote::Accept, Vote::Accept]),
            Decision::Commit
        );
        assert_eq!(
            Decision::from_votes([Vote::Accept, Vote::Reject, Vote::Accept]),
            Decision::Abort
        );
    }

    #[test]
    fn test_no_votes_commits() {
        assert_eq!(Decision::from_votes([]), Decision::Commit);
    }
}
