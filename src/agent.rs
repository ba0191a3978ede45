use crate::config::{PeerId, Term};

/// Read-only view of the replicated log's tail, as supplied by the Agent.
/// This core never writes it; it is only used for the up-to-date-log
/// check when granting a vote, and to fill in `RequestVote`'s
/// `prevLogIndex`/`prevLogTerm` fields when this peer is itself a
/// candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LastLogEntry {
    pub index: u64,
    pub term: Term,
}

impl LastLogEntry {
    /// Standard Raft log-comparison rule: `self` (typically a candidate's
    /// advertised tail) is at least as up to date as `other` (typically the
    /// local tail) if its last term is higher, or the terms tie and its
    /// last index is at least as large.
    pub fn is_at_least_as_up_to_date_as(&self, other: LastLogEntry) -> bool {
        self.term > other.term || (self.term == other.term && self.index >= other.index)
    }
}

/// The external collaborator that owns durable log state and is notified
/// of leadership changes. Log replication, snapshotting and membership
/// changes live on the other side of this trait -- it is strictly the
/// surface the election core needs.
pub trait Agent: Send + Sync {
    /// Returns `(lastLogIndex, lastLogTerm)` for the up-to-date-log check.
    fn last_log(&self) -> LastLogEntry;

    /// Durably persists `(term, voted_for)`. Must complete before a vote
    /// grant is replied to. `voted_for` is `None` only when persisting a
    /// bare term bump with no vote cast this term.
    fn persist(&self, term: Term, voted_for: Option<PeerId>) -> Result<(), String>;

    /// Called exactly when the role transitions to Leader. The agent uses
    /// this to reinitialise whatever replication state it owns; this core
    /// does not care what that entails.
    fn lead(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_term_is_always_more_up_to_date() {
        let candidate = LastLogEntry { index: 1, term: Term(5) };
        let local = LastLogEntry { index: 100, term: Term(4) };
        assert!(candidate.is_at_least_as_up_to_date_as(local));
    }

    #[test]
    fn same_term_compares_by_index() {
        let ahead = LastLogEntry { index: 10, term: Term(3) };
        let behind = LastLogEntry { index: 9, term: Term(3) };
        assert!(ahead.is_at_least_as_up_to_date_as(behind));
        assert!(!behind.is_at_least_as_up_to_date_as(ahead));
    }

    #[test]
    fn lower_term_is_never_more_up_to_date() {
        let candidate = LastLogEntry { index: 1000, term: Term(1) };
        let local = LastLogEntry { index: 0, term: Term(2) };
        assert!(!candidate.is_at_least_as_up_to_date_as(local));
    }
}
