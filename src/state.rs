//! The role state machine: Role, Term, Vote, LeaderId and the vote tally,
//! all owned exclusively by this type and guarded by a single lock at the
//! call site. Nothing in here talks to an `Agent` or `Transport` --
//! persistence and the majority-of-the-cluster decision are made one layer
//! up, in `Constituent`, because they need to call out to collaborators
//! this type should not know about.

use crate::config::{Configuration, PeerId, Term};
use crate::role::Role;

/// The mutable heart of a constituent. Everything here is guarded by one
/// mutex in `Constituent::shared`; this type itself does no locking.
#[derive(Debug)]
pub struct ConstituentState {
    role: Role,
    term: Term,
    vote: Option<PeerId>,
    leader_id: Option<PeerId>,
    votes: Vec<bool>,
    has_cast_vote: bool,
}

impl ConstituentState {
    /// Initial state for a peer: Follower at term zero, unless it is the
    /// sole member of the agency, in which case it is permanently Leader
    /// and never bothers allocating a tally vector.
    pub fn new(config: &Configuration) -> ConstituentState {
        if config.size() == 1 {
            return ConstituentState {
                role: Role::Leader,
                term: Term::ZERO,
                vote: None,
                leader_id: Some(config.id),
                votes: Vec::new(),
                has_cast_vote: false,
            };
        }
        ConstituentState {
            role: Role::Follower,
            term: Term::ZERO,
            vote: None,
            leader_id: None,
            votes: vec![false; config.size()],
            has_cast_vote: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn term(&self) -> Term {
        self.term
    }

    pub fn vote(&self) -> Option<PeerId> {
        self.vote
    }

    pub fn leader_id(&self) -> Option<PeerId> {
        self.leader_id
    }

    pub fn has_cast_vote(&self) -> bool {
        self.has_cast_vote
    }

    pub fn set_has_cast_vote(&mut self, value: bool) {
        self.has_cast_vote = value;
    }

    pub fn votes(&self) -> &[bool] {
        &self.votes
    }

    pub fn set_vote_tally(&mut self, id: PeerId, granted: bool) {
        self.votes[id.value()] = granted;
    }

    /// Count of peers (including self) whose tally entry is `true`.
    pub fn yea_count(&self) -> usize {
        self.votes.iter().filter(|&&v| v).count()
    }

    /// Adopts a term observed elsewhere and reverts to Follower. Returns
    /// whether the role actually changed, so the caller can decide whether
    /// to emit a role-change log line -- this type does no logging of its
    /// own.
    pub fn follow(&mut self, t: Term) -> bool {
        let changed = self.role != Role::Follower;
        if t > self.term {
            self.vote = None;
            self.leader_id = None;
        }
        self.term = t;
        for v in self.votes.iter_mut() {
            *v = false;
        }
        self.role = Role::Follower;
        changed
    }

    /// Raises the term in place without touching role, vote, leader or
    /// tally. Deliberately not the same transition as `follow`: a
    /// candidate bumping its own term going into a fresh election round
    /// needs to keep its self-vote, not wipe it.
    pub fn raise_term(&mut self, t: Term) {
        debug_assert!(t > self.term, "term must only rise: {:?} -> {:?}", self.term, t);
        self.term = t;
    }

    /// Precondition: `role == Follower`. Does not touch the term; the
    /// driver raises it itself once it is actually calling an election.
    pub fn enter_candidate(&mut self) {
        debug_assert_eq!(self.role, Role::Follower, "candidate() requires Follower");
        self.role = Role::Candidate;
    }

    /// Becomes Leader, minus the `Agent::lead()` notification, which the
    /// caller performs (this type cannot reach the Agent). Returns whether
    /// the role actually changed, mirroring `follow`.
    pub fn enter_leader(&mut self, self_id: PeerId) -> bool {
        let changed = self.role != Role::Leader;
        self.role = Role::Leader;
        self.leader_id = Some(self_id);
        changed
    }

    /// Marks the self-vote and the local cast-vote flag for a fresh
    /// election attempt. Precondition: `self_id` is within range of the
    /// tally vector.
    pub fn mark_self_vote(&mut self, self_id: PeerId) {
        self.votes[self_id.value()] = true;
        self.has_cast_vote = true;
    }

    /// The grant predicate, evaluated without side effects so the caller
    /// can decide whether to actually perform the (term, vote) adoption
    /// only after persistence succeeds.
    pub fn should_grant(&self, candidate_term: Term, candidate_id: PeerId) -> bool {
        candidate_term > self.term || (candidate_term == self.term && self.leader_id == Some(candidate_id))
    }

    /// Performs the local-state half of granting a vote: adopt the term,
    /// record the vote, set the believed leader, demote to Follower if
    /// currently above it. Persistence and the condition-variable signal
    /// are the caller's responsibility (they require collaborators this
    /// type does not have).
    pub fn record_grant(&mut self, candidate_term: Term, candidate_id: PeerId) {
        self.term = candidate_term;
        self.has_cast_vote = true;
        self.vote = Some(candidate_id);
        self.leader_id = Some(candidate_id);
        if self.role != Role::Follower {
            for v in self.votes.iter_mut() {
                *v = false;
            }
            self.role = Role::Follower;
        }
    }
}
