use std::fmt;

/// The three roles a constituent can occupy.
///
/// A closed enum rather than an ordered integer, so role comparisons go
/// through explicit pattern matching instead of relying on which variant
/// happens to sort highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

impl Role {
    pub fn is_follower(self) -> bool {
        matches!(self, Role::Follower)
    }

    pub fn is_candidate(self) -> bool {
        matches!(self, Role::Candidate)
    }

    pub fn is_leader(self) -> bool {
        matches!(self, Role::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Follower => "follower",
            Role::Candidate => "candidate",
            Role::Leader => "leader",
        };
        f.write_str(s)
    }
}
