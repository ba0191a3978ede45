use std::time::Duration;

use crate::error::Error;

/// A peer's stable index within the agency, `[0, size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub usize);

impl PeerId {
    pub fn value(self) -> usize {
        self.0
    }
}

impl From<usize> for PeerId {
    fn from(v: usize) -> Self {
        PeerId(v)
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A monotonically increasing election term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Term(pub u64);

impl Term {
    pub const ZERO: Term = Term(0);

    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns `other` if it is strictly greater than `self`, panicking in
    /// debug builds otherwise. Callers only ever reach for this when they
    /// have already checked `other > self`; it exists so the "term only
    /// rises" invariant has one place it can be double-checked.
    pub fn raised_to(self, other: Term) -> Term {
        debug_assert!(other > self, "term must only rise: {:?} -> {:?}", self, other);
        other
    }

    pub fn next(self) -> Term {
        Term(self.0 + 1)
    }
}

impl std::fmt::Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static, validated configuration for one constituent. Immutable after
/// construction, shared read-only with the election driver.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// This peer's own id.
    pub id: PeerId,
    /// Endpoints of every peer in the agency, indexed by `PeerId`. This
    /// peer's own entry may be empty; entries for peers that are not (yet)
    /// known may also be empty and are skipped by the election driver.
    pub endpoints: Vec<String>,
    /// Lower bound of the randomised follower election timeout.
    pub min_ping: Duration,
    /// Upper bound of the randomised follower election timeout.
    pub max_ping: Duration,
    /// If true, broadcast a one-shot `notifyAll` after configuration.
    pub notify_on_start: bool,
}

impl Configuration {
    pub fn new(
        id: PeerId,
        endpoints: Vec<String>,
        min_ping: Duration,
        max_ping: Duration,
        notify_on_start: bool,
    ) -> Result<Configuration, Error> {
        let config = Configuration {
            id,
            endpoints,
            min_ping,
            max_ping,
            notify_on_start,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.endpoints.is_empty() {
            return Err(Error::Config("agency must have at least one peer".into()));
        }
        if self.id.value() >= self.endpoints.len() {
            return Err(Error::Config(format!(
                "id {} out of range for agency of size {}",
                self.id,
                self.endpoints.len()
            )));
        }
        if self.min_ping.is_zero() {
            return Err(Error::Config("min_ping must be positive".into()));
        }
        if self.max_ping < self.min_ping {
            return Err(Error::Config(format!(
                "max_ping ({:?}) must be >= min_ping ({:?})",
                self.max_ping, self.min_ping
            )));
        }
        Ok(())
    }

    /// Size of the agency.
    pub fn size(&self) -> usize {
        self.endpoints.len()
    }

    pub fn end_point(&self, id: PeerId) -> &str {
        &self.endpoints[id.value()]
    }

    /// Strict majority threshold: `yea > size/2`.
    pub fn majority(&self) -> usize {
        self.size() / 2
    }
}
