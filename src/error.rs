use thiserror::Error as ThisError;

/// Crate-wide error type.
///
/// Most failures this core encounters are not propagated as errors at all
/// -- a transport failure becomes a no-vote, a persistence failure becomes
/// a denied vote reply. This type exists for the boundaries that
/// genuinely must refuse to proceed: configuration at startup, and
/// whatever an embedding `Agent`/`Transport` chooses to surface for
/// logging.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("persistence failed: {0}")]
    Persist(String),

    #[error("transport failed: {0}")]
    Transport(String),
}
