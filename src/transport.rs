//! Outbound RPC delivery. `Transport` is the narrow seam the election
//! driver uses to reach other constituents; this core does not own the
//! inbound side of the HTTP connection (that's the surrounding server's
//! job) but does provide a reference `HttpTransport` for embedders that
//! want one.

use std::time::Duration;

use crate::rpc::{NotifyAllBody, NotifyAllParams, RequestVoteParams, RequestVoteReply};

/// Errors a `Transport` impl can report back to the election driver. The
/// driver treats every one of these as a no-vote for the current round;
/// they are only ever logged, never propagated further.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("request timed out")]
    Timeout,
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

/// Best-effort delivery to a single remote peer, addressed by its
/// configured endpoint string.
pub trait Transport: Send + Sync {
    fn request_vote(
        &self,
        endpoint: &str,
        params: RequestVoteParams,
        deadline: Duration,
    ) -> Result<RequestVoteReply, TransportError>;

    fn notify_all(
        &self,
        endpoint: &str,
        params: NotifyAllParams,
        body: &NotifyAllBody,
        deadline: Duration,
    ) -> Result<(), TransportError>;
}

/// Reference `Transport` over real HTTP. Uses a blocking client so it
/// composes with the thread-per-activity concurrency model without
/// requiring an async runtime.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> HttpTransport {
        HttpTransport {
            client: reqwest::blocking::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        HttpTransport::new()
    }
}

impl Transport for HttpTransport {
    fn request_vote(
        &self,
        endpoint: &str,
        params: RequestVoteParams,
        deadline: Duration,
    ) -> Result<RequestVoteReply, TransportError> {
        let url = format!(
            "{}/_api/agency_priv/requestVote?term={}&candidateId={}&prevLogIndex={}&prevLogTerm={}",
            endpoint.trim_end_matches('/'),
            params.term,
            params.candidate_id,
            params.prev_log_index,
            params.prev_log_term,
        );
        let response = self
            .client
            .post(url)
            .timeout(deadline)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unreachable(e.to_string())
                }
            })?;
        response
            .json::<RequestVoteReply>()
            .map_err(|e| TransportError::MalformedReply(e.to_string()))
    }

    fn notify_all(
        &self,
        endpoint: &str,
        params: NotifyAllParams,
        body: &NotifyAllBody,
        deadline: Duration,
    ) -> Result<(), TransportError> {
        let url = format!(
            "{}/_api/agency_priv/notifyAll?term={}&agencyId={}",
            endpoint.trim_end_matches('/'),
            params.term,
            params.agency_id,
        );
        self.client
            .post(url)
            .timeout(deadline)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unreachable(e.to_string())
                }
            })?;
        Ok(())
    }
}
