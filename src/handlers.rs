//! Transport-agnostic RPC endpoint functions. These take already decoded
//! parameter types and a `&Constituent`, and hand back a serializable
//! reply. Deliberately thin: an embedder's HTTP framework owns decoding
//! the query string/body and encoding the response; these functions exist
//! so that wiring is a one-line call from any framework.

use crate::constituent::Constituent;
use crate::rpc::{NotifyAllBody, NotifyAllParams, RequestVoteParams, RequestVoteReply};

/// `POST /_api/agency_priv/requestVote`.
pub fn handle_request_vote(constituent: &Constituent, params: RequestVoteParams) -> RequestVoteReply {
    constituent.handle_request_vote(params)
}

/// `POST /_api/agency_priv/notifyAll`. No reply body; replies with a bare
/// 200 regardless of what it did internally.
pub fn handle_notify_all(constituent: &Constituent, params: NotifyAllParams, body: NotifyAllBody) {
    constituent.handle_notify_all(params, body)
}
