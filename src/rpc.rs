//! Wire types for the three election RPCs. These are plain `serde`-derived
//! structs; how an embedder actually puts them on the wire (JSON body,
//! query string, form encoding) is its own business -- this core only
//! needs something `Serialize`/`Deserialize`.

use serde::{Deserialize, Serialize};

use crate::config::{PeerId, Term};

/// Parameters of `POST /_api/agency_priv/requestVote`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestVoteParams {
    pub term: Term,
    pub candidate_id: PeerId,
    pub prev_log_index: u64,
    pub prev_log_term: Term,
}

/// Reply to `requestVote`. Extra keys on the wire are tolerated and
/// ignored by callers that deserialize into this type directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestVoteReply {
    pub term: Term,
    pub vote_granted: bool,
}

/// Query parameters of `POST /_api/agency_priv/notifyAll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyAllParams {
    pub term: Term,
    pub agency_id: PeerId,
}

/// Body of `notifyAll`: the sender's view of the endpoint table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyAllBody {
    pub endpoints: Vec<String>,
}

impl serde::Serialize for Term {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Term {
    fn deserialize<D>(deserializer: D) -> Result<Term, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = u64::deserialize(deserializer)?;
        Ok(Term(v))
    }
}

impl serde::Serialize for PeerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0 as u64)
    }
}

impl<'de> serde::Deserialize<'de> for PeerId {
    fn deserialize<D>(deserializer: D) -> Result<PeerId, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = u64::deserialize(deserializer)?;
        Ok(PeerId(v as usize))
    }
}
