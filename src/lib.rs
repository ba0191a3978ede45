//! Leader-election core for a fixed-size agency of constituents.
//!
//! This crate is the election portion of a Raft-style consensus protocol:
//! given an `Agent` (durable log state + persistence + leadership
//! notification) and a `Transport` (best-effort RPC delivery), a
//! `Constituent` drives itself between `Follower`, `Candidate` and
//! `Leader` and exposes the two inbound RPCs (`requestVote`, `notifyAll`)
//! an embedding HTTP server routes to it. Log replication, snapshotting,
//! membership change and client command execution live somewhere else.

mod agent;
mod config;
mod constituent;
mod error;
mod handlers;
mod role;
mod rpc;
mod state;
mod transport;

pub use agent::{Agent, LastLogEntry};
pub use config::{Configuration, PeerId, Term};
pub use constituent::Constituent;
pub use error::Error;
pub use handlers::{handle_notify_all, handle_request_vote};
pub use role::Role;
pub use rpc::{NotifyAllBody, NotifyAllParams, RequestVoteParams, RequestVoteReply};
pub use transport::{HttpTransport, Transport, TransportError};
