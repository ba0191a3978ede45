//! The election driver and the glue that lets RPC endpoints reach the
//! role state machine. `Constituent` is the one handle an embedder holds:
//! it owns the driver thread's `JoinHandle` and joins it on drop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::agent::Agent;
use crate::config::{Configuration, PeerId, Term};
use crate::error::Error;
use crate::role::Role;
use crate::rpc::{NotifyAllBody, NotifyAllParams, RequestVoteParams, RequestVoteReply};
use crate::state::ConstituentState;
use crate::transport::Transport;

struct Shared {
    state: Mutex<ConstituentState>,
    cv: Condvar,
    shutdown: AtomicBool,
}

/// Everything the driver thread needs to keep running independently of the
/// outer `Constituent` handle's lifetime; held behind an `Arc` so the
/// driver thread and the outer handle can both reach it.
struct Inner {
    shared: Shared,
    config: Configuration,
    agent: Arc<dyn Agent>,
    transport: Arc<dyn Transport>,
    rng: Mutex<StdRng>,
}

/// A single constituent's election subsystem. Construct via `configure`;
/// the returned value owns the driver thread and joins it on drop.
pub struct Constituent {
    inner: Arc<Inner>,
    driver: Option<JoinHandle<()>>,
}

impl Constituent {
    /// Brings up a constituent: assumes `config` is already validated,
    /// seeds the initial role state, optionally fires the one-shot
    /// `notifyAll` bootstrap, and -- unless this is the sole member of the
    /// agency -- starts the election driver thread.
    pub fn configure(
        config: Configuration,
        agent: Arc<dyn Agent>,
        transport: Arc<dyn Transport>,
    ) -> Constituent {
        let state = ConstituentState::new(&config);
        let size = config.size();
        let notify_on_start = config.notify_on_start;
        let inner = Arc::new(Inner {
            shared: Shared {
                state: Mutex::new(state),
                cv: Condvar::new(),
                shutdown: AtomicBool::new(false),
            },
            config,
            agent,
            transport,
            rng: Mutex::new(StdRng::from_entropy()),
        });

        if size > 1 && notify_on_start {
            inner.notify_all();
        }

        let driver = if size > 1 {
            let driver_inner = Arc::clone(&inner);
            Some(thread::spawn(move || driver_loop(driver_inner)))
        } else {
            None
        };

        Constituent { inner, driver }
    }

    /// Same as `configure`, but the RNG used for election-timeout jitter
    /// is seeded deterministically instead of from entropy. Give each peer
    /// its own seed -- sharing one RNG across peers in a test locks their
    /// jitter in step and defeats the point of randomizing it.
    pub fn configure_with_seed(
        config: Configuration,
        agent: Arc<dyn Agent>,
        transport: Arc<dyn Transport>,
        seed: u64,
    ) -> Constituent {
        let state = ConstituentState::new(&config);
        let size = config.size();
        let notify_on_start = config.notify_on_start;
        let inner = Arc::new(Inner {
            shared: Shared {
                state: Mutex::new(state),
                cv: Condvar::new(),
                shutdown: AtomicBool::new(false),
            },
            config,
            agent,
            transport,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        });

        if size > 1 && notify_on_start {
            inner.notify_all();
        }

        let driver = if size > 1 {
            let driver_inner = Arc::clone(&inner);
            Some(thread::spawn(move || driver_loop(driver_inner)))
        } else {
            None
        };

        Constituent { inner, driver }
    }

    pub fn role(&self) -> Role {
        self.inner.shared.state.lock().unwrap().role()
    }

    pub fn term(&self) -> Term {
        self.inner.shared.state.lock().unwrap().term()
    }

    pub fn leader_id(&self) -> Option<PeerId> {
        self.inner.shared.state.lock().unwrap().leader_id()
    }

    pub fn is_leader(&self) -> bool {
        self.role().is_leader()
    }

    /// `requestVote` RPC endpoint. Holds the state lock across the
    /// `Agent::persist` call: this core's single coarse mutex covers the
    /// whole transition, so nothing observes the grant (the reply, the
    /// condition-variable signal) until persistence has already happened.
    pub fn handle_request_vote(&self, params: RequestVoteParams) -> RequestVoteReply {
        self.inner.handle_request_vote(params)
    }

    /// `notifyAll` RPC endpoint. Idempotent, safe on unknown senders;
    /// folds the observed term into the state machine and logs the rest.
    /// Configuration's endpoint table is immutable, so this does not
    /// attempt to refresh it from the request body.
    pub fn handle_notify_all(&self, params: NotifyAllParams, body: NotifyAllBody) {
        self.inner.handle_notify_all(params, body)
    }

    /// The generic "observed remote term" path: called by an embedding
    /// replicated-log Agent whenever it observes a term on the wire
    /// outside of the two RPCs this core owns (e.g. on receipt of an
    /// `AppendEntries`-equivalent).
    pub fn observe_term(&self, term: Term) {
        self.inner.observe_term(term)
    }

    /// Broadcasts the one-shot `notifyAll` bootstrap on demand, in
    /// addition to whatever `configure` already did for `notify_on_start`.
    /// Returns the number of recipients attempted (`size() - 1`).
    pub fn notify_all(&self) -> usize {
        self.inner.notify_all()
    }
}

impl Drop for Constituent {
    /// Flips the stop flag, wakes every suspension point, and joins the
    /// driver thread so no detached thread outlives this handle.
    fn drop(&mut self) {
        self.inner.shared.shutdown.store(true, Ordering::SeqCst);
        self.inner.shared.cv.notify_all();
        if let Some(handle) = self.driver.take() {
            let _ = handle.join();
        }
    }
}

impl Inner {
    fn is_shutting_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::SeqCst)
    }

    /// Persists a term change regardless of which transition caused it --
    /// only call this when the term actually moved. Best-effort: a
    /// failure here is logged, not fatal, since unlike a vote grant
    /// nothing downstream depends on it succeeding before continuing.
    fn persist_term(&self, term: Term, vote: Option<PeerId>) {
        if let Err(e) = self.agent.persist(term, vote) {
            log::error!("term {}: {}", term, Error::Persist(e));
        }
    }

    fn random_duration(&self, min: Duration, max: Duration) -> Duration {
        let min_s = min.as_secs_f64();
        let max_s = max.as_secs_f64().max(min_s);
        let mut rng = self.rng.lock().unwrap();
        let dist = Uniform::new_inclusive(min_s, max_s);
        Duration::from_secs_f64(dist.sample(&mut *rng))
    }

    /// Blocks until either `has_cast_vote` becomes true (another thread
    /// granted a vote and signalled the condition variable) or `timeout`
    /// elapses, whichever first. Returns whether a vote was cast. Wakes
    /// immediately on shutdown.
    fn sleep_until_cast_or_timeout(&self, timeout: Duration) -> bool {
        let guard = self.shared.state.lock().unwrap();
        let (guard, _) = self
            .shared
            .cv
            .wait_timeout_while(guard, timeout, |s| {
                !s.has_cast_vote() && !self.is_shutting_down()
            })
            .unwrap();
        guard.has_cast_vote()
    }

    fn follower_tick(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.set_has_cast_vote(false);
        }
        let timeout = self.random_duration(self.config.min_ping, self.config.max_ping);
        let cast = self.sleep_until_cast_or_timeout(timeout);
        if !cast && !self.is_shutting_down() {
            let mut state = self.shared.state.lock().unwrap();
            if state.role() == Role::Follower {
                state.enter_candidate();
                log::info!(
                    "role change: converted to candidate in term {}",
                    state.term()
                );
            }
        }
    }

    /// Runs one round of an election. Reached whenever the role is
    /// Candidate or Leader -- a Leader keeps re-running this as its
    /// heartbeat substitute.
    fn call_election(self: &Arc<Self>) {
        let self_id = self.config.id;
        let term;
        let mut raised_term = None;
        {
            let mut state = self.shared.state.lock().unwrap();
            state.mark_self_vote(self_id);
            if state.role().is_candidate() {
                state.raise_term(state.term().next());
                raised_term = Some(state.vote());
            }
            term = state.term();
        }
        if let Some(vote) = raised_term {
            self.persist_term(term, vote);
        }

        let last_log = self.agent.last_log();
        let params = RequestVoteParams {
            term,
            candidate_id: self_id,
            prev_log_index: last_log.index,
            prev_log_term: last_log.term,
        };

        let (tx, rx) = mpsc::channel();
        let mut sent = 0usize;
        for i in 0..self.config.size() {
            if i == self_id.value() {
                continue;
            }
            let endpoint = self.config.end_point(PeerId(i));
            if endpoint.is_empty() {
                continue;
            }
            // Pessimistic default: unreachable/slow peers count as a
            // no-vote unless overwritten by an actual reply below.
            {
                let mut state = self.shared.state.lock().unwrap();
                state.set_vote_tally(PeerId(i), false);
            }
            sent += 1;
            let transport = Arc::clone(&self.transport);
            let endpoint = endpoint.to_string();
            let tx = tx.clone();
            let deadline = self.config.min_ping;
            thread::spawn(move || {
                let result = transport.request_vote(&endpoint, params, deadline);
                let _ = tx.send((PeerId(i), result));
            });
        }
        drop(tx);

        let round_start = Instant::now();
        let collect_window = self.random_duration(
            self.config.min_ping.mul_f64(0.5),
            self.config.min_ping.mul_f64(0.8),
        );
        thread::sleep(collect_window);

        let mut aborted = false;
        let mut received = 0usize;
        while received < sent {
            let remaining = self
                .config
                .min_ping
                .saturating_sub(round_start.elapsed());
            let reply = match rx.recv_timeout(remaining) {
                Ok(reply) => reply,
                Err(_) => break, // remaining peers stay at the pessimistic false default
            };
            received += 1;
            match reply {
                (_peer, Ok(reply)) if reply.term > term => {
                    let mut state = self.shared.state.lock().unwrap();
                    let changed = state.follow(reply.term);
                    let vote_after = state.vote();
                    drop(state);
                    if changed {
                        log::info!("role change: converted to follower in term {}", reply.term);
                    }
                    self.persist_term(reply.term, vote_after);
                    aborted = true;
                    break;
                }
                (peer, Ok(reply)) => {
                    let mut state = self.shared.state.lock().unwrap();
                    state.set_vote_tally(peer, reply.vote_granted);
                }
                (peer, Err(e)) => {
                    log::warn!(
                        "counting peer {} as a no-vote this round: {}",
                        peer,
                        Error::Transport(e.to_string())
                    );
                }
            }
        }

        if aborted {
            return;
        }

        let mut state = self.shared.state.lock().unwrap();
        let yea = state.yea_count();
        if yea > self.config.majority() {
            let became_leader = state.enter_leader(self_id);
            drop(state);
            if became_leader {
                log::info!("role change: converted to leader in term {}", term);
                self.agent.lead();
            }
        } else {
            let changed = state.follow(term);
            drop(state);
            if changed {
                log::info!("role change: converted to follower in term {}", term);
            }
        }
    }

    fn handle_request_vote(&self, params: RequestVoteParams) -> RequestVoteReply {
        let mut state = self.shared.state.lock().unwrap();

        if !state.should_grant(params.term, params.candidate_id) {
            return RequestVoteReply {
                term: state.term(),
                vote_granted: false,
            };
        }

        let local_last_log = self.agent.last_log();
        let candidate_last_log = crate::agent::LastLogEntry {
            index: params.prev_log_index,
            term: params.prev_log_term,
        };
        if !candidate_last_log.is_at_least_as_up_to_date_as(local_last_log) {
            return RequestVoteReply {
                term: state.term(),
                vote_granted: false,
            };
        }

        if let Err(e) = self.agent.persist(params.term, Some(params.candidate_id)) {
            log::error!(
                "denying vote to {} at term {}: {}",
                params.candidate_id,
                params.term,
                Error::Persist(e)
            );
            return RequestVoteReply {
                term: state.term(),
                vote_granted: false,
            };
        }

        state.record_grant(params.term, params.candidate_id);
        let reply_term = state.term();
        drop(state);
        self.shared.cv.notify_all();
        RequestVoteReply {
            term: reply_term,
            vote_granted: true,
        }
    }

    fn handle_notify_all(&self, params: NotifyAllParams, body: NotifyAllBody) {
        self.observe_term(params.term);
        log::debug!(
            "received notifyAll from agency {} at term {} ({} endpoints)",
            params.agency_id,
            params.term,
            body.endpoints.len()
        );
    }

    fn observe_term(&self, term: Term) {
        let mut state = self.shared.state.lock().unwrap();
        if term > state.term() {
            let changed = state.follow(term);
            let vote_after = state.vote();
            drop(state);
            if changed {
                log::info!("role change: converted to follower in term {}", term);
            }
            self.shared.cv.notify_all();
            self.persist_term(term, vote_after);
        }
    }

    /// Unlike `call_election`'s broadcast, this does not skip blank
    /// endpoints -- it only excludes `self`.
    fn notify_all(&self) -> usize {
        let term = self.shared.state.lock().unwrap().term();
        let body = NotifyAllBody {
            endpoints: self.config.endpoints.clone(),
        };
        let params = NotifyAllParams {
            term,
            agency_id: self.config.id,
        };
        let deadline = self.config.min_ping;
        let mut attempted = 0usize;
        for i in 0..self.config.size() {
            if i == self.config.id.value() {
                continue;
            }
            attempted += 1;
            let transport = Arc::clone(&self.transport);
            let endpoint = self.config.end_point(PeerId(i)).to_string();
            let body = body.clone();
            thread::spawn(move || {
                if let Err(e) = transport.notify_all(&endpoint, params, &body, deadline) {
                    log::warn!("notifyAll to {}: {}", endpoint, Error::Transport(e.to_string()));
                }
            });
        }
        attempted
    }
}

fn driver_loop(inner: Arc<Inner>) {
    while !inner.is_shutting_down() {
        let role = inner.shared.state.lock().unwrap().role();
        match role {
            Role::Follower => inner.follower_tick(),
            Role::Candidate | Role::Leader => inner.call_election(),
        }
    }
}
