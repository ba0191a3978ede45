//! Shared test doubles for the scenario and property tests: a recording
//! `Agent` and an in-memory `Transport` that loops requests straight back
//! to the target `Constituent` in the same process, so scenario tests
//! never open a real socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agency::{
    Agent, Configuration, Constituent, LastLogEntry, NotifyAllBody, NotifyAllParams, PeerId,
    RequestVoteParams, RequestVoteReply, Term, Transport, TransportError,
};

/// Records every `persist`/`lead` call instead of writing anywhere, so
/// tests can assert on exactly what was durably committed and when.
pub struct RecordingAgent {
    pub persisted: Mutex<Vec<(Term, Option<PeerId>)>>,
    pub led_count: AtomicUsize,
}

impl RecordingAgent {
    pub fn new() -> RecordingAgent {
        RecordingAgent {
            persisted: Mutex::new(Vec::new()),
            led_count: AtomicUsize::new(0),
        }
    }

    pub fn led(&self) -> usize {
        self.led_count.load(Ordering::SeqCst)
    }

    pub fn last_persisted(&self) -> Option<(Term, Option<PeerId>)> {
        self.persisted.lock().unwrap().last().copied()
    }
}

impl Agent for RecordingAgent {
    fn last_log(&self) -> LastLogEntry {
        LastLogEntry::default()
    }

    fn persist(&self, term: Term, voted_for: Option<PeerId>) -> Result<(), String> {
        self.persisted.lock().unwrap().push((term, voted_for));
        Ok(())
    }

    fn lead(&self) {
        self.led_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A `Transport` that never reaches anyone -- every send fails. Useful for
/// single-constituent tests that only drive the RPC endpoints directly and
/// never want the election driver to actually talk to peers.
pub struct NullTransport;

impl Transport for NullTransport {
    fn request_vote(
        &self,
        _endpoint: &str,
        _params: RequestVoteParams,
        _deadline: Duration,
    ) -> Result<RequestVoteReply, TransportError> {
        Err(TransportError::Unreachable("no network in tests".into()))
    }

    fn notify_all(
        &self,
        _endpoint: &str,
        _params: NotifyAllParams,
        _body: &NotifyAllBody,
        _deadline: Duration,
    ) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A shared directory mapping endpoint strings to the live `Constituent`
/// behind them, populated as each peer comes up. `LoopbackTransport`
/// resolves outbound requests through it instead of opening a socket.
pub struct Directory {
    endpoints: Vec<String>,
    peers: Mutex<Vec<Option<Arc<Constituent>>>>,
}

impl Directory {
    pub fn new(endpoints: Vec<String>) -> Arc<Directory> {
        let size = endpoints.len();
        Arc::new(Directory {
            endpoints,
            peers: Mutex::new(vec![None; size]),
        })
    }

    pub fn register(&self, id: PeerId, constituent: Arc<Constituent>) {
        self.peers.lock().unwrap()[id.value()] = Some(constituent);
    }

    fn resolve(&self, endpoint: &str) -> Result<Arc<Constituent>, TransportError> {
        let idx = self
            .endpoints
            .iter()
            .position(|e| e == endpoint)
            .ok_or_else(|| TransportError::Unreachable(format!("unknown endpoint {endpoint}")))?;
        self.peers.lock().unwrap()[idx]
            .clone()
            .ok_or_else(|| TransportError::Unreachable("peer not yet registered".into()))
    }
}

pub struct LoopbackTransport {
    directory: Arc<Directory>,
}

impl LoopbackTransport {
    pub fn new(directory: Arc<Directory>) -> LoopbackTransport {
        LoopbackTransport { directory }
    }
}

impl Transport for LoopbackTransport {
    fn request_vote(
        &self,
        endpoint: &str,
        params: RequestVoteParams,
        _deadline: Duration,
    ) -> Result<RequestVoteReply, TransportError> {
        let target = self.directory.resolve(endpoint)?;
        Ok(target.handle_request_vote(params))
    }

    fn notify_all(
        &self,
        endpoint: &str,
        params: NotifyAllParams,
        body: &NotifyAllBody,
        _deadline: Duration,
    ) -> Result<(), TransportError> {
        let target = self.directory.resolve(endpoint)?;
        target.handle_notify_all(params, body.clone());
        Ok(())
    }
}

/// A fully wired cluster of `size` constituents talking over
/// `LoopbackTransport`, each with its own `RecordingAgent`. Peer `i`
/// listens at `http://peer-{i}`.
pub struct Cluster {
    pub peers: Vec<Arc<Constituent>>,
    pub agents: Vec<Arc<RecordingAgent>>,
}

impl Cluster {
    pub fn new(size: usize, min_ping: Duration, max_ping: Duration) -> Cluster {
        let endpoints: Vec<String> = (0..size).map(|i| format!("http://peer-{i}")).collect();
        let directory = Directory::new(endpoints.clone());
        let mut peers = Vec::with_capacity(size);
        let mut agents = Vec::with_capacity(size);
        for i in 0..size {
            let config =
                Configuration::new(PeerId(i), endpoints.clone(), min_ping, max_ping, false)
                    .expect("valid test configuration");
            let agent = Arc::new(RecordingAgent::new());
            let transport = Arc::new(LoopbackTransport::new(Arc::clone(&directory)));
            // Each peer gets a distinct seed so their election-timeout
            // jitter does not lock-step.
            let seed = 1_000 + i as u64;
            let constituent = Arc::new(Constituent::configure_with_seed(
                config,
                Arc::clone(&agent) as Arc<dyn Agent>,
                transport,
                seed,
            ));
            directory.register(PeerId(i), Arc::clone(&constituent));
            peers.push(constituent);
            agents.push(agent);
        }
        Cluster { peers, agents }
    }

    /// Polls every peer's `(role, term, leaderId)` until `predicate` holds
    /// for all of them, or `timeout` elapses without it doing so (in which
    /// case this panics -- a scenario test that never converges is a
    /// failure, not a skip).
    pub fn wait_until(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&[Arc<Constituent>]) -> bool,
    ) {
        let start = std::time::Instant::now();
        loop {
            if predicate(&self.peers) {
                return;
            }
            if start.elapsed() > timeout {
                panic!("cluster did not converge within {timeout:?}");
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

pub fn single_peer_config(min_ping: Duration, max_ping: Duration) -> Configuration {
    Configuration::new(
        PeerId(0),
        vec!["http://peer-0".to_string()],
        min_ping,
        max_ping,
        false,
    )
    .expect("valid test configuration")
}
