//! Thread-per-peer connection registry.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn};

use crate::config::NodeConfig;
use crate::session::{Session, SessionError, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStatus {
    Connecting,
    Handshaking,
    Ready,
    /// Ended by [`PeerPool::shutdown`].
    Cancelled,
    Failed(String),
}

impl PeerStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, PeerStatus::Cancelled | PeerStatus::Failed(_))
    }
}

struct PeerEntry {
    addr: String,
    status: PeerStatus,
    /// Second handle on the socket, for unblocking reads at shutdown.
    stream: Option<TcpStream>,
    handle: Option<JoinHandle<()>>,
}

type Registry = Arc<Mutex<HashMap<PeerId, PeerEntry>>>;

/// Runs one [`Session`] per peer, each on its own thread.
///
/// `connect` may be called from any thread. After the handshake a session
/// keeps reading until the peer goes away or the pool shuts down.
pub struct PeerPool {
    config: Arc<NodeConfig>,
    peers: Registry,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl PeerPool {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config: Arc::new(config),
            peers: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        }
    }

    /// Registers `addr` and starts its session thread.
    ///
    /// Fails once the pool has been shut down.
    pub fn connect(&self, addr: &str) -> io::Result<PeerId> {
        if self.shutdown.is_cancelled() {
            return Err(io::Error::other("peer pool is shut down"));
        }
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed));

        lock(&self.peers).insert(
            id,
            PeerEntry {
                addr: addr.to_owned(),
                status: PeerStatus::Connecting,
                stream: None,
                handle: None,
            },
        );

        let peers = Arc::clone(&self.peers);
        let config = Arc::clone(&self.config);
        let shutdown = self.shutdown.clone();
        let peer = addr.to_owned();
        let span = info_span!("peer", %id, addr = %peer);

        let spawned = thread::Builder::new()
            .name(format!("{id} {peer}"))
            .spawn(move || {
                let _enter = span.enter();
                let status = match run_peer(id, &peer, &config, &peers, shutdown) {
                    Ok(()) => PeerStatus::Cancelled,
                    Err(SessionError::Cancelled) => {
                        debug!("cancelled");
                        PeerStatus::Cancelled
                    }
                    Err(e) => {
                        warn!(error = %e, "session ended");
                        PeerStatus::Failed(e.to_string())
                    }
                };
                set_status(&peers, id, status);
            });

        match spawned {
            Ok(handle) => {
                if let Some(entry) = lock(&self.peers).get_mut(&id) {
                    entry.handle = Some(handle);
                }
                Ok(id)
            }
            Err(e) => {
                lock(&self.peers).remove(&id);
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.peers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self, id: PeerId) -> Option<PeerStatus> {
        lock(&self.peers).get(&id).map(|e| e.status.clone())
    }

    /// Snapshot of every registered peer.
    pub fn peers(&self) -> Vec<(PeerId, String, PeerStatus)> {
        let mut out: Vec<_> = lock(&self.peers)
            .iter()
            .map(|(id, e)| (*id, e.addr.clone(), e.status.clone()))
            .collect();
        out.sort_by_key(|(id, _, _)| *id);
        out
    }

    pub fn ready_count(&self) -> usize {
        lock(&self.peers)
            .values()
            .filter(|e| e.status == PeerStatus::Ready)
            .count()
    }

    /// Removes finished peers, joining their threads, and returns their
    /// final statuses.
    pub fn prune(&self) -> Vec<(PeerId, PeerStatus)> {
        let finished: Vec<_> = {
            let mut peers = lock(&self.peers);
            let ids: Vec<_> = peers
                .iter()
                .filter(|(_, e)| e.status.is_finished())
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| peers.remove(&id).map(|e| (id, e)))
                .collect()
        };

        let mut out = Vec::with_capacity(finished.len());
        for (id, entry) in finished {
            // the status is set last thing on the thread, so this join is short
            let status = match entry.handle.map(JoinHandle::join) {
                Some(Err(_)) => {
                    warn!(%id, "session thread panicked");
                    PeerStatus::Failed("panicked".to_owned())
                }
                _ => entry.status,
            };
            debug!(%id, addr = %entry.addr, ?status, "pruned");
            out.push((id, status));
        }
        out.sort_by_key(|(id, _)| *id);
        out
    }

    /// Cancels every session, closes their sockets and joins their threads.
    ///
    /// Returns each peer's final status.
    pub fn shutdown(&self) -> Vec<(PeerId, PeerStatus)> {
        self.shutdown.cancel();

        let handles: Vec<_> = {
            let mut peers = lock(&self.peers);
            peers
                .iter_mut()
                .filter_map(|(id, entry)| {
                    if let Some(stream) = entry.stream.take() {
                        // NotConnected just means the peer already left
                        let _ = stream.shutdown(Shutdown::Both);
                    }
                    entry.handle.take().map(|h| (*id, h))
                })
                .collect()
        };

        for (id, handle) in handles {
            if handle.join().is_err() {
                warn!(%id, "session thread panicked");
                set_status(&self.peers, id, PeerStatus::Failed("panicked".to_owned()));
            }
        }

        let statuses: Vec<_> = self
            .peers()
            .into_iter()
            .map(|(id, _, status)| (id, status))
            .collect();
        info!(peers = statuses.len(), "pool shut down");
        statuses
    }
}

impl Drop for PeerPool {
    fn drop(&mut self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown();
        }
    }
}

fn run_peer(
    id: PeerId,
    addr: &str,
    config: &NodeConfig,
    peers: &Registry,
    shutdown: CancellationToken,
) -> SessionResult<()> {
    info!("connecting");
    let mut session = Session::connect(addr, config)?.with_shutdown(shutdown.clone());

    {
        let mut peers = lock(peers);
        if let Some(entry) = peers.get_mut(&id) {
            entry.stream = Some(session.try_clone_stream()?);
            entry.status = PeerStatus::Handshaking;
        }
    }
    // shutdown may have swept the registry before our stream was in it
    if shutdown.is_cancelled() {
        return Err(SessionError::Cancelled);
    }

    session.handshake()?;
    set_status(peers, id, PeerStatus::Ready);

    loop {
        let msg = session.recv()?;
        debug!(command = msg.command_name(), "message");
    }
}

fn set_status(peers: &Registry, id: PeerId, status: PeerStatus) {
    if let Some(entry) = lock(peers).get_mut(&id) {
        entry.status = status;
    }
}

/// A poisoned lock only means another peer thread panicked; the map itself
/// is still consistent.
fn lock(peers: &Registry) -> MutexGuard<'_, HashMap<PeerId, PeerEntry>> {
    peers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
