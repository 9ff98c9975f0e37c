//! Named in-process broadcast channels.
//!
//! Every open `BroadcastChannel` registers an endpoint under
//! `"{CHANNEL_NAMESPACE}/{name}"` in a process-wide registry. Posting a
//! payload delivers it to every other endpoint with the same key, on any
//! thread; the posting endpoint never receives its own payloads.
//!
//! Payloads are opaque strings (the broadcast hub encodes them as JSON).
//! Each endpoint has a bounded inbox; when an inbox is full the payload is
//! dropped for that endpoint only.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use uuid::Uuid;

use crate::error::{ArgumentError, StreamError};
use crate::runtime::LoopWaker;

/// Prefix applied to every channel name.
pub const CHANNEL_NAMESPACE: &str = "kyrorx.broadcast";

/// Broadcast channel configuration.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Max payloads buffered per endpoint before new ones are dropped.
    pub inbox_capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1024,
        }
    }
}

/// Unique identity of one channel endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(Uuid);

impl EndpointId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct Endpoint {
    id: EndpointId,
    tx: Sender<String>,
    waker: Option<LoopWaker>,
}

type Registry = HashMap<String, Vec<Endpoint>>;

fn registry() -> MutexGuard<'static, Registry> {
    static REGISTRY: OnceLock<Mutex<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn channel_key(name: &str) -> String {
    format!("{CHANNEL_NAMESPACE}/{name}")
}

/// One endpoint of a named broadcast channel.
///
/// The endpoint is `Send`: it may be opened on one thread and drained on
/// another, but each endpoint has a single receiver.
pub struct BroadcastChannel {
    key: String,
    name: String,
    id: EndpointId,
    rx: Receiver<String>,
    closed: AtomicBool,
}

impl BroadcastChannel {
    /// Opens an endpoint on the channel called `name`.
    ///
    /// `waker`, if given, is signalled whenever a peer posts to this
    /// endpoint, so a blocked event loop can pump it promptly.
    ///
    /// # Errors
    ///
    /// Returns `ArgumentError::MissingArgument` for an empty name.
    pub fn open(
        name: &str,
        cfg: &BroadcastConfig,
        waker: Option<LoopWaker>,
    ) -> Result<Self, ArgumentError> {
        if name.is_empty() {
            return Err(ArgumentError::missing("name"));
        }

        let key = channel_key(name);
        let id = EndpointId::generate();
        let (tx, rx) = bounded(cfg.inbox_capacity.max(1));

        registry()
            .entry(key.clone())
            .or_default()
            .push(Endpoint { id, tx, waker });
        tracing::debug!(channel = %key, endpoint = %id, "broadcast endpoint opened");

        Ok(Self {
            key,
            name: name.to_string(),
            id,
            rx,
            closed: AtomicBool::new(false),
        })
    }

    /// Sends `payload` to every other endpoint on this channel.
    ///
    /// Returns the number of endpoints that accepted it. Endpoints with a
    /// full inbox are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::Transport` if this endpoint is closed.
    pub fn post(&self, payload: &str) -> Result<usize, StreamError> {
        if self.is_closed() {
            return Err(StreamError::transport(format!(
                "broadcast channel '{}' is closed",
                self.name
            )));
        }

        let mut delivered = 0;
        let mut wakers = Vec::new();
        {
            let registry = registry();
            let peers = registry.get(&self.key).map(Vec::as_slice).unwrap_or_default();
            for peer in peers.iter().filter(|p| p.id != self.id) {
                match peer.tx.try_send(payload.to_string()) {
                    Ok(()) => {
                        delivered += 1;
                        if let Some(waker) = &peer.waker {
                            wakers.push(waker.clone());
                        }
                    }
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            channel = %self.key,
                            peer = %peer.id,
                            "broadcast inbox full; payload dropped"
                        );
                    }
                    Err(TrySendError::Disconnected(_)) => {}
                }
            }
        }

        for waker in wakers {
            waker.wake();
        }
        Ok(delivered)
    }

    /// Takes the next received payload, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Unregisters this endpoint. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut registry = registry();
        if let Some(endpoints) = registry.get_mut(&self.key) {
            endpoints.retain(|e| e.id != self.id);
            if endpoints.is_empty() {
                registry.remove(&self.key);
            }
        }
        tracing::debug!(channel = %self.key, endpoint = %self.id, "broadcast endpoint closed");
    }

    /// True once `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of other open endpoints on this channel.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        registry()
            .get(&self.key)
            .map_or(0, |endpoints| {
                endpoints.iter().filter(|e| e.id != self.id).count()
            })
    }

    /// The channel name, without namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This endpoint's identity.
    #[must_use]
    pub fn id(&self) -> EndpointId {
        self.id
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for BroadcastChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastChannel")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn open(name: &str) -> BroadcastChannel {
        BroadcastChannel::open(name, &BroadcastConfig::default(), None).unwrap()
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = BroadcastChannel::open("", &BroadcastConfig::default(), None).unwrap_err();
        assert_eq!(err, ArgumentError::missing("name"));
    }

    #[test]
    fn post_reaches_peers_but_not_self() {
        let a = open("transport-unit-peers");
        let b = open("transport-unit-peers");
        let other = open("transport-unit-peers-other");

        assert_eq!(a.peer_count(), 1);
        assert_eq!(a.post("hello").unwrap(), 1);
        assert_eq!(b.try_recv().as_deref(), Some("hello"));
        assert_eq!(a.try_recv(), None);
        assert_eq!(other.try_recv(), None);
    }

    #[test]
    fn full_inbox_drops_payload() {
        let cfg = BroadcastConfig { inbox_capacity: 1 };
        let a = BroadcastChannel::open("transport-unit-full", &cfg, None).unwrap();
        let b = BroadcastChannel::open("transport-unit-full", &cfg, None).unwrap();

        assert_eq!(a.post("1").unwrap(), 1);
        assert_eq!(a.post("2").unwrap(), 0);
        assert_eq!(b.try_recv().as_deref(), Some("1"));
        assert_eq!(b.try_recv(), None);
    }

    #[test]
    fn closed_endpoint_leaves_registry() {
        let a = open("transport-unit-close");
        let b = open("transport-unit-close");
        b.close();
        b.close();

        assert!(b.is_closed());
        assert_eq!(a.peer_count(), 0);
        assert_eq!(a.post("x").unwrap(), 0);
        assert!(b.post("x").is_err_and(|e| matches!(e, StreamError::Transport { .. })));

        drop(a);
        assert!(!registry().contains_key(&channel_key("transport-unit-close")));
    }

    #[test]
    fn crosses_threads() {
        let local = open("transport-unit-thread");
        let handle = thread::spawn(|| {
            let remote = open("transport-unit-thread");
            remote.post("from-thread").unwrap()
        });
        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(local.try_recv().as_deref(), Some("from-thread"));
    }
}
