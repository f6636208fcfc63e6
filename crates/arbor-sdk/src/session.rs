//! Tree sessions: a replica wired to a relay transport.
//!
//! The session owns the replica behind a mutex; the inbound receiver task
//! and the caller's edit path are the only two producers, so every apply,
//! observer fan-out, and recompute is serialized.

use crate::error::Result;
use crate::transport::RelayTransport;
use arbor_core::{NodeId, Op, Origin, TreeReplica};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Tunables for a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Capacity of the session-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

/// Events emitted by a session.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// A local edit was applied and queued for broadcast.
    LocalEdit { ops: usize },
    /// A remote op was applied and the tree recomputed.
    RemoteApplied { op: Op },
    /// The inbound subscription ended.
    Disconnected,
}

/// A replica participating in a shared tree through a relay.
pub struct TreeSession<T: RelayTransport> {
    replica: Arc<Mutex<TreeReplica>>,
    transport: Arc<T>,
    events: broadcast::Sender<SessionEvent>,
}

impl<T: RelayTransport> TreeSession<T> {
    /// Wire `replica` to `transport` and spawn the send/receive tasks.
    /// Every locally originated op is pushed to the relay exactly once;
    /// every inbound op is applied as `Origin::Remote`.
    pub fn start(replica: TreeReplica, transport: Arc<T>) -> Arc<Self> {
        Self::start_with_config(replica, transport, SessionConfig::default())
    }

    pub fn start_with_config(
        mut replica: TreeReplica,
        transport: Arc<T>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity);

        // The outbound hook runs inside `apply`, which cannot block, so ops
        // land on an unbounded queue and a task drains it onto the wire.
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Op>();
        replica.after_apply(move |op, origin, _prev| {
            if origin == Origin::Local {
                let _ = out_tx.send(op.clone());
            }
        });

        let session = Arc::new(Self {
            replica: Arc::new(Mutex::new(replica)),
            transport,
            events,
        });

        let sender = session.transport.clone();
        tokio::spawn(async move {
            while let Some(op) = out_rx.recv().await {
                if let Err(e) = sender.send(op).await {
                    warn!(error = %e, "outbound push failed");
                    break;
                }
            }
        });

        let replica = session.replica.clone();
        let events = session.events.clone();
        let mut inbound = session.transport.subscribe();
        tokio::spawn(async move {
            while let Some(op) = inbound.recv().await {
                debug!(id = %op.id, key = %op.key, value = op.value, "remote op");
                replica.lock().apply(op.clone(), Origin::Remote);
                let _ = events.send(SessionEvent::RemoteApplied { op });
            }
            let _ = events.send(SessionEvent::Disconnected);
        });

        session
    }

    /// Subscribe to session events (for re-rendering on remote changes).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Make `child` a child of `parent`. The resulting ops are broadcast
    /// through the outbound hook.
    pub fn add_child(&self, child: &NodeId, parent: &NodeId) -> Result<()> {
        let ops = self.replica.lock().add_child(child, parent)?;
        let _ = self.events.send(SessionEvent::LocalEdit { ops: ops.len() });
        Ok(())
    }

    /// Detach `child` by retracting its chosen edge.
    pub fn detach(&self, child: &NodeId) -> Result<()> {
        let op = self.replica.lock().detach(child)?;
        if op.is_some() {
            let _ = self.events.send(SessionEvent::LocalEdit { ops: 1 });
        }
        Ok(())
    }

    /// Materialize a node locally without writing any register.
    pub fn ensure_node(&self, id: &NodeId) {
        self.replica.lock().ensure_node(id);
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.replica.lock().contains(id)
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<NodeId> {
        self.replica.lock().parent_of(id)
    }

    pub fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        self.replica.lock().children_of(id)
    }

    pub fn render_with(&self, label: &dyn Fn(&NodeId) -> String) -> String {
        self.replica.lock().render_with(label)
    }

    pub fn render_text(&self) -> String {
        self.replica.lock().render_text()
    }

    /// Direct access to the replica, for tests and embedding.
    pub fn replica(&self) -> Arc<Mutex<TreeReplica>> {
        self.replica.clone()
    }
}
