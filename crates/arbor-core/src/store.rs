//! Keyed last-writer-wins register store.
//!
//! Each register is addressed by `(id, key)` and holds the winning row under
//! the `(timestamp, peer)` order. The store decides accept/reject; everything
//! downstream (the tree view, outbound broadcast, undo history) hangs off the
//! observer list, which fires on every apply, accepted or not, so observer
//! state stays aligned with the op stream.

use crate::op::{NodeId, Op, Origin, PeerId, RegisterKey, Row};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Callback invoked synchronously after every `apply`. `prev` is the row the
/// register held before this apply (if any); whether the op was accepted can
/// be recomputed from it via [`Row::dominates`].
pub type Observer = Box<dyn FnMut(&Op, Origin, Option<&Row>) + Send>;

/// A keyed map of LWW registers plus an append-only observer list.
pub struct RegisterStore {
    peer: PeerId,
    rows: HashMap<RegisterKey, Row>,
    observers: Vec<Observer>,
}

impl RegisterStore {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            rows: HashMap::new(),
            observers: Vec::new(),
        }
    }

    /// This replica's identity, stamped onto every locally generated op.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Register an observer called after every apply. Observers are never
    /// removed; registration happens at construction of the higher layers.
    pub fn after_apply<F>(&mut self, observer: F)
    where
        F: FnMut(&Op, Origin, Option<&Row>) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn value_of(&self, id: &NodeId, key: &NodeId) -> Option<i32> {
        self.rows
            .get(&RegisterKey::new(id.clone(), key.clone()))
            .map(|row| row.value)
    }

    pub fn timestamp_of(&self, id: &NodeId, key: &NodeId) -> Option<i64> {
        self.rows
            .get(&RegisterKey::new(id.clone(), key.clone()))
            .map(|row| row.timestamp)
    }

    /// Distinct row ids, sorted.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.rows.keys().map(|k| k.id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Apply one op. Accepts unless the existing row dominates it; either
    /// way every observer is notified with the op and the previous row.
    /// Returns whether the op was accepted.
    pub fn apply(&mut self, op: Op, origin: Origin) -> bool {
        let key = op.register_key();
        let prev = self.rows.get(&key).cloned();
        let accepted = prev.as_ref().map_or(true, |row| !row.dominates(&op));
        if accepted {
            self.rows.insert(key, Row::from(&op));
        }
        for observer in &mut self.observers {
            observer(&op, origin, prev.as_ref());
        }
        accepted
    }

    /// Issue a local write: stamp `peer = self` and a timestamp strictly
    /// greater than whatever this replica has observed for the register, so
    /// the write always supersedes the locally observed state.
    pub fn set_value(&mut self, id: NodeId, key: NodeId, value: i32) -> Op {
        let mut timestamp = now_nanos();
        if let Some(prev) = self.timestamp_of(&id, &key) {
            timestamp = timestamp.max(prev + 1);
        }
        let op = Op {
            id,
            key,
            value,
            peer: self.peer.clone(),
            timestamp,
        };
        self.apply(op.clone(), Origin::Local);
        op
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
