//! Operations and register rows exchanged between replicas.
//!
//! Every mutation of the shared tree is an [`Op`]: node `id` proposes `key`
//! as a candidate parent with an integer counter as the edge's recency. Ops
//! are the unit applied to the register store and the unit shipped over the
//! wire, unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The reserved identifier of the tree root. Every replica agrees on it.
pub const ROOT_ID: &str = "(ROOT)";

/// Retraction sentinel: a register holding this value withdraws its edge.
pub const TOMBSTONE: i32 = -1;

/// An opaque, globally unique node identifier. Ordered lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The sentinel root identifier.
    pub fn root() -> Self {
        Self(ROOT_ID.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Identifier of a replica; the LWW tiebreaker. Ordered lexicographically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Where an op entered this replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Issued by this replica; will be broadcast to the relay.
    Local,
    /// Delivered by the relay on behalf of some peer (possibly ourselves).
    Remote,
}

/// The unit applied to the register store and exchanged over the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
    pub id: NodeId,
    pub key: NodeId,
    pub value: i32,
    pub peer: PeerId,
    pub timestamp: i64,
}

impl Op {
    /// The register this op addresses.
    pub fn register_key(&self) -> RegisterKey {
        RegisterKey {
            id: self.id.clone(),
            key: self.key.clone(),
        }
    }
}

/// Register key: node `id` proposes `key` as a candidate parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegisterKey {
    pub id: NodeId,
    pub key: NodeId,
}

impl RegisterKey {
    pub fn new(id: impl Into<NodeId>, key: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
        }
    }
}

/// Stored state of one LWW register.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub value: i32,
    pub peer: PeerId,
    pub timestamp: i64,
}

impl Row {
    /// Last-writer-wins dominance: the stored row beats `op` when it carries
    /// a strictly newer timestamp, or the same timestamp and a greater peer.
    pub fn dominates(&self, op: &Op) -> bool {
        self.timestamp > op.timestamp || (self.timestamp == op.timestamp && self.peer > op.peer)
    }
}

impl From<&Op> for Row {
    fn from(op: &Op) -> Self {
        Self {
            value: op.value,
            peer: op.peer.clone(),
            timestamp: op.timestamp,
        }
    }
}
