//! Arbor core - a replicated, convergent tree.
//!
//! Peers share a rooted tree by exchanging last-writer-wins register writes
//! keyed by `(node, candidate-parent)`. Each replica derives the same tree
//! from the same register contents, no coordination required: concurrent
//! edits that would produce cycles or ambiguity are resolved
//! deterministically on every peer.
//!
//! # Quick Start
//!
//! ```rust
//! use arbor_core::{NodeId, PeerId, TreeReplica};
//!
//! let mut replica = TreeReplica::new(PeerId::new("peer-1"));
//!
//! // Build ROOT -> docs -> notes.
//! let docs = NodeId::new("docs");
//! let notes = NodeId::new("notes");
//! replica.add_child(&docs, &NodeId::root()).unwrap();
//! replica.add_child(&notes, &docs).unwrap();
//!
//! assert_eq!(replica.parent_of(&notes), Some(docs));
//! ```
//!
//! # Architecture
//!
//! - [`store`] - the keyed LWW register store and its observer list
//! - [`tree`] - the derived tree view: cycle detection and reattachment
//! - [`planner`] - translates reparent intents into register writes
//! - [`replica`] - wires store and tree into one serialized unit
//! - [`history`] - observer-based undo/redo
//! - [`op`] - operations, rows, and identifiers
//! - [`error`] - error types

pub mod error;
pub mod history;
pub mod op;
pub mod planner;
pub mod replica;
pub mod store;
pub mod tree;

// Re-exports for convenience
pub use error::{Result, TreeError};
pub use history::History;
pub use op::{NodeId, Op, Origin, PeerId, RegisterKey, Row, ROOT_ID, TOMBSTONE};
pub use planner::{plan_reparent, Edit};
pub use replica::TreeReplica;
pub use store::RegisterStore;
pub use tree::{OrphanPolicy, TreeView};
