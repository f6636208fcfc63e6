//! Arbor SDK - client-side sessions for the replicated tree.
//!
//! A [`TreeSession`] wires an `arbor_core::TreeReplica` to a relay: local
//! edits are pushed out exactly once, inbound ops (any order, echo included)
//! are applied as remote, and the derived tree stays identical across peers.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use arbor_core::{NodeId, PeerId, TreeReplica};
//! use arbor_sdk::{TreeSession, WsTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> arbor_sdk::Result<()> {
//!     let transport = Arc::new(WsTransport::connect("ws://127.0.0.1:12345").await?);
//!     let replica = TreeReplica::new(PeerId::new("peer-1"));
//!     let session = TreeSession::start(replica, transport);
//!
//!     let docs = NodeId::new("docs");
//!     session.add_child(&docs, &NodeId::root())?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::{Result, SdkError};
pub use session::{SessionConfig, SessionEvent, TreeSession};
pub use transport::{MemoryHub, MemoryTransport, RelayTransport, WsTransport};
