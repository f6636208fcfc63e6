//! End-to-end convergence over a real websocket relay.

use arbor_core::{NodeId, PeerId, TreeReplica};
use arbor_relay::{RelayConfig, RelayServer};
use arbor_sdk::{TreeSession, WsTransport};
use std::sync::Arc;
use std::time::Duration;

fn id(s: &str) -> NodeId {
    NodeId::from(s)
}

async fn settled(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

async fn spawn_relay() -> String {
    let config = RelayConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..RelayConfig::default()
    };
    let server = RelayServer::bind(&config).await.expect("bind relay");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    format!("ws://{addr}")
}

#[tokio::test]
async fn test_two_peers_converge_through_the_relay() {
    let url = spawn_relay().await;

    let alice = TreeSession::start(
        TreeReplica::new(PeerId::from("alice")),
        Arc::new(WsTransport::connect(&url).await.expect("connect alice")),
    );
    let bob = TreeSession::start(
        TreeReplica::new(PeerId::from("bob")),
        Arc::new(WsTransport::connect(&url).await.expect("connect bob")),
    );

    alice.add_child(&id("A"), &NodeId::root()).unwrap();
    alice.add_child(&id("B"), &id("A")).unwrap();

    assert!(
        settled(|| bob.parent_of(&id("B")) == Some(id("A"))).await,
        "bob never observed alice's edits"
    );
    assert_eq!(bob.parent_of(&id("A")), Some(NodeId::root()));

    // Bob answers; alice must see it, and her own ops echoing back must
    // have changed nothing.
    bob.add_child(&id("C"), &id("B")).unwrap();
    assert!(settled(|| alice.parent_of(&id("C")) == Some(id("B"))).await);
    assert_eq!(alice.children_of(&NodeId::root()), vec![id("A")]);
}
