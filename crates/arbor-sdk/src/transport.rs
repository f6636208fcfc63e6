//! Relay transport abstractions.
//!
//! A peer keeps two unidirectional channels to the relay: an outbound push
//! channel carrying every locally accepted op exactly once, and an inbound
//! subscription delivering every op any peer pushed, self-echo included.
//! The relay gives no ordering guarantee; LWW apply absorbs both reordering
//! and echo.

use crate::error::{Result, SdkError};
use arbor_core::Op;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

/// A peer's two channels to the relay.
#[async_trait]
pub trait RelayTransport: Send + Sync + 'static {
    /// Push a locally accepted op to the relay.
    async fn send(&self, op: Op) -> Result<()>;

    /// Take the inbound subscription.
    fn subscribe(&self) -> mpsc::Receiver<Op>;
}

/// In-memory relay for tests and simulation: every op pushed through any
/// handle is fanned out to every subscriber, the pusher included, matching
/// the real relay's self-echo behavior.
#[derive(Clone, Default)]
pub struct MemoryHub {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Op>>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport handle connected to this hub.
    pub fn handle(&self) -> MemoryTransport {
        let (tx, rx) = mpsc::channel(100);
        self.subscribers.lock().push(tx);
        MemoryTransport {
            subscribers: self.subscribers.clone(),
            inbound: Mutex::new(Some(rx)),
        }
    }
}

/// One peer's connection to a [`MemoryHub`].
pub struct MemoryTransport {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<Op>>>>,
    inbound: Mutex<Option<mpsc::Receiver<Op>>>,
}

#[async_trait]
impl RelayTransport for MemoryTransport {
    async fn send(&self, op: Op) -> Result<()> {
        let subscribers: Vec<_> = self.subscribers.lock().clone();
        for tx in subscribers {
            let _ = tx.send(op.clone()).await;
        }
        Ok(())
    }

    fn subscribe(&self) -> mpsc::Receiver<Op> {
        self.inbound
            .lock()
            .take()
            .expect("subscribe can only be called once")
    }
}

/// Websocket transport: a push connection and a subscription connection to
/// the relay, ops as JSON text frames.
pub struct WsTransport {
    outbound: mpsc::Sender<Op>,
    inbound: Mutex<Option<mpsc::Receiver<Op>>>,
}

impl WsTransport {
    /// Connect both channels to the relay at `base_url`
    /// (e.g. `ws://127.0.0.1:12345`).
    pub async fn connect(base_url: &str) -> Result<Self> {
        let base = base_url.trim_end_matches('/');

        let (push_ws, _) = connect_async(format!("{base}/push"))
            .await
            .map_err(|e| SdkError::ConnectionFailed(e.to_string()))?;
        let (sub_ws, _) = connect_async(format!("{base}/sub"))
            .await
            .map_err(|e| SdkError::ConnectionFailed(e.to_string()))?;
        info!(url = %base, "connected to relay");

        let (outbound, mut out_rx) = mpsc::channel::<Op>(100);
        let (in_tx, in_rx) = mpsc::channel::<Op>(100);

        // Writer: drain the outbound queue onto the push channel.
        let (mut push_sink, _) = push_ws.split();
        tokio::spawn(async move {
            while let Some(op) = out_rx.recv().await {
                let frame = match serde_json::to_string(&op) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "failed to encode op");
                        continue;
                    }
                };
                if let Err(e) = push_sink.send(Message::Text(frame)).await {
                    warn!(error = %e, "push channel closed");
                    break;
                }
            }
        });

        // Reader: decode subscription frames; malformed frames are logged
        // and dropped, never partially applied.
        let (_, mut sub_stream) = sub_ws.split();
        tokio::spawn(async move {
            while let Some(frame) = sub_stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Op>(&text) {
                        Ok(op) => {
                            if in_tx.send(op).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "dropping malformed op"),
                    },
                    Ok(Message::Close(_)) => {
                        debug!("subscription closed by relay");
                        break;
                    }
                    Ok(_) => {} // pings and binary frames are not ours
                    Err(e) => {
                        warn!(error = %e, "subscription receive failed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            outbound,
            inbound: Mutex::new(Some(in_rx)),
        })
    }
}

#[async_trait]
impl RelayTransport for WsTransport {
    async fn send(&self, op: Op) -> Result<()> {
        self.outbound
            .send(op)
            .await
            .map_err(|e| SdkError::SendFailed(e.to_string()))
    }

    fn subscribe(&self) -> mpsc::Receiver<Op> {
        self.inbound
            .lock()
            .take()
            .expect("subscribe can only be called once")
    }
}
