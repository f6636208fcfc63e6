//! Arbor relay: a websocket fan-out server for tree ops.
//!
//! Peers connect twice: `/push` carries their outbound ops, `/sub` delivers
//! every op any peer pushed, the pusher's own included. The relay never
//! parses op contents; frames are forwarded verbatim with no ordering
//! guarantee beyond best-effort delivery to currently connected subscribers.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, tungstenite};
use tracing::{debug, info, warn};

/// Errors that can occur while running the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Accept failed: {0}")]
    Accept(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

/// Relay configuration.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Address to listen on.
    pub listen_addr: String,
    /// Fan-out channel capacity; slow subscribers falling further behind
    /// than this lose frames.
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:12345".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// The fan-out server.
pub struct RelayServer {
    listener: TcpListener,
    frames: broadcast::Sender<String>,
}

impl RelayServer {
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.listen_addr.clone(),
                source,
            })?;
        let (frames, _) = broadcast::channel(config.channel_capacity);
        info!(addr = %config.listen_addr, "relay listening");
        Ok(Self { listener, frames })
    }

    /// The bound address; useful when listening on port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until the task is dropped.
    pub async fn run(&self) -> Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let frames = self.frames.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, frames).await {
                    debug!(peer = %addr, error = %e, "connection ended");
                }
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    frames: broadcast::Sender<String>,
) -> std::result::Result<(), tungstenite::Error> {
    let mut path = String::new();
    let ws = accept_hdr_async(stream, |request: &Request, response: Response| {
        path = request.uri().path().to_string();
        Ok(response)
    })
    .await?;

    match path.as_str() {
        "/push" => serve_push(ws, frames).await,
        "/sub" => serve_sub(ws, frames).await,
        other => {
            warn!(path = %other, "unknown endpoint, closing");
            Ok(())
        }
    }
}

/// Inbound side: every text frame a peer pushes goes onto the fan-out
/// channel, uninterpreted.
async fn serve_push<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    frames: broadcast::Sender<String>,
) -> std::result::Result<(), tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (_, mut stream) = ws.split();
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(frame) => {
                debug!(len = frame.len(), "fanning out frame");
                // No subscribers is fine; the frame is simply dropped.
                let _ = frames.send(frame);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}

/// Outbound side: forward the fan-out channel onto the socket. A subscriber
/// that lags past the channel capacity loses the skipped frames.
async fn serve_sub<S>(
    ws: tokio_tungstenite::WebSocketStream<S>,
    frames: broadcast::Sender<String>,
) -> std::result::Result<(), tungstenite::Error>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = ws.split();
    let mut inbox = frames.subscribe();
    loop {
        tokio::select! {
            frame = inbox.recv() => match frame {
                Ok(frame) => sink.send(Message::Text(frame)).await?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagging, frames lost");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = stream.next() => match message {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {} // the subscription channel is one-way
                Some(Err(e)) => return Err(e),
            },
        }
    }
    Ok(())
}
