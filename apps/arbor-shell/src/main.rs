//! # Arbor Shell
//!
//! An interactive client for the shared tree. Commands are two
//! whitespace-separated tokens, `childName parentName`; any other input
//! redisplays the tree. Names are bound to fresh identifiers the first time
//! they appear, local to this session; `ROOT` is pre-bound to the sentinel.
//!
//! ```text
//! $ arbor-shell --url ws://127.0.0.1:12345
//! ROOT
//! docs ROOT
//! ROOT
//!   docs
//! notes docs
//! ROOT
//!   docs
//!     notes
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use arbor_core::{NodeId, PeerId, TreeReplica};
use arbor_sdk::{SdkError, SessionEvent, TreeSession, WsTransport};
use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use ulid::Ulid;

#[derive(Parser)]
#[command(name = "arbor-shell")]
#[command(about = "Interactive shell for the arbor replicated tree")]
#[command(version)]
struct Cli {
    /// Relay base URL
    #[arg(long, default_value = "ws://127.0.0.1:12345")]
    url: String,

    /// Peer identifier; a fresh ulid is generated when omitted
    #[arg(long)]
    peer: Option<String>,
}

/// Session-local name dictionary: names map to stable identifiers the first
/// time they appear.
struct Names {
    ids: HashMap<String, NodeId>,
    labels: HashMap<NodeId, String>,
}

impl Names {
    fn new() -> Self {
        let mut names = Self {
            ids: HashMap::new(),
            labels: HashMap::new(),
        };
        names.bind("ROOT", NodeId::root());
        names
    }

    fn bind(&mut self, name: &str, id: NodeId) {
        self.ids.insert(name.to_string(), id.clone());
        self.labels.insert(id, name.to_string());
    }

    fn intern(&mut self, name: &str) -> NodeId {
        if let Some(id) = self.ids.get(name) {
            return id.clone();
        }
        let id = NodeId::new(Ulid::new().to_string());
        self.bind(name, id.clone());
        id
    }

    fn label(&self, id: &NodeId) -> String {
        self.labels
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), SdkError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let peer = cli.peer.unwrap_or_else(|| Ulid::new().to_string());
    let transport = Arc::new(WsTransport::connect(&cli.url).await?);
    let replica = TreeReplica::new(PeerId::new(peer.clone()));
    let session = TreeSession::start(replica, transport);

    println!("{}", format!("connected to {} as {}", cli.url, peer).dimmed());

    let mut names = Names::new();
    render(&session, &names);

    let mut events = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => handle_line(&session, &mut names, &line),
                    None => break, // stdin closed
                }
            }
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::RemoteApplied { .. }) => render(&session, &names),
                    Ok(SessionEvent::Disconnected) => {
                        eprintln!("{}", "relay disconnected".red());
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

fn handle_line(session: &TreeSession<WsTransport>, names: &mut Names, line: &str) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() != 2 {
        render(session, names);
        return;
    }

    let child = names.intern(parts[0]);
    let parent = names.intern(parts[1]);

    // The child may be brand new; the parent must have been observed.
    session.ensure_node(&child);
    if session.contains(&parent) {
        if let Err(e) = session.add_child(&child, &parent) {
            println!("{} {}", "error:".red(), e);
        }
    } else {
        println!("{} {}", "unknown parent".red(), parts[1]);
    }

    render(session, names);
}

fn render(session: &TreeSession<WsTransport>, names: &Names) {
    print!("{}", session.render_with(&|id| names.label(id)));
}
