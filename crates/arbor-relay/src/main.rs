//! Relay server binary.

use arbor_relay::{RelayConfig, RelayServer, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "arbor-relay")]
#[command(about = "Websocket fan-out relay for arbor peers")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:12345")]
    listen: String,

    /// Fan-out channel capacity
    #[arg(long, default_value_t = 1024)]
    capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = RelayConfig {
        listen_addr: cli.listen,
        channel_capacity: cli.capacity,
    };

    let server = RelayServer::bind(&config).await?;
    server.run().await
}
