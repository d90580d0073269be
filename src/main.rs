//! mocksocket CLI
//!
//! - `demo`: run a scripted echo and room-broadcast session in memory
//! - `config`: print or write the default config file

use anyhow::Context;
use clap::{Parser, Subcommand};
use mocksocket::config::generate_default_config;
use mocksocket::{
    listener, logging, Config, ConnectionRegistry, EmitOptions, Server, SocketIoClient, WebSocket,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mocksocket")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "In-process WebSocket and Socket.IO simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a scripted session against an in-memory server
    Demo {
        /// Server URL to simulate
        #[arg(long, default_value = "ws://localhost:8080")]
        url: String,
        /// Number of Socket.IO clients joining the room
        #[arg(long, default_value = "3")]
        clients: usize,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    logging::init(&config.logging);

    match cli.command {
        Commands::Demo { url, clients } => run_demo(config, &url, clients).await?,
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write config to {:?}", path))?;
                    println!("Wrote default config to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

async fn run_demo(config: Config, url: &str, clients: usize) -> anyhow::Result<()> {
    tracing::info!("mocksocket demo v{}", env!("CARGO_PKG_VERSION"));

    let registry = ConnectionRegistry::with_config(config.simulator);
    let server = Server::new(&registry, url)?;

    // Echo every message back to all clients
    let echo = server.clone();
    server.on(
        "message",
        listener(move |d| {
            if let Some(data) = d.payload() {
                tracing::info!(%data, "Server received message");
                echo.send(data.clone(), EmitOptions::default());
            }
        }),
    );
    server.on(
        "connection",
        listener(|d| {
            if let Some(client) = d.connection() {
                tracing::info!(socket_id = %client.id(), flavor = client.flavor().name(), "Client connected");
            }
        }),
    );

    let ws = WebSocket::new(&registry, url)?;
    ws.on_message(listener(|d| {
        tracing::info!(data = ?d.payload(), "WebSocket received echo");
    }));
    registry.settle().await;

    ws.send("hello")?;
    registry.settle().await;
    ws.close();

    let sockets = (0..clients)
        .map(|_| SocketIoClient::new(&registry, url))
        .collect::<Result<Vec<_>, _>>()?;
    registry.settle().await;

    for (index, socket) in sockets.iter().enumerate() {
        socket.join("lobby");
        socket.on(
            "announcement",
            listener(move |d| {
                tracing::info!(client = index, args = ?d.args(), "Room member received announcement");
            }),
        );
    }

    if let Some(first) = sockets.first() {
        first.to("lobby")?.emit("announcement", "hello from the first client");
    }
    server.to("lobby").emit("announcement", "hello from the server");

    for socket in &sockets {
        socket.disconnect();
    }
    server.stop();

    tracing::info!(remaining = registry.servers().len(), "Demo finished");
    Ok(())
}
