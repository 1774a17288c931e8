//! Mesh node - multicast discovery and point-to-point chat
//!
//! Starts one node. The node whose port equals the configured base port
//! becomes the coordinator; every other node joins through the group.
//!
//! # Usage
//!
//! ```bash
//! # Coordinator (default base port)
//! meshd 50010
//!
//! # Members
//! meshd 50011
//! meshd 50012
//!
//! # Every node on one machine reachable at a LAN address
//! meshd 50010 --host 192.168.1.20
//! meshd 50011 --host 192.168.1.20
//!
//! # Custom config and debug logging
//! RUST_LOG=meshd=debug meshd 50011 --config ./mesh.toml
//! ```
//!
//! The coordinator records its own host for every member it admits, so all
//! nodes must share the coordinator's host.
//!
//! Console commands: `/peers`, `/status`, `/quit`. Any other line is sent as
//! chat once the node is registered.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use meshd::registry::NodeEvent;
use meshd::{Node, NodeConfig, NodeError};

/// Mesh node - discovery, roster and chat
#[derive(Parser, Debug)]
#[command(name = "meshd", version, about)]
struct Args {
    /// Port this node listens on for point-to-point messages
    port: u16,

    /// Path to a TOML config file (overrides MESH_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to listen on; must match the coordinator's, which is the
    /// address recorded for every member
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("meshd=info".parse()?)
                .add_directive("mesh_core=info".parse()?)
                .add_directive("mesh_protocol=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = NodeConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?
        .with_port(args.port);
    if let Some(host) = args.host {
        config = config.with_host(host);
    }
    config.validate().context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        addr = %config.listen_addr(),
        "Mesh node starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for Ctrl-C");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let node = Node::launch(config, cancel_token.clone())
        .await
        .context("Failed to start node")?;

    if node.is_coordinator() {
        println!("Coordinator on {} (ID 1)", node.local_addr());
    } else {
        println!("Listening on {}, waiting for the coordinator...", node.local_addr());
    }

    tokio::spawn(print_events(node.subscribe(), cancel_token.clone()));

    run_console(&node, &cancel_token).await;

    node.shutdown().await;
    info!("Mesh node stopped");
    Ok(())
}

/// Forwards stdin lines from a detached thread so a pending read never
/// holds up runtime shutdown.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    break;
                }
            }
        }
    });
    rx
}

/// Reads console lines until `/quit`, end of input, or cancellation.
async fn run_console(node: &Node, cancel_token: &CancellationToken) {
    let mut lines = spawn_stdin_reader();

    loop {
        let line = tokio::select! {
            _ = cancel_token.cancelled() => break,
            line = lines.recv() => line,
        };

        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "" => {}
            "/quit" => break,
            "/peers" => match node.membership().await {
                Ok(view) => {
                    for (id, addr) in view.roster.iter() {
                        println!("  {id}: {addr}");
                    }
                }
                Err(e) => println!("! {e}"),
            },
            "/status" => match node.membership().await {
                Ok(view) => match view.id {
                    Some(id) => println!("{} as ID {id}, {} members", view.state, view.roster.len()),
                    None => println!("{}", view.state),
                },
                Err(e) => println!("! {e}"),
            },
            text => match node.send_chat(text).await {
                Ok(report) if !report.all_delivered() => {
                    println!("! {} of {} unreachable", report.unreachable.len(), report.attempted());
                }
                Ok(_) => {}
                Err(NodeError::NotRegistered { state }) => {
                    println!("! not registered yet ({state}), message not sent");
                }
                Err(e) => println!("! {e}"),
            },
        }
    }
}

async fn print_events(mut events: broadcast::Receiver<NodeEvent>, cancel_token: CancellationToken) {
    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(NodeEvent::Registered { id, roster }) => {
                println!("Registered as ID {id} ({} members)", roster.len());
            }
            Ok(NodeEvent::RosterReplaced { roster }) => {
                println!("Roster updated ({} members)", roster.len());
            }
            Ok(NodeEvent::MemberAdmitted { id, addr }) => {
                println!("Admitted ID {id} at {addr}");
            }
            Ok(NodeEvent::ChatReceived {
                from,
                text,
                received_at,
            }) => {
                let local = received_at.with_timezone(&Local);
                println!("[{}] {from} {text}", local.format("%H:%M:%S"));
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Console lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
