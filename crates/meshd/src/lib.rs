//! Mesh node runtime - discovery, roster coordination and chat delivery
//!
//! This crate provides everything a node runs:
//! - `transport` - group channel (multicast or in-memory) and one-shot TCP sends
//! - `registry` - roster actor owning the node's ID, state and roster
//! - `server` - TCP listener for join responses, roster updates and chat
//! - `discovery` - group channel consumer
//! - `coordinator` - admission of joining nodes
//! - `join` - member side of the join handshake
//! - `heartbeat` - coordinator liveness broadcast
//! - `fanout` - chat and roster update delivery
//! - `node` - ties the above together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Node                               │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌─────────────────┐  JoinRequest  ┌──────────────────────┐  │
//! │  │  GroupListener  │──────────────▶│     Coordinator      │  │
//! │  │ (group channel) │               │  (base port only)    │  │
//! │  └─────────────────┘               └──────────┬───────────┘  │
//! │                                    admit      │ JoinResponse │
//! │  ┌─────────────────┐               ┌──────────▼───────────┐  │
//! │  │   PeerServer    │──────────────▶│     RosterActor      │  │
//! │  │  (TCP accept)   │  register /   │ (id, state, roster)  │  │
//! │  └─────────────────┘  replace      └──────────┬───────────┘  │
//! │                                               │ NodeEvent    │
//! │                                               ▼              │
//! │                                      console / tests         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate has no `.unwrap()`, `.expect()` or
//! `panic!()`. Network failures become `DeliveryError`s or log lines.

pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod fanout;
pub mod heartbeat;
pub mod join;
pub mod node;
pub mod registry;
pub mod server;
pub mod transport;

pub use config::NodeConfig;
pub use node::{Node, NodeError};
