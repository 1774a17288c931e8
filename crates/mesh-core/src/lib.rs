//! Mesh Core - Shared membership types for mesh chat nodes
//!
//! This crate provides the domain types shared between the wire
//! protocol (`mesh-protocol`) and the node runtime (`meshd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod node;
pub mod roster;

// Re-exports for convenience
pub use error::{DeliveryError, TransportError};
pub use node::{MembershipView, NodeId, NodeState, PeerAddr};
pub use roster::Roster;
