//! DAG construction and invariants (§3, §4.6).

pub mod manager;
pub mod node;

pub use manager::DagManager;
pub use node::{Edge, Node, NodeId, NodeKind, NodePatch, NodePayload};
