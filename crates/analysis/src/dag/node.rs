//! DAG node and edge types (§3 "Node", "Edge").

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::request::Request;

pub type NodeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
	MasterCurl,
	Curl,
	Cookie,
	InputVariable,
	NotFound,
}

impl NodeKind {
	fn id_prefix(self) -> &'static str {
		match self {
			NodeKind::MasterCurl => "master",
			NodeKind::Curl => "curl",
			NodeKind::Cookie => "cookie",
			NodeKind::InputVariable => "input",
			NodeKind::NotFound => "not_found",
		}
	}
}

/// The payload a node carries, discriminated by its [`NodeKind`] (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodePayload {
	Request(Request),
	Cookie { key: String, value: String },
	InputVariable { name: String, value: String },
	NotFound { token: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
	pub id: NodeId,
	pub kind: NodeKind,
	pub payload: NodePayload,
	/// Strings this node produces for downstream consumers.
	pub extracted_parts: IndexSet<String>,
	/// Strings this node still consumes and has not resolved.
	pub dynamic_parts: IndexSet<String>,
	/// Variable name -> literal value bound within this node.
	pub input_variables: IndexMap<String, String>,
}

impl Node {
	pub fn new_id(kind: NodeKind, counter: usize) -> NodeId {
		format!("{}_{counter}", kind.id_prefix())
	}
}

/// A directed edge from a producer to a consumer, labeled with the dynamic
/// part the producer supplies (§3 "Edge").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
	pub from: NodeId,
	pub to: NodeId,
	pub label: String,
}

/// Fields that may be updated on a node after creation. `dynamic_parts`
/// must only shrink (§3 invariant 3); callers are trusted to uphold this,
/// the manager does not re-validate it.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
	pub dynamic_parts: Option<IndexSet<String>>,
	pub extracted_parts: Option<IndexSet<String>>,
	pub input_variables: Option<IndexMap<String, String>>,
}
