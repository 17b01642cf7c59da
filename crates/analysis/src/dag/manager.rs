//! DAG Manager (§4.6): typed nodes, edges, cycle detection, topological
//! sort, and the completeness predicate.

use std::collections::{HashSet, VecDeque};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::node::{Edge, Node, NodeId, NodeKind, NodePatch, NodePayload};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DagManager {
	nodes: IndexMap<NodeId, Node>,
	edges: Vec<Edge>,
	#[serde(skip)]
	counters: IndexMap<NodeKind, usize>,
}

impl DagManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_node(
		&mut self,
		kind: NodeKind,
		payload: NodePayload,
		extracted_parts: IndexSet<String>,
		dynamic_parts: IndexSet<String>,
		input_variables: IndexMap<String, String>,
	) -> NodeId {
		let counter = self.counters.entry(kind).or_insert(0);
		let id = Node::new_id(kind, *counter);
		*counter += 1;

		self.nodes.insert(id.clone(), Node { id: id.clone(), kind, payload, extracted_parts, dynamic_parts, input_variables });
		id
	}

	/// Rejects with `CycleDetected` if the edge would close a cycle: a path
	/// already exists from `to` back to `from` (§4.6).
	pub fn add_edge(&mut self, from: &str, to: &str, label: impl Into<String>) -> Result<()> {
		if self.path_exists(to, from) {
			return Err(Error::CycleDetected);
		}
		self.edges.push(Edge { from: from.to_string(), to: to.to_string(), label: label.into() });
		Ok(())
	}

	fn path_exists(&self, from: &str, to: &str) -> bool {
		if from == to {
			return true;
		}
		let mut visited = HashSet::new();
		let mut stack = vec![from.to_string()];
		while let Some(current) = stack.pop() {
			if !visited.insert(current.clone()) {
				continue;
			}
			for edge in &self.edges {
				if edge.from == current {
					if edge.to == to {
						return true;
					}
					stack.push(edge.to.clone());
				}
			}
		}
		false
	}

	pub fn update_node(&mut self, id: &str, patch: NodePatch) {
		if let Some(node) = self.nodes.get_mut(id) {
			if let Some(dynamic_parts) = patch.dynamic_parts {
				node.dynamic_parts = dynamic_parts;
			}
			if let Some(extracted_parts) = patch.extracted_parts {
				node.extracted_parts = extracted_parts;
			}
			if let Some(input_variables) = patch.input_variables {
				node.input_variables = input_variables;
			}
		}
	}

	pub fn get_node(&self, id: &str) -> Option<&Node> {
		self.nodes.get(id)
	}

	pub fn get_all_nodes(&self) -> impl Iterator<Item = &Node> {
		self.nodes.values()
	}

	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	pub fn find_curl_node_by_url(&self, method: &str, url: &str) -> Option<&Node> {
		self.nodes.values().find(|n| match &n.payload {
			NodePayload::Request(req) => req.method.eq_ignore_ascii_case(method) && req.url == url,
			_ => false,
		})
	}

	pub fn find_cookie_node(&self, key: &str) -> Option<&Node> {
		self.nodes.values().find(|n| matches!(&n.payload, NodePayload::Cookie { key: k, .. } if k == key))
	}

	/// Full acyclicity re-check, independent of the incremental check in
	/// `add_edge`. Returns the first cycle found as a node-id path, if any.
	pub fn detect_cycles(&self) -> Option<Vec<NodeId>> {
		let mut visiting = HashSet::new();
		let mut visited = HashSet::new();
		let mut path = Vec::new();

		fn visit(
			id: &str,
			dag: &DagManager,
			visiting: &mut HashSet<NodeId>,
			visited: &mut HashSet<NodeId>,
			path: &mut Vec<NodeId>,
		) -> Option<Vec<NodeId>> {
			if visited.contains(id) {
				return None;
			}
			if visiting.contains(id) {
				let start = path.iter().position(|n| n == id).unwrap_or(0);
				return Some(path[start..].to_vec());
			}
			visiting.insert(id.to_string());
			path.push(id.to_string());
			for edge in dag.edges.iter().filter(|e| e.from == id) {
				if let Some(cycle) = visit(&edge.to, dag, visiting, visited, path) {
					return Some(cycle);
				}
			}
			path.pop();
			visiting.remove(id);
			visited.insert(id.to_string());
			None
		}

		for id in self.nodes.keys() {
			if let Some(cycle) = visit(id, self, &mut visiting, &mut visited, &mut path) {
				return Some(cycle);
			}
		}
		None
	}

	/// Kahn's algorithm; ties among the current frontier are broken by node
	/// insertion order (§4.6 "ordering among sibling frontier nodes is
	/// insertion order").
	pub fn topological_sort(&self) -> Vec<NodeId> {
		let mut indegree: IndexMap<NodeId, usize> = self.nodes.keys().map(|id| (id.clone(), 0)).collect();
		for edge in &self.edges {
			if let Some(count) = indegree.get_mut(&edge.to) {
				*count += 1;
			}
		}

		let mut frontier: VecDeque<NodeId> =
			self.nodes.keys().filter(|id| indegree[*id] == 0).cloned().collect();
		let mut order = Vec::with_capacity(self.nodes.len());

		while let Some(id) = frontier.pop_front() {
			order.push(id.clone());
			for edge in self.edges.iter().filter(|e| e.from == id) {
				if let Some(count) = indegree.get_mut(&edge.to) {
					*count -= 1;
					if *count == 0 {
						frontier.push_back(edge.to.clone());
					}
				}
			}
		}
		order
	}

	/// §3 invariant 4: complete iff every node has no remaining dynamic
	/// parts, no `not_found` node exists, and exactly one `master_curl` exists.
	pub fn is_complete(&self) -> bool {
		let has_master = self.nodes.values().filter(|n| n.kind == NodeKind::MasterCurl).count() == 1;
		let no_not_found = !self.nodes.values().any(|n| n.kind == NodeKind::NotFound);
		let all_resolved = self.nodes.values().all(|n| n.dynamic_parts.is_empty());
		has_master && no_not_found && all_resolved
	}

	pub fn master_node(&self) -> Option<&Node> {
		self.nodes.values().find(|n| n.kind == NodeKind::MasterCurl)
	}

	pub fn not_found_nodes(&self) -> Vec<&Node> {
		self.nodes.values().filter(|n| n.kind == NodeKind::NotFound).collect()
	}

	pub fn unresolved_nodes(&self) -> Vec<&Node> {
		self.nodes.values().filter(|n| !n.dynamic_parts.is_empty()).collect()
	}

	pub fn to_json(&self) -> serde_json::Result<String> {
		serde_json::to_string(self)
	}

	pub fn from_json(text: &str) -> serde_json::Result<Self> {
		let mut dag: DagManager = serde_json::from_str(text)?;
		dag.rebuild_counters();
		Ok(dag)
	}

	fn rebuild_counters(&mut self) {
		for node in self.nodes.values() {
			let prefix_len = node.id.rfind('_').unwrap_or(node.id.len());
			if let Ok(n) = node.id[prefix_len + 1..].parse::<usize>() {
				let entry = self.counters.entry(node.kind).or_insert(0);
				*entry = (*entry).max(n + 1);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::request::Request;

	fn curl_node(dag: &mut DagManager, url: &str, extracted: &[&str], dynamic: &[&str]) -> NodeId {
		dag.add_node(
			NodeKind::Curl,
			NodePayload::Request(Request::new("GET", url)),
			extracted.iter().map(|s| s.to_string()).collect(),
			dynamic.iter().map(|s| s.to_string()).collect(),
			IndexMap::new(),
		)
	}

	#[test]
	fn topological_sort_respects_edges_and_empty_dag() {
		let mut dag = DagManager::new();
		assert!(dag.topological_sort().is_empty());

		let auth = curl_node(&mut dag, "https://x/api/auth", &["tok_abc"], &[]);
		let search = curl_node(&mut dag, "https://x/api/search", &["d_123"], &[]);
		dag.add_edge(&auth, &search, "tok_abc").unwrap();

		let order = dag.topological_sort();
		assert_eq!(order, vec![auth, search]);
	}

	#[test]
	fn cycle_is_rejected() {
		let mut dag = DagManager::new();
		let a = curl_node(&mut dag, "https://x/a", &["x"], &[]);
		let b = curl_node(&mut dag, "https://x/b", &["y"], &[]);
		let c = curl_node(&mut dag, "https://x/c", &["z"], &[]);
		dag.add_edge(&a, &b, "x").unwrap();
		dag.add_edge(&b, &c, "y").unwrap();
		let err = dag.add_edge(&c, &a, "z").unwrap_err();
		assert!(matches!(err, Error::CycleDetected));
		assert_eq!(dag.edges().len(), 2);
	}

	#[test]
	fn is_complete_requires_master_no_not_found_and_resolved_parts() {
		let mut dag = DagManager::new();
		assert!(!dag.is_complete());

		let master = dag.add_node(
			NodeKind::MasterCurl,
			NodePayload::Request(Request::new("GET", "https://x/api/download")),
			IndexSet::new(),
			["tok_abc".to_string()].into_iter().collect(),
			IndexMap::new(),
		);
		assert!(!dag.is_complete());

		dag.update_node(&master, NodePatch { dynamic_parts: Some(IndexSet::new()), ..Default::default() });
		assert!(dag.is_complete());
	}

	#[test]
	fn roundtrips_through_json() {
		let mut dag = DagManager::new();
		let auth = curl_node(&mut dag, "https://x/api/auth", &["tok_abc"], &[]);
		let search = curl_node(&mut dag, "https://x/api/search", &[], &["tok_abc"]);
		dag.add_edge(&auth, &search, "tok_abc").unwrap();

		let json = dag.to_json().unwrap();
		let restored = DagManager::from_json(&json).unwrap();
		assert_eq!(restored.get_all_nodes().count(), 2);
		assert_eq!(restored.edges().len(), 1);
	}
}
