//! Completion Analyzer (§4.10): reports why a session cannot yet emit code.

use serde::Serialize;

use crate::dag::{DagManager, NodeId};

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
	pub dag_complete: bool,
	pub has_master_node: bool,
	pub has_action_url: bool,
	pub unresolved_node_count: usize,
	pub not_found_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Blocker {
	MissingMasterNode,
	UnresolvedDynamicParts { node_ids: Vec<NodeId> },
	NotFoundDependency { node_ids: Vec<NodeId> },
	AnalysisIncomplete,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionReport {
	pub can_generate_code: bool,
	pub blockers: Vec<Blocker>,
	pub recommendations: Vec<String>,
	pub diagnostics: Diagnostics,
}

/// `master_url` is the workflow identifier's pick (§4.7), which may exist
/// before a `master_curl` node has actually landed in the DAG.
pub fn analyze(dag: &DagManager, master_url: Option<&str>) -> CompletionReport {
	let has_master_node = dag.master_node().is_some();
	let not_found = dag.not_found_nodes();
	let unresolved = dag.unresolved_nodes();
	let dag_complete = dag.is_complete();

	let mut blockers = Vec::new();
	let mut recommendations = Vec::new();

	if !has_master_node {
		blockers.push(Blocker::MissingMasterNode);
		recommendations.push("identify a workflow before requesting code generation".to_string());
	}
	if !not_found.is_empty() {
		blockers.push(Blocker::NotFoundDependency {
			node_ids: not_found.iter().map(|n| n.id.clone()).collect(),
		});
		recommendations.push("bind the unresolved tokens as input variables or recapture with them present".to_string());
	}
	let unresolved_excluding_not_found: Vec<NodeId> = unresolved
		.iter()
		.filter(|n| n.kind != crate::dag::NodeKind::NotFound)
		.map(|n| n.id.clone())
		.collect();
	if !unresolved_excluding_not_found.is_empty() {
		blockers.push(Blocker::UnresolvedDynamicParts { node_ids: unresolved_excluding_not_found });
		recommendations.push("continue processing the node queue until no dynamic parts remain".to_string());
	}
	if !dag_complete && blockers.is_empty() {
		blockers.push(Blocker::AnalysisIncomplete);
	}

	CompletionReport {
		can_generate_code: dag_complete,
		blockers,
		recommendations,
		diagnostics: Diagnostics {
			dag_complete,
			has_master_node,
			has_action_url: master_url.is_some(),
			unresolved_node_count: unresolved.len(),
			not_found_count: not_found.len(),
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dag::{NodeKind, NodePayload};
	use crate::request::Request;
	use indexmap::{IndexMap, IndexSet};

	#[test]
	fn complete_dag_has_no_blockers() {
		let mut dag = DagManager::new();
		let master = dag.add_node(
			NodeKind::MasterCurl,
			NodePayload::Request(Request::new("GET", "https://x/api/download")),
			IndexSet::new(),
			IndexSet::new(),
			IndexMap::new(),
		);
		let _ = master;
		let report = analyze(&dag, Some("https://x/api/download"));
		assert!(report.can_generate_code);
		assert!(report.blockers.is_empty());
	}

	#[test]
	fn missing_master_and_not_found_are_both_reported() {
		let mut dag = DagManager::new();
		dag.add_node(
			NodeKind::NotFound,
			NodePayload::NotFound { token: "missing_token".to_string() },
			IndexSet::new(),
			IndexSet::new(),
			IndexMap::new(),
		);
		let report = analyze(&dag, None);
		assert!(!report.can_generate_code);
		assert!(matches!(report.blockers[0], Blocker::MissingMasterNode));
		assert!(report.blockers.iter().any(|b| matches!(b, Blocker::NotFoundDependency { .. })));
		assert!(!report.diagnostics.has_action_url);
	}
}
