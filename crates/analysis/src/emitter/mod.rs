//! Code Emitter (§4.11): a topological walk over a complete DAG that
//! materializes source text via a pluggable backend.

pub mod backend;
pub mod ir;
pub mod js_backend;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::completion;
use crate::dag::{DagManager, NodeId, NodeKind, NodePayload};
use crate::error::{Error, Result};

use backend::EmitBackend;
use ir::{CookieAnnotation, EmittedFile, EmittedFunction, ExtractedField, Metadata, Param};

fn sanitize_identifier(raw: &str) -> String {
	let mut out: String =
		raw.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect::<String>();
	if out.is_empty() || out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
		out.insert(0, '_');
	}
	out
}

fn slug_from_url(url: &str) -> String {
	let path = url::Url::parse(url).map(|u| u.path().to_string()).unwrap_or_else(|_| url.to_string());
	let words: Vec<&str> = path.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty()).collect();
	if words.is_empty() {
		return "request".to_string();
	}
	let mut name = words[0].to_ascii_lowercase();
	for word in &words[1..] {
		let mut chars = word.chars();
		if let Some(first) = chars.next() {
			name.push(first.to_ascii_uppercase());
			name.push_str(&chars.as_str().to_ascii_lowercase());
		}
	}
	name
}

/// Assigns each `curl`/`master_curl`/`not_found` node a deterministic,
/// collision-disambiguated function name, seeded only by insertion order and
/// URL/token text (§4.11 determinism guarantee).
fn assign_names(dag: &DagManager) -> IndexMap<NodeId, String> {
	let mut counts: IndexMap<String, u32> = IndexMap::new();
	let mut names = IndexMap::new();

	for node in dag.get_all_nodes() {
		let base = match &node.payload {
			NodePayload::Request(req) => slug_from_url(&req.url),
			NodePayload::NotFound { token } => format!("resolve_{}", sanitize_identifier(token)),
			NodePayload::Cookie { .. } | NodePayload::InputVariable { .. } => continue,
		};
		let count = counts.entry(base.clone()).or_insert(0);
		*count += 1;
		let name = if *count == 1 { base } else { format!("{base}_{count}") };
		names.insert(node.id.clone(), name);
	}
	names
}

fn find_json_path(value: &serde_json::Value, needle: &str) -> Option<String> {
	match value {
		serde_json::Value::String(s) if s == needle => Some(String::new()),
		serde_json::Value::Object(map) => map.iter().find_map(|(k, v)| {
			find_json_path(v, needle).map(|rest| if rest.is_empty() { k.clone() } else { format!("{k}.{rest}") })
		}),
		serde_json::Value::Array(items) => items.iter().enumerate().find_map(|(i, v)| {
			find_json_path(v, needle).map(|rest| {
				if rest.is_empty() { format!("[{i}]") } else { format!("[{i}].{rest}") }
			})
		}),
		_ => None,
	}
}

fn build_function(
	dag: &DagManager,
	node_id: &NodeId,
	names: &IndexMap<NodeId, String>,
) -> EmittedFunction {
	let node = dag.get_node(node_id).expect("topo-sorted id exists in dag");
	let name = names.get(node_id).cloned().unwrap_or_else(|| node_id.clone());

	let mut params: Vec<Param> = dag
		.edges()
		.iter()
		.filter(|e| &e.to == node_id)
		.map(|e| {
			let producer = dag.get_node(&e.from).expect("edge endpoint exists");
			match &producer.payload {
				NodePayload::Cookie { value, .. } => Param {
					name: sanitize_identifier(&e.label),
					default_literal: Some(value.clone()),
					produced_by_function: None,
				},
				_ => Param {
					name: sanitize_identifier(&e.label),
					default_literal: None,
					produced_by_function: names.get(&e.from).cloned(),
				},
			}
		})
		.collect();
	params.extend(node.input_variables.iter().map(|(k, v)| Param {
		name: sanitize_identifier(k),
		default_literal: Some(v.clone()),
		produced_by_function: None,
	}));

	let substitutions: Vec<(String, String)> = dag
		.edges()
		.iter()
		.filter(|e| &e.to == node_id)
		.map(|e| (e.label.clone(), sanitize_identifier(&e.label)))
		.collect();

	let (request, not_found_token) = match &node.payload {
		NodePayload::Request(req) => (Some(req.clone()), None),
		NodePayload::NotFound { token } => (None, Some(token.clone())),
		_ => (None, None),
	};

	let extracted = node
		.extracted_parts
		.iter()
		.map(|part| {
			let accessor = request
				.as_ref()
				.and_then(|r| r.response.as_ref())
				.and_then(|r| r.body_json.as_ref())
				.and_then(|json| find_json_path(json, part))
				.map(|path| format!("body.{path}"))
				.unwrap_or_else(|| format!("extractFromText(bodyText, {part:?})"));
			ExtractedField { name: sanitize_identifier(part), accessor }
		})
		.collect();

	EmittedFunction { name, kind: node.kind, params, request, substitutions, extracted, not_found_token }
}

/// Walks the DAG in topological order and renders source text via the
/// default backend. Fails with `AnalysisIncomplete` if the DAG isn't
/// complete (§4.11 failure semantics).
pub fn emit(dag: &DagManager, prompt: &str, session_id: Uuid, generated_date: &str) -> Result<String> {
	emit_with_backend(dag, prompt, session_id, generated_date, &js_backend::JsBackend)
}

pub fn emit_with_backend(
	dag: &DagManager,
	prompt: &str,
	session_id: Uuid,
	generated_date: &str,
	backend: &dyn EmitBackend,
) -> Result<String> {
	if !dag.is_complete() {
		return Err(Error::AnalysisIncomplete(Box::new(completion::analyze(dag, None))));
	}

	let names = assign_names(dag);
	let order = dag.topological_sort();

	let mut cookies = Vec::new();
	let mut functions = Vec::new();

	for node_id in &order {
		let node = dag.get_node(node_id).expect("topo-sorted id exists in dag");
		match &node.payload {
			NodePayload::Cookie { key, value } => {
				cookies.push(CookieAnnotation { name: key.clone(), value: value.clone() });
			}
			NodePayload::InputVariable { .. } => {}
			NodePayload::Request(_) | NodePayload::NotFound { .. } => {
				functions.push(build_function(dag, node_id, &names));
			}
		}
	}

	let master_id = dag.master_node().expect("checked complete above").id.clone();
	let master_function = names.get(&master_id).cloned().expect("master node was named");

	let file = EmittedFile {
		banner: "Generated by harvest-analysis. Do not edit by hand.".to_string(),
		metadata: Metadata {
			prompt: prompt.to_string(),
			generated_date: generated_date.to_string(),
			session_id: session_id.to_string(),
		},
		cookies,
		functions,
		master_function,
	};

	Ok(backend.render(&file))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dag::{DagManager, NodeKind, NodePayload};
	use crate::request::{Body, Request, Response};
	use indexmap::IndexSet;

	fn request_with_json_response(method: &str, url: &str, body_json: serde_json::Value) -> Request {
		let mut req = Request::new(method, url);
		req.response = Some(Response {
			status: 200,
			status_text: "OK".into(),
			headers: Default::default(),
			body_text: Some(body_json.to_string()),
			body_json: Some(body_json),
		});
		req
	}

	#[test]
	fn emits_deterministic_output_for_the_auth_search_download_scenario() {
		let mut dag = DagManager::new();

		let mut auth = request_with_json_response(
			"POST",
			"https://x/api/auth/login",
			serde_json::json!({"access_token": "tok_abc"}),
		);
		auth.body = Some(Body::from_text(r#"{"username":"u","password":"p"}"#));
		let auth_id = dag.add_node(
			NodeKind::Curl,
			NodePayload::Request(auth),
			["tok_abc".to_string()].into_iter().collect(),
			IndexSet::new(),
			IndexMap::new(),
		);

		let mut search = request_with_json_response(
			"GET",
			"https://x/api/search?query=documents&limit=10",
			serde_json::json!({"doc_id": "d_123"}),
		);
		search.headers.insert("Authorization", "Bearer tok_abc");
		let search_id = dag.add_node(
			NodeKind::Curl,
			NodePayload::Request(search),
			["d_123".to_string()].into_iter().collect(),
			IndexSet::new(),
			IndexMap::new(),
		);
		dag.add_edge(&auth_id, &search_id, "tok_abc").unwrap();

		let mut download = Request::new("GET", "https://x/api/documents/download?document_id=d_123&format=pdf");
		download.headers.insert("Authorization", "Bearer tok_abc");
		let download_id = dag.add_node(
			NodeKind::MasterCurl,
			NodePayload::Request(download),
			IndexSet::new(),
			IndexSet::new(),
			IndexMap::new(),
		);
		dag.add_edge(&auth_id, &download_id, "tok_abc").unwrap();
		dag.add_edge(&search_id, &download_id, "d_123").unwrap();

		assert!(dag.is_complete());

		let first = emit(&dag, "Search and download documents", Uuid::nil(), "2026-01-01").unwrap();
		let second = emit(&dag, "Search and download documents", Uuid::nil(), "2026-01-01").unwrap();
		assert_eq!(first, second);
		assert!(first.contains("function apiAuthLogin"));
		assert!(first.contains("function apiSearch"));
		assert!(first.contains("async function main"));
	}

	#[test]
	fn incomplete_dag_fails_with_analysis_incomplete() {
		let mut dag = DagManager::new();
		dag.add_node(
			NodeKind::MasterCurl,
			NodePayload::Request(Request::new("GET", "https://x/api/protected")),
			IndexSet::new(),
			["missing".to_string()].into_iter().collect(),
			IndexMap::new(),
		);
		let err = emit(&dag, "prompt", Uuid::nil(), "2026-01-01").unwrap_err();
		assert!(matches!(err, Error::AnalysisIncomplete(_)));
	}
}
