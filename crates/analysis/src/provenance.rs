//! Provenance Finder (§4.5): for each unresolved dynamic part, searches the
//! cookie jar and prior responses, then asks the LLM to break ties among
//! multiple candidate sources.

use serde_json::json;

use crate::cookies::CookieJar;
use crate::curl::render_curl;
use crate::error::{Error, Result};
use crate::request::Request;
use harvest_llm::{CallOptions, FunctionDef, LlmProvider, Message, RetryPolicy, call_with_policy};

#[derive(Debug, Clone)]
pub struct CookieDependency {
	pub part: String,
	pub cookie_name: String,
	pub cookie_value: String,
}

#[derive(Debug, Clone)]
pub struct RequestDependency {
	pub part: String,
	pub request_index: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceResult {
	pub cookie_dependencies: Vec<CookieDependency>,
	pub request_dependencies: Vec<RequestDependency>,
	pub not_found_parts: Vec<String>,
}

fn function_def() -> FunctionDef {
	FunctionDef {
		name: "get_simplest_curl_index".to_string(),
		description: "Given a numbered list of candidate curl commands that could each supply a \
			dynamic value, return the index of the simplest one (fewest dependencies, most \
			direct source of the value)."
			.to_string(),
		parameters: json!({
			"type": "object",
			"properties": {
				"index": { "type": "integer" }
			},
			"required": ["index"]
		}),
	}
}

/// A candidate response is a valid data source unless it's a script or document (§4.5).
fn is_valid_candidate(req: &Request) -> bool {
	if req.is_script_asset() {
		return false;
	}
	!req.response.as_ref().is_some_and(|r| r.is_html())
}

fn candidate_indices(part: &str, requests: &[Request]) -> Vec<usize> {
	requests
		.iter()
		.enumerate()
		.filter(|(_, req)| is_valid_candidate(req))
		.filter(|(_, req)| {
			req.response.as_ref().is_some_and(|r| r.searchable_strings().iter().any(|s| s.contains(part)))
		})
		.map(|(i, _)| i)
		.collect()
}

/// Searches cookies then prior responses for each dynamic part, asking the
/// LLM to break ties when more than one response candidate supplies the
/// same value.
pub async fn find_provenance(
	provider: &dyn LlmProvider,
	call_options: CallOptions,
	retry_policy: RetryPolicy,
	dynamic_parts: &[String],
	requests: &[Request],
	cookies: &CookieJar,
) -> Result<ProvenanceResult> {
	let mut result = ProvenanceResult::default();

	for part in dynamic_parts {
		if let Some(cookie) = cookies.find_by_value(part) {
			result.cookie_dependencies.push(CookieDependency {
				part: part.clone(),
				cookie_name: cookie.name.clone(),
				cookie_value: cookie.value.clone(),
			});
			continue;
		}

		let candidates = candidate_indices(part, requests);
		match candidates.len() {
			0 => result.not_found_parts.push(part.clone()),
			1 => result.request_dependencies.push(RequestDependency { part: part.clone(), request_index: candidates[0] }),
			_ => {
				let chosen = tie_break(provider, call_options, retry_policy, part, &candidates, requests).await?;
				result.request_dependencies.push(RequestDependency { part: part.clone(), request_index: chosen });
			}
		}
	}

	Ok(result)
}

async fn tie_break(
	provider: &dyn LlmProvider,
	call_options: CallOptions,
	retry_policy: RetryPolicy,
	part: &str,
	candidates: &[usize],
	requests: &[Request],
) -> Result<usize> {
	let renderings: Vec<String> = candidates.iter().map(|&i| render_curl(&requests[i])).collect();
	let numbered =
		renderings.iter().enumerate().map(|(i, c)| format!("{i}: {c}")).collect::<Vec<_>>().join("\n");

	let messages = vec![
		Message::system(
			"Multiple prior requests could have produced the same dynamic value. Choose the \
			 simplest one: the one with the fewest unresolved dependencies of its own.",
		),
		Message::user(format!("dynamic value: {part}\ncandidates:\n{numbered}")),
	];
	let function = function_def();

	let raw = match call_with_policy(call_options, retry_policy, || {
		provider.call_function(&messages, &function)
	})
	.await
	{
		Ok(v) => v,
		Err(e @ (harvest_llm::Error::MalformedResponse(_) | harvest_llm::Error::SchemaMismatch(_))) => {
			tracing::warn!(error = %e, "llm tie-break response malformed, defaulting to first candidate");
			return Ok(candidates[0]);
		}
		Err(e) => return Err(Error::Llm(e)),
	};

	let chosen = raw.get("index").and_then(|v| v.as_u64()).map(|i| i as usize).unwrap_or(0);
	Ok(*candidates.get(chosen).unwrap_or(&candidates[0]))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::request::{Body, Response};
	use crate::test_support::StubProvider;

	fn request_with_response_body(method: &str, url: &str, body: &str) -> Request {
		let mut req = Request::new(method, url);
		req.response = Some(Response {
			status: 200,
			status_text: "OK".into(),
			headers: Default::default(),
			body_text: Some(body.to_string()),
			body_json: None,
		});
		req
	}

	#[tokio::test]
	async fn cookie_match_takes_priority_over_response_search() {
		let jar = CookieJar::parse(br#"{"session_id": "sess_abc"}"#).unwrap();
		let requests = vec![request_with_response_body("GET", "https://x/api/whoami", "sess_abc")];
		let provider = StubProvider::unreachable();
		let result =
			find_provenance(
				&provider,
				CallOptions::default(),
				RetryPolicy::default(),
				&["sess_abc".to_string()],
				&requests,
				&jar,
			)
			.await
			.unwrap();
		assert_eq!(result.cookie_dependencies.len(), 1);
		assert!(result.request_dependencies.is_empty());
	}

	#[tokio::test]
	async fn single_candidate_skips_llm_tie_break() {
		let jar = CookieJar::new();
		let requests = vec![request_with_response_body("POST", "https://x/api/login", r#"{"access_token":"tok_abc"}"#)];
		let provider = StubProvider::unreachable();
		let result =
			find_provenance(
				&provider,
				CallOptions::default(),
				RetryPolicy::default(),
				&["tok_abc".to_string()],
				&requests,
				&jar,
			)
			.await
			.unwrap();
		assert_eq!(result.request_dependencies.len(), 1);
		assert_eq!(result.request_dependencies[0].request_index, 0);
	}

	#[tokio::test]
	async fn multiple_candidates_invoke_tie_break() {
		let jar = CookieJar::new();
		let requests = vec![
			request_with_response_body("POST", "https://x/api/login", r#"{"access_token":"tok_abc"}"#),
			request_with_response_body("POST", "https://x/api/refresh", r#"{"access_token":"tok_abc"}"#),
		];
		let provider = StubProvider::function_result(json!({"index": 1}));
		let result =
			find_provenance(
				&provider,
				CallOptions::default(),
				RetryPolicy::default(),
				&["tok_abc".to_string()],
				&requests,
				&jar,
			)
			.await
			.unwrap();
		assert_eq!(result.request_dependencies[0].request_index, 1);
	}

	#[tokio::test]
	async fn script_and_html_candidates_are_excluded() {
		let jar = CookieJar::new();
		let mut script = Request::new("GET", "https://x/assets/app.js");
		script.response = Some(Response {
			status: 200,
			status_text: "OK".into(),
			headers: Default::default(),
			body_text: Some("tok_abc".into()),
			body_json: None,
		});
		let mut html = Request::new("GET", "https://x/page");
		let mut html_headers = crate::request::HeaderBag::new();
		html_headers.insert("content-type", "text/html");
		html.response = Some(Response {
			status: 200,
			status_text: "OK".into(),
			headers: html_headers,
			body_text: Some("tok_abc".into()),
			body_json: None,
		});
		let requests = vec![script, html];
		let provider = StubProvider::unreachable();
		let result =
			find_provenance(
				&provider,
				CallOptions::default(),
				RetryPolicy::default(),
				&["tok_abc".to_string()],
				&requests,
				&jar,
			)
			.await
			.unwrap();
		assert_eq!(result.not_found_parts, vec!["tok_abc".to_string()]);
	}

	#[test]
	fn body_search_covers_json_leaves() {
		let body = Body::from_text(r#"{"doc_id":"d_123"}"#);
		assert!(body.searchable_strings().iter().any(|s| s == "d_123"));
	}
}
