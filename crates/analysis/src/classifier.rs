//! Dynamic-Parts Classifier (§4.3): given a request's `curl` rendering and the
//! known input variables, ask the LLM which substrings are dynamic.

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

use crate::error::{Error, Result};
use harvest_llm::{CallOptions, FunctionDef, LlmProvider, Message, RetryPolicy, call_with_policy};

const WELL_KNOWN_STATIC_VALUES: &[&str] = &[
	"application/json",
	"application/x-www-form-urlencoded",
	"text/plain",
	"text/html",
	"true",
	"false",
	"null",
	"get",
	"post",
	"put",
	"delete",
	"patch",
	"options",
];

fn function_def() -> FunctionDef {
	FunctionDef {
		name: "identify_dynamic_parts".to_string(),
		description: "Identify substrings of the curl command that are dynamically produced \
			values (tokens, ids, timestamps) rather than static constants or input variables."
			.to_string(),
		parameters: json!({
			"type": "object",
			"properties": {
				"dynamic_parts": {
					"type": "array",
					"items": { "type": "string" }
				}
			},
			"required": ["dynamic_parts"]
		}),
	}
}

fn is_noise(candidate: &str, input_values: &IndexMap<String, String>) -> bool {
	if candidate.len() < 2 {
		return true;
	}
	if input_values.values().any(|v| v == candidate) {
		return true;
	}
	WELL_KNOWN_STATIC_VALUES.iter().any(|s| s.eq_ignore_ascii_case(candidate))
}

/// Returns the ordered set of candidate dynamic-part substrings within
/// `curl_text`. Script assets (`.js` URLs) are never classified. A malformed
/// LLM response degrades to an empty set rather than failing the session (§4.3).
pub async fn classify(
	provider: &dyn LlmProvider,
	call_options: CallOptions,
	retry_policy: RetryPolicy,
	curl_text: &str,
	url: &str,
	input_variables: &IndexMap<String, String>,
) -> Result<IndexSet<String>> {
	if url.to_ascii_lowercase().ends_with(".js") {
		return Ok(IndexSet::new());
	}

	let messages = vec![
		Message::system(
			"You analyze HTTP requests captured from a browser session and identify which \
			 substrings are dynamically generated at runtime (auth tokens, session ids, \
			 opaque identifiers) as opposed to static constants.",
		),
		Message::user(format!("curl command:\n{curl_text}")),
	];
	let function = function_def();

	let raw = match call_with_policy(call_options, retry_policy, || {
		provider.call_function(&messages, &function)
	})
	.await
	{
		Ok(v) => v,
		Err(e @ (harvest_llm::Error::MalformedResponse(_) | harvest_llm::Error::SchemaMismatch(_))) => {
			tracing::warn!(error = %e, "llm returned malformed classifier response, degrading to empty set");
			return Ok(IndexSet::new());
		}
		Err(e) => return Err(Error::Llm(e)),
	};

	let parts: Vec<String> = raw
		.get("dynamic_parts")
		.and_then(|v| v.as_array())
		.map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
		.unwrap_or_default();

	let mut ordered = IndexSet::new();
	for part in parts {
		if !part.is_empty() && !is_noise(&part, input_variables) {
			ordered.insert(part);
		}
	}
	Ok(ordered)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::StubProvider;

	#[test]
	fn filters_noise_values() {
		let vars = IndexMap::from([("username".to_string(), "alice".to_string())]);
		assert!(is_noise("a", &vars));
		assert!(is_noise("application/json", &vars));
		assert!(is_noise("alice", &vars));
		assert!(!is_noise("tok_abc123", &vars));
	}

	#[tokio::test]
	async fn script_assets_are_never_classified() {
		let provider = StubProvider::unreachable();
		let result = classify(
			&provider,
			CallOptions::default(),
			RetryPolicy::default(),
			"curl https://x/app.js",
			"https://x/app.js",
			&IndexMap::new(),
		)
		.await
		.unwrap();
		assert!(result.is_empty());
	}

	#[tokio::test]
	async fn malformed_response_degrades_to_empty_set() {
		let provider = StubProvider::function_error(|| harvest_llm::Error::MalformedResponse("bad".into()));
		let result = classify(
			&provider,
			CallOptions::default(),
			RetryPolicy::default(),
			"curl https://x/api/search",
			"https://x/api/search",
			&IndexMap::new(),
		)
		.await
		.unwrap();
		assert!(result.is_empty());
	}

	#[tokio::test]
	async fn returns_ordered_deduplicated_dynamic_parts() {
		let provider = StubProvider::function_result(
			json!({"dynamic_parts": ["tok_abc", "tok_abc", "true", "a", "sess_123"]}),
		);
		let result = classify(
			&provider,
			CallOptions::default(),
			RetryPolicy::default(),
			"curl https://x/api/search",
			"https://x/api/search",
			&IndexMap::new(),
		)
		.await
		.unwrap();
		assert_eq!(result.iter().collect::<Vec<_>>(), vec!["tok_abc", "sess_123"]);
	}
}
