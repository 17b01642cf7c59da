//! Workflow Identifier (§4.7): picks the "master" URL that realizes the
//! prompt from the ordered set of candidate URLs.

use serde_json::json;

use crate::error::{Error, Result};
use crate::har::filter::UrlSummary;
use harvest_llm::{CallOptions, FunctionDef, LlmProvider, Message, RetryPolicy, call_with_policy};

fn function_def() -> FunctionDef {
	FunctionDef {
		name: "identify_end_url".to_string(),
		description: "Given a natural-language description of a user action and a list of \
			candidate request URLs, identify the URL whose request realizes that action."
			.to_string(),
		parameters: json!({
			"type": "object",
			"properties": {
				"url": { "type": "string" }
			},
			"required": ["url"]
		}),
	}
}

/// Selects the master URL. Falls back to the first API-tagged summary if the
/// model's answer doesn't match any candidate (logged as `WorkflowFallback`,
/// §8 boundary behavior). An empty candidate list fails with `NoCandidates`.
pub async fn identify_master_url(
	provider: &dyn LlmProvider,
	call_options: CallOptions,
	retry_policy: RetryPolicy,
	prompt: &str,
	candidates: &[UrlSummary],
) -> Result<String> {
	if candidates.is_empty() {
		return Err(Error::NoCandidates);
	}

	let listing =
		candidates.iter().map(|c| format!("{} {}", c.method, c.url)).collect::<Vec<_>>().join("\n");
	let messages = vec![
		Message::system(
			"You pick which single HTTP request out of a captured session realizes a described \
			 user action.",
		),
		Message::user(format!("action: {prompt}\ncandidate requests:\n{listing}")),
	];
	let function = function_def();

	let selected = match call_with_policy(call_options, retry_policy, || {
		provider.call_function(&messages, &function)
	})
	.await
	{
		Ok(raw) => raw.get("url").and_then(|v| v.as_str()).map(str::to_string),
		Err(e @ (harvest_llm::Error::MalformedResponse(_) | harvest_llm::Error::SchemaMismatch(_))) => {
			tracing::warn!(error = %e, "llm returned malformed workflow-identifier response");
			None
		}
		Err(e) => return Err(Error::Llm(e)),
	};

	if let Some(url) = selected
		&& candidates.iter().any(|c| c.url == url)
	{
		return Ok(url);
	}

	let fallback = candidates
		.iter()
		.find(|c| c.is_api)
		.or_else(|| candidates.first())
		.expect("checked non-empty above")
		.url
		.clone();
	tracing::warn!(event = "WorkflowFallback", url = %fallback, "falling back to first api-tagged url");
	Ok(fallback)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::StubProvider;

	fn summary(method: &str, url: &str, is_api: bool) -> UrlSummary {
		UrlSummary { method: method.to_string(), url: url.to_string(), is_api, response_is_json: is_api }
	}

	#[tokio::test]
	async fn empty_candidates_fail_with_no_candidates() {
		let provider = StubProvider::unreachable();
		let err = identify_master_url(&provider, CallOptions::default(), RetryPolicy::default(), "do something", &[])
			.await
			.unwrap_err();
		assert!(matches!(err, Error::NoCandidates));
	}

	#[tokio::test]
	async fn selected_url_is_returned_when_present_in_candidates() {
		let provider = StubProvider::function_result(json!({"url": "https://x/api/search"}));
		let candidates = vec![summary("GET", "https://x/home", false), summary("GET", "https://x/api/search", true)];
		let url = identify_master_url(&provider, CallOptions::default(), RetryPolicy::default(), "search", &candidates)
			.await
			.unwrap();
		assert_eq!(url, "https://x/api/search");
	}

	#[tokio::test]
	async fn unrecognized_url_falls_back_to_first_api_tagged() {
		let provider = StubProvider::function_result(json!({"url": "https://not-a-candidate.example"}));
		let candidates = vec![summary("GET", "https://x/home", false), summary("GET", "https://x/api/search", true)];
		let url = identify_master_url(&provider, CallOptions::default(), RetryPolicy::default(), "search", &candidates)
			.await
			.unwrap();
		assert_eq!(url, "https://x/api/search");
	}
}
