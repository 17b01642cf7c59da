//! Input-Variables Binder (§4.4): matches dynamic parts against user-supplied
//! variables and removes the matched ones from the dynamic set.

use indexmap::{IndexMap, IndexSet};
use serde_json::json;

use crate::error::{Error, Result};
use harvest_llm::{CallOptions, FunctionDef, LlmProvider, Message, RetryPolicy, call_with_policy};

fn function_def() -> FunctionDef {
	FunctionDef {
		name: "identify_bound_variables".to_string(),
		description: "Identify which of the given variable names appear (by value) in the \
			curl command text."
			.to_string(),
		parameters: json!({
			"type": "object",
			"properties": {
				"variable_names": {
					"type": "array",
					"items": { "type": "string" }
				}
			},
			"required": ["variable_names"]
		}),
	}
}

pub struct BindResult {
	pub bound: IndexMap<String, String>,
	pub remaining: IndexSet<String>,
}

/// Empty `variables` short-circuits to `({}, dynamic_parts)` without an LLM call (§4.4).
pub async fn bind(
	provider: &dyn LlmProvider,
	call_options: CallOptions,
	retry_policy: RetryPolicy,
	curl_text: &str,
	variables: &IndexMap<String, String>,
	dynamic_parts: IndexSet<String>,
) -> Result<BindResult> {
	if variables.is_empty() {
		return Ok(BindResult { bound: IndexMap::new(), remaining: dynamic_parts });
	}

	let variable_list: Vec<&str> = variables.keys().map(String::as_str).collect();
	let messages = vec![
		Message::system(
			"You are given a curl command and a list of variable names. Return the subset of \
			 variable names whose bound value literally appears in the curl command text.",
		),
		Message::user(format!(
			"curl command:\n{curl_text}\n\nvariable names: {}",
			variable_list.join(", ")
		)),
	];
	let function = function_def();

	let raw = match call_with_policy(call_options, retry_policy, || {
		provider.call_function(&messages, &function)
	})
	.await
	{
		Ok(v) => v,
		Err(e @ (harvest_llm::Error::MalformedResponse(_) | harvest_llm::Error::SchemaMismatch(_))) => {
			tracing::warn!(error = %e, "llm returned malformed binder response, binding nothing");
			return Ok(BindResult { bound: IndexMap::new(), remaining: dynamic_parts });
		}
		Err(e) => return Err(Error::Llm(e)),
	};

	let names: Vec<String> = raw
		.get("variable_names")
		.and_then(|v| v.as_array())
		.map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
		.unwrap_or_default();

	let mut bound = IndexMap::new();
	for name in names {
		if let Some(value) = variables.get(&name) {
			bound.insert(name, value.clone());
		}
	}

	let remaining: IndexSet<String> =
		dynamic_parts.into_iter().filter(|part| !bound.values().any(|v| v == part)).collect();

	Ok(BindResult { bound, remaining })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::StubProvider;

	#[tokio::test]
	async fn empty_variables_short_circuit_without_llm_call() {
		let provider = StubProvider::unreachable();
		let parts: IndexSet<String> = ["tok_abc".to_string()].into_iter().collect();
		let result = bind(
			&provider,
			CallOptions::default(),
			RetryPolicy::default(),
			"curl ...",
			&IndexMap::new(),
			parts.clone(),
		)
		.await
		.unwrap();
		assert!(result.bound.is_empty());
		assert_eq!(result.remaining, parts);
	}

	#[tokio::test]
	async fn bound_variable_values_are_removed_from_remaining() {
		let provider = StubProvider::function_result(json!({"variable_names": ["username"]}));
		let variables = IndexMap::from([("username".to_string(), "alice".to_string())]);
		let parts: IndexSet<String> = ["alice".to_string(), "tok_abc".to_string()].into_iter().collect();
		let result = bind(
			&provider,
			CallOptions::default(),
			RetryPolicy::default(),
			"curl ... alice ...",
			&variables,
			parts,
		)
		.await
		.unwrap();
		assert_eq!(result.bound.get("username").map(String::as_str), Some("alice"));
		assert_eq!(result.remaining, ["tok_abc".to_string()].into_iter().collect::<IndexSet<_>>());
	}
}
