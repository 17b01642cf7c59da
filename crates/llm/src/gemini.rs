use serde_json::json;

use crate::error::Error;
use crate::provider::{Completion, FunctionDef, Message, Role};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
	client: reqwest::Client,
	api_key: String,
	model: String,
	api_base: String,
}

impl GeminiProvider {
	pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
		Self::with_base(api_key, model, API_BASE.to_string())
	}

	/// Same as [`Self::new`] but against a caller-supplied base URL, used by
	/// tests to point at a `wiremock` server instead of the real API.
	pub fn with_base(api_key: impl Into<String>, model: Option<String>, api_base: String) -> Self {
		Self {
			client: reqwest::Client::new(),
			api_key: api_key.into(),
			model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
			api_base,
		}
	}

	fn contents(messages: &[Message]) -> serde_json::Value {
		// Gemini has no "system" turn in `contents`; system messages are sent
		// as the leading user turn, matching the teacher's collapsed-role pattern.
		let parts: Vec<_> = messages
			.iter()
			.map(|m| {
				json!({
					"role": if m.role == Role::Assistant { "model" } else { "user" },
					"parts": [{"text": m.content}],
				})
			})
			.collect();
		json!(parts)
	}

	async fn post(&self, body: serde_json::Value) -> Result<serde_json::Value, Error> {
		let url = format!(
			"{}/models/{}:generateContent?key={}",
			self.api_base, self.model, self.api_key
		);
		let resp = self
			.client
			.post(url)
			.json(&body)
			.send()
			.await
			.map_err(|e| Error::Unavailable(e.to_string()))?;

		if !resp.status().is_success() {
			return Err(Error::Unavailable(format!("gemini returned status {}", resp.status())));
		}

		resp
			.json::<serde_json::Value>()
			.await
			.map_err(|e| Error::MalformedResponse(e.to_string()))
	}
}

#[async_trait::async_trait]
impl crate::LlmProvider for GeminiProvider {
	fn name(&self) -> &'static str {
		"gemini"
	}

	fn default_model(&self) -> &str {
		DEFAULT_MODEL
	}

	async fn call_function(
		&self,
		messages: &[Message],
		function: &FunctionDef,
	) -> Result<serde_json::Value, Error> {
		let body = json!({
			"contents": Self::contents(messages),
			"tools": [{
				"functionDeclarations": [{
					"name": function.name,
					"description": function.description,
					"parameters": function.parameters,
				}]
			}],
			"toolConfig": {
				"functionCallingConfig": {
					"mode": "ANY",
					"allowedFunctionNames": [function.name],
				}
			}
		});

		let value = self.post(body).await?;
		let call = value
			.pointer("/candidates/0/content/parts/0/functionCall")
			.ok_or_else(|| Error::MalformedResponse("no functionCall in gemini response".into()))?;

		let name = call
			.get("name")
			.and_then(|n| n.as_str())
			.ok_or_else(|| Error::MalformedResponse("functionCall missing name".into()))?;
		if name != function.name {
			return Err(Error::UnknownFunctionCalledBack(name.to_string()));
		}

		call
			.get("args")
			.cloned()
			.ok_or_else(|| Error::MalformedResponse("functionCall missing args".into()))
	}

	async fn generate_completion(
		&self,
		messages: &[Message],
		temperature: Option<f64>,
		_model: Option<&str>,
	) -> Result<Completion, Error> {
		let mut body = json!({ "contents": Self::contents(messages) });
		if let Some(t) = temperature {
			body["generationConfig"] = json!({ "temperature": t });
		}

		let value = self.post(body).await?;
		let text = value
			.pointer("/candidates/0/content/parts/0/text")
			.and_then(|t| t.as_str())
			.ok_or_else(|| Error::MalformedResponse("no text in gemini response".into()))?;

		Ok(Completion { content: text.to_string() })
	}
}

#[cfg(test)]
mod tests {
	use wiremock::matchers::{method, path_regex};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	use super::*;
	use crate::LlmProvider;

	fn function() -> FunctionDef {
		FunctionDef {
			name: "pick_url".to_string(),
			description: "picks a url".to_string(),
			parameters: json!({"type": "object", "properties": {"url": {"type": "string"}}}),
		}
	}

	#[tokio::test]
	async fn call_function_extracts_the_function_call_args() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path_regex(r"/models/.*:generateContent"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"candidates": [{
					"content": {
						"parts": [{
							"functionCall": {"name": "pick_url", "args": {"url": "https://example.com"}}
						}]
					}
				}]
			})))
			.mount(&server)
			.await;

		let provider = GeminiProvider::with_base("key", None, server.uri());
		let messages = [Message { role: Role::User, content: "hi".to_string() }];
		let args = provider.call_function(&messages, &function()).await.unwrap();
		assert_eq!(args["url"], "https://example.com");
	}

	#[tokio::test]
	async fn call_function_rejects_a_mismatched_function_name() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path_regex(r"/models/.*:generateContent"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"candidates": [{
					"content": {"parts": [{"functionCall": {"name": "other_fn", "args": {}}}]}
				}]
			})))
			.mount(&server)
			.await;

		let provider = GeminiProvider::with_base("key", None, server.uri());
		let messages = [Message { role: Role::User, content: "hi".to_string() }];
		let err = provider.call_function(&messages, &function()).await.unwrap_err();
		assert!(matches!(err, Error::UnknownFunctionCalledBack(_)));
	}

	#[tokio::test]
	async fn a_non_success_status_surfaces_as_unavailable() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path_regex(r"/models/.*:generateContent"))
			.respond_with(ResponseTemplate::new(503))
			.mount(&server)
			.await;

		let provider = GeminiProvider::with_base("key", None, server.uri());
		let messages = [Message { role: Role::User, content: "hi".to_string() }];
		let err = provider.call_function(&messages, &function()).await.unwrap_err();
		assert!(matches!(err, Error::Unavailable(_)));
	}
}
