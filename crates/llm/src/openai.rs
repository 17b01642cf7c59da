use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
	ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
	ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
	ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolChoiceOption,
	ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObjectArgs,
};

use crate::error::Error;
use crate::provider::{Completion, FunctionDef, Message, Role};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiProvider {
	client: Client<OpenAIConfig>,
	model: String,
}

impl OpenAiProvider {
	pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
		let config = OpenAIConfig::new().with_api_key(api_key.into());
		Self { client: Client::with_config(config), model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()) }
	}

	/// Same as [`Self::new`] but against a caller-supplied base URL, used by
	/// tests to point at a `wiremock` server instead of the real API.
	pub fn with_base(api_key: impl Into<String>, model: Option<String>, api_base: String) -> Self {
		let config = OpenAIConfig::new().with_api_key(api_key.into()).with_api_base(api_base);
		Self { client: Client::with_config(config), model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()) }
	}

	fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, Error> {
		messages
			.iter()
			.map(|m| -> Result<ChatCompletionRequestMessage, Error> {
				match m.role {
					Role::System => Ok(
						ChatCompletionRequestSystemMessageArgs::default()
							.content(m.content.clone())
							.build()
							.map_err(|e| Error::MalformedResponse(e.to_string()))?
							.into(),
					),
					Role::User => Ok(
						ChatCompletionRequestUserMessageArgs::default()
							.content(m.content.clone())
							.build()
							.map_err(|e| Error::MalformedResponse(e.to_string()))?
							.into(),
					),
					Role::Assistant => Ok(
						ChatCompletionRequestAssistantMessageArgs::default()
							.content(m.content.clone())
							.build()
							.map_err(|e| Error::MalformedResponse(e.to_string()))?
							.into(),
					),
				}
			})
			.collect()
	}
}

#[async_trait::async_trait]
impl crate::LlmProvider for OpenAiProvider {
	fn name(&self) -> &'static str {
		"openai"
	}

	fn default_model(&self) -> &str {
		DEFAULT_MODEL
	}

	async fn call_function(
		&self,
		messages: &[Message],
		function: &FunctionDef,
	) -> Result<serde_json::Value, Error> {
		let tool: ChatCompletionTool = ChatCompletionToolArgs::default()
			.r#type(ChatCompletionToolType::Function)
			.function(
				FunctionObjectArgs::default()
					.name(function.name.clone())
					.description(function.description.clone())
					.parameters(function.parameters.clone())
					.build()
					.map_err(|e| Error::MalformedResponse(e.to_string()))?,
			)
			.build()
			.map_err(|e| Error::MalformedResponse(e.to_string()))?;

		let request = CreateChatCompletionRequestArgs::default()
			.model(&self.model)
			.messages(Self::to_openai_messages(messages)?)
			.tools(vec![tool])
			.tool_choice(ChatCompletionToolChoiceOption::Named(
				async_openai::types::ChatCompletionNamedToolChoice {
					r#type: ChatCompletionToolType::Function,
					function: async_openai::types::FunctionName { name: function.name.clone() },
				},
			))
			.build()
			.map_err(|e| Error::MalformedResponse(e.to_string()))?;

		let response = self
			.client
			.chat()
			.create(request)
			.await
			.map_err(|e| Error::Unavailable(e.to_string()))?;

		let choice = response
			.choices
			.into_iter()
			.next()
			.ok_or_else(|| Error::MalformedResponse("no choices returned".into()))?;

		let tool_call = choice
			.message
			.tool_calls
			.and_then(|mut calls| if calls.is_empty() { None } else { Some(calls.remove(0)) })
			.ok_or_else(|| Error::MalformedResponse("no tool call in response".into()))?;

		if tool_call.function.name != function.name {
			return Err(Error::UnknownFunctionCalledBack(tool_call.function.name));
		}

		serde_json::from_str(&tool_call.function.arguments)
			.map_err(|e| Error::SchemaMismatch(e.to_string()))
	}

	async fn generate_completion(
		&self,
		messages: &[Message],
		temperature: Option<f64>,
		model: Option<&str>,
	) -> Result<Completion, Error> {
		let mut builder = CreateChatCompletionRequestArgs::default();
		builder
			.model(model.unwrap_or(&self.model))
			.messages(Self::to_openai_messages(messages)?);
		if let Some(t) = temperature {
			builder.temperature(t as f32);
		}
		let request = builder.build().map_err(|e| Error::MalformedResponse(e.to_string()))?;

		let response = self
			.client
			.chat()
			.create(request)
			.await
			.map_err(|e| Error::Unavailable(e.to_string()))?;

		let content = response
			.choices
			.into_iter()
			.next()
			.and_then(|c| c.message.content)
			.ok_or_else(|| Error::MalformedResponse("no content returned".into()))?;

		Ok(Completion { content })
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use wiremock::matchers::{method, path};
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

	fn tool_call_body(called_name: &str) -> serde_json::Value {
		json!({
			"id": "chatcmpl-1",
			"object": "chat.completion",
			"created": 1,
			"model": "gpt-4o-mini",
			"choices": [{
				"index": 0,
				"message": {
					"role": "assistant",
					"content": null,
					"tool_calls": [{
						"id": "call_1",
						"type": "function",
						"function": { "name": called_name, "arguments": "{\"url\":\"https://example.com\"}" }
					}]
				},
				"finish_reason": "tool_calls"
			}],
			"usage": { "prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2 }
		})
	}

	#[tokio::test]
	async fn call_function_extracts_the_tool_call_arguments() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(tool_call_body("pick_url")))
			.mount(&server)
			.await;

		let provider = OpenAiProvider::with_base("key", None, server.uri());
		let messages = [Message { role: Role::User, content: "hi".to_string() }];
		let args = provider.call_function(&messages, &function()).await.unwrap();
		assert_eq!(args["url"], "https://example.com");
	}

	#[tokio::test]
	async fn call_function_rejects_a_mismatched_tool_name() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/chat/completions"))
			.respond_with(ResponseTemplate::new(200).set_body_json(tool_call_body("other_fn")))
			.mount(&server)
			.await;

		let provider = OpenAiProvider::with_base("key", None, server.uri());
		let messages = [Message { role: Role::User, content: "hi".to_string() }];
		let err = provider.call_function(&messages, &function()).await.unwrap_err();
		assert!(matches!(err, Error::UnknownFunctionCalledBack(_)));
	}
}
