//! The LLM Provider Interface (§6.3): a request/response contract the analysis
//! core consumes. No callbacks, no coroutines — a plain blocking call inside a
//! session that other sessions preempt (§9 design note).

mod error;
mod gemini;
mod openai;
mod provider;
mod registry;
mod retry;

pub use error::Error;
pub use gemini::GeminiProvider;
pub use openai::OpenAiProvider;
pub use provider::{Completion, FunctionDef, Message, Role};
pub use registry::{ProviderConfig, ProviderKind, ProviderRegistry};
pub use retry::{CallOptions, RetryPolicy, call_with_policy};

/// The contract every concrete provider implements (§6.3).
///
/// `call_function` drives the dynamic-parts classifier, the input-variables
/// binder, the provenance finder's tie-break, and the workflow identifier.
/// `generate_completion` is reserved for free-form generation callers that
/// don't need structured arguments back.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
	fn name(&self) -> &'static str;
	fn default_model(&self) -> &str;

	async fn call_function(
		&self,
		messages: &[Message],
		function: &FunctionDef,
	) -> Result<serde_json::Value, Error>;

	async fn generate_completion(
		&self,
		messages: &[Message],
		temperature: Option<f64>,
		model: Option<&str>,
	) -> Result<Completion, Error>;
}
