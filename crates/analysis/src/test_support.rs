//! Test-only stub LLM provider shared by classifier/binder/provenance/workflow tests.

use harvest_llm::{Completion, Error, FunctionDef, LlmProvider, Message};

pub enum StubBehavior {
	FunctionResult(serde_json::Value),
	FunctionError(fn() -> Error),
	Unreachable,
}

pub struct StubProvider {
	behavior: StubBehavior,
}

impl StubProvider {
	pub fn function_result(value: serde_json::Value) -> Self {
		Self { behavior: StubBehavior::FunctionResult(value) }
	}

	pub fn function_error(make: fn() -> Error) -> Self {
		Self { behavior: StubBehavior::FunctionError(make) }
	}

	pub fn unreachable() -> Self {
		Self { behavior: StubBehavior::Unreachable }
	}
}

#[async_trait::async_trait]
impl LlmProvider for StubProvider {
	fn name(&self) -> &'static str {
		"stub"
	}

	fn default_model(&self) -> &str {
		"stub-model"
	}

	async fn call_function(
		&self,
		_messages: &[Message],
		_function: &FunctionDef,
	) -> Result<serde_json::Value, Error> {
		match &self.behavior {
			StubBehavior::FunctionResult(v) => Ok(v.clone()),
			StubBehavior::FunctionError(make) => Err(make()),
			StubBehavior::Unreachable => panic!("stub provider was not expected to be called"),
		}
	}

	async fn generate_completion(
		&self,
		_messages: &[Message],
		_temperature: Option<f64>,
		_model: Option<&str>,
	) -> Result<Completion, Error> {
		panic!("generate_completion not used by the analysis core")
	}
}
