/// LLM-side error taxonomy (§7): `LlmUnavailable`, `LlmTimeout`,
/// `LlmMalformedResponse`, `NoProviderConfigured`, `MissingApiKey`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("llm provider unavailable: {0}")]
	Unavailable(String),

	#[error("llm call timed out after {0:?}")]
	Timeout(std::time::Duration),

	#[error("llm returned a malformed response envelope: {0}")]
	MalformedResponse(String),

	#[error("llm function-call arguments did not match the expected schema: {0}")]
	SchemaMismatch(String),

	#[error("no llm provider configured (set an api key or LLM_PROVIDER)")]
	NoProviderConfigured,

	#[error("missing api key for provider {0}")]
	MissingApiKey(String),

	#[error("provider called back an unknown function: {0}")]
	UnknownFunctionCalledBack(String),
}

impl Error {
	/// §5: "Retry only on transport-level errors and malformed responses; do
	/// not retry on 'missing API key,' 'unknown function called back,' or
	/// parse errors of the returned arguments."
	pub fn is_retryable(&self) -> bool {
		matches!(self, Error::Unavailable(_) | Error::MalformedResponse(_))
	}
}
