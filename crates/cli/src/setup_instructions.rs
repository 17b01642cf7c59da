//! The setup-instruction library (§7: "a short list of next-step
//! recommendations drawn from the setup-instruction library for
//! configuration errors").

/// Human remediation steps for an error code, or an empty slice if the code
/// isn't a configuration error this library covers.
pub fn recommendations_for(code: &str) -> &'static [&'static str] {
	match code {
		"NoProviderConfigured" => &[
			"set HARVEST_LLM_PROVIDERS_OPENAI_API_KEY (or the gemini equivalent)",
			"pass --llm-api-key on the command line",
			"set llm.providers.openai.apiKey in the config file",
		],
		"MissingApiKey" => &[
			"the selected provider has no API key configured",
			"set HARVEST_LLM_PROVIDERS_OPENAI_API_KEY or HARVEST_LLM_PROVIDERS_GEMINI_API_KEY",
			"or pass --llm-provider together with --llm-api-key",
		],
		"LlmTimeout" => &[
			"the configured llm.providers.*.timeout may be too low for this prompt",
			"retry, or raise HARVEST_LLM_PROVIDERS_OPENAI_TIMEOUT_MS (1000-300000)",
		],
		"OutputPathUnsafe" => &[
			"the configured paths.outputDir was rejected (traversal or unwritable)",
			"generated code was written to the fallback .harvest/output directory instead",
		],
		_ => &[],
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_codes_have_recommendations() {
		assert!(!recommendations_for("NoProviderConfigured").is_empty());
		assert!(!recommendations_for("MissingApiKey").is_empty());
	}

	#[test]
	fn unknown_codes_return_empty() {
		assert!(recommendations_for("CycleDetected").is_empty());
	}
}
