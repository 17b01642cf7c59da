use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::LlmProvider;
use crate::error::Error;
use crate::gemini::GeminiProvider;
use crate::openai::OpenAiProvider;
use crate::retry::{CallOptions, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
	Openai,
	Gemini,
}

impl ProviderKind {
	/// §6.3: "`sk-*` ⇒ OpenAI; `AIza*` ⇒ Google/Gemini; otherwise default to OpenAI."
	pub fn detect_from_key(key: &str) -> ProviderKind {
		if key.starts_with("AIza") {
			ProviderKind::Gemini
		} else {
			ProviderKind::Openai
		}
	}

	pub fn parse_env(value: &str) -> Option<ProviderKind> {
		match value.to_ascii_lowercase().as_str() {
			"openai" => Some(ProviderKind::Openai),
			"gemini" => Some(ProviderKind::Gemini),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
	pub api_key: Option<String>,
	pub model: Option<String>,
	pub timeout: Option<Duration>,
	pub max_retries: Option<u32>,
}

/// Process-wide provider handle cache (§5: "LLM provider handle: created at
/// most once per (provider, config) tuple; thread-safe use thereafter").
pub struct ProviderRegistry {
	configs: HashMap<ProviderKind, ProviderConfig>,
	handles: HashMap<ProviderKind, OnceLock<Arc<dyn LlmProvider>>>,
}

impl ProviderRegistry {
	pub fn new(configs: HashMap<ProviderKind, ProviderConfig>) -> Self {
		let handles = configs.keys().map(|k| (*k, OnceLock::new())).collect();
		Self { configs, handles }
	}

	/// §6.3 precedence: explicit per-call override > CLI/tool-parameter
	/// provider > environment `LLM_PROVIDER` > auto-detect from available keys.
	pub fn resolve(
		&self,
		explicit_override: Option<ProviderKind>,
		cli_provider: Option<ProviderKind>,
		env_llm_provider: Option<&str>,
	) -> Result<Arc<dyn LlmProvider>, Error> {
		let kind = explicit_override
			.or(cli_provider)
			.or_else(|| env_llm_provider.and_then(ProviderKind::parse_env))
			.or_else(|| self.auto_detect())
			.ok_or(Error::NoProviderConfigured)?;

		self.provider(kind)
	}

	fn auto_detect(&self) -> Option<ProviderKind> {
		self
			.configs
			.iter()
			.find_map(|(kind, cfg)| cfg.api_key.as_deref().map(|k| (*kind, ProviderKind::detect_from_key(k))))
			.map(|(configured, detected)| if self.configs.contains_key(&detected) { detected } else { configured })
	}

	pub fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn LlmProvider>, Error> {
		let cfg = self.configs.get(&kind).ok_or(Error::NoProviderConfigured)?;
		let api_key = cfg.api_key.clone().ok_or_else(|| Error::MissingApiKey(format!("{kind:?}")))?;
		let cell = self.handles.get(&kind).expect("handle reserved at construction");
		let handle = cell.get_or_init(|| -> Arc<dyn LlmProvider> {
			match kind {
				ProviderKind::Openai => Arc::new(OpenAiProvider::new(api_key, cfg.model.clone())),
				ProviderKind::Gemini => Arc::new(GeminiProvider::new(api_key, cfg.model.clone())),
			}
		});
		Ok(handle.clone())
	}

	pub fn call_options(&self, kind: ProviderKind) -> CallOptions {
		self
			.configs
			.get(&kind)
			.and_then(|c| c.timeout)
			.map(CallOptions::clamped)
			.unwrap_or_default()
	}

	pub fn retry_policy(&self, kind: ProviderKind) -> RetryPolicy {
		self
			.configs
			.get(&kind)
			.and_then(|c| c.max_retries)
			.map(|max_retries| RetryPolicy { max_retries })
			.unwrap_or_default()
	}

	/// Looks up the per-provider [`CallOptions`]/[`RetryPolicy`] for an
	/// already-resolved provider handle, by round-tripping its [`LlmProvider::name`]
	/// back through [`ProviderKind::parse_env`]. Lets call sites that only hold
	/// the resolved `Arc<dyn LlmProvider>` (not the `ProviderKind` that produced
	/// it) still apply this provider's configured deadline/retry policy (§5).
	pub fn policy_for(&self, provider: &dyn LlmProvider) -> (CallOptions, RetryPolicy) {
		match ProviderKind::parse_env(provider.name()) {
			Some(kind) => (self.call_options(kind), self.retry_policy(kind)),
			None => (CallOptions::default(), RetryPolicy::default()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn detects_provider_from_key_shape() {
		assert_eq!(ProviderKind::detect_from_key("sk-abc123"), ProviderKind::Openai);
		assert_eq!(ProviderKind::detect_from_key("AIzaSyAbc"), ProviderKind::Gemini);
		assert_eq!(ProviderKind::detect_from_key("something-else"), ProviderKind::Openai);
	}

	#[test]
	fn resolve_without_any_source_fails() {
		let registry = ProviderRegistry::new(HashMap::new());
		let result = registry.resolve(None, None, None);
		assert!(matches!(result, Err(Error::NoProviderConfigured)));
	}

	#[test]
	fn resolve_precedence_prefers_explicit_override() {
		let mut configs = HashMap::new();
		configs.insert(
			ProviderKind::Openai,
			ProviderConfig { api_key: Some("sk-test".into()), ..Default::default() },
		);
		configs.insert(
			ProviderKind::Gemini,
			ProviderConfig { api_key: Some("AIzaTest".into()), ..Default::default() },
		);
		let registry = ProviderRegistry::new(configs);
		let provider = registry.resolve(Some(ProviderKind::Gemini), None, Some("openai")).unwrap();
		assert_eq!(provider.name(), "gemini");
	}
}
