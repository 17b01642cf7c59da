//! Configuration surface (§6.4): a layered loader following the teacher's
//! `RawConfig`/precedence pattern — file < environment < CLI flags < explicit
//! per-call arguments, each layer only overriding what it actually sets.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use harvest_analysis::Error as AnalysisError;
use harvest_llm::{ProviderConfig, ProviderKind, ProviderRegistry};
use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLlmProviderConfig {
	pub api_key: Option<String>,
	pub model: Option<String>,
	pub timeout: Option<u64>,
	pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLlmProviders {
	pub openai: RawLlmProviderConfig,
	pub gemini: RawLlmProviderConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLlmConfig {
	pub provider: Option<String>,
	pub model: Option<String>,
	pub providers: RawLlmProviders,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSessionConfig {
	pub max_sessions: Option<usize>,
	pub timeout_minutes: Option<i64>,
	pub cleanup_interval_minutes: Option<i64>,
	pub completed_session_cache_ttl_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPathsConfig {
	pub shared_dir: Option<String>,
	pub output_dir: Option<String>,
	pub temp_dir: Option<String>,
	pub cookies_dir: Option<String>,
	pub screenshots_dir: Option<String>,
	pub har_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLoggingConfig {
	pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMemoryConfig {
	pub monitoring_enabled: Option<bool>,
	pub max_heap_size_mb: Option<u64>,
	pub warning_threshold_mb: Option<u64>,
	pub snapshot_interval_ms: Option<u64>,
}

/// The deserializable shape of an optional TOML/YAML config file (§6.4).
/// Every field is optional: a missing file, or a file missing a section,
/// falls through to the environment and then to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct RawConfig {
	pub llm: RawLlmConfig,
	pub session: RawSessionConfig,
	pub paths: RawPathsConfig,
	pub logging: RawLoggingConfig,
	pub memory: RawMemoryConfig,
}

/// Command-line overrides that sit above environment variables in precedence
/// (§6.4). Distinct from `clap`'s `Args` struct so config construction does
/// not need to depend on `clap` directly.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub llm_provider: Option<String>,
	pub llm_api_key: Option<String>,
	pub llm_model: Option<String>,
	pub output_dir: Option<String>,
	pub logging_level: Option<String>,
}

/// The fully resolved, immutable configuration snapshot (§6.4, §5:
/// "Configuration: immutable after `initialize()`").
#[derive(Debug, Clone)]
pub struct Config {
	pub llm_provider_override: Option<ProviderKind>,
	pub provider_configs: HashMap<ProviderKind, ProviderConfig>,
	pub max_sessions: usize,
	pub timeout_minutes: i64,
	pub cleanup_interval_minutes: i64,
	pub completed_session_cache_ttl_minutes: i64,
	pub shared_dir: Option<String>,
	pub output_dir: Option<String>,
	pub cookies_dir: Option<String>,
	pub har_dir: Option<String>,
	pub logging_level: String,
	pub memory_monitoring_enabled: bool,
	pub memory_warning_threshold_mb: u64,
	pub memory_snapshot_interval_ms: u64,
}

impl Config {
	pub fn provider_registry(&self) -> ProviderRegistry {
		ProviderRegistry::new(self.provider_configs.clone())
	}
}

static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

/// Reads `HARVEST_<ENV>` if set and parses it, surfacing a malformed value as
/// `InvalidConfig` rather than silently ignoring it.
fn env_var<T: FromStr>(name: &str) -> Result<Option<T>> {
	match env::var(format!("HARVEST_{name}")) {
		Ok(val) => {
			val.parse().map(Some).map_err(|_| Error::InvalidConfig(format!("HARVEST_{name}={val} is invalid")))
		}
		Err(_) => Ok(None),
	}
}

fn clamp(value: u64, min: u64, max: u64) -> u64 {
	value.clamp(min, max)
}

fn clamp_i64(value: i64, min: i64, max: i64) -> i64 {
	value.clamp(min, max)
}

/// Builds the resolved `Config` from a parsed file, the process environment,
/// and CLI overrides, applying §6.4's precedence at every field.
pub fn build_config(raw: RawConfig, cli: &CliOverrides) -> Result<Config> {
	let llm_provider_override = cli
		.llm_provider
		.as_deref()
		.or(raw.llm.provider.as_deref())
		.and_then(ProviderKind::parse_env);

	let mut provider_configs = HashMap::new();

	let openai_key = cli
		.llm_api_key
		.clone()
		.filter(|_| matches!(llm_provider_override, Some(ProviderKind::Openai) | None))
		.or_else(|| env_var::<String>("LLM_PROVIDERS_OPENAI_API_KEY").ok().flatten())
		.or(raw.llm.providers.openai.api_key.clone());
	if openai_key.is_some()
		|| raw.llm.providers.openai.model.is_some()
		|| env_var::<String>("LLM_PROVIDERS_OPENAI_MODEL")?.is_some()
	{
		provider_configs.insert(
			ProviderKind::Openai,
			ProviderConfig {
				api_key: openai_key,
				model: cli
					.llm_model
					.clone()
					.or(env_var::<String>("LLM_PROVIDERS_OPENAI_MODEL")?)
					.or(raw.llm.providers.openai.model.clone())
					.or(raw.llm.model.clone()),
				timeout: env_var::<u64>("LLM_PROVIDERS_OPENAI_TIMEOUT_MS")?
					.or(raw.llm.providers.openai.timeout)
					.map(|ms| Duration::from_millis(ms.clamp(1_000, 300_000))),
				max_retries: env_var::<u32>("LLM_PROVIDERS_OPENAI_MAX_RETRIES")?
					.or(raw.llm.providers.openai.max_retries)
					.map(|r| r.clamp(0, 10)),
			},
		);
	}

	let gemini_key = cli
		.llm_api_key
		.clone()
		.filter(|_| matches!(llm_provider_override, Some(ProviderKind::Gemini)))
		.or_else(|| env_var::<String>("LLM_PROVIDERS_GEMINI_API_KEY").ok().flatten())
		.or(raw.llm.providers.gemini.api_key.clone());
	if gemini_key.is_some() {
		provider_configs.insert(
			ProviderKind::Gemini,
			ProviderConfig {
				api_key: gemini_key,
				model: env_var::<String>("LLM_PROVIDERS_GEMINI_MODEL")?
					.or(raw.llm.providers.gemini.model.clone())
					.or(raw.llm.model.clone()),
				timeout: env_var::<u64>("LLM_PROVIDERS_GEMINI_TIMEOUT_MS")?
					.or(raw.llm.providers.gemini.timeout)
					.map(|ms| Duration::from_millis(ms.clamp(1_000, 300_000))),
				max_retries: env_var::<u32>("LLM_PROVIDERS_GEMINI_MAX_RETRIES")?
					.or(raw.llm.providers.gemini.max_retries)
					.map(|r| r.clamp(0, 10)),
			},
		);
	}

	let max_sessions = env_var::<usize>("SESSION_MAX_SESSIONS")?
		.or(raw.session.max_sessions)
		.unwrap_or(100)
		.clamp(1, 1_000);
	let timeout_minutes =
		clamp_i64(env_var::<i64>("SESSION_TIMEOUT_MINUTES")?.or(raw.session.timeout_minutes).unwrap_or(30), 1, 1_440);
	let cleanup_interval_minutes = clamp_i64(
		env_var::<i64>("SESSION_CLEANUP_INTERVAL_MINUTES")?.or(raw.session.cleanup_interval_minutes).unwrap_or(5),
		1,
		60,
	);
	let completed_session_cache_ttl_minutes = clamp_i64(
		env_var::<i64>("SESSION_COMPLETED_SESSION_CACHE_TTL_MINUTES")?
			.or(raw.session.completed_session_cache_ttl_minutes)
			.unwrap_or(60),
		1,
		1_440,
	);

	let logging_level = cli
		.logging_level
		.clone()
		.or(env_var::<String>("LOGGING_LEVEL")?)
		.or(raw.logging.level.clone())
		.unwrap_or_else(|| "info".to_string());

	let output_dir = cli.output_dir.clone().or(env_var::<String>("PATHS_OUTPUT_DIR")?).or(raw.paths.output_dir);

	Ok(Config {
		llm_provider_override,
		provider_configs,
		max_sessions,
		timeout_minutes,
		cleanup_interval_minutes,
		completed_session_cache_ttl_minutes,
		shared_dir: env_var::<String>("PATHS_SHARED_DIR")?.or(raw.paths.shared_dir),
		output_dir,
		cookies_dir: env_var::<String>("PATHS_COOKIES_DIR")?.or(raw.paths.cookies_dir),
		har_dir: env_var::<String>("PATHS_HAR_DIR")?.or(raw.paths.har_dir),
		logging_level,
		memory_monitoring_enabled: env_var::<bool>("MEMORY_MONITORING_ENABLED")?
			.or(raw.memory.monitoring_enabled)
			.unwrap_or(true),
		memory_warning_threshold_mb: clamp(
			env_var::<u64>("MEMORY_WARNING_THRESHOLD_MB")?.or(raw.memory.warning_threshold_mb).unwrap_or(256),
			64,
			4_096,
		),
		memory_snapshot_interval_ms: clamp(
			env_var::<u64>("MEMORY_SNAPSHOT_INTERVAL_MS")?.or(raw.memory.snapshot_interval_ms).unwrap_or(30_000),
			5_000,
			300_000,
		),
	})
}

/// Reads an optional config file (YAML or TOML-as-YAML-superset is not
/// attempted here; only YAML is parsed, matching `serde_yaml`'s presence in
/// the workspace dependency set), merges it with the environment and CLI
/// overrides, and installs the immutable global snapshot. A second call
/// fails with `AlreadyInitialized` (§5).
pub fn initialize(config_path: Option<&std::path::Path>, cli: &CliOverrides) -> Result<Arc<Config>> {
	if CONFIG.get().is_some() {
		return Err(AnalysisError::AlreadyInitialized.into());
	}
	let raw = match config_path {
		Some(path) => {
			let text = std::fs::read_to_string(path)?;
			serde_yaml::from_str(&text).map_err(|e| Error::InvalidConfig(e.to_string()))?
		}
		None => RawConfig::default(),
	};
	let config = Arc::new(build_config(raw, cli)?);
	CONFIG.set(config.clone()).map_err(|_| AnalysisError::AlreadyInitialized)?;
	Ok(config)
}

pub fn current() -> Option<Arc<Config>> {
	CONFIG.get().cloned()
}
