//! The CLI surface (§6.6): session start, session status, session list,
//! process next, is complete, get unresolved, get completion blockers,
//! generate code, delete session, list all requests.
//!
//! Each command is a thin wrapper: load the session snapshot (if any),
//! reconstruct an in-memory `Session`, drive one operation, persist the
//! snapshot back. The `Session`/`SessionManager` themselves stay exactly as
//! the analysis core defines them; this module adds no analysis logic.

use std::sync::Arc;

use harvest_analysis::har::FilterOptions;
use harvest_analysis::{Session, SessionManagerConfig};
use harvest_llm::{CallOptions, LlmProvider, RetryPolicy};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store;

/// Resolves the provider for this invocation, plus the deadline/retry policy
/// (§5) its `ProviderConfig` carries — every session-bearing command applies
/// this to its LLM calls via `Session::set_call_policy`.
fn resolve_provider(config: &Config) -> Result<(Arc<dyn LlmProvider>, CallOptions, RetryPolicy)> {
	let registry = config.provider_registry();
	let env_provider = std::env::var("HARVEST_LLM_PROVIDER").ok();
	let provider = registry
		.resolve(None, config.llm_provider_override, env_provider.as_deref())
		.map_err(|e| Into::<Error>::into(harvest_analysis::Error::from(e)))?;
	let (call_options, retry_policy) = registry.policy_for(provider.as_ref());
	Ok((provider, call_options, retry_policy))
}

fn load_session(config: &Config, id: Uuid) -> Result<Session> {
	let snapshot = store::load(config.shared_dir.as_deref(), id)?;
	let (provider, call_options, retry_policy) = resolve_provider(config)?;
	let mut session = Session::from_snapshot(snapshot, provider)?;
	session.set_call_policy(call_options, retry_policy);
	Ok(session)
}

fn save_session(config: &Config, session: &Session) -> Result<()> {
	store::save(config.shared_dir.as_deref(), &session.to_snapshot())
}

/// Applies §4.9's idle-timeout/TTL eviction rules over the on-disk session
/// store, then returns the surviving count. `SessionManager` implements
/// these same rules against an in-memory registry; a CLI invocation is a
/// fresh process with no registry to hold, so this runs them directly
/// against `store::list`/`store::load` instead.
fn sweep_and_count_sessions(config: &Config, provider: &Arc<dyn LlmProvider>) -> Result<usize> {
	let manager_config = default_session_manager_config(config);
	let ids = store::list(config.shared_dir.as_deref())?;

	for id in ids {
		let Ok(snapshot) = store::load(config.shared_dir.as_deref(), id) else { continue };

		if manager_config.is_ttl_expired(&snapshot) {
			store::delete(config.shared_dir.as_deref(), id)?;
			continue;
		}
		if manager_config.is_idle_timed_out(&snapshot) {
			let mut session = Session::from_snapshot(snapshot, provider.clone())?;
			session.cancel()?;
			save_session(config, &session)?;
		}
	}

	Ok(store::list(config.shared_dir.as_deref())?.len())
}

pub fn session_start(
	config: &Config,
	prompt: &str,
	har_path: &std::path::Path,
	cookie_path: Option<&std::path::Path>,
	input_variables: IndexMap<String, String>,
) -> Result<serde_json::Value> {
	let har_bytes = std::fs::read(har_path)?;
	let cookie_bytes = cookie_path.map(std::fs::read).transpose()?;

	let (provider, call_options, retry_policy) = resolve_provider(config)?;

	let live_sessions = sweep_and_count_sessions(config, &provider)?;
	if live_sessions >= config.max_sessions {
		return Err(harvest_analysis::Error::SessionAtCapacity(config.max_sessions).into());
	}

	let mut session = Session::new(Uuid::new_v4(), prompt, provider);
	session.set_call_policy(call_options, retry_policy);
	session.start_session(&har_bytes, cookie_bytes.as_deref(), &FilterOptions::default(), input_variables)?;
	save_session(config, &session)?;

	Ok(serde_json::json!({
		"sessionId": session.id,
		"state": session.state,
		"validation": session.validation,
	}))
}

pub async fn identify_workflow(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let mut session = load_session(config, id)?;
	session.identify_workflow().await?;
	save_session(config, &session)?;
	Ok(serde_json::json!({ "sessionId": session.id, "state": session.state }))
}

pub fn session_status(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let session = load_session(config, id)?;
	let progress = session.progress();
	Ok(serde_json::json!({
		"sessionId": session.id,
		"prompt": session.prompt,
		"progress": progress,
		"masterUrl": session.master_url,
		"error": session.error,
		"logs": session.logs.entries().collect::<Vec<_>>(),
	}))
}

pub fn session_list(config: &Config) -> Result<serde_json::Value> {
	let ids = store::list(config.shared_dir.as_deref())?;
	Ok(serde_json::json!({ "sessions": ids }))
}

pub async fn process_next(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let mut session = load_session(config, id)?;
	session.process_next_node().await?;
	save_session(config, &session)?;
	Ok(serde_json::json!({
		"sessionId": session.id,
		"state": session.state,
		"progress": session.progress(),
	}))
}

pub fn is_complete(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let session = load_session(config, id)?;
	Ok(serde_json::json!({ "sessionId": session.id, "complete": session.dag.is_complete() }))
}

pub fn get_unresolved(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let session = load_session(config, id)?;
	Ok(serde_json::json!({ "sessionId": session.id, "unresolved": session.dag.unresolved_nodes() }))
}

pub fn get_completion_blockers(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let session = load_session(config, id)?;
	Ok(serde_json::to_value(session.completion_report())?)
}

pub fn generate_code(config: &Config, id: Uuid, generated_date: &str) -> Result<serde_json::Value> {
	let mut session = load_session(config, id)?;
	let source = session.generate_code(generated_date)?.to_string();
	save_session(config, &session)?;

	let out_dir = harvest_util::paths::resolve_output_dir(config.output_dir.as_deref());
	let out_path = out_dir.join(format!("{}.js", session.id));
	std::fs::write(&out_path, &source)?;

	Ok(serde_json::json!({
		"sessionId": session.id,
		"state": session.state,
		"outputPath": out_path.to_string_lossy(),
	}))
}

pub fn delete_session(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	store::delete(config.shared_dir.as_deref(), id)?;
	Ok(serde_json::json!({ "sessionId": id, "deleted": true }))
}

pub fn list_all_requests(config: &Config, id: Uuid) -> Result<serde_json::Value> {
	let session = load_session(config, id)?;
	Ok(serde_json::json!({ "sessionId": session.id, "requests": session.filtered_requests }))
}

pub fn default_session_manager_config(config: &Config) -> SessionManagerConfig {
	SessionManagerConfig {
		max_sessions: config.max_sessions,
		timeout_minutes: config.timeout_minutes,
		completed_session_cache_ttl_minutes: config.completed_session_cache_ttl_minutes,
	}
}
