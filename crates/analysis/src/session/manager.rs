//! Session (§3, §4.8) and Session Manager (§4.9).

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use uuid::Uuid;

use harvest_llm::{CallOptions, LlmProvider, RetryPolicy};
use harvest_util::{LogLevel, RingLog};

use crate::completion::{self, CompletionReport};
use crate::cookies::CookieJar;
use crate::curl::render_curl;
use crate::dag::{DagManager, NodeId, NodeKind, NodePatch, NodePayload};
use crate::emitter;
use crate::error::{Error, Result};
use crate::har::{self, FilterOptions};
use crate::request::Request;
use crate::{binder, classifier, provenance, workflow};

use super::fsm::{self, EventKind, SessionState};

/// Reserved for future clustering of related requests (§9 open question);
/// no component in this pipeline populates it yet.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct WorkflowGroup {
	pub name: String,
	pub node_ids: Vec<NodeId>,
}

pub struct Session {
	pub id: Uuid,
	pub prompt: String,
	pub state: SessionState,
	pub cookies: CookieJar,
	pub dag: DagManager,
	pub queue: VecDeque<NodeId>,
	pub input_variables: IndexMap<String, String>,
	pub workflow_groups: Vec<WorkflowGroup>,
	pub logs: RingLog,
	pub generated_source: Option<String>,
	pub master_url: Option<String>,
	pub validation: Option<har::ValidationReport>,
	pub filtered_requests: Vec<Request>,
	pub created_at: DateTime<Utc>,
	pub last_activity_at: DateTime<Utc>,
	pub error: Option<String>,
	provider: Arc<dyn LlmProvider>,
	call_options: CallOptions,
	retry_policy: RetryPolicy,
}

/// Progress/diagnostics accessor (§3: the session "exposes progress/diagnostics").
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionProgress {
	pub state: SessionState,
	pub queue_depth: usize,
	pub processed_node_count: usize,
	pub total_node_count: usize,
}

impl Session {
	pub fn new(id: Uuid, prompt: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
		let now = Utc::now();
		Self {
			id,
			prompt: prompt.into(),
			state: SessionState::Initializing,
			cookies: CookieJar::new(),
			dag: DagManager::new(),
			queue: VecDeque::new(),
			input_variables: IndexMap::new(),
			workflow_groups: Vec::new(),
			logs: RingLog::new(),
			generated_source: None,
			master_url: None,
			validation: None,
			filtered_requests: Vec::new(),
			created_at: now,
			last_activity_at: now,
			error: None,
			provider,
			call_options: CallOptions::default(),
			retry_policy: RetryPolicy::default(),
		}
	}

	/// Overrides the deadline/retry policy applied to every LLM call this
	/// session makes (§5) — normally the resolved provider's own configured
	/// policy, rather than the defaults `new` starts with.
	pub fn set_call_policy(&mut self, call_options: CallOptions, retry_policy: RetryPolicy) {
		self.call_options = call_options;
		self.retry_policy = retry_policy;
	}

	fn touch(&mut self) {
		self.last_activity_at = Utc::now();
	}

	fn transition(&mut self, event: EventKind, queue_empty_and_complete: bool) -> Result<()> {
		match fsm::next_state(self.state, event, queue_empty_and_complete) {
			Some(next) => {
				self.logs.info(format!("{:?} -> {:?}", self.state, next));
				self.state = next;
				Ok(())
			}
			None => Err(Error::PermissionDenied(format!("illegal event {event:?} in state {:?}", self.state))),
		}
	}

	pub fn progress(&self) -> SessionProgress {
		let processed = self.dag.get_all_nodes().filter(|n| n.dynamic_parts.is_empty()).count();
		SessionProgress {
			state: self.state,
			queue_depth: self.queue.len(),
			processed_node_count: processed,
			total_node_count: self.dag.get_all_nodes().count(),
		}
	}

	/// `START_SESSION`: parses the HAR (and optional cookie bundle), then
	/// automatically advances to `awaitingWorkflowSelection` on success (§4.8).
	pub fn start_session(
		&mut self,
		har_bytes: &[u8],
		cookie_bytes: Option<&[u8]>,
		filter_options: &FilterOptions,
		input_variables: IndexMap<String, String>,
	) -> Result<()> {
		self.transition(EventKind::StartSession, false)?;

		let parsed = har::parse(har_bytes, filter_options)?;
		if let Some(cookie_bytes) = cookie_bytes {
			self.cookies = CookieJar::parse(cookie_bytes).map_err(|e| Error::InvalidHarFormat(e.to_string()))?;
		}
		self.filtered_requests = parsed.requests;
		self.validation = Some(parsed.validation);
		self.input_variables = input_variables;
		self.touch();

		self.state = fsm::complete_parsing(self.state)
			.ok_or_else(|| Error::PermissionDenied("parse completed outside parsingHar".to_string()))?;
		self.logs.info("har parsed, awaiting workflow selection");
		Ok(())
	}

	/// `IDENTIFY_WORKFLOW`: selects the master URL and seeds the DAG and
	/// process queue with its `master_curl` node (§4.7, §4.8).
	pub async fn identify_workflow(&mut self) -> Result<()> {
		let summaries = crate::har::filter::order_urls(&self.filtered_requests);
		let master_url = workflow::identify_master_url(
			self.provider.as_ref(),
			self.call_options,
			self.retry_policy,
			&self.prompt,
			&summaries,
		)
		.await?;
		self.master_url = Some(master_url.clone());

		let request = self
			.filtered_requests
			.iter()
			.find(|r| r.url == master_url)
			.cloned()
			.ok_or(Error::NoCandidates)?;

		let node_id = self.dag.add_node(
			NodeKind::MasterCurl,
			NodePayload::Request(request),
			IndexSet::new(),
			IndexSet::new(),
			IndexMap::new(),
		);
		self.queue.push_back(node_id);
		self.transition(EventKind::IdentifyWorkflow, false)?;
		self.touch();
		Ok(())
	}

	pub fn add_input_variable(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
		self.input_variables.insert(name.into(), value.into());
		if self.state == SessionState::ProcessingDependencies {
			self.transition(EventKind::AddInputVariable, false)?;
		}
		self.touch();
		Ok(())
	}

	/// `PROCESS_NEXT_NODE` (§4.8 steps 1-8): the core dependency-resolution loop.
	pub async fn process_next_node(&mut self) -> Result<()> {
		let Some(node_id) = self.queue.pop_front() else {
			self.transition(EventKind::ProcessNextNode, self.dag.is_complete())?;
			self.touch();
			return Ok(());
		};

		let node = self.dag.get_node(&node_id).cloned_request().ok_or_else(|| {
			Error::PermissionDenied(format!("queued node {node_id} missing from dag"))
		})?;

		if node.is_script_asset() {
			self.dag.update_node(&node_id, NodePatch { dynamic_parts: Some(IndexSet::new()), ..Default::default() });
			self.transition(EventKind::ProcessNextNode, self.queue.is_empty() && self.dag.is_complete())?;
			self.touch();
			return Ok(());
		}

		let curl_text = render_curl(&node);
		let dynamic_parts = classifier::classify(
			self.provider.as_ref(),
			self.call_options,
			self.retry_policy,
			&curl_text,
			&node.url,
			&self.input_variables,
		)
		.await?;

		let bind_result = binder::bind(
			self.provider.as_ref(),
			self.call_options,
			self.retry_policy,
			&curl_text,
			&self.input_variables,
			dynamic_parts,
		)
		.await?;
		if !bind_result.bound.is_empty() {
			self.dag.update_node(
				&node_id,
				NodePatch { input_variables: Some(bind_result.bound.clone()), ..Default::default() },
			);
		}

		let remaining: Vec<String> = bind_result.remaining.into_iter().collect();
		self.dag.update_node(
			&node_id,
			NodePatch { dynamic_parts: Some(remaining.iter().cloned().collect()), ..Default::default() },
		);

		if !remaining.is_empty() {
			let found = provenance::find_provenance(
				self.provider.as_ref(),
				self.call_options,
				self.retry_policy,
				&remaining,
				&self.filtered_requests,
				&self.cookies,
			)
			.await?;

			for dep in found.cookie_dependencies {
				let cookie_node = match self.dag.find_cookie_node(&dep.cookie_name) {
					Some(existing) => existing.id.clone(),
					None => self.dag.add_node(
						NodeKind::Cookie,
						NodePayload::Cookie { key: dep.cookie_name.clone(), value: dep.cookie_value.clone() },
						[dep.part.clone()].into_iter().collect(),
						IndexSet::new(),
						IndexMap::new(),
					),
				};
				self.dag.add_edge(&cookie_node, &node_id, dep.part)?;
			}

			for dep in found.request_dependencies {
				let source = &self.filtered_requests[dep.request_index];
				let producer_id = match self.dag.find_curl_node_by_url(&source.method, &source.url) {
					Some(existing) => existing.id.clone(),
					None => {
						let id = self.dag.add_node(
							NodeKind::Curl,
							NodePayload::Request(source.clone()),
							[dep.part.clone()].into_iter().collect(),
							IndexSet::new(),
							IndexMap::new(),
						);
						self.queue.push_back(id.clone());
						id
					}
				};
				self.dag.add_edge(&producer_id, &node_id, dep.part)?;
			}

			for token in found.not_found_parts {
				let id = self.dag.add_node(
					NodeKind::NotFound,
					NodePayload::NotFound { token: token.clone() },
					IndexSet::new(),
					IndexSet::new(),
					IndexMap::new(),
				);
				self.dag.add_edge(&id, &node_id, token)?;
				self.logs.warn(format!("dependency not found: {}", id));
			}
		}

		// §4.8 step 8: once edges exist for every remaining part, the node is resolved.
		self.dag.update_node(&node_id, NodePatch { dynamic_parts: Some(IndexSet::new()), ..Default::default() });

		self.transition(EventKind::ProcessNextNode, self.queue.is_empty() && self.dag.is_complete())?;
		self.touch();
		Ok(())
	}

	/// `FORCE_COMPLETE` (debug): skips straight to `readyForCodeGen`.
	pub fn force_complete(&mut self) -> Result<()> {
		self.transition(EventKind::ForceComplete, true)?;
		self.touch();
		Ok(())
	}

	pub fn completion_report(&self) -> CompletionReport {
		completion::analyze(&self.dag, self.master_url.as_deref())
	}

	/// `GENERATE_CODE`: fails with `AnalysisIncomplete` if the DAG isn't ready (§4.11).
	pub fn generate_code(&mut self, generated_header_date: &str) -> Result<&str> {
		if !self.dag.is_complete() {
			return Err(Error::AnalysisIncomplete(Box::new(self.completion_report())));
		}
		let source = emitter::emit(&self.dag, &self.prompt, self.id, generated_header_date)?;
		self.transition(EventKind::GenerateCode, false)?;
		self.generated_source = Some(source);
		self.touch();
		Ok(self.generated_source.as_deref().expect("just set"))
	}

	pub fn cancel(&mut self) -> Result<()> {
		self.transition(EventKind::Cancel, false)?;
		self.touch();
		Ok(())
	}

	pub fn fail(&mut self, error: &Error) {
		self.error = Some(error.to_string());
		self.logs.warn(format!("session failed: {error}"));
		let _ = self.transition(EventKind::Fail, false);
		self.touch();
	}

	/// Everything about this session except its LLM provider handle, which a
	/// CLI process re-resolves from configuration on load (§6.3 precedence).
	/// A CLI invocation is a fresh process per command; this is how `session
	/// status`/`process next`/etc. see state written by a prior invocation.
	pub fn to_snapshot(&self) -> SessionSnapshot {
		SessionSnapshot {
			id: self.id,
			prompt: self.prompt.clone(),
			state: self.state,
			cookies: self.cookies.clone(),
			dag: self.dag.to_json().expect("dag serializes"),
			queue: self.queue.iter().cloned().collect(),
			input_variables: self.input_variables.clone(),
			workflow_groups: self.workflow_groups.clone(),
			logs: self.logs.clone(),
			generated_source: self.generated_source.clone(),
			master_url: self.master_url.clone(),
			validation: self.validation.clone(),
			filtered_requests: self.filtered_requests.clone(),
			created_at: self.created_at,
			last_activity_at: self.last_activity_at,
			error: self.error.clone(),
		}
	}

	pub fn from_snapshot(snapshot: SessionSnapshot, provider: Arc<dyn LlmProvider>) -> Result<Self> {
		Ok(Self {
			id: snapshot.id,
			prompt: snapshot.prompt,
			state: snapshot.state,
			cookies: snapshot.cookies,
			dag: DagManager::from_json(&snapshot.dag).map_err(|e| Error::InvalidHarFormat(e.to_string()))?,
			queue: snapshot.queue.into_iter().collect(),
			input_variables: snapshot.input_variables,
			workflow_groups: snapshot.workflow_groups,
			logs: snapshot.logs,
			generated_source: snapshot.generated_source,
			master_url: snapshot.master_url,
			validation: snapshot.validation,
			filtered_requests: snapshot.filtered_requests,
			created_at: snapshot.created_at,
			last_activity_at: snapshot.last_activity_at,
			error: snapshot.error,
			provider,
			call_options: CallOptions::default(),
			retry_policy: RetryPolicy::default(),
		})
	}
}

/// The serializable projection of a [`Session`] (§3), persisted by a CLI
/// process between commands that each run in their own process.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionSnapshot {
	pub id: Uuid,
	pub prompt: String,
	pub state: SessionState,
	pub cookies: CookieJar,
	pub dag: String,
	pub queue: Vec<NodeId>,
	pub input_variables: IndexMap<String, String>,
	pub workflow_groups: Vec<WorkflowGroup>,
	pub logs: RingLog,
	pub generated_source: Option<String>,
	pub master_url: Option<String>,
	pub validation: Option<har::ValidationReport>,
	pub filtered_requests: Vec<Request>,
	pub created_at: DateTime<Utc>,
	pub last_activity_at: DateTime<Utc>,
	pub error: Option<String>,
}

trait NodeRequestExt {
	fn cloned_request(&self) -> Option<Request>;
}

impl NodeRequestExt for Option<&crate::dag::Node> {
	fn cloned_request(&self) -> Option<Request> {
		self.and_then(|n| match &n.payload {
			NodePayload::Request(req) => Some(req.clone()),
			_ => None,
		})
	}
}

/// Session Manager (§4.9): registry, caps, idle timeout, and terminal-state
/// cache eviction.
pub struct SessionManagerConfig {
	pub max_sessions: usize,
	pub timeout_minutes: i64,
	pub completed_session_cache_ttl_minutes: i64,
}

impl Default for SessionManagerConfig {
	fn default() -> Self {
		Self { max_sessions: 100, timeout_minutes: 30, completed_session_cache_ttl_minutes: 60 }
	}
}

impl SessionManagerConfig {
	/// Whether a persisted snapshot has sat idle past `timeoutMinutes` without
	/// reaching a terminal state (§4.9). Exposed so a cross-process caller (the
	/// CLI, which has no long-lived in-memory registry to sweep) can apply the
	/// same rule directly against a loaded [`SessionSnapshot`].
	pub fn is_idle_timed_out(&self, snapshot: &SessionSnapshot) -> bool {
		!snapshot.state.is_terminal()
			&& (Utc::now() - snapshot.last_activity_at).num_minutes() >= self.timeout_minutes
	}

	/// Whether a terminal-state snapshot has outlived `completedSessionCacheTTLMinutes` (§4.9).
	pub fn is_ttl_expired(&self, snapshot: &SessionSnapshot) -> bool {
		snapshot.state.is_terminal()
			&& (Utc::now() - snapshot.last_activity_at).num_minutes() >= self.completed_session_cache_ttl_minutes
	}
}

pub struct SessionManager {
	sessions: RwLock<IndexMap<Uuid, Session>>,
	config: SessionManagerConfig,
	provider: Arc<dyn LlmProvider>,
}

impl SessionManager {
	pub fn new(config: SessionManagerConfig, provider: Arc<dyn LlmProvider>) -> Self {
		Self { sessions: RwLock::new(IndexMap::new()), config, provider }
	}

	/// Creates a session with a generated id, evicting the oldest by
	/// last-activity if at the `maxSessions` cap (§4.9).
	pub fn create(&self, prompt: impl Into<String>) -> Result<Uuid> {
		let mut sessions = self.sessions.write();
		if sessions.len() >= self.config.max_sessions {
			let oldest = sessions
				.iter()
				.min_by_key(|(_, s)| s.last_activity_at)
				.map(|(id, _)| *id)
				.ok_or(Error::SessionAtCapacity(self.config.max_sessions))?;
			sessions.shift_remove(&oldest);
		}
		let id = Uuid::new_v4();
		sessions.insert(id, Session::new(id, prompt, self.provider.clone()));
		Ok(id)
	}

	pub fn with_session<R>(&self, id: Uuid, f: impl FnOnce(&Session) -> R) -> Result<R> {
		let sessions = self.sessions.read();
		sessions.get(&id).map(f).ok_or(Error::SessionNotFound(id))
	}

	pub fn with_session_mut<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Result<R> {
		let mut sessions = self.sessions.write();
		sessions.get_mut(&id).map(f).ok_or(Error::SessionNotFound(id))
	}

	pub fn list(&self) -> Vec<Uuid> {
		self.sessions.read().keys().copied().collect()
	}

	pub fn delete(&self, id: Uuid) -> Result<()> {
		self.sessions.write().shift_remove(&id).map(|_| ()).ok_or(Error::SessionNotFound(id))
	}

	pub fn clear_all(&self) {
		self.sessions.write().clear();
	}

	/// Immediately evicts every terminal-state session, regardless of the
	/// cache TTL. Used by the memory monitor's `performCleanup` under memory
	/// pressure (§4.12), as opposed to `sweep`'s timer-driven TTL eviction.
	pub fn evict_completed_sessions(&self) -> usize {
		let mut sessions = self.sessions.write();
		let terminal: Vec<Uuid> =
			sessions.iter().filter(|(_, s)| s.state.is_terminal()).map(|(id, _)| *id).collect();
		for id in &terminal {
			sessions.shift_remove(id);
		}
		terminal.len()
	}

	/// Synchronizes each session's cached completion state with the DAG's
	/// own predicate; required after debug operations like `FORCE_COMPLETE`
	/// or manual edge insertion can invalidate a previously cached flag (§4.9).
	pub fn analyze_completion_state(&self, id: Uuid) -> Result<CompletionReport> {
		self.with_session(id, |session| session.completion_report())
	}

	/// Sweeps idle sessions past `timeoutMinutes` into `cancelled`, and
	/// evicts terminal sessions past `completedSessionCacheTTLMinutes` (§4.9).
	/// Intended to run on a `cleanupIntervalMinutes` timer.
	pub fn sweep(&self) {
		let now = Utc::now();
		let mut sessions = self.sessions.write();
		let mut to_remove = Vec::new();

		for (id, session) in sessions.iter_mut() {
			let idle_minutes = (now - session.last_activity_at).num_minutes();
			if !session.state.is_terminal() && idle_minutes >= self.config.timeout_minutes {
				session.logs.warn("session idle timeout, cancelling");
				let _ = session.cancel();
			}
			if session.state.is_terminal() && idle_minutes >= self.config.completed_session_cache_ttl_minutes {
				to_remove.push(*id);
			}
		}
		for id in to_remove {
			sessions.shift_remove(&id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::StubProvider;
	use serde_json::json;

	fn provider_identifying(url: &str) -> Arc<dyn LlmProvider> {
		Arc::new(StubProvider::function_result(json!({"url": url})))
	}

	const SAMPLE_HAR: &str = r#"{
		"log": {
			"entries": [
				{
					"request": {
						"method": "POST",
						"url": "https://x/api/auth/login",
						"headers": [{"name": "Content-Type", "value": "application/json"}],
						"queryString": [],
						"postData": {"mimeType": "application/json", "text": "{\"username\":\"u\"}"}
					},
					"response": {
						"status": 200, "statusText": "OK",
						"headers": [{"name": "Content-Type", "value": "application/json"}],
						"content": {"mimeType": "application/json", "text": "{\"access_token\":\"tok_abc\"}"}
					}
				},
				{
					"request": {
						"method": "GET",
						"url": "https://x/api/search?query=documents&limit=10",
						"headers": [{"name": "Authorization", "value": "Bearer tok_abc"}],
						"queryString": []
					},
					"response": {
						"status": 200, "statusText": "OK",
						"headers": [{"name": "Content-Type", "value": "application/json"}],
						"content": {"mimeType": "application/json", "text": "{\"doc_id\":\"d_123\"}"}
					}
				}
			]
		}
	}"#;

	#[tokio::test]
	async fn start_session_advances_to_awaiting_workflow_selection() {
		let provider = provider_identifying("https://x/api/search?query=documents&limit=10");
		let mut session = Session::new(Uuid::new_v4(), "search documents", provider);
		session.start_session(SAMPLE_HAR.as_bytes(), None, &FilterOptions::default(), IndexMap::new()).unwrap();
		assert_eq!(session.state, SessionState::AwaitingWorkflowSelection);
		assert_eq!(session.filtered_requests.len(), 2);
	}

	#[tokio::test]
	async fn identify_workflow_seeds_master_node_and_queue() {
		let provider = provider_identifying("https://x/api/search?query=documents&limit=10");
		let mut session = Session::new(Uuid::new_v4(), "search documents", provider);
		session.start_session(SAMPLE_HAR.as_bytes(), None, &FilterOptions::default(), IndexMap::new()).unwrap();
		session.identify_workflow().await.unwrap();
		assert_eq!(session.state, SessionState::ProcessingDependencies);
		assert_eq!(session.queue.len(), 1);
		assert!(session.dag.master_node().is_some());
	}

	#[test]
	fn session_manager_enforces_capacity_by_evicting_oldest() {
		let provider: Arc<dyn LlmProvider> = Arc::new(StubProvider::unreachable());
		let manager = SessionManager::new(
			SessionManagerConfig { max_sessions: 1, ..Default::default() },
			provider,
		);
		let first = manager.create("first").unwrap();
		let second = manager.create("second").unwrap();
		assert!(manager.with_session(first, |_| ()).is_err());
		assert!(manager.with_session(second, |_| ()).is_ok());
	}

	#[tokio::test]
	async fn session_round_trips_through_a_snapshot() {
		let provider = provider_identifying("https://x/api/search?query=documents&limit=10");
		let mut session = Session::new(Uuid::new_v4(), "search documents", provider.clone());
		session.start_session(SAMPLE_HAR.as_bytes(), None, &FilterOptions::default(), IndexMap::new()).unwrap();
		session.identify_workflow().await.unwrap();

		let snapshot = session.to_snapshot();
		let json = serde_json::to_string(&snapshot).unwrap();
		let restored_snapshot: SessionSnapshot = serde_json::from_str(&json).unwrap();
		let restored = Session::from_snapshot(restored_snapshot, provider).unwrap();

		assert_eq!(restored.id, session.id);
		assert_eq!(restored.state, session.state);
		assert_eq!(restored.queue.len(), session.queue.len());
		assert!(restored.dag.master_node().is_some());
	}
}
