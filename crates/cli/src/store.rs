//! Persists a session's [`SessionSnapshot`] to disk between CLI invocations.
//! Each `harvest` command is its own process; this is how `session status`
//! sees state written by an earlier `process next` call (§6.6).

use std::path::{Path, PathBuf};

use harvest_analysis::SessionSnapshot;
use uuid::Uuid;

use crate::error::{Error, Result};

fn sessions_dir(shared_dir: Option<&str>) -> PathBuf {
	let base = harvest_util::paths::expand_home(shared_dir.unwrap_or("~/.harvest/sessions"));
	let _ = std::fs::create_dir_all(&base);
	base
}

fn path_for(shared_dir: Option<&str>, id: Uuid) -> PathBuf {
	sessions_dir(shared_dir).join(format!("{id}.json"))
}

pub fn save(shared_dir: Option<&str>, snapshot: &SessionSnapshot) -> Result<()> {
	let path = path_for(shared_dir, snapshot.id);
	let text = serde_json::to_string_pretty(snapshot)?;
	std::fs::write(path, text)?;
	Ok(())
}

pub fn load(shared_dir: Option<&str>, id: Uuid) -> Result<SessionSnapshot> {
	let path = path_for(shared_dir, id);
	if !path.exists() {
		return Err(Error::SessionStateMissing(id.to_string()));
	}
	let text = std::fs::read_to_string(path)?;
	Ok(serde_json::from_str(&text)?)
}

pub fn delete(shared_dir: Option<&str>, id: Uuid) -> Result<()> {
	let path = path_for(shared_dir, id);
	if path.exists() {
		std::fs::remove_file(path)?;
	}
	Ok(())
}

pub fn list(shared_dir: Option<&str>) -> Result<Vec<Uuid>> {
	let dir = sessions_dir(shared_dir);
	let mut ids = Vec::new();
	for entry in std::fs::read_dir(&dir)? {
		let entry = entry?;
		if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
			if let Ok(id) = Uuid::parse_str(stem) {
				ids.push(id);
			}
		}
	}
	Ok(ids)
}

#[allow(dead_code)]
pub fn base_dir_for_tests(shared_dir: Option<&str>) -> PathBuf {
	sessions_dir(shared_dir)
}

#[cfg(test)]
mod tests {
	use super::*;
	use harvest_analysis::{Session, SessionManagerConfig};
	use harvest_llm::LlmProvider;
	use std::sync::Arc;

	struct Unreachable;
	#[async_trait::async_trait]
	impl LlmProvider for Unreachable {
		fn name(&self) -> &'static str {
			"unreachable"
		}
		fn default_model(&self) -> &str {
			"n/a"
		}
		async fn call_function(
			&self,
			_messages: &[harvest_llm::Message],
			_function: &harvest_llm::FunctionDef,
		) -> std::result::Result<serde_json::Value, harvest_llm::Error> {
			unreachable!()
		}
		async fn generate_completion(
			&self,
			_messages: &[harvest_llm::Message],
			_temperature: Option<f64>,
			_model: Option<&str>,
		) -> std::result::Result<harvest_llm::Completion, harvest_llm::Error> {
			unreachable!()
		}
	}

	#[test]
	fn saves_and_loads_a_session_snapshot_round_trip() {
		let _ = SessionManagerConfig::default();
		let dir = tempfile::tempdir().unwrap();
		let shared = dir.path().to_str().unwrap();

		let provider: Arc<dyn LlmProvider> = Arc::new(Unreachable);
		let session = Session::new(Uuid::new_v4(), "a prompt", provider);
		let snapshot = session.to_snapshot();

		save(Some(shared), &snapshot).unwrap();
		let loaded = load(Some(shared), snapshot.id).unwrap();
		assert_eq!(loaded.id, snapshot.id);
		assert_eq!(loaded.prompt, "a prompt");
		assert!(list(Some(shared)).unwrap().contains(&snapshot.id));

		delete(Some(shared), snapshot.id).unwrap();
		assert!(load(Some(shared), snapshot.id).is_err());
	}
}
