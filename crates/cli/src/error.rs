//! The CLI-side error taxonomy (§7): adds config/process-local kinds on top
//! of `harvest_analysis::Error`, whose `code()` is reused unchanged for the
//! errors that originate in the analysis core.

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Analysis(#[from] harvest_analysis::Error),

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("no session state found at {0}")]
	SessionStateMissing(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid session state file: {0}")]
	InvalidSessionState(#[from] serde_json::Error),
}

impl Error {
	pub fn code(&self) -> &'static str {
		match self {
			Error::Analysis(e) => e.code(),
			Error::InvalidConfig(_) => "InvalidConfig",
			Error::SessionStateMissing(_) => "SessionNotFound",
			Error::Io(_) => "IoError",
			Error::InvalidSessionState(_) => "InvalidSessionState",
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
