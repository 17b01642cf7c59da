use crate::completion::CompletionReport;

/// The error taxonomy of §7, as enum variants rather than ad-hoc strings.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid HAR format: {0}")]
	InvalidHarFormat(String),

	#[error("HAR contains no usable entries")]
	EmptyHar,

	#[error("workflow identifier found no candidate urls")]
	NoCandidates,

	#[error(transparent)]
	Llm(#[from] harvest_llm::Error),

	#[error("internal consistency error: edge would close a cycle")]
	CycleDetected,

	#[error("analysis incomplete, code cannot be emitted yet")]
	AnalysisIncomplete(Box<CompletionReport>),

	#[error("session {0} not found")]
	SessionNotFound(uuid::Uuid),

	#[error("configuration already initialized")]
	AlreadyInitialized,

	#[error("session manager is at capacity ({0} sessions)")]
	SessionAtCapacity(usize),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	#[error("permission denied: {0}")]
	PermissionDenied(String),
}

impl Error {
	/// The symbolic error "kind" string surfaced in the CLI's `{code, message, data}` shape (§6.6/§7).
	pub fn code(&self) -> &'static str {
		match self {
			Error::InvalidHarFormat(_) => "InvalidHarFormat",
			Error::EmptyHar => "EmptyHar",
			Error::NoCandidates => "NoCandidates",
			Error::Llm(e) => match e {
				harvest_llm::Error::Unavailable(_) => "LlmUnavailable",
				harvest_llm::Error::Timeout(_) => "LlmTimeout",
				harvest_llm::Error::MalformedResponse(_) => "LlmMalformedResponse",
				harvest_llm::Error::SchemaMismatch(_) => "LlmMalformedResponse",
				harvest_llm::Error::NoProviderConfigured => "NoProviderConfigured",
				harvest_llm::Error::MissingApiKey(_) => "MissingApiKey",
				harvest_llm::Error::UnknownFunctionCalledBack(_) => "LlmMalformedResponse",
			},
			Error::CycleDetected => "CycleDetected",
			Error::AnalysisIncomplete(_) => "AnalysisIncomplete",
			Error::SessionNotFound(_) => "SessionNotFound",
			Error::AlreadyInitialized => "SessionAlreadyInitialized",
			Error::SessionAtCapacity(_) => "SessionAtCapacity",
			Error::Io(_) => "IoError",
			Error::PermissionDenied(_) => "PermissionDenied",
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
