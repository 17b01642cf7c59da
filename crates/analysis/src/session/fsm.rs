//! Session FSM states and the legal-transition table (§4.8). The action
//! logic that actually drives the work (parsing, classification, provenance)
//! lives in [`super::manager::Session`]; this module is the state-machine
//! skeleton the teacher's "native state-machine construct" design note (§9)
//! calls for.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
	Initializing,
	ParsingHar,
	AwaitingWorkflowSelection,
	ProcessingDependencies,
	ReadyForCodeGen,
	CodeGenerated,
	Failed,
	Cancelled,
}

impl SessionState {
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionState::CodeGenerated | SessionState::Failed | SessionState::Cancelled)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
	StartSession,
	IdentifyWorkflow,
	ProcessNextNode,
	AddInputVariable,
	ForceComplete,
	GenerateCode,
	Cancel,
	Fail,
}

/// The §4.8 transition diagram. Returns the destination state for a legal
/// `(current, event)` pair, or `None` if the event is illegal from that state.
///
/// `ProcessNextNode` is special: its destination depends on whether the
/// queue emptied with a complete DAG, which the caller (not this table)
/// knows; callers resolve that ambiguity themselves by passing
/// `queue_empty_and_complete`.
pub fn next_state(current: SessionState, event: EventKind, queue_empty_and_complete: bool) -> Option<SessionState> {
	use SessionState::*;

	if current.is_terminal() {
		return None;
	}
	if event == EventKind::Cancel {
		return Some(Cancelled);
	}
	if event == EventKind::Fail {
		return Some(Failed);
	}

	match (current, event) {
		(Initializing, EventKind::StartSession) => Some(ParsingHar),
		(AwaitingWorkflowSelection, EventKind::IdentifyWorkflow) => Some(ProcessingDependencies),
		(ProcessingDependencies, EventKind::ProcessNextNode) => {
			if queue_empty_and_complete {
				Some(ReadyForCodeGen)
			} else {
				Some(ProcessingDependencies)
			}
		}
		(ProcessingDependencies, EventKind::AddInputVariable) => Some(ProcessingDependencies),
		(ProcessingDependencies, EventKind::ForceComplete) => Some(ReadyForCodeGen),
		(ReadyForCodeGen, EventKind::GenerateCode) => Some(CodeGenerated),
		_ => None,
	}
}

/// The diagram's unlabeled `parsingHar --(parse+validate)--> awaitingWorkflowSelection`
/// arrow: an automatic transition on successful parse, not a user-submitted event.
pub fn complete_parsing(current: SessionState) -> Option<SessionState> {
	matches!(current, SessionState::ParsingHar).then_some(SessionState::AwaitingWorkflowSelection)
}
