//! Session FSM (§4.8) and Session Manager (§4.9).

pub mod fsm;
pub mod manager;

pub use fsm::{EventKind, SessionState};
pub use manager::{
	Session, SessionManager, SessionManagerConfig, SessionProgress, SessionSnapshot, WorkflowGroup,
};
