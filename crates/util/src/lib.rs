pub mod bow;
pub mod paths;
pub mod ring_log;
pub mod telemetry;

pub use bow::OwnedOrBorrowed;
pub use ring_log::{LogEntry, LogLevel, RingLog};
