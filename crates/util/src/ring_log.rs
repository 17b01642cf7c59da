use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on entries retained per session (§5 "per-node log ring ≤ 500 entries").
pub const MAX_LOG_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
	pub at: DateTime<Utc>,
	pub level: LogLevel,
	pub message: String,
}

/// A bounded FIFO ring buffer of diagnostic entries for a single session.
///
/// Independent of global `tracing` output: this is what `session status`
/// returns to a caller without needing access to the process's log sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RingLog {
	entries: VecDeque<LogEntry>,
}

impl RingLog {
	pub fn new() -> Self {
		Self {
			entries: VecDeque::with_capacity(MAX_LOG_ENTRIES),
		}
	}

	pub fn push(&mut self, level: LogLevel, message: impl Into<String>) {
		if self.entries.len() == MAX_LOG_ENTRIES {
			self.entries.pop_front();
		}
		self.entries.push_back(LogEntry {
			at: Utc::now(),
			level,
			message: message.into(),
		});
	}

	pub fn info(&mut self, message: impl Into<String>) {
		self.push(LogLevel::Info, message);
	}

	pub fn warn(&mut self, message: impl Into<String>) {
		self.push(LogLevel::Warn, message);
	}

	pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
		self.entries.iter()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ring_evicts_oldest_past_cap() {
		let mut log = RingLog::new();
		for i in 0..MAX_LOG_ENTRIES + 10 {
			log.info(format!("entry {i}"));
		}
		assert_eq!(log.len(), MAX_LOG_ENTRIES);
		assert_eq!(log.entries().next().unwrap().message, "entry 10");
	}
}
