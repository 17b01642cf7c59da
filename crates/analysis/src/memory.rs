//! Memory & Resource Monitor (§4.12): periodic sampling of process heap
//! usage, sustained-upward-trend detection, and cleanup-on-pressure.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use sysinfo::{Pid, System};

use crate::session::SessionManager;

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MemorySample {
	pub at: DateTime<Utc>,
	pub bytes_used: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
	/// Number of trailing samples the slope is computed over.
	pub window_size: usize,
	/// Bytes-per-sample slope above which a sustained upward trend is flagged.
	pub leak_slope_threshold: f64,
}

impl Default for MonitorConfig {
	fn default() -> Self {
		Self { window_size: 10, leak_slope_threshold: 1_000_000.0 }
	}
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
#[serde(tag = "kind")]
pub enum Diagnostic {
	MemoryLeakSuspected { slope_bytes_per_sample: f64, samples: usize },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
	pub evicted_session_count: usize,
}

/// Samples this process's own resident memory on a timer (driven externally,
/// e.g. by a `sampleIntervalSeconds` tick) and flags a sustained upward trend.
pub struct MemoryMonitor {
	config: MonitorConfig,
	system: System,
	pid: Pid,
	samples: VecDeque<MemorySample>,
}

impl MemoryMonitor {
	pub fn new(config: MonitorConfig) -> Self {
		let pid = Pid::from_u32(std::process::id());
		Self { samples: VecDeque::with_capacity(config.window_size), config, system: System::new(), pid }
	}

	fn record(&mut self, sample: MemorySample) {
		if self.samples.len() == self.config.window_size {
			self.samples.pop_front();
		}
		self.samples.push_back(sample);
	}

	/// Takes one reading of this process's memory usage.
	pub fn sample(&mut self) -> MemorySample {
		self.system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[self.pid]), true);
		let bytes_used = self.system.process(self.pid).map(|p| p.memory()).unwrap_or(0);
		let sample = MemorySample { at: Utc::now(), bytes_used };
		self.record(sample);
		sample
	}

	/// Least-squares slope of `bytes_used` against sample index.
	fn slope(&self) -> Option<f64> {
		let n = self.samples.len();
		if n < 2 {
			return None;
		}
		let n_f = n as f64;
		let mean_x = (n_f - 1.0) / 2.0;
		let mean_y = self.samples.iter().map(|s| s.bytes_used as f64).sum::<f64>() / n_f;
		let mut cov = 0.0;
		let mut var = 0.0;
		for (i, s) in self.samples.iter().enumerate() {
			let dx = i as f64 - mean_x;
			cov += dx * (s.bytes_used as f64 - mean_y);
			var += dx * dx;
		}
		if var == 0.0 { Some(0.0) } else { Some(cov / var) }
	}

	/// Flags a `MemoryLeakSuspected` diagnostic once the window is full and
	/// the slope exceeds the configured threshold (§4.12).
	pub fn diagnose(&self) -> Option<Diagnostic> {
		if self.samples.len() < self.config.window_size {
			return None;
		}
		let slope = self.slope()?;
		(slope > self.config.leak_slope_threshold)
			.then_some(Diagnostic::MemoryLeakSuspected { slope_bytes_per_sample: slope, samples: self.samples.len() })
	}

	/// Evicts idle completed sessions to relieve memory pressure. Rust has no
	/// runtime garbage collector to request explicitly; the eviction itself,
	/// dropping each session's DAG and logs, is the actual reclamation step.
	pub fn perform_cleanup(&self, manager: &SessionManager) -> CleanupReport {
		CleanupReport { evicted_session_count: manager.evict_completed_sessions() }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn monitor_with_samples(bytes: &[u64]) -> MemoryMonitor {
		let mut monitor = MemoryMonitor::new(MonitorConfig { window_size: bytes.len(), leak_slope_threshold: 1000.0 });
		for &b in bytes {
			monitor.record(MemorySample { at: Utc::now(), bytes_used: b });
		}
		monitor
	}

	#[test]
	fn steady_memory_does_not_trigger_a_diagnostic() {
		let monitor = monitor_with_samples(&[100, 100, 100, 100, 100]);
		assert!(monitor.diagnose().is_none());
	}

	#[test]
	fn sustained_growth_triggers_memory_leak_suspected() {
		let monitor = monitor_with_samples(&[10_000, 20_000, 30_000, 40_000, 50_000]);
		let diag = monitor.diagnose().expect("growth should be flagged");
		match diag {
			Diagnostic::MemoryLeakSuspected { slope_bytes_per_sample, samples } => {
				assert!(slope_bytes_per_sample > 0.0);
				assert_eq!(samples, 5);
			}
		}
	}

	#[test]
	fn below_window_size_withholds_diagnosis() {
		let mut monitor = MemoryMonitor::new(MonitorConfig { window_size: 5, leak_slope_threshold: 1.0 });
		monitor.record(MemorySample { at: Utc::now(), bytes_used: 1_000_000 });
		monitor.record(MemorySample { at: Utc::now(), bytes_used: 2_000_000 });
		assert!(monitor.diagnose().is_none());
	}

	#[tokio::test]
	async fn perform_cleanup_evicts_terminal_sessions() {
		use crate::session::{SessionManager, SessionManagerConfig};
		use crate::test_support::StubProvider;
		use std::sync::Arc;

		let provider: Arc<dyn harvest_llm::LlmProvider> = Arc::new(StubProvider::unreachable());
		let manager = SessionManager::new(SessionManagerConfig::default(), provider);
		let id = manager.create("a prompt").unwrap();
		manager.with_session_mut(id, |s| s.cancel().unwrap()).unwrap();

		let monitor = MemoryMonitor::new(MonitorConfig::default());
		let report = monitor.perform_cleanup(&manager);
		assert_eq!(report.evicted_session_count, 1);
		assert!(manager.with_session(id, |_| ()).is_err());
	}
}
