use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Recognized `logging.level` values (§6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
	Fatal,
}

impl Default for LogLevel {
	fn default() -> Self {
		LogLevel::Info
	}
}

impl LogLevel {
	fn as_filter_directive(self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			// tracing has no "fatal" level; map to error, the closest it supports.
			LogLevel::Error | LogLevel::Fatal => "error",
		}
	}
}

/// Installs the process-wide `tracing` subscriber. Idempotent: later calls are no-ops,
/// mirroring the "initialize once" rule applied to configuration (§9).
pub fn init(level: LogLevel, json: bool) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_directive()));

	let registry = tracing_subscriber::registry().with(filter);
	let result = if json {
		registry.with(tracing_subscriber::fmt::layer().json()).try_init()
	} else {
		registry.with(tracing_subscriber::fmt::layer()).try_init()
	};
	// try_init fails if a subscriber is already set; that's fine, we only want one.
	let _ = result;
}
