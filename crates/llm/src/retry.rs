use std::future::Future;
use std::time::Duration;

use crate::error::Error;

/// Per-call deadline bounds (§5): default 5 min, configurable 1s-5min.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(1);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct CallOptions {
	pub deadline: Duration,
}

impl Default for CallOptions {
	fn default() -> Self {
		Self { deadline: DEFAULT_TIMEOUT }
	}
}

impl CallOptions {
	pub fn clamped(deadline: Duration) -> Self {
		Self {
			deadline: deadline.clamp(MIN_TIMEOUT, MAX_TIMEOUT),
		}
	}
}

/// §5: "retry up to `maxRetries` (default 3) with exponential backoff (1s, 2s, 4s)."
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	pub max_retries: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 3 }
	}
}

impl RetryPolicy {
	fn backoff_for(attempt: u32) -> Duration {
		Duration::from_secs(1 << attempt.min(2))
	}
}

/// Runs `f` under the per-call deadline, retrying on retryable errors with
/// exponential backoff. Non-retryable errors (missing key, unknown function,
/// schema mismatch) return immediately, as do retryable errors once retries
/// are exhausted.
pub async fn call_with_policy<T, F, Fut>(
	opts: CallOptions,
	policy: RetryPolicy,
	mut f: F,
) -> Result<T, Error>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, Error>>,
{
	let mut attempt = 0;
	loop {
		let call = tokio::time::timeout(opts.deadline, f()).await;
		let result = match call {
			Ok(r) => r,
			Err(_) => return Err(Error::Timeout(opts.deadline)),
		};
		match result {
			Ok(v) => return Ok(v),
			Err(e) if e.is_retryable() && attempt < policy.max_retries => {
				tracing::warn!(attempt, error = %e, "retrying llm call");
				tokio::time::sleep(RetryPolicy::backoff_for(attempt)).await;
				attempt += 1;
			}
			Err(e) => return Err(e),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	#[tokio::test]
	async fn retries_retryable_errors_then_succeeds() {
		let calls = AtomicU32::new(0);
		let result = call_with_policy(CallOptions::default(), RetryPolicy { max_retries: 3 }, || async {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			if n < 2 {
				Err(Error::Unavailable("boom".into()))
			} else {
				Ok(42)
			}
		})
		.await;
		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn does_not_retry_missing_api_key() {
		let calls = AtomicU32::new(0);
		let result: Result<(), Error> =
			call_with_policy(CallOptions::default(), RetryPolicy::default(), || async {
				calls.fetch_add(1, Ordering::SeqCst);
				Err(Error::MissingApiKey("openai".into()))
			})
			.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}
