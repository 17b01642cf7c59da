//! The CLI's `{code, message, data}` JSON shape (§6.6, §7).

use serde::Serialize;

use crate::error::Error;
use crate::setup_instructions;

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
	code: &'static str,
	message: String,
	recommendations: &'a [&'a str],
	data: Option<serde_json::Value>,
}

/// Prints `data` as success JSON to stdout and returns exit code 0.
pub fn success(data: serde_json::Value) -> i32 {
	println!("{}", serde_json::to_string_pretty(&data).expect("json serializes"));
	0
}

/// Prints the §7 error envelope to stdout and returns exit code 1. Analysis
/// errors that carry structured context (e.g. `AnalysisIncomplete`'s blocker
/// report) surface it in `data`.
pub fn failure(err: Error) -> i32 {
	let code = err.code();
	let data = match &err {
		Error::Analysis(harvest_analysis::Error::AnalysisIncomplete(report)) => {
			serde_json::to_value(report.as_ref()).ok()
		}
		_ => None,
	};
	let envelope = ErrorEnvelope {
		code,
		message: err.to_string(),
		recommendations: setup_instructions::recommendations_for(code),
		data,
	};
	println!("{}", serde_json::to_string_pretty(&envelope).expect("json serializes"));
	1
}
