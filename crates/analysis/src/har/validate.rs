use serde::{Deserialize, Serialize};

use crate::request::{Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
	Excellent,
	Good,
	Poor,
	Empty,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Counts {
	pub total_entries: usize,
	pub relevant: usize,
	pub api_requests: usize,
	pub modifying_requests: usize,
	pub responses_with_content: usize,
	pub auth_requests: usize,
	pub token_requests: usize,
	pub auth_errors: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthAnalysis {
	pub has_auth_headers: bool,
	pub has_cookies: bool,
	pub has_tokens: bool,
	pub auth_types_seen: Vec<String>,
	/// Truncated samples (first 12 chars + ellipsis), never the full secret.
	pub token_samples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
	pub quality: Quality,
	pub counts: Counts,
	pub issues: Vec<String>,
	pub recommendations: Vec<String>,
	pub authentication: AuthAnalysis,
}

const MODIFYING_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

pub fn assess(requests: &[Request]) -> ValidationReport {
	let mut counts = Counts { total_entries: requests.len(), relevant: requests.len(), ..Default::default() };
	let mut auth = AuthAnalysis::default();
	let mut issues = Vec::new();
	let mut recommendations = Vec::new();

	for req in requests {
		let is_api = req.url.contains("/api/") || Response::is_json_like(req.response_content_type());
		if is_api {
			counts.api_requests += 1;
		}
		if MODIFYING_METHODS.contains(&req.method.to_uppercase().as_str()) {
			counts.modifying_requests += 1;
		}
		if req.response.as_ref().is_some_and(|r| r.body_text.is_some() || r.body_json.is_some()) {
			counts.responses_with_content += 1;
		}

		if let Some(auth_header) = req.headers.get("authorization") {
			counts.auth_requests += 1;
			auth.has_auth_headers = true;
			let scheme = auth_header.split_whitespace().next().unwrap_or("unknown");
			if !auth.auth_types_seen.iter().any(|t| t == scheme) {
				auth.auth_types_seen.push(scheme.to_string());
			}
			auth.has_tokens = true;
			auth.token_samples.push(truncate_token(auth_header));
			counts.token_requests += 1;
		}
		if req.headers.contains("cookie") {
			auth.has_cookies = true;
		}
		if req.response.as_ref().is_some_and(|r| r.is_auth_error()) {
			counts.auth_errors += 1;
		}
	}

	let quality = if counts.relevant == 0 {
		issues.push("no relevant traffic found after filtering".to_string());
		recommendations.push("capture the action again, this HAR has no API traffic".to_string());
		Quality::Empty
	} else if counts.auth_errors > 0 {
		issues.push(format!("{} requests returned 401/403", counts.auth_errors));
		recommendations.push("recapture while authenticated; requests are failing auth".to_string());
		Quality::Poor
	} else if counts.api_requests >= 3 || counts.modifying_requests >= 2 {
		Quality::Excellent
	} else if counts.relevant >= 5 || counts.api_requests >= 1 {
		Quality::Good
	} else {
		issues.push("very little API traffic captured".to_string());
		recommendations.push("capture a longer session covering the full action".to_string());
		Quality::Poor
	};

	ValidationReport { quality, counts, issues, recommendations, authentication: auth }
}

fn truncate_token(value: &str) -> String {
	if value.len() <= 12 {
		value.to_string()
	} else {
		format!("{}...", &value[..12])
	}
}
