use std::collections::HashSet;

use crate::request::{HeaderBag, Request, Response};

/// Tracking substrings a header name must contain to be stripped, unless the
/// name is one of the always-preserved auth headers (§3).
pub const HEADER_DENYLIST_SUBSTRINGS: &[&str] = &[
	"sec-", "accept", "user-agent", "referer", "relic", "sentry", "datadog", "amplitude", "mixpanel",
	"segment", "heap", "hotjar", "fullstory", "pendo", "optimizely", "adobe", "analytics", "tracking",
	"telemetry", "clarity", "matomo", "plausible",
];

/// Default URL-keyword denylist (§4.1 item 4); caller may override the whole list.
pub const DEFAULT_URL_DENYLIST: &[&str] = &[
	"google", "taboola", "datadog", "sentry", "facebook", "twitter", "linkedin", "amplitude", "mixpanel",
	"segment", "heap", "hotjar", "fullstory", "pendo", "optimizely", "adobe", "analytics", "tracking",
	"telemetry", "clarity", "matomo", "plausible",
];

const API_PATH_MARKERS: &[&str] = &["/api/", "/v1/", "/v2/", "/rest/", "/graphql"];

/// Strips denylisted headers from a request in place, always keeping the
/// preserved auth headers (§3).
pub fn normalize_headers(headers: &mut HeaderBag) {
	let to_remove: Vec<String> = headers
		.iter()
		.filter(|(name, _)| {
			!HeaderBag::is_preserved_auth_header(name)
				&& HEADER_DENYLIST_SUBSTRINGS.iter().any(|kw| name.to_ascii_lowercase().contains(kw))
		})
		.map(|(name, _)| name.to_string())
		.collect();
	for name in to_remove {
		headers.remove_ignore_case(&name);
	}
}

#[derive(Default)]
pub struct FilterOptions {
	pub exclude_keywords: Option<Vec<String>>,
	pub include_all_api_requests: bool,
	pub preserve_analytics: bool,
	pub custom_filters: Vec<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

fn is_api_path(url: &str) -> bool {
	let lower = url.to_ascii_lowercase();
	API_PATH_MARKERS.iter().any(|m| lower.contains(m))
}

fn matches_denylist(url: &str, denylist: &[String]) -> bool {
	let lower = url.to_ascii_lowercase();
	denylist.iter().any(|kw| lower.contains(kw.as_str()))
}

fn is_dropped_asset_content_type(req: &Request) -> bool {
	let ct = req.response_content_type().or_else(|| req.content_type()).unwrap_or("");
	let ct = ct.to_ascii_lowercase();
	ct.starts_with("image/")
		|| ct.starts_with("font/")
		|| ct == "text/css"
		|| ct == "application/javascript"
}

/// Applies the filtering rules of §4.1, in order, to a parsed-and-normalized
/// request list. Idempotent: `filter(filter(x)) == filter(x)` (§8) because
/// every rule is a pure predicate over a request's own fields.
pub fn apply(requests: Vec<Request>, options: &FilterOptions) -> Vec<Request> {
	let denylist: Vec<String> = options
		.exclude_keywords
		.clone()
		.unwrap_or_else(|| DEFAULT_URL_DENYLIST.iter().map(|s| s.to_string()).collect());

	requests
		.into_iter()
		.filter(|req| {
			// Rule 1: preserveAnalytics bypasses every other rule.
			if options.preserve_analytics {
				return true;
			}
			// Rule 2: includeAllApiRequests retains API paths regardless of the denylist.
			if options.include_all_api_requests && is_api_path(&req.url) {
				return true;
			}
			// Rule 3: custom filters exclude on a true return.
			if options.custom_filters.iter().any(|f| f(&req.url)) {
				return false;
			}
			// Rule 4: default denylist.
			if matches_denylist(&req.url, &denylist) {
				return false;
			}
			// Rule 5: drop OPTIONS preflight requests.
			if req.method.eq_ignore_ascii_case("OPTIONS") {
				return false;
			}
			// Rule 6: drop known asset content types.
			!is_dropped_asset_content_type(req)
		})
		.collect()
}

/// One entry in the ordered URL summary (§3 `ParsedHAR`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct UrlSummary {
	pub method: String,
	pub url: String,
	pub is_api: bool,
	pub response_is_json: bool,
}

fn method_priority(method: &str) -> u8 {
	match method.to_uppercase().as_str() {
		"POST" => 0,
		"PUT" => 1,
		"DELETE" => 2,
		"GET" => 3,
		_ => 4,
	}
}

/// Stable-deduplicates by `(method, url)`, then sorts API endpoints before
/// others, with method priority POST < PUT < DELETE < GET < others within
/// each group (§4.1 "URL ordering").
pub fn order_urls(requests: &[Request]) -> Vec<UrlSummary> {
	let mut seen = HashSet::new();
	let mut summaries: Vec<UrlSummary> = Vec::new();
	for req in requests {
		let key = (req.method.to_uppercase(), req.url.clone());
		if !seen.insert(key) {
			continue;
		}
		let response_is_json =
			req.response.as_ref().is_some_and(|r| Response::is_json_like(r.headers.get("content-type")));
		summaries.push(UrlSummary {
			method: req.method.to_uppercase(),
			url: req.url.clone(),
			is_api: req.url.contains("/api/") || response_is_json,
			response_is_json,
		});
	}
	summaries.sort_by(|a, b| {
		b.is_api.cmp(&a.is_api).then_with(|| method_priority(&a.method).cmp(&method_priority(&b.method)))
	});
	summaries
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;
	use crate::request::Request;

	fn req(method: &str, url: &str) -> Request {
		Request::new(method, url)
	}

	#[rstest]
	#[case("X-Amplitude-Id", false)]
	#[case("X-Mixpanel-Token", false)]
	#[case("Sec-Fetch-Mode", false)]
	#[case("Authorization", true)]
	#[case("Cookie", true)]
	#[case("Content-Type", true)]
	fn normalize_headers_strips_tracking_headers_but_preserves_auth(#[case] name: &str, #[case] survives: bool) {
		let mut headers = HeaderBag::new();
		headers.insert(name, "value");
		normalize_headers(&mut headers);
		assert_eq!(headers.contains(name), survives, "header {name} survival mismatch");
	}

	#[test]
	fn drops_options_and_denylisted_urls() {
		let requests = vec![
			req("OPTIONS", "https://x/api/search"),
			req("GET", "https://x/api/search"),
			req("GET", "https://analytics.example.com/collect"),
		];
		let out = apply(requests, &FilterOptions::default());
		assert_eq!(out.len(), 1);
		assert_eq!(out[0].url, "https://x/api/search");
	}

	#[test]
	fn filtering_is_idempotent() {
		let requests = vec![req("GET", "https://x/api/search"), req("GET", "https://x/taboola/track")];
		let once = apply(requests.clone(), &FilterOptions::default());
		let twice = apply(once.clone(), &FilterOptions::default());
		assert_eq!(once.len(), twice.len());
		assert_eq!(once[0].url, twice[0].url);
	}

	#[test]
	fn preserve_analytics_bypasses_options_and_asset_drops() {
		let options_req = req("OPTIONS", "https://analytics.example.com/collect");
		let mut asset_req = req("GET", "https://x/style.css");
		asset_req.response = Some(Response {
			status: 200,
			status_text: "OK".to_string(),
			headers: {
				let mut h = HeaderBag::new();
				h.insert("Content-Type", "text/css");
				h
			},
			body_text: None,
			body_json: None,
		});

		let requests = vec![options_req, asset_req];
		let options = FilterOptions { preserve_analytics: true, ..Default::default() };
		let out = apply(requests, &options);
		assert_eq!(out.len(), 2, "preserveAnalytics must bypass every other rule, including OPTIONS/asset drops");
	}

	#[test]
	fn include_all_api_requests_overrides_denylist() {
		let requests = vec![req("GET", "https://analytics.example.com/api/v1/search")];
		let options = FilterOptions { include_all_api_requests: true, ..Default::default() };
		let out = apply(requests, &options);
		assert_eq!(out.len(), 1);
	}

	#[test]
	fn order_urls_sorts_api_first_and_by_method_priority() {
		let requests = vec![
			req("GET", "https://x/home"),
			req("GET", "https://x/api/search"),
			req("POST", "https://x/api/login"),
		];
		let ordered = order_urls(&requests);
		assert_eq!(ordered[0].url, "https://x/api/login");
		assert_eq!(ordered[1].url, "https://x/api/search");
		assert_eq!(ordered[2].url, "https://x/home");
	}
}
