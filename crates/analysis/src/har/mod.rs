//! HAR Parser & Filter (§4.1): loads a HAR 1.2 capture, strips non-signal
//! traffic and tracking headers, and produces a [`ParsedHar`] plus a
//! [`ValidationReport`].

pub mod filter;
pub mod types;
pub mod validate;

use indexmap::IndexMap;

pub use filter::FilterOptions;
pub use validate::{Quality, ValidationReport};

use crate::error::{Error, Result};
use crate::request::{Body, HeaderBag, Request, Response};

#[derive(Debug, Clone)]
pub struct ParsedHar {
	pub requests: Vec<Request>,
	pub url_summaries: Vec<filter::UrlSummary>,
	pub validation: ValidationReport,
}

/// Parses and filters a HAR document. §4.1 failure semantics: missing
/// `log.entries` fails with [`Error::InvalidHarFormat`]; a HAR with zero
/// entries fails with [`Error::EmptyHar`]; malformed bodies degrade to text
/// and are never fatal.
pub fn parse(bytes: &[u8], options: &FilterOptions) -> Result<ParsedHar> {
	let har: types::HarFile =
		serde_json::from_slice(bytes).map_err(|e| Error::InvalidHarFormat(e.to_string()))?;

	if har.log.entries.is_empty() {
		return Err(Error::EmptyHar);
	}

	let requests: Vec<Request> = har.log.entries.into_iter().map(normalize_entry).collect();
	let filtered = filter::apply(requests, options);
	let validation = validate::assess(&filtered);
	let url_summaries = filter::order_urls(&filtered);

	Ok(ParsedHar { requests: filtered, url_summaries, validation })
}

fn normalize_entry(entry: types::HarEntry) -> Request {
	let mut headers = HeaderBag::new();
	for h in entry.request.headers {
		headers.insert(h.name, h.value);
	}
	filter::normalize_headers(&mut headers);

	let mut query = IndexMap::new();
	for q in entry.request.query_string {
		query.insert(q.name, q.value);
	}
	if query.is_empty()
		&& let Ok(parsed) = url::Url::parse(&entry.request.url)
	{
		for (k, v) in parsed.query_pairs() {
			query.insert(k.into_owned(), v.into_owned());
		}
	}

	let body = entry.request.post_data.and_then(|post_data| {
		if let Some(text) = post_data.text {
			Some(Body::from_text(&text))
		} else if !post_data.params.is_empty() {
			let map: IndexMap<String, String> =
				post_data.params.into_iter().map(|p| (p.name, p.value)).collect();
			Some(Body::from_form(map))
		} else {
			None
		}
	});

	let response = entry.response.map(normalize_response);

	Request { method: entry.request.method, url: entry.request.url, headers, query, body, response }
}

fn normalize_response(resp: types::HarResponse) -> Response {
	let mut headers = HeaderBag::new();
	for h in resp.headers {
		headers.insert(h.name, h.value);
	}

	let content_type = headers.get("content-type").map(str::to_string);
	let body_text = resp.content.and_then(|c| c.text);
	let body_json = body_text
		.as_ref()
		.filter(|_| Response::is_json_like(content_type.as_deref()))
		.and_then(|t| serde_json::from_str(t).ok());

	Response { status: resp.status, status_text: resp.status_text, headers, body_text, body_json }
}

#[cfg(test)]
mod tests {
	use super::*;

	const SAMPLE: &str = r#"{
		"log": {
			"entries": [
				{
					"startedDateTime": "2026-01-01T00:00:00Z",
					"request": {
						"method": "POST",
						"url": "https://x/api/auth/login",
						"headers": [{"name": "Content-Type", "value": "application/json"}],
						"queryString": [],
						"postData": {"mimeType": "application/json", "text": "{\"username\":\"u\"}"}
					},
					"response": {
						"status": 200,
						"statusText": "OK",
						"headers": [{"name": "Content-Type", "value": "application/json"}],
						"content": {"mimeType": "application/json", "text": "{\"access_token\":\"tok_abc\"}"}
					}
				}
			]
		}
	}"#;

	#[test]
	fn parses_and_filters_sample_har() {
		let parsed = parse(SAMPLE.as_bytes(), &FilterOptions::default()).unwrap();
		assert_eq!(parsed.requests.len(), 1);
		assert_eq!(parsed.validation.quality, Quality::Good);
	}

	#[test]
	fn empty_entries_is_a_hard_error() {
		let empty = r#"{"log": {"entries": []}}"#;
		let err = parse(empty.as_bytes(), &FilterOptions::default()).unwrap_err();
		assert!(matches!(err, Error::EmptyHar));
	}

	#[test]
	fn missing_entries_field_is_invalid_format() {
		let malformed = r#"{"log": {}}"#;
		let err = parse(malformed.as_bytes(), &FilterOptions::default()).unwrap_err();
		assert!(matches!(err, Error::InvalidHarFormat(_)));
	}

	#[test]
	fn analytics_only_har_is_quality_empty() {
		let analytics = r#"{
			"log": {
				"entries": [
					{
						"request": {"method": "GET", "url": "https://amplitude.com/collect", "headers": [], "queryString": []}
					}
				]
			}
		}"#;
		let parsed = parse(analytics.as_bytes(), &FilterOptions::default()).unwrap();
		assert_eq!(parsed.validation.quality, Quality::Empty);
	}
}
