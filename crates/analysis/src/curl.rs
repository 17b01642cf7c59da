//! Request Model & Curl Rendering (§4.2): a deterministic, round-tripping
//! `curl`-command rendering used as the textual representation fed to the LLM.

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::request::{Body, HeaderBag, Request};

/// Characters a query-string key/value must escape: the delimiters we split
/// on (`&`, `=`) plus the usual URL-unsafe set, so a round-trip through
/// `render_curl`/`parse_curl` never misreads a literal `&` inside a value.
const QUERY_ENCODE_SET: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'<').add(b'>').add(b'&').add(b'=');

fn shell_quote(value: &str) -> String {
	format!("'{}'", value.replace('\'', r"'\''"))
}

/// Renders a [`Request`] as a `curl` command. Headers are emitted in stable
/// alphabetical order (case-insensitive) but with their original casing, so
/// repeated renders of the same request are byte-identical (§4.2).
pub fn render_curl(req: &Request) -> String {
	let mut parts = vec!["curl".to_string(), "-X".to_string(), req.method.to_uppercase()];

	let url = if req.query.is_empty() {
		req.url.clone()
	} else {
		let qs: Vec<String> = req
			.query
			.iter()
			.map(|(k, v)| {
				format!(
					"{}={}",
					utf8_percent_encode(k, QUERY_ENCODE_SET),
					utf8_percent_encode(v, QUERY_ENCODE_SET)
				)
			})
			.collect();
		let separator = if req.url.contains('?') { "&" } else { "?" };
		format!("{}{separator}{}", req.url, qs.join("&"))
	};
	parts.push(shell_quote(&url));

	for (name, value) in req.headers.iter_sorted() {
		parts.push("-H".to_string());
		parts.push(shell_quote(&format!("{name}: {value}")));
	}

	if let Some(body) = &req.body {
		parts.push("--data-raw".to_string());
		parts.push(shell_quote(&body.as_text()));
	}

	parts.join(" ")
}

/// Tokenizes a `curl` command the way a POSIX shell would: single quotes
/// take their contents literally, double quotes likewise (comments and `$`
/// expansion are not a concern for our own rendered output), and a backslash
/// outside quotes escapes the following character. This lets `shell_quote`'s
/// `'\''`-style escaped apostrophe round-trip correctly.
fn tokenize(command: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut current = String::new();
	let mut has_token = false;
	let chars: Vec<char> = command.chars().collect();
	let mut i = 0;

	while i < chars.len() {
		let c = chars[i];
		match c {
			c if c.is_whitespace() => {
				if has_token {
					tokens.push(std::mem::take(&mut current));
					has_token = false;
				}
				i += 1;
			}
			'\'' => {
				has_token = true;
				i += 1;
				while i < chars.len() && chars[i] != '\'' {
					current.push(chars[i]);
					i += 1;
				}
				i += 1; // skip closing quote
			}
			'"' => {
				has_token = true;
				i += 1;
				while i < chars.len() && chars[i] != '"' {
					current.push(chars[i]);
					i += 1;
				}
				i += 1;
			}
			'\\' if i + 1 < chars.len() => {
				has_token = true;
				current.push(chars[i + 1]);
				i += 2;
			}
			c => {
				has_token = true;
				current.push(c);
				i += 1;
			}
		}
	}
	if has_token {
		tokens.push(current);
	}
	tokens
}

/// Parses a rendered `curl` command back into a [`Request`]. Round-trips
/// method, URL, headers, query parameters, and body semantics (§8).
pub fn parse_curl(command: &str) -> Option<Request> {
	let raw_tokens = tokenize(command.trim());
	if raw_tokens.first().map(String::as_str) != Some("curl") {
		return None;
	}

	let mut method = "GET".to_string();
	let mut url = None;
	let mut headers = HeaderBag::new();
	let mut body_text: Option<String> = None;

	let mut i = 1;
	while i < raw_tokens.len() {
		let tok = raw_tokens[i].as_str();
		match tok {
			"-X" | "--request" => {
				i += 1;
				if let Some(v) = raw_tokens.get(i) {
					method = v.to_uppercase();
				}
			}
			"-H" | "--header" => {
				i += 1;
				if let Some(v) = raw_tokens.get(i)
					&& let Some((name, value)) = v.split_once(':')
				{
					headers.insert(name.trim(), value.trim());
				}
			}
			"--data-raw" | "--data" | "-d" | "--data-binary" => {
				i += 1;
				if let Some(v) = raw_tokens.get(i) {
					body_text = Some(v.clone());
				}
			}
			other => {
				if url.is_none() && !other.starts_with('-') {
					url = Some(other.to_string());
				}
			}
		}
		i += 1;
	}

	let full_url = url?;
	let (base_url, query) = split_query(&full_url);

	Some(Request {
		method,
		url: base_url,
		headers,
		query,
		body: body_text.map(|t| Body::from_text(&t)),
		response: None,
	})
}

fn percent_decode(raw: &str) -> String {
	percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn split_query(url: &str) -> (String, IndexMap<String, String>) {
	match url.split_once('?') {
		None => (url.to_string(), IndexMap::new()),
		Some((base, qs)) => {
			let mut map = IndexMap::new();
			for pair in qs.split('&').filter(|p| !p.is_empty()) {
				match pair.split_once('=') {
					Some((k, v)) => {
						map.insert(percent_decode(k), percent_decode(v));
					}
					None => {
						map.insert(percent_decode(pair), String::new());
					}
				}
			}
			(base.to_string(), map)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_stable_header_order() {
		let mut req = Request::new("GET", "https://x/api/search");
		req.headers.insert("Authorization", "Bearer tok");
		req.headers.insert("Accept", "application/json");
		let rendered = render_curl(&req);
		let auth_idx = rendered.find("Accept").unwrap();
		let bearer_idx = rendered.find("Authorization").unwrap();
		assert!(auth_idx < bearer_idx);
	}

	#[test]
	fn round_trips_method_url_headers_query_and_body() {
		let mut req = Request::new("post", "https://x/api/login");
		req.headers.insert("Authorization", "Bearer tok_abc");
		req.query.insert("limit".to_string(), "10".to_string());
		req.body = Some(Body::from_text(r#"{"username":"u"}"#));

		let rendered = render_curl(&req);
		let parsed = parse_curl(&rendered).expect("parses");

		assert_eq!(parsed.method, "POST");
		assert_eq!(parsed.url, "https://x/api/login");
		assert_eq!(parsed.query.get("limit").map(String::as_str), Some("10"));
		assert_eq!(parsed.headers.get("authorization"), Some("Bearer tok_abc"));
		assert_eq!(parsed.body.unwrap().as_text(), r#"{"username":"u"}"#);
	}

	#[test]
	fn query_values_containing_delimiter_characters_round_trip() {
		let mut req = Request::new("get", "https://x/api/search");
		req.query.insert("q".to_string(), "a&b=c d".to_string());

		let rendered = render_curl(&req);
		assert!(!rendered.contains("a&b=c d"), "delimiter characters must be escaped in the rendered form");

		let parsed = parse_curl(&rendered).expect("parses");
		assert_eq!(parsed.query.get("q").map(String::as_str), Some("a&b=c d"));
	}
}
