use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Header names that always survive filtering (§3), regardless of the
/// tracking-substring denylist.
pub const PRESERVED_AUTH_HEADERS: &[&str] = &[
	"authorization",
	"cookie",
	"x-api-key",
	"x-auth-token",
	"x-access-token",
	"x-csrf-token",
	"x-xsrf-token",
	"x-requested-with",
];

/// Case-insensitive header map that preserves the original casing of the
/// first-seen name for emission (§3: "case-insensitive keys but preserving
/// original casing for emission").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderBag(IndexMap<String, String>);

impl HeaderBag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
		let name = name.into();
		if let Some(existing_key) = self.0.keys().find(|k| k.eq_ignore_ascii_case(&name)).cloned() {
			self.0.insert(existing_key, value.into());
		} else {
			self.0.insert(name, value.into());
		}
	}

	pub fn remove_ignore_case(&mut self, name: &str) {
		if let Some(key) = self.0.keys().find(|k| k.eq_ignore_ascii_case(name)).cloned() {
			self.0.shift_remove(&key);
		}
	}

	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	/// Stable iteration order: alphabetical by lowercased name, original case preserved (§4.2).
	pub fn iter_sorted(&self) -> impl Iterator<Item = (&str, &str)> {
		let mut entries: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
		entries.sort_by_key(|(k, _)| k.to_ascii_lowercase());
		entries.into_iter()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn is_preserved_auth_header(name: &str) -> bool {
		PRESERVED_AUTH_HEADERS.iter().any(|p| p.eq_ignore_ascii_case(name))
	}
}

/// The structured interpretation of a request/response body (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Body {
	Json(serde_json::Value),
	Form(IndexMap<String, String>),
	Text(String),
}

impl Body {
	/// Best-effort parse, degrading to raw text on failure per §4.1 ("never fatal").
	pub fn from_text(raw: &str) -> Self {
		match serde_json::from_str::<serde_json::Value>(raw) {
			Ok(v) => Body::Json(v),
			Err(_) => Body::Text(raw.to_string()),
		}
	}

	pub fn from_form(params: IndexMap<String, String>) -> Self {
		Body::Form(params)
	}

	pub fn as_text(&self) -> String {
		match self {
			Body::Json(v) => v.to_string(),
			Body::Form(m) => m.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&"),
			Body::Text(s) => s.clone(),
		}
	}

	/// Every substring of interest for classification and provenance search:
	/// the whole body plus, for JSON, every leaf string value individually.
	pub fn searchable_strings(&self) -> Vec<String> {
		let mut out = vec![self.as_text()];
		if let Body::Json(v) = self {
			collect_json_leaf_strings(v, &mut out);
		}
		out
	}
}

fn collect_json_leaf_strings(value: &serde_json::Value, out: &mut Vec<String>) {
	match value {
		serde_json::Value::String(s) => out.push(s.clone()),
		serde_json::Value::Array(items) => items.iter().for_each(|v| collect_json_leaf_strings(v, out)),
		serde_json::Value::Object(map) => map.values().for_each(|v| collect_json_leaf_strings(v, out)),
		_ => {}
	}
}

/// A canonical HTTP request (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
	pub method: String,
	pub url: String,
	pub headers: HeaderBag,
	pub query: IndexMap<String, String>,
	pub body: Option<Body>,
	pub response: Option<Response>,
}

impl Request {
	pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			method: method.into(),
			url: url.into(),
			headers: HeaderBag::new(),
			query: IndexMap::new(),
			body: None,
			response: None,
		}
	}

	pub fn is_script_asset(&self) -> bool {
		self.url_path().ends_with(".js")
	}

	pub fn url_path(&self) -> String {
		url::Url::parse(&self.url).map(|u| u.path().to_string()).unwrap_or_else(|_| self.url.clone())
	}

	pub fn content_type(&self) -> Option<&str> {
		self.headers.get("content-type")
	}

	pub fn response_content_type(&self) -> Option<&str> {
		self.response.as_ref().and_then(|r| r.headers.get("content-type"))
	}

	/// Every string on this request and its captured response worth searching
	/// for provenance and classification (§4.3, §4.5).
	pub fn searchable_strings(&self) -> Vec<String> {
		let mut out = vec![self.url.clone()];
		out.extend(self.query.values().cloned());
		out.extend(self.headers.iter().map(|(_, v)| v.to_string()));
		if let Some(body) = &self.body {
			out.extend(body.searchable_strings());
		}
		out
	}
}

/// A captured response (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
	pub status: u16,
	pub status_text: String,
	pub headers: HeaderBag,
	pub body_text: Option<String>,
	pub body_json: Option<serde_json::Value>,
}

impl Response {
	pub fn is_json_like(content_type: Option<&str>) -> bool {
		matches!(content_type, Some(ct) if ct.contains("application/json") || ct.contains("text/json"))
	}

	pub fn is_html(&self) -> bool {
		self.headers.get("content-type").is_some_and(|ct| ct.contains("text/html"))
	}

	pub fn is_auth_error(&self) -> bool {
		self.status == 401 || self.status == 403
	}

	/// Every string this response could supply downstream (§4.5): body text,
	/// every JSON leaf, and header values.
	pub fn searchable_strings(&self) -> Vec<String> {
		let mut out = Vec::new();
		if let Some(text) = &self.body_text {
			out.push(text.clone());
		}
		if let Some(json) = &self.body_json {
			collect_json_leaf_strings(json, &mut out);
		}
		out.extend(self.headers.iter().map(|(_, v)| v.to_string()));
		out
	}
}

/// A cookie bundle entry (§3, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieEntry {
	pub name: String,
	pub value: String,
	pub domain: Option<String>,
	pub path: Option<String>,
	pub secure: Option<bool>,
	pub http_only: Option<bool>,
	pub expires: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_bag_is_case_insensitive_but_case_preserving() {
		let mut headers = HeaderBag::new();
		headers.insert("Authorization", "Bearer tok");
		headers.insert("AUTHORIZATION", "Bearer tok2");
		assert_eq!(headers.get("authorization"), Some("Bearer tok2"));
		assert_eq!(headers.len(), 1);
		assert_eq!(headers.iter().next().unwrap().0, "Authorization");
	}

	#[test]
	fn preserved_auth_headers_survive_case_variance() {
		assert!(HeaderBag::is_preserved_auth_header("X-CSRF-Token"));
		assert!(!HeaderBag::is_preserved_auth_header("sec-fetch-mode"));
	}
}
