//! Cookie bundle parsing (§6.2): a JSON document whose keys are cookie names
//! and whose values are either a literal string (interpreted as `.value`) or
//! a full cookie object.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::request::CookieEntry;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCookieValue {
	Literal(String),
	Full {
		value: String,
		domain: Option<String>,
		path: Option<String>,
		secure: Option<bool>,
		#[serde(rename = "httpOnly")]
		http_only: Option<bool>,
		expires: Option<String>,
	},
}

/// An ordered jar of cookie entries, keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieJar(IndexMap<String, CookieEntry>);

impl CookieJar {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
		let raw: IndexMap<String, RawCookieValue> = serde_json::from_slice(bytes)?;
		let mut jar = IndexMap::new();
		for (name, value) in raw {
			let entry = match value {
				RawCookieValue::Literal(value) => CookieEntry {
					name: name.clone(),
					value,
					domain: None,
					path: None,
					secure: None,
					http_only: None,
					expires: None,
				},
				RawCookieValue::Full { value, domain, path, secure, http_only, expires } => {
					CookieEntry { name: name.clone(), value, domain, path, secure, http_only, expires }
				}
			};
			jar.insert(name, entry);
		}
		Ok(Self(jar))
	}

	pub fn iter(&self) -> impl Iterator<Item = &CookieEntry> {
		self.0.values()
	}

	pub fn get(&self, name: &str) -> Option<&CookieEntry> {
		self.0.get(name)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The first cookie whose value exactly matches `needle`, if any (§4.5 step 1).
	pub fn find_by_value(&self, needle: &str) -> Option<&CookieEntry> {
		self.0.values().find(|c| c.value == needle)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_literal_and_full_cookie_shapes() {
		let json = br#"{
			"session_id": {"value": "sess_abc123"},
			"csrf_token": "csrf_xyz789"
		}"#;
		let jar = CookieJar::parse(json).unwrap();
		assert_eq!(jar.len(), 2);
		assert_eq!(jar.get("session_id").unwrap().value, "sess_abc123");
		assert_eq!(jar.get("csrf_token").unwrap().value, "csrf_xyz789");
	}

	#[test]
	fn finds_cookie_by_value() {
		let jar = CookieJar::parse(br#"{"a": "needle"}"#).unwrap();
		assert_eq!(jar.find_by_value("needle").unwrap().name, "a");
		assert!(jar.find_by_value("missing").is_none());
	}
}
