//! Raw HAR 1.2 JSON schema (§6.1), grounded on the field layout of a typical
//! HAR capture. Only `log.entries[*].request`, `log.entries[*].response`, and
//! `log.entries[*].startedDateTime` are semantically consumed (§6.1); the rest
//! is accepted so the parser does not choke on fields it doesn't use.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct HarFile {
	pub log: HarLog,
}

#[derive(Debug, Deserialize)]
pub struct HarLog {
	pub entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
pub struct HarEntry {
	#[serde(rename = "startedDateTime")]
	pub started_date_time: Option<String>,
	pub request: HarRequest,
	pub response: Option<HarResponse>,
}

#[derive(Debug, Deserialize)]
pub struct HarRequest {
	pub method: String,
	pub url: String,
	#[serde(default)]
	pub headers: Vec<HarHeader>,
	#[serde(default, rename = "queryString")]
	pub query_string: Vec<HarQueryParam>,
	#[serde(default, rename = "postData")]
	pub post_data: Option<HarPostData>,
}

#[derive(Debug, Deserialize)]
pub struct HarResponse {
	pub status: u16,
	#[serde(rename = "statusText", default)]
	pub status_text: String,
	#[serde(default)]
	pub headers: Vec<HarHeader>,
	pub content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
pub struct HarHeader {
	pub name: String,
	pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct HarQueryParam {
	pub name: String,
	pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct HarPostData {
	#[serde(rename = "mimeType", default)]
	pub mime_type: Option<String>,
	pub text: Option<String>,
	#[serde(default)]
	pub params: Vec<HarPostParam>,
}

#[derive(Debug, Deserialize)]
pub struct HarPostParam {
	pub name: String,
	#[serde(default)]
	pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct HarContent {
	#[serde(rename = "mimeType", default)]
	pub mime_type: Option<String>,
	pub text: Option<String>,
}
