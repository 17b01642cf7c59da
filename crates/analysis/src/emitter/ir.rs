//! Structured intermediate representation the emitter builds before handing
//! it to a backend (§9: "use a structured source-tree builder so invariants
//! ... are checkable at emission time").

use crate::dag::NodeKind;
use crate::request::Request;

#[derive(Debug, Clone)]
pub struct Param {
	pub name: String,
	/// `Some` for input variables and cookie-sourced values, which are passed
	/// as literals (§4.11 item 2 and item 4).
	pub default_literal: Option<String>,
	/// `Some(function name)` when this param is threaded from a predecessor
	/// node's call result (§4.11: "threading arguments from its dependencies'
	/// return values").
	pub produced_by_function: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractedField {
	pub name: String,
	/// A backend-rendered accessor expression into the parsed response body,
	/// e.g. `body.access_token`, or a literal fallback when no JSON path matches.
	pub accessor: String,
}

#[derive(Debug, Clone)]
pub struct EmittedFunction {
	pub name: String,
	pub kind: NodeKind,
	pub params: Vec<Param>,
	/// Present for `curl`/`master_curl` nodes; `None` for a `not_found` stub.
	pub request: Option<Request>,
	/// Text substitutions applied to the request's URL/headers/body: dynamic
	/// part literal -> parameter name, so the emitted request is templated
	/// rather than hardcoded to the captured values.
	pub substitutions: Vec<(String, String)>,
	pub extracted: Vec<ExtractedField>,
	/// Set only for a `not_found` stub (§4.11 item 5).
	pub not_found_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CookieAnnotation {
	pub name: String,
	pub value: String,
}

#[derive(Debug, Clone)]
pub struct Metadata {
	pub prompt: String,
	pub generated_date: String,
	pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct EmittedFile {
	pub banner: String,
	pub metadata: Metadata,
	pub cookies: Vec<CookieAnnotation>,
	pub functions: Vec<EmittedFunction>,
	pub master_function: String,
}
