//! A concrete emission backend: browser-`fetch`-based JavaScript. One of
//! potentially several backends the pluggable emitter contract (§9) allows;
//! this is the only one this crate ships.

use super::backend::EmitBackend;
use super::ir::{EmittedFile, EmittedFunction};

fn escape_template(raw: &str) -> String {
	raw.replace('\\', "\\\\").replace('`', "\\`").replace("${", "\\${")
}

/// Replaces every occurrence of a dynamic-part literal with a `${name}`
/// template interpolation, so the emitted request is parameterized instead
/// of hardcoded to the captured values.
fn render_template(raw: &str, substitutions: &[(String, String)]) -> String {
	let mut text = escape_template(raw);
	for (literal, name) in substitutions {
		text = text.replace(&escape_template(literal), &format!("${{{name}}}"));
	}
	format!("`{text}`")
}

fn render_headers(func: &EmittedFunction) -> String {
	let Some(req) = &func.request else {
		return "{}".to_string();
	};
	if req.headers.is_empty() {
		return "{}".to_string();
	}
	let entries: Vec<String> = req
		.headers
		.iter_sorted()
		.map(|(name, value)| format!("      {:?}: {}", name, render_template(value, &func.substitutions)))
		.collect();
	format!("{{\n{}\n    }}", entries.join(",\n"))
}

fn render_body(func: &EmittedFunction) -> Option<String> {
	let req = func.request.as_ref()?;
	let body = req.body.as_ref()?;
	Some(render_template(&body.as_text(), &func.substitutions))
}

fn render_function(func: &EmittedFunction) -> String {
	let params = func.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(", ");

	if func.request.is_none() {
		let token = func.not_found_token.as_deref().unwrap_or("unknown");
		return format!(
			"// WARNING: Could not resolve {token}\nasync function {name}({params}) {{\n  throw new Error({token_literal:?});\n}}\n",
			name = func.name,
			token_literal = format!("unresolved dependency: {token}"),
		);
	}

	let req = func.request.as_ref().unwrap();
	let url = render_template(&req.url, &func.substitutions);
	let headers = render_headers(func);
	let body_line = match render_body(func) {
		Some(body) => format!("\n      body: {body},"),
		None => String::new(),
	};

	let extractions = func
		.extracted
		.iter()
		.map(|f| format!("      {}: {},", f.name, f.accessor))
		.collect::<Vec<_>>()
		.join("\n");

	format!(
		"async function {name}({params}) {{\n  const res = await fetch({url}, {{\n    method: {method:?},\n    headers: {headers},{body_line}\n  }});\n  const bodyText = await res.text();\n  let body = {{}};\n  try {{ body = JSON.parse(bodyText); }} catch {{}}\n  return {{\n    status: res.status,\n    headers: Object.fromEntries(res.headers),\n{extractions}\n  }};\n}}\n",
		name = func.name,
		method = req.method.to_uppercase(),
	)
}

pub struct JsBackend;

impl EmitBackend for JsBackend {
	fn render(&self, file: &EmittedFile) -> String {
		let mut out = String::new();
		out.push_str(&format!("// {}\n", file.banner));
		out.push_str(&format!("// prompt: {}\n", file.metadata.prompt));
		out.push_str(&format!("// generated: {}\n", file.metadata.generated_date));
		out.push_str(&format!("// session: {}\n\n", file.metadata.session_id));

		if !file.cookies.is_empty() {
			out.push_str("// cookie dependencies:\n");
			for cookie in &file.cookies {
				out.push_str(&format!("// - {} = {}\n", cookie.name, cookie.value));
			}
			out.push('\n');
		}

		out.push_str(
			"function extractFromText(text, literal) {\n  return text.includes(literal) ? literal : undefined;\n}\n\n",
		);

		for func in &file.functions {
			out.push_str(&render_function(func));
			out.push('\n');
		}

		let result_vars: std::collections::HashMap<&str, String> = file
			.functions
			.iter()
			.enumerate()
			.map(|(i, func)| (func.name.as_str(), format!("r{i}")))
			.collect();

		let call_chain: Vec<String> = file
			.functions
			.iter()
			.enumerate()
			.map(|(i, func)| {
				let args: Vec<String> = func
					.params
					.iter()
					.map(|p| match (&p.produced_by_function, &p.default_literal) {
						(Some(producer), _) => {
							let var = result_vars.get(producer.as_str()).cloned().unwrap_or_else(|| producer.clone());
							format!("{var}.{}", p.name)
						}
						(None, Some(default)) => format!("{default:?}"),
						(None, None) => "undefined".to_string(),
					})
					.collect();
				format!("  const r{i} = await {}({});", func.name, args.join(", "))
			})
			.collect();

		out.push_str("async function main() {\n");
		out.push_str(&call_chain.join("\n"));
		out.push('\n');
		out.push_str(&format!("  return r{};\n}}\n\n", file.functions.len().saturating_sub(1)));

		let exports = std::iter::once("main".to_string())
			.chain(file.functions.iter().map(|f| f.name.clone()))
			.collect::<Vec<_>>()
			.join(", ");
		out.push_str(&format!("module.exports = {{ {exports} }};\n"));

		out
	}
}
