#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
	pub role: Role,
	pub content: String,
}

impl Message {
	pub fn system(content: impl Into<String>) -> Self {
		Self {
			role: Role::System,
			content: content.into(),
		}
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self {
			role: Role::User,
			content: content.into(),
		}
	}
}

/// A single function-call declaration (§6.3): `callFunction(messages, functionDef, resultSchema)`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FunctionDef {
	pub name: String,
	pub description: String,
	/// JSON-schema parameter shape the provider must return arguments against.
	pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct Completion {
	pub content: String,
}
