//! The pluggable code-emission backend contract (§1, §9 "Code emission"):
//! the structured walk is fixed, the target syntax is not.

use super::ir::EmittedFile;

/// Renders a structured [`EmittedFile`] into source text. Concrete output
/// language is a backend concern; the analysis core only guarantees the
/// structure (functions in topological order, a `main` entry, determinism).
pub trait EmitBackend {
	fn render(&self, file: &EmittedFile) -> String;
}
