use std::path::{Component, Path, PathBuf};

/// Default directory used when a configured output path is rejected or unwritable.
pub const SAFE_OUTPUT_FALLBACK: &str = ".harvest/output";

/// Expands a leading `~` to the user's home directory, as `paths.*` config values document (§6.4).
pub fn expand_home(raw: &str) -> PathBuf {
	PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Rejects paths containing `..` components (directory traversal), per §5's
/// "directory path is validated to reject traversal".
pub fn rejects_traversal(path: &Path) -> bool {
	path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Resolves a configured output directory, falling back to a safe default
/// (warn, don't fail) when the configured path attempts traversal or is not writable.
///
/// The fallback directory is created (and re-created on every call) so callers can write
/// into it immediately.
pub fn resolve_output_dir(configured: Option<&str>) -> PathBuf {
	if let Some(raw) = configured {
		let expanded = expand_home(raw);
		if !rejects_traversal(&expanded) && is_or_can_be_writable(&expanded) {
			return expanded;
		}
		tracing::warn!(path = %expanded.display(), "output path unsafe or unwritable, falling back");
	}
	let fallback = expand_home(SAFE_OUTPUT_FALLBACK);
	let _ = std::fs::create_dir_all(&fallback);
	fallback
}

fn is_or_can_be_writable(path: &Path) -> bool {
	std::fs::create_dir_all(path).is_ok()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn traversal_is_rejected() {
		assert!(rejects_traversal(Path::new("../../etc")));
		assert!(!rejects_traversal(Path::new("a/b/c")));
	}

	#[test]
	fn traversal_triggers_fallback() {
		let dir = resolve_output_dir(Some("../escape"));
		assert!(dir.ends_with(".harvest/output"));
	}
}
