//! Rewrites interpreter error text so staged file paths never reach callers.

use std::path::Path;

/// Token substituted for the staged script path.
pub const PATH_PLACEHOLDER: &str = "line";

/// Replace every verbatim occurrence of `script_path` in `message` with
/// [`PATH_PLACEHOLDER`].
///
/// Purely textual: the rest of the message, including `:line:col`
/// suffixes, is preserved. A message that does not contain the path is
/// returned unchanged.
pub fn sanitize(message: &str, script_path: &Path) -> String {
    sanitize_str(message, &script_path.to_string_lossy())
}

/// [`sanitize`] for a path already rendered as a string.
pub fn sanitize_str(message: &str, script_path: &str) -> String {
    if script_path.is_empty() {
        return message.to_string();
    }
    message.replace(script_path, PATH_PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATH: &str = "/tmp/exec_script8Hq2.rhai";

    #[test]
    fn test_replaces_path_with_placeholder() {
        let msg = format!("{PATH}:3:5: Syntax error: unexpected ')'");
        assert_eq!(
            sanitize(&msg, Path::new(PATH)),
            "line:3:5: Syntax error: unexpected ')'"
        );
    }

    #[test]
    fn test_message_without_path_is_unchanged() {
        let msg = "Function not found: foo";
        assert_eq!(sanitize(msg, Path::new(PATH)), msg);
    }

    #[test]
    fn test_is_idempotent() {
        let msg = format!("{PATH}:1:1: bad; see {PATH}");
        let once = sanitize(&msg, Path::new(PATH));
        let twice = sanitize(&once, Path::new(PATH));
        assert_eq!(once, twice);
        assert!(!once.contains("/tmp/"));
    }

    #[test]
    fn test_empty_path_is_noop() {
        assert_eq!(sanitize_str("abc", ""), "abc");
    }
}
