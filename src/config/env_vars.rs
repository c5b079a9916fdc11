use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// Matches `${VAR}`, `$VAR` and `%VAR%` references
    static ref ENV_REFERENCE: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)|%([A-Za-z_][A-Za-z0-9_()]*)%")
            .expect("environment reference pattern is valid");
}

/// Expand environment variable references in a configured path.
///
/// Handles Unix (`$VAR`, `${VAR}`) and Windows (`%VAR%`) styles. References
/// to variables that are not set are left untouched so the resulting path
/// error still names them.
pub fn expand_env_vars(path: &str) -> String {
    expand_with(path, |name| std::env::var(name).ok())
}

/// Expand references using the given lookup instead of the process environment.
pub fn expand_with<F>(path: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let expanded: Cow<'_, str> = ENV_REFERENCE.replace_all(path, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();

        lookup(name).unwrap_or_else(|| caps[0].to_string())
    });

    expanded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "HOME" => Some("/home/builder".to_string()),
            "BUILD_DIR" => Some("/agent/_work/1/s".to_string()),
            "USERPROFILE" => Some("C:\\Users\\builder".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_dollar_style() {
        assert_eq!(expand_with("$HOME/drop", lookup), "/home/builder/drop");
        assert_eq!(expand_with("$BUILD_DIR-out", lookup), "/agent/_work/1/s-out");
    }

    #[test]
    fn test_expand_brace_style() {
        assert_eq!(expand_with("${BUILD_DIR}/bin", lookup), "/agent/_work/1/s/bin");
    }

    #[test]
    fn test_expand_windows_style() {
        assert_eq!(
            expand_with("%USERPROFILE%\\artifacts", lookup),
            "C:\\Users\\builder\\artifacts"
        );
    }

    #[test]
    fn test_unknown_variables_are_left_alone() {
        assert_eq!(expand_with("$MISSING/x", lookup), "$MISSING/x");
        assert_eq!(expand_with("%MISSING%\\x", lookup), "%MISSING%\\x");
        assert_eq!(expand_with("${MISSING}", lookup), "${MISSING}");
    }

    #[test]
    fn test_plain_paths_pass_through() {
        assert_eq!(expand_with("/opt/app/dist", lookup), "/opt/app/dist");
        assert_eq!(expand_with("100%", lookup), "100%");
        assert_eq!(expand_with("$", lookup), "$");
    }
}
