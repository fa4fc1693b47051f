//! `${env.NAME}` / `${env.NAME:-default}` substitution (§4.1, §6).

use once_cell::sync::Lazy;
use regex::Regex;

static ENV_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{env\.([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("valid"));

/// Expand every `${env.NAME}` / `${env.NAME:-default}` token in `input`
/// against the process environment. An unknown variable without a default
/// expands to the empty string.
///
/// Idempotent: running this again over an already-expanded string is a
/// no-op, since no `${env.*}` token can remain (§8 invariant).
pub fn expand(input: &str) -> String {
    ENV_TOKEN
        .replace_all(input, |caps: &regex::Captures| {
            let name = &caps[1];
            let default = caps.get(3).map(|m| m.as_str());
            std::env::var(name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_var() {
        std::env::set_var("IMPOSTER_TEST_VAR", "hello");
        assert_eq!(expand("x=${env.IMPOSTER_TEST_VAR}"), "x=hello");
        std::env::remove_var("IMPOSTER_TEST_VAR");
    }

    #[test]
    fn unknown_var_without_default_is_empty() {
        std::env::remove_var("IMPOSTER_TEST_MISSING");
        assert_eq!(expand("x=${env.IMPOSTER_TEST_MISSING}"), "x=");
    }

    #[test]
    fn unknown_var_with_default() {
        std::env::remove_var("IMPOSTER_TEST_MISSING2");
        assert_eq!(expand("x=${env.IMPOSTER_TEST_MISSING2:-fallback}"), "x=fallback");
    }

    #[test]
    fn idempotent_on_already_expanded_string() {
        let once = expand("a=${env.NOPE:-b}");
        let twice = expand(&once);
        assert_eq!(once, twice);
        assert!(!twice.contains("${env."));
    }
}
