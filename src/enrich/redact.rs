//! Secret redaction for enrichment output.
//!
//! External summarizer tools echo their command lines and environment into
//! stdout often enough that everything is scrubbed before storage: known
//! credential shapes by pattern, plus the literal values of any
//! secret-looking environment variables present at run time.

use std::env;

use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Env var name fragments that mark a value as secret.
const SECRET_NAME_TOKENS: &[&str] = &[
    "TOKEN",
    "SECRET",
    "PASSWORD",
    "API_KEY",
    "ACCESS_KEY",
    "PRIVATE_KEY",
];

/// Minimum length for an env value to be treated as a redactable secret;
/// shorter values would shred ordinary prose.
const MIN_SECRET_LEN: usize = 6;

fn credential_patterns() -> Vec<(Regex, String)> {
    [
        (r"glpat-[A-Za-z0-9._-]+", "glpat-"),
        (r"sk-[A-Za-z0-9][A-Za-z0-9_-]{8,}", "sk-"),
        (r"(--gitlab\.personal_access_token=)\S+", "$1"),
        (r"(OPENAI_API_KEY\s*=\s*)\S+", "$1"),
        (r"(PRIVATE-TOKEN:\s*)\S+", "$1"),
    ]
    .iter()
    .map(|(pattern, keep)| {
        let re = Regex::new(pattern).expect("credential pattern compiles");
        (re, format!("{keep}{REDACTED}"))
    })
    .collect()
}

/// Values of secret-looking environment variables, longest first so that
/// substring secrets never leave partial residue.
pub fn collect_secret_values() -> Vec<String> {
    let mut secrets: Vec<String> = env::vars()
        .filter(|(key, value)| {
            let upper = key.to_uppercase();
            !value.trim().is_empty()
                && value.trim().len() >= MIN_SECRET_LEN
                && SECRET_NAME_TOKENS.iter().any(|t| upper.contains(t))
        })
        .map(|(_, value)| value.trim().to_string())
        .collect();
    secrets.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    secrets.dedup();
    secrets
}

/// Scrub credential shapes and live secret values from `text`.
pub fn redact_secrets(text: &str) -> String {
    let mut redacted = text.to_string();
    for (pattern, replacement) in credential_patterns() {
        redacted = pattern.replace_all(&redacted, replacement.as_str()).into_owned();
    }
    for secret in collect_secret_values() {
        redacted = redacted.replace(&secret, REDACTED);
    }
    redacted
}

/// Remove ANSI escape sequences.
pub fn strip_ansi(text: &str) -> String {
    let re = Regex::new(r"\x1B\[[0-9;]*[A-Za-z]").expect("ansi pattern compiles");
    re.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_token_shapes_are_redacted() {
        let input = "auth with glpat-AbC123_def and sk-proj4567890123 done";
        let output = redact_secrets(input);
        assert!(!output.contains("glpat-AbC123_def"));
        assert!(!output.contains("sk-proj4567890123"));
        assert!(output.contains("glpat-[REDACTED]"));
    }

    #[test]
    fn test_cli_arg_token_is_redacted_but_flag_kept() {
        let input = "ran: tool --gitlab.personal_access_token=abc123xyz --verbose";
        let output = redact_secrets(input);
        assert!(output.contains("--gitlab.personal_access_token=[REDACTED]"));
        assert!(!output.contains("abc123xyz"));
        assert!(output.contains("--verbose"));
    }

    #[test]
    fn test_env_secret_value_is_redacted() {
        // Modifies process env; value is unique enough not to collide.
        let value = "hunter2-very-secret-value-93412";
        std::env::set_var("MERGEMAP_TEST_TOKEN", value);
        let output = redact_secrets(&format!("leaked: {value}!"));
        std::env::remove_var("MERGEMAP_TEST_TOKEN");
        assert_eq!(output, "leaked: [REDACTED]!");
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m text"), "red text");
        assert_eq!(strip_ansi("plain"), "plain");
    }
}
