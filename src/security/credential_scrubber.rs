//! Credential scrubbing for log lines and error messages.
//!
//! Remote command output and transport errors can echo back what was sent to
//! the host. Everything that may contain a password or passphrase goes
//! through [`scrub_secrets`] before it is logged or reported.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Regex patterns for credentials that appear as `key=value` text
    static ref CREDENTIAL_PATTERNS: Vec<(Regex, &'static str)> = vec![
        // Passwords and passphrases
        (Regex::new(r"(?i)\b(password|passwd|pwd|passphrase)\s*[:=]\s*([^\s]+)").unwrap(),
         "$1=<REDACTED_PASSWORD>"),

        // sshpass -p <password>
        (Regex::new(r"(sshpass\s+-p)\s*(\S+)").unwrap(),
         "$1 <REDACTED_PASSWORD>"),

        // Credentials embedded in ssh/sftp URLs
        (Regex::new(r"(?i)\b(ssh|sftp|scp)://([^:/@\s]+):([^@\s]+)@").unwrap(),
         "$1://$2:<REDACTED_PASS>@"),
    ];
}

/// Scrub well-known credential shapes from a string.
///
/// ```
/// use ssh_copy::security::credential_scrubber::scrub_credentials;
///
/// let scrubbed = scrub_credentials("auth failed for passphrase=hunter2");
/// assert_eq!(scrubbed, "auth failed for passphrase=<REDACTED_PASSWORD>");
/// ```
pub fn scrub_credentials(input: &str) -> String {
    let mut result = input.to_string();

    for (pattern, replacement) in CREDENTIAL_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }

    result
}

/// Scrub credential shapes plus every occurrence of the given secret values.
pub fn scrub_secrets<S: AsRef<str>>(input: &str, secrets: &[S]) -> String {
    let mut result = scrub_credentials(input);

    for secret in secrets {
        let secret = secret.as_ref();
        if !secret.is_empty() {
            result = result.replace(secret, "<REDACTED>");
        }
    }

    result
}
