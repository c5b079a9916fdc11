//! Security utilities.
//!
//! Credential scrubbing keeps passwords and passphrases out of logs,
//! error messages and the run summary.

pub mod credential_scrubber;

pub use credential_scrubber::{scrub_credentials, scrub_secrets};
