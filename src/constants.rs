//! Global constants for ssh-copy.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Upload queue constants
/// Default number of uploads allowed in flight at once
pub const DEFAULT_CONCURRENT_UPLOADS: usize = 10;

/// Default delay inserted before each upload is dispatched (milliseconds)
pub const DEFAULT_DISPATCH_DELAY_MS: u64 = 50;

// SSH constants
/// Default SSH port
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Default time allowed for connect and handshake (milliseconds)
pub const DEFAULT_READY_TIMEOUT_MS: u64 = 20_000;

/// Permissions applied to directories created on the remote host
pub const REMOTE_DIR_MODE: i32 = 0o755;

/// Permissions applied to files created on the remote host
pub const REMOTE_FILE_MODE: i32 = 0o644;

/// SFTP status code for a missing path (`SSH_FX_NO_SUCH_FILE`)
pub const SFTP_NO_SUCH_FILE: i32 = 2;

/// Buffer size used when streaming a local file into a remote one (1MB)
pub const UPLOAD_BUFFER_SIZE: usize = 1024 * 1024;

// Timeout and retry constants
/// Maximum upload retry attempts inside the SSH session
pub const MAX_UPLOAD_RETRIES: usize = 3;

/// Base retry delay in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 250;

/// Maximum retry delay in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 30;

// Path resolution constants
/// Pattern used when no include pattern was given
pub const MATCH_ALL_PATTERN: &str = "**";

/// Prefix marking an explicitly relative remote path
pub const RELATIVE_PREFIX: &str = "./";
