//! Remote host primitives used by a copy run.
//!
//! The queue only ever talks to a [`RemoteSession`]. [`ssh::SshSession`]
//! provides it over SSH/SFTP; tests substitute in-memory fakes.
//!
//! ## Concurrency contract
//!
//! One session is shared by every in-flight upload. Implementations must be
//! safe to call concurrently and must actually serve concurrent calls in
//! parallel. [`ssh::SshSession`] does so with a pool of connections sized to
//! the queue concurrency.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

pub(crate) mod pool;
/// SSH session implementation over libssh2
pub mod ssh;

/// Output of a remote command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Operations a copy run needs from the remote host.
#[async_trait]
pub trait RemoteSession: Send + Sync + 'static {
    /// Does `path` exist on the remote host?
    async fn check_exists(&self, path: &str) -> Result<bool>;

    /// Create `path`, including missing parents.
    async fn create_directory(&self, path: &str) -> Result<()>;

    /// Copy a local file to `remote`, replacing any existing file.
    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()>;

    /// Run a shell command; a non-zero exit status is an error.
    async fn run_command(&self, command: &str) -> Result<CommandOutput>;

    /// Close the connection. Further calls fail.
    async fn close(&self) -> Result<()>;
}
