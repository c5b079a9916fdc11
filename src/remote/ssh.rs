use std::fmt;
use std::fs;
use std::io::{self, BufReader, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use ssh2::{ErrorCode, OpenFlags, OpenType, Session, Sftp};
use tokio::time::sleep;

use crate::constants::{
    DEFAULT_READY_TIMEOUT_MS, MAX_UPLOAD_RETRIES, REMOTE_DIR_MODE, REMOTE_FILE_MODE,
    RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_SECS, SFTP_NO_SUCH_FILE, SSH_DEFAULT_PORT,
    UPLOAD_BUFFER_SIZE,
};
use crate::remote::pool::ConnectionPool;
use crate::remote::{CommandOutput, RemoteSession};
use crate::security::credential_scrubber::scrub_secrets;

/// SSH endpoint and credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub private_key_path: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub password: Option<String>,
    /// Time allowed for connect, handshake and authentication
    pub ready_timeout_ms: u64,
    /// Upload attempts per file before the job fails
    pub max_retries: usize,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: SSH_DEFAULT_PORT,
            username: String::new(),
            private_key_path: None,
            passphrase: None,
            password: None,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            max_retries: MAX_UPLOAD_RETRIES,
        }
    }
}

impl SshConfig {
    /// `user@host:port`, for logs and errors
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    /// Secret values that must never reach the logs
    pub fn secrets(&self) -> Vec<&str> {
        [self.password.as_deref(), self.passphrase.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<REDACTED>");
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("private_key_path", &self.private_key_path)
            .field("passphrase", &redact(&self.passphrase))
            .field("password", &redact(&self.password))
            .field("ready_timeout_ms", &self.ready_timeout_ms)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Retry configuration for uploads
#[derive(Clone, Debug)]
struct RetryConfig {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_UPLOAD_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_secs(RETRY_MAX_DELAY_SECS),
        }
    }
}

impl RetryConfig {
    /// Backoff before the attempt following `attempt` (1-based)
    fn delay_after(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        std::cmp::min(self.base_delay * 2u32.pow(exponent), self.max_delay)
    }
}

/// An authenticated SSH connection with its SFTP channel
struct Connection {
    session: Session,
    sftp: Sftp,
}

impl Connection {
    fn open(config: &SshConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.ready_timeout_ms);
        let tcp = connect_tcp(&config.host, config.port, timeout)?;

        let mut session = Session::new().context("Failed to create SSH session")?;
        session.set_tcp_stream(tcp);
        session.set_timeout(config.ready_timeout_ms.min(u32::MAX as u64) as u32);
        session.handshake().context("Failed to perform SSH handshake")?;

        if let Some(key) = &config.private_key_path {
            session
                .userauth_pubkey_file(&config.username, None, key, config.passphrase.as_deref())
                .context(format!("Failed to authenticate with private key: {}", key.display()))?;
        } else if let Some(password) = &config.password {
            session
                .userauth_password(&config.username, password)
                .context("Failed to authenticate with password")?;
        }

        if !session.authenticated() {
            return Err(anyhow!("Authentication failed"));
        }

        let sftp = session.sftp().context("Failed to create SFTP subsystem")?;

        // The ready timeout only covers connection setup.
        session.set_timeout(0);

        Ok(Connection { session, sftp })
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addresses = (host, port)
        .to_socket_addrs()
        .context(format!("Failed to resolve {}:{}", host, port))?;

    let mut last_error = None;
    for address in addresses {
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connection to {} failed: {}", address, e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e).context(format!("Failed to connect to {}:{}", host, port)),
        None => Err(anyhow!("No addresses found for {}:{}", host, port)),
    }
}

/// [`RemoteSession`] over SSH and SFTP.
///
/// libssh2 is blocking, so every operation runs on tokio's blocking pool on
/// a connection checked out of a [`ConnectionPool`]. The pool holds up to
/// `max_connections` authenticated connections, one per upload in flight.
pub struct SshSession {
    endpoint: String,
    secrets: Vec<String>,
    retry_config: RetryConfig,
    pool: ConnectionPool<Connection>,
    bytes_uploaded: Arc<AtomicU64>,
}

impl SshSession {
    /// Open and authenticate the first connection.
    ///
    /// Further connections, up to `max_connections`, are opened on demand
    /// with the same settings.
    pub async fn connect(config: SshConfig, max_connections: usize) -> Result<Self> {
        let endpoint = config.endpoint();
        info!("Connecting to {}", endpoint);

        let open_config = config.clone();
        let connection = tokio::task::spawn_blocking(move || Connection::open(&open_config))
            .await
            .context("SSH connect task failed")??;

        info!("Connected to {}", endpoint);

        let pool_config = config.clone();
        let pool = ConnectionPool::new(connection, max_connections, move || {
            Connection::open(&pool_config)
        });
        debug!("Using up to {} connections to {}", pool.size(), endpoint);

        Ok(Self {
            endpoint,
            secrets: config.secrets().into_iter().map(str::to_string).collect(),
            retry_config: RetryConfig {
                max_attempts: config.max_retries.max(1),
                ..Default::default()
            },
            pool,
            bytes_uploaded: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Bytes written to the remote host so far
    pub fn get_progress(&self) -> u64 {
        self.bytes_uploaded.load(Ordering::SeqCst)
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.pool.run(op).await
    }
}

fn is_missing(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::SFTP(code) if code == SFTP_NO_SUCH_FILE)
}

fn stat_exists(sftp: &Sftp, path: &str) -> Result<bool> {
    match sftp.stat(Path::new(path)) {
        Ok(_) => Ok(true),
        Err(e) if is_missing(&e) => Ok(false),
        Err(e) => Err(e).context(format!("Failed to stat {}", path)),
    }
}

fn create_dir_all(sftp: &Sftp, path: &str) -> Result<()> {
    for prefix in directory_prefixes(path) {
        match sftp.stat(Path::new(&prefix)) {
            Ok(stat) if stat.is_dir() => continue,
            Ok(_) => bail!("{} exists and is not a directory", prefix),
            Err(e) if is_missing(&e) => {
                debug!("Creating remote directory {}", prefix);
                sftp.mkdir(Path::new(&prefix), REMOTE_DIR_MODE)
                    .context(format!("Failed to create directory {}", prefix))?;
            }
            Err(e) => return Err(e).context(format!("Failed to stat {}", prefix)),
        }
    }
    Ok(())
}

fn upload_blocking(sftp: &Sftp, local: &Path, remote: &str) -> Result<u64> {
    let local_file = fs::File::open(local)
        .context(format!("Failed to open local file: {}", local.display()))?;

    let mut remote_file = sftp
        .open_mode(
            Path::new(remote),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            REMOTE_FILE_MODE,
            OpenType::File,
        )
        .context(format!("Failed to create remote file: {}", remote))?;

    let mut reader = BufReader::with_capacity(UPLOAD_BUFFER_SIZE, local_file);
    let written = io::copy(&mut reader, &mut remote_file)
        .context(format!("Failed to write to remote file: {}", remote))?;

    Ok(written)
}

/// Every directory on the way to `path`, shortest first.
///
/// Roots (`/`, `C:`, `//server`) are never included since they cannot be
/// created.
fn directory_prefixes(path: &str) -> Vec<String> {
    let path = path.trim_end_matches('/');
    let mut current = String::new();
    let mut skip = 0;

    let rest = if let Some(rest) = path.strip_prefix("//") {
        current.push_str("//");
        skip = 1;
        rest
    } else if let Some(rest) = path.strip_prefix('/') {
        current.push('/');
        rest
    } else if let Some(rest) = path.strip_prefix("./") {
        current.push_str("./");
        rest
    } else {
        path
    };

    let mut prefixes = Vec::new();
    let segments = rest.split('/').filter(|s| !s.is_empty() && *s != ".");
    for (index, segment) in segments.enumerate() {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);

        let is_drive = index == 0 && segment.len() == 2 && segment.ends_with(':');
        if index < skip || is_drive {
            continue;
        }
        prefixes.push(current.clone());
    }

    prefixes
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn check_exists(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.with_connection(move |conn| stat_exists(&conn.sftp, &path)).await
    }

    async fn create_directory(&self, path: &str) -> Result<()> {
        let path = path.to_string();
        self.with_connection(move |conn| create_dir_all(&conn.sftp, &path)).await
    }

    async fn upload_file(&self, local: &Path, remote: &str) -> Result<()> {
        let metadata = tokio::fs::metadata(local)
            .await
            .context(format!("Failed to get metadata for {}", local.display()))?;
        let file_size = metadata.len();

        debug!("Starting upload of {} ({} bytes) to sftp://{}{}",
               local.display(), file_size, self.endpoint, remote);

        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let local_path = local.to_path_buf();
            let remote_path = remote.to_string();
            let result = self
                .with_connection(move |conn| upload_blocking(&conn.sftp, &local_path, &remote_path))
                .await;

            match result {
                Ok(written) => {
                    self.bytes_uploaded.fetch_add(written, Ordering::SeqCst);
                    debug!("Uploaded {} to {} in {:?}", local.display(), remote, start_time.elapsed());
                    return Ok(());
                }
                Err(e) if attempt >= self.retry_config.max_attempts => {
                    return Err(e.context(format!(
                        "Upload of {} failed after {} attempts",
                        local.display(),
                        attempt
                    )));
                }
                Err(e) => {
                    let delay = self.retry_config.delay_after(attempt);
                    warn!("Upload attempt {} for {} failed, retrying in {:?}: {}",
                          attempt, remote, delay, scrub_secrets(&format!("{:#}", e), &self.secrets));
                    sleep(delay).await;
                }
            }
        }
    }

    async fn run_command(&self, command: &str) -> Result<CommandOutput> {
        let command = command.to_string();
        let secrets = self.secrets.clone();

        self.with_connection(move |conn| {
            let mut channel = conn.session.channel_session()
                .context("Failed to open SSH channel")?;
            channel.exec(&command)
                .context("Failed to start remote command")?;

            let mut stdout = String::new();
            channel.read_to_string(&mut stdout)
                .context("Failed to read command output")?;
            let mut stderr = String::new();
            channel.stderr().read_to_string(&mut stderr)
                .context("Failed to read command error output")?;

            channel.wait_close().context("Failed to close SSH channel")?;
            let status = channel.exit_status().context("Failed to read exit status")?;

            if status != 0 {
                bail!("Command exited with status {}: {}", status, scrub_secrets(stderr.trim(), &secrets));
            }

            Ok(CommandOutput { stdout, stderr })
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        let connections = self.pool.close()?;
        let endpoint = self.endpoint.clone();

        tokio::task::spawn_blocking(move || {
            let count = connections.len();
            for conn in connections {
                drop(conn.sftp);
                conn.session
                    .disconnect(None, "copy finished", None)
                    .context("Failed to disconnect SSH session")?;
            }
            info!("Disconnected {} connections from {}", count, endpoint);
            Ok(())
        })
        .await
        .context("SSH close task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_config_defaults() {
        let config = SshConfig::default();
        assert_eq!(config.port, 22);
        assert_eq!(config.ready_timeout_ms, 20_000);
        assert_eq!(config.max_retries, 3);
        assert!(config.private_key_path.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SshConfig {
            host: "deploy.example.com".to_string(),
            username: "deploy".to_string(),
            password: Some("s3cr3t-pass".to_string()),
            passphrase: Some("key-phrase".to_string()),
            ..Default::default()
        };

        let debug = format!("{:?}", config);
        assert!(debug.contains("deploy.example.com"));
        assert!(!debug.contains("s3cr3t-pass"));
        assert!(!debug.contains("key-phrase"));
        assert_eq!(config.secrets(), vec!["s3cr3t-pass", "key-phrase"]);
    }

    #[test]
    fn test_endpoint_format() {
        let config = SshConfig {
            host: "10.0.0.5".to_string(),
            port: 2222,
            username: "ci".to_string(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "ci@10.0.0.5:2222");
    }

    #[test]
    fn test_exponential_backoff() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_after(1), Duration::from_millis(250));
        assert_eq!(retry.delay_after(2), Duration::from_millis(500));
        assert_eq!(retry.delay_after(3), Duration::from_millis(1000));
        assert_eq!(retry.delay_after(40), Duration::from_secs(30));
    }

    #[test]
    fn test_directory_prefixes() {
        assert_eq!(directory_prefixes("/srv/www/css"), vec!["/srv", "/srv/www", "/srv/www/css"]);
        assert_eq!(directory_prefixes("./site/assets/"), vec!["./site", "./site/assets"]);
        assert_eq!(directory_prefixes("C:/deploy/app"), vec!["C:/deploy", "C:/deploy/app"]);
        assert_eq!(directory_prefixes("//fs01/drop/build"), vec!["//fs01/drop", "//fs01/drop/build"]);
        assert_eq!(directory_prefixes("logs"), vec!["logs"]);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = SshConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "nobody".to_string(),
            password: Some("unused".to_string()),
            ready_timeout_ms: 1_000,
            ..Default::default()
        };

        let result = SshSession::connect(config, 4).await;
        assert!(result.is_err());
        assert!(format!("{:#}", result.err().unwrap()).contains("Failed to connect to 127.0.0.1:1"));
    }
}
