use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{CopyTaskConfig, NumericInput};

/// Command-line arguments for ssh-copy.
///
/// Every option overrides the matching field of the YAML configuration file
/// given with `--config`; without a file the options alone describe the run.
#[derive(Parser, Debug)]
#[clap(name = "ssh-copy", about = "Copy files to a remote host over SSH")]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// SSH server hostname
    #[clap(long)]
    pub host: Option<String>,

    /// SSH server port (default: 22)
    #[clap(long)]
    pub port: Option<u16>,

    /// SSH username
    #[clap(short = 'u', long)]
    pub user: Option<String>,

    /// Path to private key file
    #[clap(short = 'k', long)]
    pub key: Option<PathBuf>,

    /// Passphrase for the private key
    #[clap(long, env = "SSH_COPY_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Password authentication
    #[clap(long, env = "SSH_COPY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Local folder to copy from
    #[clap(short = 's', long)]
    pub source: Option<String>,

    /// File patterns, may be repeated; prefix with ! to exclude
    #[clap(long = "contents", value_name = "PATTERN")]
    pub contents: Vec<String>,

    /// Remote folder to copy into
    #[clap(short = 't', long)]
    pub target: Option<String>,

    /// The remote host runs Windows
    #[clap(long)]
    pub windows_target: bool,

    /// Empty the target folder before copying
    #[clap(long)]
    pub clean: bool,

    /// Also remove hidden files when cleaning
    #[clap(long)]
    pub clean_hidden: bool,

    /// Fail a file whose target already exists instead of replacing it
    #[clap(long)]
    pub no_overwrite: bool,

    /// Fail when no file matches the patterns
    #[clap(long)]
    pub fail_on_empty: bool,

    /// Copy every file directly into the target folder
    #[clap(long)]
    pub flatten: bool,

    /// Maximum concurrent uploads (default: 10)
    #[clap(long)]
    pub concurrency: Option<String>,

    /// Delay before each upload starts, in milliseconds (default: 50)
    #[clap(long)]
    pub delay: Option<String>,

    /// Connection timeout in milliseconds (default: 20000)
    #[clap(long)]
    pub ready_timeout: Option<u64>,

    /// Write a JSON run summary to this path
    #[clap(long)]
    pub summary: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "ssh-copy.yaml")]
        path: PathBuf,
    },
}

impl Args {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_to(&self, config: &mut CopyTaskConfig) {
        let endpoint = &mut config.endpoint;
        if let Some(host) = &self.host {
            endpoint.host = host.clone();
        }
        if let Some(port) = self.port {
            endpoint.port = port;
        }
        if let Some(user) = &self.user {
            endpoint.username = user.clone();
        }
        if let Some(key) = &self.key {
            endpoint.private_key_path = Some(key.clone());
        }
        if let Some(passphrase) = &self.passphrase {
            endpoint.passphrase = Some(passphrase.clone());
        }
        if let Some(password) = &self.password {
            endpoint.password = Some(password.clone());
        }
        if let Some(timeout) = self.ready_timeout {
            endpoint.ready_timeout_ms = timeout;
        }

        if let Some(source) = &self.source {
            config.source_folder = source.clone();
        }
        if !self.contents.is_empty() {
            config.contents = self.contents.clone();
        }
        if let Some(target) = &self.target {
            config.target_folder = target.clone();
        }
        if let Some(concurrency) = &self.concurrency {
            config.concurrent_uploads = Some(NumericInput::from(concurrency.as_str()));
        }
        if let Some(delay) = &self.delay {
            config.delay_between_uploads = Some(NumericInput::from(delay.as_str()));
        }

        config.is_windows_on_target |= self.windows_target;
        config.clean_target_folder |= self.clean;
        config.clean_hidden_files_in_target |= self.clean_hidden;
        config.fail_on_empty_source |= self.fail_on_empty;
        config.flatten_folders |= self.flatten;
        if self.no_overwrite {
            config.overwrite = false;
        }
    }
}
