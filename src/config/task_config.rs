use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::env_vars::expand_env_vars;
use crate::constants::MATCH_ALL_PATTERN;
use crate::remote::ssh::SshConfig;
use crate::transfer::queue::QueueConfig;

/// A numeric setting as it arrives from YAML or the command line.
///
/// Both `concurrent_uploads: 4` and `concurrent_uploads: "4"` are accepted.
/// Any other YAML value (a float, a bool, a list) still loads and is handed
/// to [`QueueConfig::from_inputs`], which falls back to the documented default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    Number(i64),
    Text(String),
    Other(serde_yaml::Value),
}

impl NumericInput {
    /// Interpret the input as an integer, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NumericInput::Number(n) => Some(*n),
            NumericInput::Text(s) => s.trim().parse::<i64>().ok(),
            NumericInput::Other(_) => None,
        }
    }
}

impl From<&str> for NumericInput {
    fn from(value: &str) -> Self {
        NumericInput::Text(value.to_string())
    }
}

impl std::fmt::Display for NumericInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericInput::Number(n) => write!(f, "{}", n),
            NumericInput::Text(s) => write!(f, "{}", s),
            NumericInput::Other(value) => match serde_yaml::to_string(value) {
                Ok(yaml) => write!(f, "{}", yaml.trim()),
                Err(_) => write!(f, "{:?}", value),
            },
        }
    }
}

/// Settings for one copy run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyTaskConfig {
    /// SSH endpoint and credentials
    pub endpoint: SshConfig,
    /// Local folder the patterns are evaluated against
    pub source_folder: String,
    /// Include patterns; a leading `!` turns a pattern into an exclude
    pub contents: Vec<String>,
    /// Remote folder the files are copied into
    pub target_folder: String,
    /// The remote host runs Windows (affects the clean command)
    pub is_windows_on_target: bool,
    /// Remove the contents of the target folder before copying
    pub clean_target_folder: bool,
    /// Also remove hidden files when cleaning
    pub clean_hidden_files_in_target: bool,
    /// Replace files that already exist on the remote host
    pub overwrite: bool,
    /// Fail the task when no file matches
    pub fail_on_empty_source: bool,
    /// Copy every file directly into the target folder
    pub flatten_folders: bool,
    /// Maximum uploads in flight (default 10)
    pub concurrent_uploads: Option<NumericInput>,
    /// Delay before each upload starts, in milliseconds (default 50)
    pub delay_between_uploads: Option<NumericInput>,
}

impl Default for CopyTaskConfig {
    fn default() -> Self {
        Self {
            endpoint: SshConfig::default(),
            source_folder: String::new(),
            contents: vec![MATCH_ALL_PATTERN.to_string()],
            target_folder: String::new(),
            is_windows_on_target: false,
            clean_target_folder: false,
            clean_hidden_files_in_target: false,
            overwrite: true,
            fail_on_empty_source: false,
            flatten_folders: false,
            concurrent_uploads: None,
            delay_between_uploads: None,
        }
    }
}

impl CopyTaskConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CopyTaskConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Example configuration written by `init-config`
    pub fn example() -> Self {
        Self {
            endpoint: SshConfig {
                host: "deploy.example.com".to_string(),
                username: "deploy".to_string(),
                private_key_path: Some(PathBuf::from("~/.ssh/id_ed25519")),
                ..SshConfig::default()
            },
            source_folder: "$BUILD_DIR/dist".to_string(),
            contents: vec!["**".to_string(), "!**/*.map".to_string()],
            target_folder: "/srv/app/releases/current".to_string(),
            concurrent_uploads: Some(NumericInput::Number(10)),
            delay_between_uploads: Some(NumericInput::Number(50)),
            ..Self::default()
        }
    }

    /// Expand environment variable references in local paths.
    ///
    /// Passwords and passphrases are taken literally; they come from the
    /// environment through the command line instead.
    pub fn process_environment_variables(&mut self) {
        self.source_folder = expand_env_vars(&self.source_folder);

        if let Some(key) = &self.endpoint.private_key_path {
            let expanded = expand_env_vars(&key.to_string_lossy());
            self.endpoint.private_key_path = Some(expand_home(&expanded));
        }
    }

    /// Check that the settings are complete enough to start a run
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(anyhow!("SSH host is not configured"));
        }
        if self.endpoint.username.trim().is_empty() {
            return Err(anyhow!("SSH username is not configured"));
        }
        if self.endpoint.private_key_path.is_none() && self.endpoint.password.is_none() {
            return Err(anyhow!("Either a private key or a password must be configured"));
        }
        if self.source_folder.trim().is_empty() {
            return Err(anyhow!("Source folder is not configured"));
        }
        Ok(())
    }

    /// Scheduler policy derived from the raw numeric inputs
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::from_inputs(
            self.concurrent_uploads.as_ref(),
            self.delay_between_uploads.as_ref(),
        )
    }

    /// Source folder as a path
    pub fn source_path(&self) -> PathBuf {
        PathBuf::from(&self.source_folder)
    }
}

/// Replace a leading `~` with the user's home directory
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Load a configuration file, or start from defaults when none is given.
pub fn load_or_default(config_path: Option<&Path>) -> Result<CopyTaskConfig> {
    match config_path {
        Some(path) => CopyTaskConfig::from_yaml_file(path),
        None => {
            debug!("No config path provided, using defaults and command-line values");
            Ok(CopyTaskConfig::default())
        }
    }
}
