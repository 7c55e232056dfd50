//! Application configuration.
//!
//! Settings come from an optional TOML file and may be overridden on the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret as _, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

fn chirp_runtime_dir() -> Option<PathBuf> {
    if let Some(path) = dirs::runtime_dir() {
        return Some(path.join("chirp-fs"));
    }

    dirs::home_dir().map(|home| home.join(".local").join("share").join("chirp-fs"))
}

fn default_mount_point() -> PathBuf {
    chirp_runtime_dir().map_or_else(|| PathBuf::from("/tmp/chirp-fs/mnt"), |rd| rd.join("mnt"))
}

fn default_api_url() -> String {
    openchirp::DEFAULT_API_URL.to_owned()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn current_uid() -> u32 {
    nix::unistd::Uid::current().as_raw()
}

fn current_gid() -> u32 {
    nix::unistd::Gid::current().as_raw()
}

/// Application configuration structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Base URL of the OpenChirp REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// OpenChirp user id used for basic auth.
    #[serde(default)]
    pub user_id: String,

    /// OpenChirp user token used for basic auth.
    #[serde(default)]
    pub user_token: Option<SecretString>,

    /// Location mounted at the filesystem root. Empty means the API's root location.
    #[serde(default)]
    pub root_location: String,

    /// The mount point for the filesystem.
    #[serde(default = "default_mount_point")]
    pub mount_point: PathBuf,

    /// The user owning every entry. Defaults to the current user.
    #[serde(default = "current_uid")]
    pub uid: u32,

    /// The group owning every entry. Defaults to the current group.
    #[serde(default = "current_gid")]
    pub gid: u32,

    /// Per-request timeout for calls to the API.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            user_id: String::new(),
            user_token: None,
            root_location: String::new(),
            mount_point: default_mount_point(),
            uid: current_uid(),
            gid: current_gid(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Values given on the command line, each replacing its counterpart from the file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub mount_point: Option<PathBuf>,
    pub user_id: Option<String>,
    pub user_token: Option<SecretString>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Config {
    /// Validate the correctness of the configuration.
    ///
    /// Returns every problem found rather than stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.user_id.trim().is_empty() {
            errors.push("No user id configured. Set `user-id` or pass --user-id.".to_owned());
        }

        if self
            .user_token
            .as_ref()
            .is_none_or(|t| t.expose_secret().trim().is_empty())
        {
            errors.push(
                "No user token configured. Set `user-token`, pass --user-token or export \
                 OPENCHIRP_USER_TOKEN."
                    .to_owned(),
            );
        }

        if self.mount_point.as_os_str().is_empty() {
            errors.push("Mount point is empty.".to_owned());
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            errors.push(format!(
                "API url '{}' must start with http:// or https://.",
                self.api_url
            ));
        }

        if self.request_timeout_secs == 0 {
            errors.push("`request-timeout-secs` must be greater than zero.".to_owned());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replace file values with whatever was given on the command line.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(mount_point) = overrides.mount_point {
            self.mount_point = mount_point;
        }
        if let Some(user_id) = overrides.user_id {
            self.user_id = user_id;
        }
        if let Some(token) = overrides.user_token {
            self.user_token = Some(token);
        }
        self
    }

    /// Returns config file paths in descending priority order.
    /// On macOS, skips `dirs::config_dir()` (resolves to ~/Library/Application Support/).
    fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        #[cfg(not(target_os = "macos"))]
        if let Some(xdg) = dirs::config_dir() {
            paths.push(xdg.join("chirp-fs").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("chirp-fs").join("config.toml"));
        }

        paths.push(PathBuf::from("/etc/chirp-fs/config.toml"));

        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::config_search_paths().into_iter().find(|p| p.exists())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = ?path, "Loading configuration file.");
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load from `external_config_path` if given, else from the first config file found.
    ///
    /// With no file anywhere the defaults are used, leaving credentials to the command line.
    pub fn load(external_config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = external_config_path {
            return Self::load_from_file(path);
        }

        match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path),
            None => {
                debug!("No configuration file found, using defaults.");
                Ok(Self::default())
            }
        }
    }
}
