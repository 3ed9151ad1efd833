//! Console configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/dispatchlink/console.toml`
//! - Windows: `%APPDATA%/dispatchlink/console.toml`
//!
//! Values are layered: file, then environment, then command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use dispatchlink_protocol::Role;
use dispatchlink_session::types::{DEFAULT_SERVER_URL, SERVER_URL_ENV};
use dispatchlink_session::{ReconnectConfig, RoleProfile, SessionConfig};

/// Fallback identity when neither the CLI nor the file provides one.
pub const IDENTITY_ENV: &str = "DISPATCH_IDENTITY";

/// Console configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the dispatch server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Which feed to follow.
    #[serde(default = "default_role")]
    pub role: Role,

    /// Admin or courier id to join with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,

    #[serde(default)]
    pub reconnect: ReconnectSettings,

    #[serde(default)]
    pub alerts: AlertSettings,
}

/// Backoff settings, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSettings {
    /// Play a sound for every new order.
    #[serde(default = "default_true")]
    pub sound: bool,

    /// External command used to play the sound file.
    #[serde(default = "default_player")]
    pub player: String,

    /// Sound asset. Without one the terminal bell is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_file: Option<PathBuf>,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.into()
}

fn default_role() -> Role {
    Role::Admin
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_true() -> bool {
    true
}

fn default_player() -> String {
    if cfg!(target_os = "macos") {
        "afplay".into()
    } else {
        "paplay".into()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            role: default_role(),
            identity: None,
            reconnect: ReconnectSettings::default(),
            alerts: AlertSettings::default(),
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            sound: default_true(),
            player: default_player(),
            sound_file: None,
        }
    }
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub role: Option<Role>,
    pub identity: Option<String>,
    pub server_url: Option<String>,
}

impl Config {
    /// Loads the configuration file.
    ///
    /// An explicit `path` must exist. Without one the default location is
    /// used, and a default file is written there on first run.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    let config = Config::default();
                    config.save_to(&path)?;
                    Ok(config)
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies environment variables (looked up through `env`) and then
    /// command-line overrides. Blank values are ignored.
    pub fn resolve(mut self, env: impl Fn(&str) -> Option<String>, cli: Overrides) -> Self {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = cli.server_url.or_else(|| env(SERVER_URL_ENV)) {
            self.server_url = url;
        }
        if let Some(identity) = cli.identity.or_else(|| env(IDENTITY_ENV)) {
            self.identity = Some(identity);
        }
        if let Some(role) = cli.role {
            self.role = role;
        }
        self
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.server_url.clone(), RoleProfile::for_role(self.role))
            .with_reconnect(ReconnectConfig {
                initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
                max_delay: Duration::from_millis(self.reconnect.max_delay_ms),
                max_attempts: self.reconnect.max_attempts,
            })
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("dispatchlink").join("console.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("dispatchlink")
            .join("console.toml"))
    }
}
