//! Configuration file support for snapship.
//!
//! This module handles loading and validating user settings from the configuration file
//! located at `~/.config/snapship/config.toml`. Settings include the upload destination,
//! local save copies, shortcut chords and post-upload behaviour.
//!
//! If no config file exists, defaults are used automatically.

pub mod enums;
pub mod shortcuts;
pub mod types;

pub use enums::TrustPolicy;
pub use shortcuts::{Chord, ShortcutAction, ShortcutsConfig};
pub use types::{DestinationConfig, GeneralConfig, SaveConfig};

use anyhow::{Context, Result};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"# snapship configuration

[destination]
host = "ftp.mydomain.name"
port = 21
user = "user"
password = "pass"
directory = "subFolder/anotherFolder"
# The uploaded file name is appended to this verbatim.
web_url = "http://mydomain.name/"
# Explicit TLS (AUTH TLS) for control and data connections.
secure = false
# "strict" validates certificates; "accept-all" accepts anything (insecure).
trust = "strict"
timeout_secs = 30

[save]
enabled = false
directory = "~/Pictures/Snapship"
filename_template = "capture_%Y-%m-%d_%H%M%S"

[shortcuts]
# Key codes joined with '+'; at least two keys per chord.
capture_region = "56+2"
capture_screen = "56+3"
capture_files = "56+4"
capture_clipboard = "56+5"

[general]
notifications = true
copy_url_to_clipboard = true
"#;

/// Main configuration structure containing all user settings.
///
/// # Example TOML
/// ```toml
/// [destination]
/// host = "ftp.example.com"
/// user = "me"
/// password = "secret"
/// directory = "public_html/shots"
/// web_url = "https://example.com/shots/"
/// secure = true
///
/// [shortcuts]
/// capture_region = "56+2"
/// ```
#[derive(Debug, Serialize, Deserialize, Default, JsonSchema)]
pub struct Config {
    /// Where captures are uploaded
    #[serde(default)]
    pub destination: DestinationConfig,

    /// Optional local copies of each capture
    #[serde(default)]
    pub save: SaveConfig,

    /// Shortcut chords for the daemon
    #[serde(default)]
    pub shortcuts: ShortcutsConfig,

    /// Notification and clipboard behaviour
    #[serde(default)]
    pub general: GeneralConfig,
}

impl Config {
    /// Repairs values that would make a transfer impossible, logging a warning for each.
    fn validate_and_clamp(&mut self) {
        if self.destination.port == 0 {
            log::warn!(
                "Invalid destination port 0, falling back to {}",
                types::default_port()
            );
            self.destination.port = types::default_port();
        }

        if self.destination.timeout_secs == 0 {
            log::warn!(
                "Invalid timeout_secs 0, falling back to {}",
                types::default_timeout_secs()
            );
            self.destination.timeout_secs = types::default_timeout_secs();
        }

        if self.destination.host.trim().is_empty() {
            log::warn!("Destination host is empty; uploads will fail to connect");
        }

        if !self.destination.web_url.is_empty() && !self.destination.web_url.ends_with('/') {
            log::warn!(
                "web_url '{}' does not end with '/'; file names are appended verbatim",
                self.destination.web_url
            );
        }

        if self.destination.trust == TrustPolicy::AcceptAll {
            log::warn!("Certificate validation is disabled (trust = \"accept-all\")");
        }
    }

    /// Returns the path to the configuration file.
    ///
    /// # Errors
    /// Returns an error if the config directory cannot be determined (e.g., HOME not set).
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("snapship");

        Ok(config_dir.join("config.toml"))
    }

    /// Loads configuration from the default location, or returns defaults if not found.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from `config_path`, or returns defaults if the file is missing.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or contains invalid TOML.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!("Config file not found, using defaults");
            debug!("Expected config at: {}", config_path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config.validate_and_clamp();

        info!("Loaded config from {}", config_path.display());
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Writes a documented default config file, refusing to overwrite an existing one.
    ///
    /// Returns the path that was written.
    pub fn create_default_file() -> Result<PathBuf> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            return Err(anyhow::anyhow!(
                "Config file already exists at {}",
                config_path.display()
            ));
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)?;

        #[cfg(unix)]
        {
            use std::fs::Permissions;
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&config_path, Permissions::from_mode(0o600))?;
        }

        info!("Created default config at {}", config_path.display());
        Ok(config_path)
    }

    /// JSON schema describing the configuration file.
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.destination.port, 21);
        assert_eq!(config.destination.trust, TrustPolicy::Strict);
        assert!(!config.destination.secure);
    }

    #[test]
    fn default_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(parsed.destination, DestinationConfig::default());
        assert_eq!(parsed.shortcuts.capture_clipboard, "56+5");
        assert!(parsed.shortcuts.build_chords().is_ok());
    }

    #[test]
    fn partial_file_is_filled_and_clamped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[destination]
host = "ftp.example.com"
port = 0
timeout_secs = 0
trust = "accept-all"
secure = true
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.destination.host, "ftp.example.com");
        assert_eq!(config.destination.port, 21);
        assert_eq!(config.destination.timeout_secs, 30);
        assert_eq!(config.destination.trust, TrustPolicy::AcceptAll);
        assert!(config.destination.secure);
        assert_eq!(config.destination.user, "user");
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[destination\nhost = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn unknown_trust_policy_is_rejected() {
        let result: Result<Config, _> = toml::from_str("[destination]\ntrust = \"maybe\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_redacts_password() {
        let destination = DestinationConfig {
            password: "hunter2".to_string(),
            ..DestinationConfig::default()
        };
        let rendered = format!("{destination:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("****"));
    }
}
