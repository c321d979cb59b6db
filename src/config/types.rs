//! Configuration type definitions.

use super::enums::TrustPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Connection parameters of the upload destination.
///
/// The core only ever reads a snapshot of this value; it is never modified
/// during a transfer.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct DestinationConfig {
    /// Host name or IP address of the FTP(S) server
    #[serde(default = "default_host")]
    pub host: String,

    /// Control connection port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Login user
    #[serde(default = "default_user")]
    pub user: String,

    /// Login password
    #[serde(default = "default_password")]
    pub password: String,

    /// Remote directory uploads are stored in
    #[serde(default = "default_directory")]
    pub directory: String,

    /// Public URL the remote directory is served from. The uploaded file name
    /// is appended verbatim, so this should normally end with `/`.
    #[serde(default = "default_web_url")]
    pub web_url: String,

    /// Use explicit TLS (AUTH TLS) on the control and data connections
    #[serde(default)]
    pub secure: bool,

    /// Certificate trust policy for secure connections
    #[serde(default)]
    pub trust: TrustPolicy,

    /// Connect/read/write timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl DestinationConfig {
    /// Timeout applied to every socket operation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Public URL for an uploaded file name.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}{}", self.web_url, file_name)
    }
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("directory", &self.directory)
            .field("web_url", &self.web_url)
            .field("secure", &self.secure)
            .field("trust", &self.trust)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: default_password(),
            directory: default_directory(),
            web_url: default_web_url(),
            secure: false,
            trust: TrustPolicy::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Local copies of every capture.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SaveConfig {
    /// Keep a copy of each capture on disk before uploading
    #[serde(default)]
    pub enabled: bool,

    /// Directory copies are written to (`~` is expanded)
    #[serde(default = "default_save_directory")]
    pub directory: String,

    /// File name template, chrono format specifiers allowed
    #[serde(default = "default_filename_template")]
    pub filename_template: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: default_save_directory(),
            filename_template: default_filename_template(),
        }
    }
}

/// Behaviour after an upload finishes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GeneralConfig {
    /// Show desktop notifications for upload results
    #[serde(default = "default_true")]
    pub notifications: bool,

    /// Copy the resulting URL to the clipboard
    #[serde(default = "default_true")]
    pub copy_url_to_clipboard: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            notifications: true,
            copy_url_to_clipboard: true,
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_host() -> String {
    "ftp.mydomain.name".to_string()
}

pub(crate) fn default_port() -> u16 {
    21
}

fn default_user() -> String {
    "user".to_string()
}

fn default_password() -> String {
    "pass".to_string()
}

fn default_directory() -> String {
    "subFolder/anotherFolder".to_string()
}

fn default_web_url() -> String {
    "http://mydomain.name/".to_string()
}

pub(crate) fn default_timeout_secs() -> u64 {
    30
}

fn default_save_directory() -> String {
    "~/Pictures/Snapship".to_string()
}

fn default_filename_template() -> String {
    "capture_%Y-%m-%d_%H%M%S".to_string()
}

fn default_true() -> bool {
    true
}
