//! Library exports for snapship.
//!
//! Capture produces a single staged file, transport ships it to the configured
//! FTP(S) destination, and the upload pipeline ties the two together for the
//! CLI and the daemon.

pub mod archive;
pub mod capture;
pub mod config;
pub mod daemon;
pub mod notification;
pub mod shortcut;
pub mod transport;
pub mod upload;

pub use config::Config;
