//! System notifications via freedesktop D-Bus.

use std::collections::HashMap;

use async_trait::async_trait;
use zbus::{Connection, proxy};

const APP_NAME: &str = "Snapship";

/// D-Bus interface for freedesktop Notifications.
#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Send a notification.
    ///
    /// # Arguments
    /// * `app_name` - Application name
    /// * `replaces_id` - ID of notification to replace (0 for new)
    /// * `app_icon` - Icon name or path
    /// * `summary` - Notification title
    /// * `body` - Notification body text
    /// * `actions` - List of action identifiers and labels
    /// * `hints` - Additional metadata
    /// * `expire_timeout` - Timeout in milliseconds (-1 for default)
    ///
    /// # Returns
    /// Notification ID
    #[allow(clippy::too_many_arguments)]
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, zbus::zvariant::Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// Icon shown next to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIcon {
    Success,
    Failure,
    Cancelled,
}

impl NotificationIcon {
    fn name(self) -> &'static str {
        match self {
            NotificationIcon::Success => "emblem-shared",
            NotificationIcon::Failure => "dialog-error",
            NotificationIcon::Cancelled => "process-stop",
        }
    }
}

/// Delivers user-facing messages about finished uploads.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, summary: &str, body: &str, icon: NotificationIcon)
    -> Result<(), String>;
}

/// Desktop notifications over the session bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(
        &self,
        summary: &str,
        body: &str,
        icon: NotificationIcon,
    ) -> Result<(), String> {
        send_notification(summary, body, Some(icon.name())).await
    }
}

/// Swallows every message; used when notifications are turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify(
        &self,
        summary: &str,
        _body: &str,
        _icon: NotificationIcon,
    ) -> Result<(), String> {
        log::debug!("Notification suppressed: {}", summary);
        Ok(())
    }
}

/// Send a system notification.
///
/// # Arguments
/// * `summary` - Notification title
/// * `body` - Notification body text
/// * `icon` - Optional icon name (defaults to "document-send")
pub async fn send_notification(
    summary: &str,
    body: &str,
    icon: Option<&str>,
) -> Result<(), String> {
    let connection = Connection::session()
        .await
        .map_err(|e| format!("Failed to connect to session bus: {}", e))?;

    let proxy = NotificationsProxy::new(&connection)
        .await
        .map_err(|e| format!("Failed to create notifications proxy: {}", e))?;

    let icon = icon.unwrap_or("document-send");
    let hints = HashMap::new();

    proxy
        .notify(APP_NAME, 0, icon, summary, body, vec![], hints, 5000)
        .await
        .map_err(|e| format!("Failed to send notification: {}", e))?;

    Ok(())
}
