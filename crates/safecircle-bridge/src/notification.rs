use serde::{Deserialize, Serialize};

/// Severity or category for inline, user-visible messages.
///
/// This enum classifies messages by their intent and visual styling,
/// allowing the UI to display them appropriately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationType {
    /// Neutral informational message that does not indicate success or failure.
    Info,
    /// Indicates a successful operation or positive outcome.
    Success,
    /// Indicates a non-critical issue that the user should be aware of, but
    /// does not prevent normal operation.
    Warning,
    /// Indicates an error or failure that may affect functionality.
    Error,
}

/// A transient inline message intended for the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    /// The type/severity of the message, determining its visual style.
    pub notification_type: NotificationType,
    /// The text content to display to the user.
    pub message: String,
}

/// Opaque data attached to a system notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationData {
    /// Route the application should show once the notification is clicked.
    pub url: String,
}

/// A system-level notification as handed to the platform:
/// `{ title, body, icon, data: { url }, vibrate?, requireInteraction? }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub data: NotificationData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub require_interaction: bool,
}

/// Platform-assigned identifier of a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl std::fmt::Display for NotificationId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// A notification currently displayed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotification {
    pub id: NotificationId,
    pub payload: NotificationPayload,
}

/// Which handler observed a notification click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickContext {
    /// The resident background handler; it may not own any window.
    Background,
    /// The foreground application window.
    Foreground,
}

/// Identifier of an application window known to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u32);

impl std::fmt::Display for WindowId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}
