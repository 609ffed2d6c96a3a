//! Contract between the application and the host's notification platform.
//!
//! The platform owns the permission prompt, the resident background handler,
//! push subscriptions, the rendering of system notifications and the set of
//! open application windows. The backend only talks to it through
//! [`NotificationPlatform`], so the alert pipeline can run against a real
//! desktop frontend ([`desktop::DesktopPlatform`]) or a recording fake.

pub mod desktop;

use async_trait::async_trait;
use safecircle_bridge::notification::{NotificationId, NotificationPayload, WindowId};

/// Errors reported by the notification platform.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The background handler script could not be installed.
    #[error("failed to register notification handler `{0}`")]
    HandlerRegistration(String),
    /// The application server key was rejected by the push service.
    #[error("application server key rejected: {0}")]
    InvalidApplicationServerKey(String),
    /// The push service could not issue a subscription.
    #[error("push subscription failed: {0}")]
    Subscription(String),
    /// The window referenced by an operation no longer exists.
    #[error("window {0} is not open")]
    UnknownWindow(WindowId),
    /// The view layer hosting the platform has gone away.
    #[error("platform is not reachable")]
    Disconnected,
}

/// Which optional platform APIs are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// A notification permission API exists.
    pub notifications: bool,
    /// A resident background handler can be registered.
    pub background_handlers: bool,
}

impl PlatformCapabilities {
    /// Push registration needs both APIs.
    pub fn supports_push(&self) -> bool {
        self.notifications && self.background_handlers
    }
}

/// The answer to a notification permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// A registered background handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerHandle {
    /// Script that was installed.
    pub script: String,
    /// Route scope the handler controls.
    pub scope: String,
}

/// A platform-issued push delivery handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushSubscription {
    /// Endpoint the push service delivers to.
    pub endpoint: String,
    /// Raw application server key the subscription is bound to.
    pub application_server_key: Vec<u8>,
}

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    pub id: WindowId,
    /// Route the window currently shows.
    pub url: String,
}

/// Operations the application needs from the notification platform.
///
/// Methods that only enqueue work on the platform (showing, closing,
/// navigating) are synchronous and return immediately; the rest suspend
/// until the platform answers.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    /// Reports which optional APIs exist.
    fn capabilities(&self) -> PlatformCapabilities;

    /// Shows the permission prompt once and returns the answer.
    async fn request_permission(&self) -> Permission;

    /// Installs the background notification and click handler.
    async fn register_handler(&self, script: &str) -> Result<HandlerHandle, PlatformError>;

    /// Requests a push subscription bound to the raw application server key.
    async fn subscribe(
        &self,
        handle: &HandlerHandle,
        application_server_key: &[u8],
    ) -> Result<PushSubscription, PlatformError>;

    /// Renders a system notification. Does not wait for it to be displayed.
    fn show_notification(
        &self,
        payload: NotificationPayload,
    ) -> Result<NotificationId, PlatformError>;

    /// Dismisses a displayed notification.
    fn close_notification(&self, id: NotificationId);

    /// All open application windows, including ones not controlled by the
    /// current handler.
    async fn client_windows(&self) -> Vec<ClientWindow>;

    /// Brings a window to the front.
    async fn focus_window(&self, id: WindowId) -> Result<(), PlatformError>;

    /// Opens a new window at `url`.
    async fn open_window(&self, url: &str) -> Result<WindowId, PlatformError>;

    /// Navigates the foreground window to `url`.
    fn navigate(&self, url: &str);

    /// Records a route change a window made on its own.
    fn record_navigation(&self, _window_id: WindowId, _url: &str) {}
}
