//! Notification platform hosted by the frontend on the other end of the bridge.
//!
//! Rendering, window and navigation requests become [`MessageFromBackend`]
//! events; the frontend reports route changes back so that click routing can
//! compare window URLs. Permission answers and capabilities come from
//! [`PlatformConfig`].
//!
//! Requests are queued and forwarded in order by a background task, so a
//! full bridge delays them instead of dropping them.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use safecircle_bridge::{
    MessageFromBackend,
    config::PlatformConfig,
    notification::{NotificationId, NotificationPayload, SystemNotification, WindowId},
    routes,
};
use tokio::sync::mpsc::{self, Sender, UnboundedReceiver, UnboundedSender};

use super::{
    ClientWindow, HandlerHandle, NotificationPlatform, Permission, PlatformCapabilities,
    PlatformError, PushSubscription,
};

/// Length of an uncompressed P-256 public key, the only key form push
/// services accept.
const APPLICATION_SERVER_KEY_LENGTH: usize = 65;

#[derive(Debug)]
struct Windows {
    next_id: u32,
    foreground: WindowId,
    open: Vec<ClientWindow>,
}

/// [`NotificationPlatform`] implemented on top of the frontend bridge.
pub struct DesktopPlatform {
    tx: Sender<MessageFromBackend>,
    outbox: UnboundedSender<MessageFromBackend>,
    config: PlatformConfig,
    next_notification_id: AtomicU64,
    windows: Mutex<Windows>,
}

impl DesktopPlatform {
    /// Creates a platform with a single main window showing the root route.
    /// Must be called from within a tokio runtime.
    pub fn new(tx: Sender<MessageFromBackend>, config: PlatformConfig) -> Self {
        let (outbox, queued) = mpsc::unbounded_channel();
        tokio::spawn(forward(queued, tx.clone()));
        Self {
            tx,
            outbox,
            config,
            next_notification_id: AtomicU64::new(1),
            windows: Mutex::new(Windows {
                next_id: 1,
                foreground: WindowId(0),
                open: vec![ClientWindow {
                    id: WindowId(0),
                    url: routes::ROOT.to_string(),
                }],
            }),
        }
    }

    fn emit(&self, message: MessageFromBackend) -> Result<(), PlatformError> {
        if self.tx.is_closed() {
            log::warn!("Dropping platform request, the frontend is gone");
            return Err(PlatformError::Disconnected);
        }
        self.outbox.send(message).map_err(|_| PlatformError::Disconnected)
    }
}

async fn forward(
    mut queued: UnboundedReceiver<MessageFromBackend>,
    tx: Sender<MessageFromBackend>,
) {
    while let Some(message) = queued.recv().await {
        if tx.send(message).await.is_err() {
            log::warn!("Frontend closed the bridge, discarding platform requests");
            break;
        }
    }
}

#[async_trait]
impl NotificationPlatform for DesktopPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        PlatformCapabilities {
            notifications: self.config.notifications_supported,
            background_handlers: self.config.background_handlers_supported,
        }
    }

    async fn request_permission(&self) -> Permission {
        if self.config.allow_notifications {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn register_handler(&self, script: &str) -> Result<HandlerHandle, PlatformError> {
        if script.is_empty() {
            return Err(PlatformError::HandlerRegistration(script.to_string()));
        }
        Ok(HandlerHandle {
            script: script.to_string(),
            scope: routes::ROOT.to_string(),
        })
    }

    async fn subscribe(
        &self,
        handle: &HandlerHandle,
        application_server_key: &[u8],
    ) -> Result<PushSubscription, PlatformError> {
        if application_server_key.len() != APPLICATION_SERVER_KEY_LENGTH
            || application_server_key[0] != 0x04
        {
            return Err(PlatformError::InvalidApplicationServerKey(format!(
                "expected a {APPLICATION_SERVER_KEY_LENGTH} byte uncompressed P-256 point, got {} bytes",
                application_server_key.len()
            )));
        }

        Ok(PushSubscription {
            endpoint: format!("urn:safecircle:push:{}{}", handle.scope, uuid::Uuid::new_v4()),
            application_server_key: application_server_key.to_vec(),
        })
    }

    fn show_notification(
        &self,
        payload: NotificationPayload,
    ) -> Result<NotificationId, PlatformError> {
        let id = NotificationId(self.next_notification_id.fetch_add(1, Ordering::Relaxed));
        self.emit(MessageFromBackend::ShowSystemNotification(
            SystemNotification { id, payload },
        ))?;
        Ok(id)
    }

    fn close_notification(&self, id: NotificationId) {
        let _ = self.emit(MessageFromBackend::CloseSystemNotification(id));
    }

    async fn client_windows(&self) -> Vec<ClientWindow> {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .open
            .clone()
    }

    async fn focus_window(&self, id: WindowId) -> Result<(), PlatformError> {
        {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            if !windows.open.iter().any(|window| window.id == id) {
                return Err(PlatformError::UnknownWindow(id));
            }
            windows.foreground = id;
        }
        self.emit(MessageFromBackend::FocusWindow(id))
    }

    async fn open_window(&self, url: &str) -> Result<WindowId, PlatformError> {
        let id = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            let id = WindowId(windows.next_id);
            windows.next_id += 1;
            windows.foreground = id;
            windows.open.push(ClientWindow {
                id,
                url: url.to_string(),
            });
            id
        };
        self.emit(MessageFromBackend::OpenWindow {
            window_id: id,
            url: url.to_string(),
        })?;
        Ok(id)
    }

    fn navigate(&self, url: &str) {
        let window_id = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            let foreground = windows.foreground;
            match windows.open.iter_mut().find(|window| window.id == foreground) {
                Some(window) => window.url = url.to_string(),
                None => windows.open.push(ClientWindow {
                    id: foreground,
                    url: url.to_string(),
                }),
            }
            foreground
        };
        let _ = self.emit(MessageFromBackend::Navigate {
            window_id,
            url: url.to_string(),
        });
    }

    /// Unknown windows are adopted.
    fn record_navigation(&self, window_id: WindowId, url: &str) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        match windows.open.iter_mut().find(|window| window.id == window_id) {
            Some(window) => window.url = url.to_string(),
            None => windows.open.push(ClientWindow {
                id: window_id,
                url: url.to_string(),
            }),
        }
    }
}
