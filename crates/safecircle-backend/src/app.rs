//! Application context and message dispatching utilities.
//!
//! The context contains the shared state, the remote collaborators and the
//! notification platform, and provides helpers for sending responses and
//! notifications back to the frontend bridge.

use std::sync::Arc;

use safecircle_bridge::{
    MessageFromBackend, MessageToBackend,
    notification::{NotificationMessage, NotificationType},
};
use tokio::sync::mpsc::{Receiver, Sender};

use crate::platform::NotificationPlatform;
use crate::remote::Remote;
use crate::services;
use crate::state::{Session, SharedState};

/// Shared application context passed to services and message handlers.
pub struct AppContext {
    /// Mutable runtime application state shared across services.
    pub state: SharedState,
    /// Outbound channel to the frontend bridge.
    pub tx: Sender<MessageFromBackend>,
    /// Hosted backend or its offline stand-in.
    pub remote: Remote,
    /// Host notification platform.
    pub platform: Arc<dyn NotificationPlatform>,
}

impl AppContext {
    /// Read and dispatch messages from the frontend bridge until it closes.
    pub async fn consume_bridge_messages(self: &Arc<Self>, mut rx: Receiver<MessageToBackend>) {
        while let Some(message) = rx.recv().await {
            log::debug!("Got a frontend message: {message:?}");
            self.dispatch_message(message).await;
        }
        log::info!("Frontend bridge closed");
        services::incident_watcher::deactivate(self.clone()).await;
    }

    /// Dispatches the received message from frontend down to individual
    /// service handlers.
    pub async fn dispatch_message(self: &Arc<Self>, message: MessageToBackend) {
        match message {
            MessageToBackend::ConfigurationRequest => {
                services::config_service::handle_config_request(self.clone()).await;
            }
            MessageToBackend::SignIn { email, password } => {
                services::auth_service::handle_sign_in(self.clone(), email, password).await;
            }
            MessageToBackend::SignUp { email, password } => {
                services::auth_service::handle_sign_up(self.clone(), email, password).await;
            }
            MessageToBackend::RequestPasswordReset { email } => {
                services::auth_service::handle_password_reset_request(self.clone(), email).await;
            }
            MessageToBackend::UpdatePassword { password } => {
                services::auth_service::handle_update_password(self.clone(), password).await;
            }
            MessageToBackend::SignOut => {
                services::auth_service::handle_sign_out(self.clone()).await;
            }
            MessageToBackend::PreferencesRequest => {
                services::preference_service::handle_preferences_request(self.clone()).await;
            }
            MessageToBackend::SavePreferences { types, frequency } => {
                services::preference_service::handle_save_preferences(
                    self.clone(),
                    types,
                    frequency,
                )
                .await;
            }
            MessageToBackend::ReportIncident(report) => {
                services::incident_service::handle_report_incident(self.clone(), report).await;
            }
            MessageToBackend::SetIncidentLocation {
                incident_id,
                position,
            } => {
                services::incident_service::handle_set_incident_location(
                    self.clone(),
                    incident_id,
                    position,
                )
                .await;
            }
            MessageToBackend::IncidentsListRequest { position } => {
                services::incident_service::handle_incidents_list_request(self.clone(), position)
                    .await;
            }
            MessageToBackend::EmergencyContactRequest => {
                services::contact_service::handle_contact_request(self.clone()).await;
            }
            MessageToBackend::SaveEmergencyContact { name, phone } => {
                services::contact_service::handle_save_contact(self.clone(), name, phone).await;
            }
            MessageToBackend::NotificationClicked {
                notification,
                context,
            } => {
                services::notification_service::handle_notification_clicked(
                    self.clone(),
                    notification,
                    context,
                )
                .await;
            }
            MessageToBackend::PushReceived(body) => {
                services::notification_service::handle_push_received(self.clone(), body);
            }
            MessageToBackend::WindowNavigated { window_id, url } => {
                self.platform.record_navigation(window_id, &url);
            }
        }
    }

    /// Send a message to the frontend bridge.
    pub async fn send(&self, message: MessageFromBackend) {
        if let Err(error) = self.tx.send(message).await {
            log::warn!("Failed to send message to frontend: {error}");
        }
    }

    /// Send a notification message to the frontend bridge.
    pub async fn send_notification(
        &self,
        notification_type: NotificationType,
        content: impl Into<String>,
    ) {
        self.send(MessageFromBackend::NotificationMessage(NotificationMessage {
            notification_type,
            message: content.into(),
        }))
        .await;
    }

    /// Route the foreground window.
    pub fn navigate(&self, url: &str) {
        self.platform.navigate(url);
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }
}
