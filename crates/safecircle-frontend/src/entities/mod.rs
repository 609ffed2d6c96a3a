use safecircle_bridge::MessageFromBackend;

use crate::formatting;

pub mod incidents_entity;
pub mod notifications_entity;
pub mod session_entity;
pub mod settings_entity;
pub mod windows_entity;

/// Everything the frontend keeps about the application.
#[derive(Debug, Clone, Default)]
pub struct DataEntities {
    pub settings: settings_entity::SettingsEntity,
    pub session: session_entity::SessionEntity,
    pub incidents: incidents_entity::IncidentsEntity,
    pub notifications: notifications_entity::NotificationsEntity,
    pub windows: windows_entity::WindowsEntity,
}

impl DataEntities {
    /// Applies a backend event and returns the lines to print for it.
    pub fn apply(&mut self, message: MessageFromBackend) -> Vec<String> {
        match message {
            MessageFromBackend::NotificationMessage(notification) => {
                vec![formatting::format_message(&notification)]
            }
            MessageFromBackend::ConfigurationResponse(config) => {
                self.settings.update(config);
                vec![self.settings.describe_backend()]
            }
            MessageFromBackend::SessionChanged(user) => {
                self.session.set_user(user);
                vec![self.session.describe_user()]
            }
            MessageFromBackend::PreferencesResponse(preference) => {
                let lines = formatting::format_preferences(&preference);
                self.session.preferences = Some(preference);
                lines
            }
            MessageFromBackend::IncidentsListResponse { center, incidents } => {
                let lines = formatting::format_incident_list(center, &incidents);
                self.incidents.replace(center, incidents);
                lines
            }
            MessageFromBackend::IncidentAddressResolved {
                incident_id,
                address,
            } => self
                .incidents
                .resolve_address(&incident_id, address)
                .map(|incident| vec![formatting::format_incident(incident)])
                .unwrap_or_default(),
            MessageFromBackend::EmergencyContactResponse(contact) => {
                let line = formatting::format_contact(contact.as_ref());
                self.session.contact = contact;
                vec![line]
            }
            MessageFromBackend::ShowSystemNotification(notification) => {
                let line = formatting::format_notification(&notification);
                self.notifications.show(notification);
                vec![line]
            }
            MessageFromBackend::CloseSystemNotification(id) => {
                self.notifications.close(id);
                Vec::new()
            }
            MessageFromBackend::Navigate { window_id, url } => {
                self.windows.navigate(window_id, &url);
                vec![format!("Window {window_id} -> {url}")]
            }
            MessageFromBackend::OpenWindow { window_id, url } => {
                self.windows.open(window_id, &url);
                vec![format!("Opened window {window_id} at {url}")]
            }
            MessageFromBackend::FocusWindow(window_id) => {
                self.windows.focus(window_id);
                vec![format!(
                    "Focused window {window_id} ({})",
                    self.windows.current_route()
                )]
            }
        }
    }
}
