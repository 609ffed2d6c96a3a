//! Communication bridge between frontend and backend.
//!
//! This crate defines the types and protocols used to connect a view layer
//! with the asynchronous backend responsible for authentication, incident
//! storage, notification preferences and the incident alert pipeline.
//!
//! The design is deliberately lightweight and unidirectional:
//! - The frontend sends commands (e.g., sign in, report an incident, save
//!   preferences, a notification was clicked).
//! - The backend pushes events (e.g., inline messages, navigation, system
//!   notifications, loaded records).
//!
//! Communication happens over bounded [`tokio::sync::mpsc`] channels wrapped
//! in [`BridgeChannels`], providing back-pressure, async compatibility, and
//! clean separation of concerns.

pub mod auth;
pub mod config;
pub mod contact;
pub mod incident;
pub mod notification;
pub mod preferences;
pub mod routes;

use tokio::sync::mpsc::{self, Receiver, Sender};

/// Messages emitted by the backend to inform the frontend of state updates.
#[derive(Debug, Clone)]
pub enum MessageFromBackend {
    /// Transient inline message for the user.
    NotificationMessage(notification::NotificationMessage),
    /// Response to the configuration request from the frontend.
    ConfigurationResponse(config::Config),
    /// The signed-in user changed; `None` after sign out.
    SessionChanged(Option<auth::AuthUser>),
    /// The current user's notification preferences.
    PreferencesResponse(preferences::NotificationPreference),
    /// Incidents ordered newest first, with the centre the map should use.
    IncidentsListResponse {
        center: incident::GeoPosition,
        incidents: Vec<incident::Incident>,
    },
    /// A reverse-geocoded address for one listed incident.
    IncidentAddressResolved {
        incident_id: incident::IncidentId,
        address: String,
    },
    /// The user's emergency contact, `None` when nothing is saved.
    EmergencyContactResponse(Option<contact::EmergencyContact>),
    /// The platform should render this system notification.
    ShowSystemNotification(notification::SystemNotification),
    /// The platform should dismiss a displayed notification.
    CloseSystemNotification(notification::NotificationId),
    /// Navigate an existing window to a route.
    Navigate {
        window_id: notification::WindowId,
        url: String,
    },
    /// Open a new application window at a route.
    OpenWindow {
        window_id: notification::WindowId,
        url: String,
    },
    /// Bring an existing application window to the front.
    FocusWindow(notification::WindowId),
}

/// Commands issued by the frontend to control or query the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageToBackend {
    /// Request for the application configuration.
    ConfigurationRequest,
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
    },
    /// Send a password recovery mail.
    RequestPasswordReset {
        email: String,
    },
    /// Set a new password for the recovery session.
    UpdatePassword {
        password: String,
    },
    SignOut,
    PreferencesRequest,
    SavePreferences {
        types: Vec<String>,
        frequency: preferences::AlertFrequency,
    },
    ReportIncident(incident::IncidentReport),
    /// Attach a position picked on the map to a reported incident.
    SetIncidentLocation {
        incident_id: Option<incident::IncidentId>,
        position: Option<incident::GeoPosition>,
    },
    /// List incidents; `position` is the device position if known.
    IncidentsListRequest {
        position: Option<incident::GeoPosition>,
    },
    EmergencyContactRequest,
    SaveEmergencyContact {
        name: String,
        phone: String,
    },
    /// A displayed system notification was clicked.
    NotificationClicked {
        notification: notification::SystemNotification,
        context: notification::ClickContext,
    },
    /// A push message was delivered to the background handler. Carries the
    /// raw JSON body, if any.
    PushReceived(Option<String>),
    /// A window moved to another route on its own.
    WindowNavigated {
        window_id: notification::WindowId,
        url: String,
    },
}

/// Paired `tokio::mpsc` channels for bidirectional communication between
/// frontend and backend.
pub struct BridgeChannels {
    /// Receiver used by the frontend to get messages from the backend.
    pub frontend_rx: Receiver<MessageFromBackend>,
    /// Sender used by the frontend to send commands to the backend.
    pub frontend_tx: Sender<MessageToBackend>,

    /// Receiver used by the backend to get commands from the frontend.
    pub backend_rx: Receiver<MessageToBackend>,
    /// Sender used by the backend to send events/responses to the frontend.
    pub backend_tx: Sender<MessageFromBackend>,
}

impl BridgeChannels {
    /// Creates a new pair of bridged channels with the given buffer capacity.
    pub fn new(buffer: usize) -> Self {
        let (to_backend_tx, to_backend_rx) = mpsc::channel(buffer);
        let (to_frontend_tx, to_frontend_rx) = mpsc::channel(buffer);
        Self {
            frontend_tx: to_backend_tx,
            frontend_rx: to_frontend_rx,
            backend_rx: to_backend_rx,
            backend_tx: to_frontend_tx,
        }
    }
}

impl Default for BridgeChannels {
    fn default() -> Self {
        Self::new(64)
    }
}
