//! Seams towards the hosted backend and other remote services.
//!
//! Every remote concern is a trait so that services can run against the
//! hosted project ([`rest::SupabaseClient`], [`realtime::RealtimeClient`]),
//! the offline [`crate::memory::MemoryBackend`], or test doubles.

pub mod geocode;
pub mod realtime;
pub mod rest;

use std::sync::Arc;

use async_trait::async_trait;
use safecircle_bridge::{
    auth::{AuthSession, AuthUser},
    contact::EmergencyContact,
    incident::{GeoPosition, Incident, IncidentEvent, IncidentId, NewIncident},
    preferences::NotificationPreference,
};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

/// Errors returned by the hosted backend.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a response (DNS, TLS, timeout...).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The service answered with an error status.
    #[error("{message} (status {status})")]
    Api { status: u16, message: String },
    /// The configured project URL cannot be used.
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    /// A row that must exist was not returned.
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl RemoteError {
    /// Human readable message from the service, if it sent one.
    pub fn api_message(&self) -> Option<&str> {
        match self {
            RemoteError::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Errors raised by the realtime change feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("failed to connect to realtime service: {0}")]
    Connect(String),
    /// The server refused to join the channel.
    #[error("channel join rejected: {0}")]
    JoinRejected(String),
    #[error("realtime protocol error: {0}")]
    Protocol(String),
}

/// Errors raised while looking up an address.
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    #[error("failed to fetch address: {0}")]
    Request(#[from] reqwest::Error),
    #[error("failed to fetch address (status {0})")]
    Status(u16),
}

/// Password authentication against the hosted auth service.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Password grant. `Ok(None)` when the credentials were accepted but no
    /// session was issued (unconfirmed email).
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, RemoteError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), RemoteError>;

    async fn sign_out(&self, session: &AuthSession) -> Result<(), RemoteError>;

    /// Sends a recovery mail whose link lands on `redirect_to`.
    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), RemoteError>;

    async fn update_password(
        &self,
        session: &AuthSession,
        password: &str,
    ) -> Result<(), RemoteError>;

    /// Resolves the user owning the session's access token.
    async fn current_user(&self, session: &AuthSession) -> Result<AuthUser, RemoteError>;

    /// Exchanges a refresh token for a new session. The old refresh token is
    /// spent either way.
    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, RemoteError>;
}

/// The `notification_preferences` table.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn fetch_preferences(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> Result<Option<NotificationPreference>, RemoteError>;

    /// Atomically inserts `preference` unless a row for the same user exists.
    /// Returns the inserted row, or `None` when one was already present.
    async fn insert_preferences_if_absent(
        &self,
        session: &AuthSession,
        preference: &NotificationPreference,
    ) -> Result<Option<NotificationPreference>, RemoteError>;

    /// Full overwrite keyed by `user_id`.
    async fn upsert_preferences(
        &self,
        session: &AuthSession,
        preference: &NotificationPreference,
    ) -> Result<NotificationPreference, RemoteError>;
}

/// The `incidents` table.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    async fn insert_incident(
        &self,
        session: &AuthSession,
        incident: &NewIncident,
    ) -> Result<Incident, RemoteError>;

    async fn update_incident_location(
        &self,
        session: &AuthSession,
        incident_id: &IncidentId,
        position: GeoPosition,
    ) -> Result<(), RemoteError>;

    /// All incidents, newest first.
    async fn list_incidents(&self, session: &AuthSession) -> Result<Vec<Incident>, RemoteError>;
}

/// The `user_contacts` table.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn fetch_contact(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> Result<Option<EmergencyContact>, RemoteError>;

    /// Replaces the user's contact.
    async fn upsert_contact(
        &self,
        session: &AuthSession,
        contact: &EmergencyContact,
    ) -> Result<EmergencyContact, RemoteError>;
}

/// Live stream of incident inserts.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribes to insert events on the incidents table. Events flow until
    /// `cancel` fires or the receiver is dropped.
    async fn subscribe_incident_inserts(
        &self,
        session: &AuthSession,
        cancel: CancellationToken,
    ) -> Result<Receiver<IncidentEvent>, FeedError>;
}

/// Reverse geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn reverse(&self, position: GeoPosition) -> Result<String, GeocodeError>;
}

/// The set of remote collaborators used by the services.
#[derive(Clone)]
pub struct Remote {
    pub auth: Arc<dyn AuthApi>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub incidents: Arc<dyn IncidentStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub feed: Arc<dyn ChangeFeed>,
    /// `None` disables address lookups.
    pub geocoder: Option<Arc<dyn Geocoder>>,
}

impl Remote {
    /// Routes every concern to a single in-memory backend.
    pub fn memory(backend: Arc<crate::memory::MemoryBackend>) -> Self {
        Self {
            auth: backend.clone(),
            preferences: backend.clone(),
            incidents: backend.clone(),
            contacts: backend.clone(),
            feed: backend,
            geocoder: None,
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }
}
