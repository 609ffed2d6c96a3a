//! In-memory stand-in for the hosted backend.
//!
//! Used when no project URL is configured and throughout the tests. Auth,
//! the three tables and the insert feed behave like their hosted
//! counterparts, including row ownership checks and duplicate handling.

use std::{
    collections::HashMap,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use safecircle_bridge::{
    auth::{AuthSession, AuthUser},
    contact::EmergencyContact,
    incident::{GeoPosition, Incident, IncidentEvent, IncidentId, NewIncident},
    preferences::NotificationPreference,
};
use tokio::sync::{
    broadcast,
    mpsc::{self, Receiver},
};
use tokio_util::sync::CancellationToken;

use crate::remote::{
    AuthApi, ChangeFeed, ContactStore, FeedError, IncidentStore, PreferenceStore, RemoteError,
};

const FEED_CAPACITY: usize = 64;

#[derive(Debug)]
struct Account {
    user: AuthUser,
    password: String,
    confirmed: bool,
}

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<String, Account>,
    /// access token -> user id
    sessions: HashMap<String, String>,
    /// refresh token -> (user id, access token it was issued with)
    refresh_tokens: HashMap<String, (String, String)>,
    preferences: HashMap<String, NotificationPreference>,
    incidents: Vec<Incident>,
    contacts: HashMap<String, EmergencyContact>,
    next_incident_id: u64,
    password_resets: Vec<(String, String)>,
}

/// In-memory implementation of every remote store.
#[derive(Debug)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    inserts: broadcast::Sender<Incident>,
    /// Fired when access tokens expire; live feeds end with it.
    expiry: Mutex<CancellationToken>,
    failing: AtomicBool,
    confirm_on_sign_up: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (inserts, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            tables: Mutex::new(Tables {
                next_incident_id: 1,
                ..Default::default()
            }),
            inserts,
            expiry: Mutex::new(CancellationToken::new()),
            failing: AtomicBool::new(false),
            confirm_on_sign_up: true,
        }
    }

    /// New accounts sign in without a session until their email is
    /// confirmed.
    pub fn requiring_email_confirmation(mut self) -> Self {
        self.confirm_on_sign_up = false;
        self
    }

    /// Simulates an outage: every request fails while set.
    pub fn fail_requests(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Creates a confirmed account directly.
    pub fn register_user(&self, email: &str, password: &str) -> AuthUser {
        let mut tables = self.tables();
        let account = tables
            .accounts
            .entry(email.to_string())
            .or_insert_with(|| Account {
                user: AuthUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    email: Some(email.to_string()),
                },
                password: password.to_string(),
                confirmed: true,
            });
        account.user.clone()
    }

    #[cfg(test)]
    pub fn confirm_email(&self, email: &str) {
        if let Some(account) = self.tables().accounts.get_mut(email) {
            account.confirmed = true;
        }
    }

    /// Stored preference row of a user.
    pub fn stored_preferences(&self, user_id: &str) -> Option<NotificationPreference> {
        self.tables().preferences.get(user_id).cloned()
    }

    /// Recovery mails sent so far as `(email, redirect)` pairs.
    pub fn password_resets(&self) -> Vec<(String, String)> {
        self.tables().password_resets.clone()
    }

    /// Expires every access token and ends the live feeds opened with them.
    /// Refresh tokens stay valid.
    #[cfg(test)]
    pub fn expire_access_tokens(&self) {
        self.tables().sessions.clear();
        let expired = std::mem::replace(
            &mut *self.expiry.lock().unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        expired.cancel();
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }
        Ok(())
    }

    /// Issues a fresh token pair for the user.
    fn issue_session(tables: &mut Tables, user: AuthUser) -> AuthSession {
        let access_token = uuid::Uuid::new_v4().to_string();
        let refresh_token = uuid::Uuid::new_v4().to_string();
        tables.sessions.insert(access_token.clone(), user.id.clone());
        tables
            .refresh_tokens
            .insert(refresh_token.clone(), (user.id.clone(), access_token.clone()));
        AuthSession {
            access_token,
            refresh_token: Some(refresh_token),
            user,
        }
    }

    /// Resolves the user id behind an access token.
    fn authorize(&self, session: &AuthSession) -> Result<String, RemoteError> {
        self.check_available()?;
        self.tables()
            .sessions
            .get(&session.access_token)
            .cloned()
            .ok_or_else(|| RemoteError::Api {
                status: 401,
                message: "Invalid JWT".to_string(),
            })
    }

    fn authorize_owner(&self, session: &AuthSession, user_id: &str) -> Result<(), RemoteError> {
        if self.authorize(session)? != user_id {
            return Err(RemoteError::Api {
                status: 403,
                message: "new row violates row-level security policy".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, RemoteError> {
        self.check_available()?;
        let mut tables = self.tables();
        let (user, confirmed) = match tables.accounts.get(email) {
            Some(account) if account.password == password => {
                (account.user.clone(), account.confirmed)
            }
            _ => {
                return Err(RemoteError::Api {
                    status: 400,
                    message: "Invalid login credentials".to_string(),
                });
            }
        };
        if !confirmed {
            return Ok(None);
        }

        Ok(Some(Self::issue_session(&mut tables, user)))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        self.check_available()?;
        let mut tables = self.tables();
        if tables.accounts.contains_key(email) {
            return Err(RemoteError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        tables.accounts.insert(
            email.to_string(),
            Account {
                user: AuthUser {
                    id: uuid::Uuid::new_v4().to_string(),
                    email: Some(email.to_string()),
                },
                password: password.to_string(),
                confirmed: self.confirm_on_sign_up,
            },
        );
        Ok(())
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), RemoteError> {
        self.check_available()?;
        let mut tables = self.tables();
        tables.sessions.remove(&session.access_token);
        tables
            .refresh_tokens
            .retain(|_, (_, access_token)| *access_token != session.access_token);
        Ok(())
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), RemoteError> {
        self.check_available()?;
        log::info!("Password recovery for {email} redirects to {redirect_to}");
        self.tables()
            .password_resets
            .push((email.to_string(), redirect_to.to_string()));
        Ok(())
    }

    async fn update_password(
        &self,
        session: &AuthSession,
        password: &str,
    ) -> Result<(), RemoteError> {
        let user_id = self.authorize(session)?;
        let mut tables = self.tables();
        let account = tables
            .accounts
            .values_mut()
            .find(|account| account.user.id == user_id)
            .ok_or(RemoteError::NotFound("user"))?;
        account.password = password.to_string();
        Ok(())
    }

    async fn current_user(&self, session: &AuthSession) -> Result<AuthUser, RemoteError> {
        let user_id = self.authorize(session)?;
        self.tables()
            .accounts
            .values()
            .find(|account| account.user.id == user_id)
            .map(|account| account.user.clone())
            .ok_or(RemoteError::NotFound("user"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
        self.check_available()?;
        let mut tables = self.tables();
        let (user_id, access_token) =
            tables
                .refresh_tokens
                .remove(refresh_token)
                .ok_or_else(|| RemoteError::Api {
                    status: 400,
                    message: "Invalid Refresh Token: Refresh Token Not Found".to_string(),
                })?;
        tables.sessions.remove(&access_token);
        let user = tables
            .accounts
            .values()
            .find(|account| account.user.id == user_id)
            .map(|account| account.user.clone())
            .ok_or(RemoteError::NotFound("user"))?;
        Ok(Self::issue_session(&mut tables, user))
    }
}

#[async_trait]
impl PreferenceStore for MemoryBackend {
    async fn fetch_preferences(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> Result<Option<NotificationPreference>, RemoteError> {
        self.authorize_owner(session, user_id)?;
        Ok(self.tables().preferences.get(user_id).cloned())
    }

    async fn insert_preferences_if_absent(
        &self,
        session: &AuthSession,
        preference: &NotificationPreference,
    ) -> Result<Option<NotificationPreference>, RemoteError> {
        self.authorize_owner(session, &preference.user_id)?;
        let mut tables = self.tables();
        if tables.preferences.contains_key(&preference.user_id) {
            return Ok(None);
        }
        tables
            .preferences
            .insert(preference.user_id.clone(), preference.clone());
        Ok(Some(preference.clone()))
    }

    async fn upsert_preferences(
        &self,
        session: &AuthSession,
        preference: &NotificationPreference,
    ) -> Result<NotificationPreference, RemoteError> {
        self.authorize_owner(session, &preference.user_id)?;
        self.tables()
            .preferences
            .insert(preference.user_id.clone(), preference.clone());
        Ok(preference.clone())
    }
}

#[async_trait]
impl IncidentStore for MemoryBackend {
    async fn insert_incident(
        &self,
        session: &AuthSession,
        incident: &NewIncident,
    ) -> Result<Incident, RemoteError> {
        self.authorize(session)?;
        let row = {
            let mut tables = self.tables();
            let row = Incident {
                id: IncidentId(tables.next_incident_id.to_string()),
                kind: incident.kind.clone(),
                description: incident.description.clone(),
                latitude: incident.latitude,
                longitude: incident.longitude,
                created_at: Some(incident.created_at.clone()),
                address: None,
            };
            tables.next_incident_id += 1;
            tables.incidents.push(row.clone());
            row
        };
        // no subscribers is fine
        let _ = self.inserts.send(row.clone());
        Ok(row)
    }

    async fn update_incident_location(
        &self,
        session: &AuthSession,
        incident_id: &IncidentId,
        position: GeoPosition,
    ) -> Result<(), RemoteError> {
        self.authorize(session)?;
        let mut tables = self.tables();
        let incident = tables
            .incidents
            .iter_mut()
            .find(|incident| &incident.id == incident_id)
            .ok_or(RemoteError::NotFound("incident"))?;
        incident.latitude = Some(position.latitude);
        incident.longitude = Some(position.longitude);
        Ok(())
    }

    async fn list_incidents(&self, session: &AuthSession) -> Result<Vec<Incident>, RemoteError> {
        self.authorize(session)?;
        let mut incidents: Vec<Incident> = self.tables().incidents.iter().rev().cloned().collect();
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(incidents)
    }
}

#[async_trait]
impl ContactStore for MemoryBackend {
    async fn fetch_contact(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> Result<Option<EmergencyContact>, RemoteError> {
        self.authorize_owner(session, user_id)?;
        Ok(self.tables().contacts.get(user_id).cloned())
    }

    async fn upsert_contact(
        &self,
        session: &AuthSession,
        contact: &EmergencyContact,
    ) -> Result<EmergencyContact, RemoteError> {
        self.authorize_owner(session, &contact.user_id)?;
        self.tables()
            .contacts
            .insert(contact.user_id.clone(), contact.clone());
        Ok(contact.clone())
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe_incident_inserts(
        &self,
        session: &AuthSession,
        cancel: CancellationToken,
    ) -> Result<Receiver<IncidentEvent>, FeedError> {
        self.authorize(session)
            .map_err(|error| FeedError::JoinRejected(error.to_string()))?;

        let mut inserts = self.inserts.subscribe();
        let expired = self
            .expiry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = expired.cancelled() => {
                        log::info!("Access token expired, closing incident feed");
                        break;
                    }
                    _ = tx.closed() => break,
                    received = inserts.recv() => match received {
                        Ok(incident) => {
                            if tx.send(IncidentEvent::from(&incident)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!("Incident feed lagged, skipped {skipped} inserts");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        Ok(rx)
    }
}
