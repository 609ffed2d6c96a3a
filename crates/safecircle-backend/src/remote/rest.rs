//! HTTPS client for the hosted project's auth (`/auth/v1`) and table
//! (`/rest/v1`) endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use safecircle_bridge::{
    auth::{AuthSession, AuthUser},
    config::BackendConfig,
    contact::EmergencyContact,
    incident::{GeoPosition, Incident, IncidentId, NewIncident},
    preferences::NotificationPreference,
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use super::{AuthApi, ContactStore, IncidentStore, PreferenceStore, RemoteError};

const PREFERENCES_TABLE: &str = "rest/v1/notification_preferences";
const INCIDENTS_TABLE: &str = "rest/v1/incidents";
const CONTACTS_TABLE: &str = "rest/v1/user_contacts";

/// `Prefer` header for inserts that keep an existing row untouched.
const PREFER_IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=representation";
/// `Prefer` header for inserts that overwrite an existing row.
const PREFER_MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<AuthUser>,
}

impl TokenResponse {
    /// `None` unless both a token and its user were issued.
    fn into_session(self) -> Option<AuthSession> {
        match (self.access_token, self.user) {
            (Some(access_token), Some(user)) => Some(AuthSession {
                access_token,
                refresh_token: self.refresh_token,
                user,
            }),
            _ => None,
        }
    }
}

/// Client for one hosted project.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: Url,
    anon_key: String,
    client: reqwest::Client,
}

impl SupabaseClient {
    /// Builds a client from the backend section of the configuration. Both
    /// the project URL and the anon key are required.
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| RemoteError::InvalidUrl("no project url configured".to_string()))?;
        let anon_key = config
            .anon_key
            .clone()
            .ok_or_else(|| RemoteError::InvalidUrl(format!("no anon key configured for {url}")))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: parse_base_url(url)?,
            anon_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|error| RemoteError::InvalidUrl(format!("{path}: {error}")))
    }

    /// Starts a request carrying the API key and, when given, the user's
    /// access token. Anonymous requests authenticate with the anon key.
    fn request(
        &self,
        method: Method,
        path: &str,
        session: Option<&AuthSession>,
    ) -> Result<RequestBuilder, RemoteError> {
        let bearer = session
            .map(|session| session.access_token.as_str())
            .unwrap_or(&self.anon_key);
        Ok(self
            .client
            .request(method, self.endpoint(path)?)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer))
    }

    async fn send(request: RequestBuilder) -> Result<Response, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| error_message(&value))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string()
            });
        Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, RemoteError> {
        Ok(Self::send(request).await?.json::<Vec<T>>().await?)
    }
}

fn parse_base_url(url: &str) -> Result<Url, RemoteError> {
    // `Url::join` drops the last path segment unless the base ends with '/'
    let normalized = if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    };
    Url::parse(&normalized).map_err(|error| RemoteError::InvalidUrl(format!("{url}: {error}")))
}

/// Extracts the message from an auth or table error body.
fn error_message(body: &serde_json::Value) -> Option<String> {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(|value| value.as_str()))
        .map(str::to_string)
}

#[async_trait]
impl AuthApi for SupabaseClient {
    async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthSession>, RemoteError> {
        let request = self
            .request(Method::POST, "auth/v1/token", None)?
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let token: TokenResponse = Self::send(request).await?.json().await?;
        Ok(token.into_session())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        let request = self
            .request(Method::POST, "auth/v1/signup", None)?
            .json(&json!({ "email": email, "password": password }));
        Self::send(request).await?;
        Ok(())
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), RemoteError> {
        let request = self.request(Method::POST, "auth/v1/logout", Some(session))?;
        Self::send(request).await?;
        Ok(())
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), RemoteError> {
        let request = self
            .request(Method::POST, "auth/v1/recover", None)?
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        Self::send(request).await?;
        Ok(())
    }

    async fn update_password(
        &self,
        session: &AuthSession,
        password: &str,
    ) -> Result<(), RemoteError> {
        let request = self
            .request(Method::PUT, "auth/v1/user", Some(session))?
            .json(&json!({ "password": password }));
        Self::send(request).await?;
        Ok(())
    }

    async fn current_user(&self, session: &AuthSession) -> Result<AuthUser, RemoteError> {
        let request = self.request(Method::GET, "auth/v1/user", Some(session))?;
        Ok(Self::send(request).await?.json().await?)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
        let request = self
            .request(Method::POST, "auth/v1/token", None)?
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        let token: TokenResponse = Self::send(request).await?.json().await?;
        token
            .into_session()
            .ok_or(RemoteError::NotFound("refreshed session"))
    }
}

#[async_trait]
impl PreferenceStore for SupabaseClient {
    async fn fetch_preferences(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> Result<Option<NotificationPreference>, RemoteError> {
        let request = self
            .request(Method::GET, PREFERENCES_TABLE, Some(session))?
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{user_id}"))]);
        Ok(Self::rows(request).await?.into_iter().next())
    }

    async fn insert_preferences_if_absent(
        &self,
        session: &AuthSession,
        preference: &NotificationPreference,
    ) -> Result<Option<NotificationPreference>, RemoteError> {
        let request = self
            .request(Method::POST, PREFERENCES_TABLE, Some(session))?
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", PREFER_IGNORE_DUPLICATES)
            .json(&[preference]);
        Ok(Self::rows(request).await?.into_iter().next())
    }

    async fn upsert_preferences(
        &self,
        session: &AuthSession,
        preference: &NotificationPreference,
    ) -> Result<NotificationPreference, RemoteError> {
        let request = self
            .request(Method::POST, PREFERENCES_TABLE, Some(session))?
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", PREFER_MERGE_DUPLICATES)
            .json(&[preference]);
        Self::rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or(RemoteError::NotFound("notification preference"))
    }
}

#[async_trait]
impl IncidentStore for SupabaseClient {
    async fn insert_incident(
        &self,
        session: &AuthSession,
        incident: &NewIncident,
    ) -> Result<Incident, RemoteError> {
        let request = self
            .request(Method::POST, INCIDENTS_TABLE, Some(session))?
            .header("Prefer", "return=representation")
            .json(&[incident]);
        Self::rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or(RemoteError::NotFound("incident"))
    }

    async fn update_incident_location(
        &self,
        session: &AuthSession,
        incident_id: &IncidentId,
        position: GeoPosition,
    ) -> Result<(), RemoteError> {
        let request = self
            .request(Method::PATCH, INCIDENTS_TABLE, Some(session))?
            .query(&[("id", format!("eq.{incident_id}"))])
            .header("Prefer", "return=minimal")
            .json(&position);
        Self::send(request).await?;
        Ok(())
    }

    async fn list_incidents(&self, session: &AuthSession) -> Result<Vec<Incident>, RemoteError> {
        let request = self
            .request(Method::GET, INCIDENTS_TABLE, Some(session))?
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        Self::rows(request).await
    }
}

#[async_trait]
impl ContactStore for SupabaseClient {
    async fn fetch_contact(
        &self,
        session: &AuthSession,
        user_id: &str,
    ) -> Result<Option<EmergencyContact>, RemoteError> {
        let request = self
            .request(Method::GET, CONTACTS_TABLE, Some(session))?
            .query(&[("select", "*".to_string()), ("user_id", format!("eq.{user_id}"))]);
        Ok(Self::rows(request).await?.into_iter().next())
    }

    async fn upsert_contact(
        &self,
        session: &AuthSession,
        contact: &EmergencyContact,
    ) -> Result<EmergencyContact, RemoteError> {
        let request = self
            .request(Method::POST, CONTACTS_TABLE, Some(session))?
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", PREFER_MERGE_DUPLICATES)
            .json(&[contact]);
        Self::rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or(RemoteError::NotFound("emergency contact"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: Option<&str>, key: Option<&str>) -> BackendConfig {
        BackendConfig {
            url: url.map(str::to_string),
            anon_key: key.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn endpoints_keep_the_project_path() {
        let client =
            SupabaseClient::new(&config(Some("https://demo.supabase.co/base"), Some("anon")))
                .unwrap();
        assert_eq!(
            client.endpoint(PREFERENCES_TABLE).unwrap().as_str(),
            "https://demo.supabase.co/base/rest/v1/notification_preferences"
        );
        assert_eq!(client.anon_key, "anon");
    }

    #[test]
    fn url_and_key_are_required() {
        assert!(matches!(
            SupabaseClient::new(&config(None, Some("anon"))),
            Err(RemoteError::InvalidUrl(_))
        ));
        assert!(matches!(
            SupabaseClient::new(&config(Some("https://demo.supabase.co"), None)),
            Err(RemoteError::InvalidUrl(_))
        ));
        assert!(matches!(
            SupabaseClient::new(&config(Some("not a url"), Some("anon"))),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    #[test]
    fn error_messages_from_auth_and_tables() {
        let auth = json!({ "code": 422, "error_code": "user_already_exists", "msg": "User already registered" });
        assert_eq!(error_message(&auth).as_deref(), Some("User already registered"));

        let legacy = json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" });
        assert_eq!(error_message(&legacy).as_deref(), Some("Invalid login credentials"));

        let table = json!({ "code": "42501", "message": "permission denied for table incidents" });
        assert_eq!(
            error_message(&table).as_deref(),
            Some("permission denied for table incidents")
        );

        assert_eq!(error_message(&json!({ "code": 500 })), None);
    }

    #[test]
    fn token_grants_need_a_user() {
        let granted: TokenResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "r2",
            "user": { "id": "user-1", "email": "a@example.com", "aud": "authenticated" }
        }))
        .unwrap();
        let session = granted.into_session().unwrap();
        assert_eq!(session.access_token, "jwt");
        assert_eq!(session.refresh_token.as_deref(), Some("r2"));
        assert_eq!(session.user.id, "user-1");

        let unconfirmed: TokenResponse =
            serde_json::from_value(json!({ "user": { "id": "user-1" } })).unwrap();
        assert!(unconfirmed.into_session().is_none());
    }
}
