use serde::{Deserialize, Serialize};

/// The identity of a signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthUser {
    /// Opaque user identifier, the key of every per-user row.
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens for an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}
