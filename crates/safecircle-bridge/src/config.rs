use serde::{Deserialize, Serialize};

use crate::incident::{DEFAULT_MAP_CENTER, GeoPosition};

/// Application server public key (VAPID) used when subscribing to push.
pub const DEFAULT_APPLICATION_SERVER_KEY: &str =
    "BMLDaj3FcHNwvk0JlWf1l9vMq89nnFZobiaLo8T_ztsmcIaVmcsxCnlbMzq0HVoRy8McuZZK3rk2jFSR4BRyoAk";

/// Connection settings for the hosted database/auth/realtime service.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`. When unset the
    /// application runs against an in-memory offline backend.
    pub url: Option<String>,
    /// Public (anon) API key sent with every request.
    pub anon_key: Option<String>,
    /// Origin that auth mails link back to.
    pub site_url: String,
    /// Name of the realtime channel carrying incident inserts.
    pub realtime_channel: String,
    /// Timeout for a single HTTP request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            site_url: "http://localhost:5173".to_string(),
            realtime_channel: "incident_notifications".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// Settings for the push subscription flow.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PushConfig {
    /// Base64url-encoded application server public key.
    pub application_server_key: String,
    /// Script installed as the background notification handler.
    pub handler_script: String,
    /// Run the permission prompt at startup instead of after the first
    /// successful sign in.
    pub register_before_sign_in: bool,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            application_server_key: DEFAULT_APPLICATION_SERVER_KEY.to_string(),
            handler_script: "/serviceWorker.js".to_string(),
            register_before_sign_in: false,
        }
    }
}

/// Reverse geocoding used to show addresses in the incident list.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeocodingConfig {
    /// OpenCage-compatible reverse geocoding endpoint.
    pub endpoint: String,
    /// API key. Lookups are skipped while it is unset.
    pub api_key: Option<String>,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.opencagedata.com/geocode/v1/json".to_string(),
            api_key: None,
        }
    }
}

/// Map defaults.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MapConfig {
    /// Centre used when the device position is unknown.
    pub default_center: GeoPosition,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: DEFAULT_MAP_CENTER,
        }
    }
}

/// Capabilities and answers of the local notification platform.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Whether the platform can show notifications at all.
    pub notifications_supported: bool,
    /// Whether a resident background handler can be installed.
    pub background_handlers_supported: bool,
    /// Answer given to the notification permission prompt.
    pub allow_notifications: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            notifications_supported: true,
            background_handlers_supported: true,
            allow_notifications: true,
        }
    }
}

/// Global application configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Remote backend connection.
    pub backend: BackendConfig,
    /// Push registration.
    pub push: PushConfig,
    /// Address lookups for the incident list.
    pub geocoding: GeocodingConfig,
    /// Map defaults.
    pub map: MapConfig,
    /// Local notification platform.
    pub platform: PlatformConfig,
}
