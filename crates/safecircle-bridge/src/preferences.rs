use serde::{Deserialize, Serialize};

/// Incident categories offered by the report and preference screens. Any
/// other label is user-custom text entered after choosing [`OTHER_INCIDENT_TYPE`].
pub const INCIDENT_TYPES: [&str; 4] = ["Theft", "Assault", "Vandalism", OTHER_INCIDENT_TYPE];

/// The category that lets the reporter type a custom label.
pub const OTHER_INCIDENT_TYPE: &str = "Other";

/// Categories a freshly created preference record is subscribed to.
pub const DEFAULT_INCIDENT_TYPES: [&str; 3] = ["Theft", "Assault", "Vandalism"];

/// How eagerly the user wants to be alerted. Stored as a preference only,
/// nothing throttles alerts based on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertFrequency {
    Low,
    #[default]
    Medium,
    High,
}

impl AlertFrequency {
    /// Position of this tier on the three-step frequency slider (1..=3).
    pub fn slider_position(self) -> u8 {
        match self {
            AlertFrequency::Low => 1,
            AlertFrequency::Medium => 2,
            AlertFrequency::High => 3,
        }
    }
}

impl std::fmt::Display for AlertFrequency {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AlertFrequency::Low => "low",
            AlertFrequency::Medium => "medium",
            AlertFrequency::High => "high",
        };
        formatter.write_str(label)
    }
}

impl std::str::FromStr for AlertFrequency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Ok(AlertFrequency::Low),
            "medium" | "2" => Ok(AlertFrequency::Medium),
            "high" | "3" => Ok(AlertFrequency::High),
            other => Err(format!("unknown alert frequency `{other}`")),
        }
    }
}

/// Per-user filter deciding which new incidents raise a notification.
///
/// Exactly one record exists per user once initialized. It is stored in the
/// `notification_preferences` table in the shape
/// `{ user_id, types: [string], frequency: "low" | "medium" | "high" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationPreference {
    /// Identifier of the owning user.
    pub user_id: String,
    /// Incident categories the user wants to be alerted about.
    pub types: Vec<String>,
    /// Stored alert frequency tier.
    pub frequency: AlertFrequency,
}

impl NotificationPreference {
    /// The record created lazily on a user's first sign in.
    pub fn default_for(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            types: DEFAULT_INCIDENT_TYPES.iter().map(|t| t.to_string()).collect(),
            frequency: AlertFrequency::default(),
        }
    }

    /// Whether an incident of the given category should raise an alert.
    /// Comparison is exact, labels are not case-folded.
    pub fn wants(&self, incident_type: &str) -> bool {
        self.types.iter().any(|t| t == incident_type)
    }
}
