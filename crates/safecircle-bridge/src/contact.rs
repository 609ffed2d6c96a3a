use serde::{Deserialize, Serialize};

/// Dial target for emergency services.
pub const EMERGENCY_SERVICES_NUMBER: &str = "999";
/// Dial target for non-emergency medical advice.
pub const NON_EMERGENCY_NUMBER: &str = "111";

/// The single personal emergency contact a user keeps in `user_contacts`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmergencyContact {
    pub user_id: String,
    pub name: String,
    pub phone: String,
}

impl EmergencyContact {
    /// `tel:` URI that dials this contact.
    pub fn dial_uri(&self) -> String {
        dial_uri(&self.phone)
    }
}

/// Builds a `tel:` URI, dropping whitespace the user may have typed.
pub fn dial_uri(number: &str) -> String {
    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    format!("tel:{digits}")
}
