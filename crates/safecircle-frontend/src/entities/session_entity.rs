use safecircle_bridge::{
    auth::AuthUser, contact::EmergencyContact, incident::GeoPosition,
    preferences::NotificationPreference,
};

/// What the frontend knows about the signed-in user.
#[derive(Debug, Clone, Default)]
pub struct SessionEntity {
    pub user: Option<AuthUser>,
    pub preferences: Option<NotificationPreference>,
    pub contact: Option<EmergencyContact>,
    /// Simulated device position, attached to reports and listings.
    pub device_position: Option<GeoPosition>,
}

impl SessionEntity {
    /// Replaces the user; per-user data is forgotten when it changes.
    pub fn set_user(&mut self, user: Option<AuthUser>) {
        let same_user = match (&self.user, &user) {
            (Some(current), Some(next)) => current.id == next.id,
            _ => false,
        };
        if !same_user {
            self.preferences = None;
            self.contact = None;
        }
        self.user = user;
    }

    pub fn describe_user(&self) -> String {
        match self.user {
            Some(ref user) => format!(
                "Signed in as {}",
                user.email.as_deref().unwrap_or(user.id.as_str())
            ),
            None => "Signed out".to_string(),
        }
    }
}
