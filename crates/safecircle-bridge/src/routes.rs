//! Application routes referenced by the backend when it moves the user
//! around or attaches a destination to a notification.

pub const ROOT: &str = "/";
pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";
pub const RESET_PASSWORD: &str = "/reset-password";
pub const DASHBOARD: &str = "/dashboard";
pub const REPORT: &str = "/report";
pub const VIEW_INCIDENTS: &str = "/view-incidents";
pub const NOTIFICATIONS: &str = "/notifications";
pub const EMERGENCY_CONTACTS: &str = "/emergency-contacts";
pub const EDIT_EMERGENCY_CONTACT: &str = "/edit-emergency-contact";

/// Location picker for a freshly reported incident.
pub fn report_location(incident_id: &crate::incident::IncidentId) -> String {
    format!("/report/location?incidentId={incident_id}")
}
