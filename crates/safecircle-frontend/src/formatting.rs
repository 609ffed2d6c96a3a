use std::fmt::Write;

use safecircle_bridge::{
    contact::EmergencyContact,
    incident::{GeoPosition, Incident},
    notification::{NotificationMessage, NotificationType, SystemNotification},
    preferences::{INCIDENT_TYPES, NotificationPreference},
};

/// Shown while an address lookup is still running.
const PENDING_ADDRESS: &str = "looking up address...";

/// Prefix for an inline message, by severity.
fn severity_label(notification_type: &NotificationType) -> &'static str {
    match notification_type {
        NotificationType::Info => "info",
        NotificationType::Success => "ok",
        NotificationType::Warning => "warning",
        NotificationType::Error => "error",
    }
}

/// Formats an inline backend message as a single prompt line.
pub fn format_message(message: &NotificationMessage) -> String {
    format!(
        "[{}] {}",
        severity_label(&message.notification_type),
        message.message
    )
}

pub fn format_position(position: GeoPosition) -> String {
    format!("{:.5}, {:.5}", position.latitude, position.longitude)
}

/// Trims an RFC 3339 timestamp down to `YYYY-MM-DD HH:MM`.
fn format_timestamp(created_at: &str) -> String {
    match created_at.get(..16) {
        Some(prefix) => prefix.replacen('T', " ", 1),
        None => created_at.to_string(),
    }
}

/// One line of the incident list.
pub fn format_incident(incident: &Incident) -> String {
    let location = match (&incident.address, incident.position()) {
        (Some(address), _) => address.clone(),
        (None, Some(_)) => PENDING_ADDRESS.to_string(),
        (None, None) => "no location".to_string(),
    };
    let when = incident
        .created_at
        .as_deref()
        .map(format_timestamp)
        .unwrap_or_else(|| "unknown time".to_string());

    format!(
        "#{} {} {}: {} ({})",
        incident.id, when, incident.kind, incident.description, location
    )
}

/// The incident list with its map centre on top.
pub fn format_incident_list(center: GeoPosition, incidents: &[Incident]) -> Vec<String> {
    let mut lines = vec![format!("Map centred on {}", format_position(center))];
    if incidents.is_empty() {
        lines.push("No incidents reported yet.".to_string());
    }
    lines.extend(incidents.iter().map(format_incident));
    lines
}

/// Checkbox list of every category plus the frequency slider.
pub fn format_preferences(preference: &NotificationPreference) -> Vec<String> {
    let mut lines = vec!["Alert me about:".to_string()];
    for kind in INCIDENT_TYPES {
        let mark = if preference.wants(kind) { 'x' } else { ' ' };
        lines.push(format!("  [{mark}] {kind}"));
    }
    for custom in preference
        .types
        .iter()
        .filter(|kind| !INCIDENT_TYPES.contains(&kind.as_str()))
    {
        lines.push(format!("  [x] {custom}"));
    }

    let position = preference.frequency.slider_position();
    let mut slider = String::with_capacity(16);
    for step in 1..=3 {
        slider.push(if step == position { 'o' } else { '-' });
    }
    let _ = write!(
        &mut slider,
        " {} ({position}/3)",
        preference.frequency
    );
    lines.push(format!("Frequency: {slider}"));
    lines
}

pub fn format_notification(notification: &SystemNotification) -> String {
    let payload = &notification.payload;
    format!(
        "(notification {}) {}: {} -> {}",
        notification.id, payload.title, payload.body, payload.data.url
    )
}

pub fn format_contact(contact: Option<&EmergencyContact>) -> String {
    match contact {
        Some(contact) => format!("Emergency contact: {} ({})", contact.name, contact.phone),
        None => "No emergency contact saved.".to_string(),
    }
}
