use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a stored incident row.
///
/// The backend may hand out numeric or textual keys, both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IncidentId(pub String);

impl<'de> Deserialize<'de> for IncidentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(number) => IncidentId(number.to_string()),
            RawId::Text(text) => IncidentId(text),
        })
    }
}

impl std::fmt::Display for IncidentId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GeoPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Central London, used whenever the device position is unknown.
pub const DEFAULT_MAP_CENTER: GeoPosition = GeoPosition {
    latitude: 51.5074,
    longitude: -0.1278,
};

/// A stored incident report as returned by the `incidents` table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Incident {
    pub id: IncidentId,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Reverse-geocoded address. Never stored, filled in by the listing.
    #[serde(default, skip_serializing)]
    pub address: Option<String>,
}

impl Incident {
    /// Coordinates of the incident, if both halves were recorded.
    pub fn position(&self) -> Option<GeoPosition> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPosition::new(latitude, longitude)),
            _ => None,
        }
    }
}

/// Fills in the address of a listed incident once its lookup resolved.
pub fn apply_address(incidents: &mut [Incident], incident_id: &IncidentId, address: String) {
    if let Some(incident) = incidents.iter_mut().find(|incident| &incident.id == incident_id) {
        incident.address = Some(address);
    }
}

/// Row inserted when the user submits a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewIncident {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: String,
}

/// The part of an incident insert event the notification pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IncidentEvent {
    #[serde(rename = "type")]
    pub kind: String,
    /// Missing and null descriptions both read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl From<&Incident> for IncidentEvent {
    fn from(incident: &Incident) -> Self {
        Self {
            kind: incident.kind.clone(),
            description: incident.description.clone(),
        }
    }
}

/// Raw contents of the report form before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentReport {
    /// One of [`crate::preferences::INCIDENT_TYPES`], or empty when nothing
    /// was picked.
    pub kind: String,
    /// Custom label, only read when `kind` is "Other".
    pub custom_kind: String,
    pub description: String,
    /// Device position at submission time, `None` when it could not be
    /// determined.
    pub position: Option<GeoPosition>,
}

impl IncidentReport {
    /// The label that ends up stored: the custom text for "Other", otherwise
    /// the picked category.
    pub fn final_kind(&self) -> &str {
        if self.kind == crate::preferences::OTHER_INCIDENT_TYPE {
            self.custom_kind.trim()
        } else {
            self.kind.trim()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_ids_accept_numbers_and_text() {
        let numeric: Incident = serde_json::from_value(serde_json::json!({
            "id": 42, "type": "Theft", "description": "bike", "latitude": null
        }))
        .unwrap();
        assert_eq!(numeric.id, IncidentId("42".into()));
        assert!(numeric.position().is_none());

        let textual: Incident = serde_json::from_value(serde_json::json!({
            "id": "7d1c", "type": "Theft", "description": "bike",
            "latitude": 51.0, "longitude": -0.1, "created_at": "2025-03-01T10:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(textual.id.to_string(), "7d1c");
        assert_eq!(textual.position(), Some(GeoPosition::new(51.0, -0.1)));
    }

    #[test]
    fn other_uses_custom_label() {
        let report = IncidentReport {
            kind: "Other".into(),
            custom_kind: " Noise ".into(),
            description: "loud party".into(),
            position: None,
        };
        assert_eq!(report.final_kind(), "Noise");

        let report = IncidentReport {
            kind: "Theft".into(),
            custom_kind: "ignored".into(),
            ..Default::default()
        };
        assert_eq!(report.final_kind(), "Theft");
    }

    #[test]
    fn event_ignores_unconsumed_columns() {
        let event: IncidentEvent = serde_json::from_value(serde_json::json!({
            "id": 3, "type": "Assault", "description": "park incident", "latitude": 1.0
        }))
        .unwrap();
        assert_eq!(event.kind, "Assault");
        assert_eq!(event.description, "park incident");
    }

    #[test]
    fn event_description_may_be_null_or_missing() {
        let event: IncidentEvent = serde_json::from_value(serde_json::json!({
            "type": "Theft", "description": null
        }))
        .unwrap();
        assert_eq!(event.description, "");

        let event: IncidentEvent =
            serde_json::from_value(serde_json::json!({ "type": "Theft" })).unwrap();
        assert_eq!(event.description, "");
    }

    #[test]
    fn addresses_apply_by_id() {
        let mut incidents = vec![Incident {
            id: IncidentId("3".into()),
            kind: "Theft".into(),
            description: "bike".into(),
            latitude: Some(1.0),
            longitude: Some(2.0),
            created_at: None,
            address: None,
        }];
        apply_address(&mut incidents, &IncidentId("4".into()), "nowhere".into());
        assert_eq!(incidents[0].address, None);
        apply_address(&mut incidents, &IncidentId("3".into()), "High Street".into());
        assert_eq!(incidents[0].address.as_deref(), Some("High Street"));
    }
}
