use safecircle_bridge::incident::{
    DEFAULT_MAP_CENTER, GeoPosition, Incident, IncidentId, apply_address,
};

/// The last incident listing, newest first.
#[derive(Debug, Clone)]
pub struct IncidentsEntity {
    pub center: GeoPosition,
    pub incidents: Vec<Incident>,
}

impl Default for IncidentsEntity {
    fn default() -> Self {
        Self {
            center: DEFAULT_MAP_CENTER,
            incidents: Vec::new(),
        }
    }
}

impl IncidentsEntity {
    pub fn replace(&mut self, center: GeoPosition, incidents: Vec<Incident>) {
        self.center = center;
        self.incidents = incidents;
    }

    /// Stores a resolved address; returns the updated incident if it is
    /// still listed.
    pub fn resolve_address(&mut self, incident_id: &IncidentId, address: String) -> Option<&Incident> {
        apply_address(&mut self.incidents, incident_id, address);
        self.incidents
            .iter()
            .find(|incident| &incident.id == incident_id)
    }
}
