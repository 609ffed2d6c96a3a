use safecircle_bridge::{incident::IncidentId, notification::WindowId, routes};

/// Query parameter carrying the incident on the location picker route.
const INCIDENT_ID_PARAMETER: &str = "incidentId";

/// Application windows and the route each one shows.
#[derive(Debug, Clone)]
pub struct WindowsEntity {
    pub open: Vec<(WindowId, String)>,
    pub foreground: WindowId,
}

impl Default for WindowsEntity {
    fn default() -> Self {
        Self {
            open: vec![(WindowId(0), routes::ROOT.to_string())],
            foreground: WindowId(0),
        }
    }
}

impl WindowsEntity {
    /// Moves a window to `url`, adopting it if it was unknown.
    pub fn navigate(&mut self, window_id: WindowId, url: &str) {
        match self.open.iter_mut().find(|(id, _)| *id == window_id) {
            Some((_, route)) => *route = url.to_string(),
            None => self.open.push((window_id, url.to_string())),
        }
    }

    pub fn open(&mut self, window_id: WindowId, url: &str) {
        self.navigate(window_id, url);
        self.foreground = window_id;
    }

    pub fn focus(&mut self, window_id: WindowId) {
        self.foreground = window_id;
    }

    /// Route of the foreground window.
    pub fn current_route(&self) -> &str {
        self.open
            .iter()
            .find(|(id, _)| *id == self.foreground)
            .map(|(_, route)| route.as_str())
            .unwrap_or(routes::ROOT)
    }

    /// Incident the foreground location picker was opened for.
    pub fn pending_incident(&self) -> Option<IncidentId> {
        let (_, query) = self.current_route().split_once('?')?;
        query.split('&').find_map(|pair| match pair.split_once('=') {
            Some((INCIDENT_ID_PARAMETER, value)) if !value.is_empty() => {
                Some(IncidentId(value.to_string()))
            }
            _ => None,
        })
    }
}
