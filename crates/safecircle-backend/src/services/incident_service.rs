//! Incident reporting, location picking and the incident list.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use futures_util::future::join_all;
use safecircle_bridge::{
    MessageFromBackend,
    incident::{GeoPosition, IncidentId, IncidentReport, NewIncident},
    notification::NotificationType,
    routes,
};

use crate::remote::Geocoder;

/// Reasons a report form is rejected before anything is stored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("Please select or enter an incident type and provide a description.")]
    MissingDetails,
    /// The device position could not be determined.
    #[error("Failed to get location. Please select it manually.")]
    MissingPosition,
}

/// Turns a filled-in report form into the row to insert.
pub fn prepare_report(
    report: &IncidentReport,
    now: DateTime<Utc>,
) -> Result<NewIncident, ReportError> {
    let kind = report.final_kind();
    if kind.is_empty() || report.description.trim().is_empty() {
        return Err(ReportError::MissingDetails);
    }
    let position = report.position.ok_or(ReportError::MissingPosition)?;

    Ok(NewIncident {
        kind: kind.to_string(),
        description: report.description.clone(),
        latitude: Some(position.latitude),
        longitude: Some(position.longitude),
        created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Handles [`safecircle_bridge::MessageToBackend::ReportIncident`]. On success
/// the user continues on the location picker for the new row.
pub async fn handle_report_incident(context: super::AppContextHandle, report: IncidentReport) {
    let Some(session) = super::require_session(&context).await else {
        return;
    };
    let incident = match prepare_report(&report, Utc::now()) {
        Ok(incident) => incident,
        Err(error) => {
            context
                .send_notification(NotificationType::Error, error.to_string())
                .await;
            return;
        }
    };

    match context
        .remote
        .incidents
        .insert_incident(&session.auth, &incident)
        .await
    {
        Ok(stored) => {
            log::info!("Reported {} incident {}", stored.kind, stored.id);
            context.navigate(&routes::report_location(&stored.id));
        }
        Err(error) => {
            log::error!("Failed to report incident: {error}");
            let message = error
                .api_message()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            context
                .send_notification(NotificationType::Error, message)
                .await;
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::SetIncidentLocation`].
pub async fn handle_set_incident_location(
    context: super::AppContextHandle,
    incident_id: Option<IncidentId>,
    position: Option<GeoPosition>,
) {
    let Some(incident_id) = incident_id else {
        context
            .send_notification(
                NotificationType::Error,
                "Error: No incident found. Please report again.",
            )
            .await;
        context.navigate(routes::DASHBOARD);
        return;
    };
    let Some(position) = position else {
        context
            .send_notification(
                NotificationType::Warning,
                "Please select a location before confirming.",
            )
            .await;
        return;
    };
    let Some(session) = super::require_session(&context).await else {
        return;
    };

    match context
        .remote
        .incidents
        .update_incident_location(&session.auth, &incident_id, position)
        .await
    {
        Ok(()) => {
            context
                .send_notification(NotificationType::Success, "Location saved successfully!")
                .await;
            context.navigate(routes::VIEW_INCIDENTS);
        }
        Err(error) => {
            log::error!("Failed to save location of incident {incident_id}: {error}");
            context
                .send_notification(NotificationType::Error, "Failed to save location. Try again.")
                .await;
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::IncidentsListRequest`].
///
/// The list is sent right away. Addresses follow one message per incident
/// as lookups finish; a failed lookup only affects its own incident.
pub async fn handle_incidents_list_request(
    context: super::AppContextHandle,
    position: Option<GeoPosition>,
) {
    let Some(session) = super::require_session(&context).await else {
        return;
    };
    let center = match position {
        Some(position) => position,
        None => context.state.read().await.config.map.default_center,
    };

    let incidents = match context.remote.incidents.list_incidents(&session.auth).await {
        Ok(incidents) => incidents,
        Err(error) => {
            log::error!("Failed to fetch incidents: {error}");
            context
                .send_notification(NotificationType::Error, "Failed to load incidents.")
                .await;
            return;
        }
    };

    let lookups: Vec<(IncidentId, GeoPosition)> = incidents
        .iter()
        .filter_map(|incident| Some((incident.id.clone(), incident.position()?)))
        .collect();
    context
        .send(MessageFromBackend::IncidentsListResponse { center, incidents })
        .await;

    if let Some(geocoder) = context.remote.geocoder.clone() {
        if !lookups.is_empty() {
            tokio::spawn(resolve_addresses(context.clone(), geocoder, lookups));
        }
    }
}

async fn resolve_addresses(
    context: super::AppContextHandle,
    geocoder: Arc<dyn Geocoder>,
    lookups: Vec<(IncidentId, GeoPosition)>,
) {
    let lookups = lookups.into_iter().map(|(incident_id, position)| {
        let context = context.clone();
        let geocoder = geocoder.clone();
        async move {
            match geocoder.reverse(position).await {
                Ok(address) => {
                    context
                        .send(MessageFromBackend::IncidentAddressResolved {
                            incident_id,
                            address,
                        })
                        .await;
                }
                Err(error) => {
                    log::error!("Error fetching address of incident {incident_id}: {error}");
                }
            }
        }
    });
    join_all(lookups).await;
}
