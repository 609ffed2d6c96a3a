//! Backend service handlers for frontend-driven requests.
//!
//! This module groups async request handlers that operate on the shared
//! `AppContext`, perform side effects (network, filesystem, platform), and
//! emit responses or inline messages back to the frontend.

pub mod auth_service;
pub mod config_service;
pub mod contact_service;
pub mod incident_service;
pub mod incident_watcher;
pub mod notification_service;
pub mod preference_service;
pub mod push_service;

/// Represents a type that is used in all handlers as an application context.
pub(crate) type AppContextHandle = std::sync::Arc<crate::AppContext>;

/// Current session, or `None` after telling the user to sign in.
pub(crate) async fn require_session(context: &AppContextHandle) -> Option<crate::state::Session> {
    let session = context.session().await;
    if session.is_none() {
        context
            .send_notification(
                safecircle_bridge::notification::NotificationType::Warning,
                "Please log in first.",
            )
            .await;
        context.navigate(safecircle_bridge::routes::LOGIN);
    }
    session
}
