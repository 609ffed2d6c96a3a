//! Loading, lazy creation and saving of the user's notification preferences.

use std::sync::Arc;

use safecircle_bridge::{
    MessageFromBackend,
    auth::AuthSession,
    notification::NotificationType,
    preferences::{AlertFrequency, NotificationPreference},
};

use crate::remote::{Remote, RemoteError};

/// The stored record of the session's user, if any.
pub async fn load(
    remote: &Remote,
    session: &AuthSession,
) -> Result<Option<NotificationPreference>, RemoteError> {
    remote
        .preferences
        .fetch_preferences(session, &session.user.id)
        .await
}

/// Returns the stored record, creating the default one first when the user
/// has none. Creation is a single insert that leaves an existing row alone.
pub async fn ensure_default(
    remote: &Remote,
    session: &AuthSession,
) -> Result<NotificationPreference, RemoteError> {
    let default = NotificationPreference::default_for(session.user.id.as_str());
    if let Some(created) = remote
        .preferences
        .insert_preferences_if_absent(session, &default)
        .await?
    {
        log::info!("Created default notification preferences for {}", created.user_id);
        return Ok(created);
    }

    load(remote, session)
        .await?
        .ok_or(RemoteError::NotFound("notification preference"))
}

/// Overwrites the whole record of the session's user.
pub async fn save(
    remote: &Remote,
    session: &AuthSession,
    types: Vec<String>,
    frequency: AlertFrequency,
) -> Result<NotificationPreference, RemoteError> {
    let preference = NotificationPreference {
        user_id: session.user.id.clone(),
        types,
        frequency,
    };
    remote
        .preferences
        .upsert_preferences(session, &preference)
        .await
}

/// Installs `preference` as the filter of the session, provided the same
/// user is still signed in.
async fn replace_in_session(
    context: &super::AppContextHandle,
    preference: NotificationPreference,
) -> Option<Arc<NotificationPreference>> {
    let mut state = context.state.write().await;
    let session = state.session.as_mut()?;
    if session.user_id() != preference.user_id {
        return None;
    }
    let preference = Arc::new(preference);
    session.preferences = Some(preference.clone());
    Some(preference)
}

/// Loads the filter of the signed-in user into the session. On failure the
/// session stays without a filter and `None` is returned.
pub async fn initialize(context: super::AppContextHandle) -> Option<Arc<NotificationPreference>> {
    let session = context.session().await?;
    match ensure_default(&context.remote, &session.auth).await {
        Ok(preference) => replace_in_session(&context, preference).await,
        Err(error) => {
            log::error!("Failed to load notification preferences: {error}");
            None
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::PreferencesRequest`].
pub async fn handle_preferences_request(context: super::AppContextHandle) {
    let Some(session) = super::require_session(&context).await else {
        return;
    };

    let preference = match session.preferences {
        Some(preference) => Some(preference),
        None => initialize(context.clone()).await,
    };
    match preference {
        Some(preference) => {
            context
                .send(MessageFromBackend::PreferencesResponse(
                    preference.as_ref().clone(),
                ))
                .await;
        }
        None => {
            context
                .send_notification(NotificationType::Error, "Failed to load preferences.")
                .await;
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::SavePreferences`]. A failed
/// save keeps the previous filter.
pub async fn handle_save_preferences(
    context: super::AppContextHandle,
    types: Vec<String>,
    frequency: AlertFrequency,
) {
    let Some(session) = super::require_session(&context).await else {
        return;
    };

    match save(&context.remote, &session.auth, types, frequency).await {
        Ok(preference) => {
            let saved = preference.clone();
            replace_in_session(&context, preference).await;
            context
                .send(MessageFromBackend::PreferencesResponse(saved))
                .await;
            context
                .send_notification(NotificationType::Success, "Preferences saved!")
                .await;
        }
        Err(error) => {
            log::error!("Failed to save preferences: {error}");
            context
                .send_notification(
                    NotificationType::Error,
                    "Failed to save preferences. Try again.",
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use safecircle_bridge::preferences::DEFAULT_INCIDENT_TYPES;

    use super::*;
    use crate::testing::TestBackend;

    #[tokio::test]
    async fn first_load_creates_exactly_one_default() {
        let backend = TestBackend::new();
        let session = backend.sign_in_user("a@example.com").await;

        let (first, second) = tokio::join!(
            ensure_default(&backend.remote, &session),
            ensure_default(&backend.remote, &session)
        );
        let first = first.unwrap();
        assert_eq!(first, second.unwrap());
        assert_eq!(first.types, DEFAULT_INCIDENT_TYPES);
        assert_eq!(first.frequency, AlertFrequency::Medium);
        assert_eq!(backend.memory.stored_preferences(&session.user.id), Some(first));
    }

    #[tokio::test]
    async fn existing_records_are_not_reset() {
        let backend = TestBackend::new();
        let session = backend.sign_in_user("a@example.com").await;
        save(
            &backend.remote,
            &session,
            vec!["Assault".into()],
            AlertFrequency::High,
        )
        .await
        .unwrap();

        let loaded = ensure_default(&backend.remote, &session).await.unwrap();
        assert_eq!(loaded.types, ["Assault"]);
        assert_eq!(loaded.frequency, AlertFrequency::High);
    }

    #[tokio::test]
    async fn save_is_idempotent() {
        let backend = TestBackend::new();
        let session = backend.sign_in_user("a@example.com").await;
        let types = vec!["Theft".to_string(), "Other".to_string()];

        let once = save(&backend.remote, &session, types.clone(), AlertFrequency::Low)
            .await
            .unwrap();
        let twice = save(&backend.remote, &session, types, AlertFrequency::Low)
            .await
            .unwrap();
        assert_eq!(once, twice);
        assert_eq!(backend.memory.stored_preferences(&session.user.id), Some(once));
    }

    #[tokio::test]
    async fn failed_save_keeps_the_previous_filter() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.signed_in_context("a@example.com").await;
        let before = context.state.read().await.current_preferences().unwrap();

        backend.memory.fail_requests(true);
        handle_save_preferences(context.clone(), vec!["Theft".into()], AlertFrequency::High)
            .await;

        let after = context.state.read().await.current_preferences().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(crate::testing::drain(&mut rx).iter().any(|message| matches!(
            message,
            MessageFromBackend::NotificationMessage(notification)
                if notification.notification_type == NotificationType::Error
        )));
    }

    #[tokio::test]
    async fn successful_save_replaces_the_filter() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;
        let before = context.state.read().await.current_preferences().unwrap();

        handle_save_preferences(context.clone(), vec!["Theft".into()], AlertFrequency::High)
            .await;

        let after = context.state.read().await.current_preferences().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.types, ["Theft"]);
        assert_eq!(before.types, DEFAULT_INCIDENT_TYPES);
    }
}
