//! Sign in, sign up, password recovery and the session lifecycle.

use safecircle_bridge::{
    MessageFromBackend, auth::AuthSession, notification::NotificationType, routes,
};

use super::{incident_watcher, preference_service, push_service};
use crate::state::Session;

const ALREADY_REGISTERED: &str = "User already registered";

/// Handles [`safecircle_bridge::MessageToBackend::SignIn`].
pub async fn handle_sign_in(context: super::AppContextHandle, email: String, password: String) {
    match context.remote.auth.sign_in(&email, &password).await {
        Ok(Some(session)) => {
            log::info!("Signed in as {}", session.user.id);
            start_session(context.clone(), session).await;
            context.navigate(routes::DASHBOARD);
        }
        Ok(None) => {
            context
                .send_notification(
                    NotificationType::Error,
                    "Login failed. Check your email for verification.",
                )
                .await;
        }
        Err(error) => {
            log::error!("Sign in failed: {error}");
            context
                .send_notification(
                    NotificationType::Error,
                    "Invalid login credentials. Please try again.",
                )
                .await;
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::SignUp`]. A new account
/// has to be confirmed by mail, so no session is kept.
pub async fn handle_sign_up(context: super::AppContextHandle, email: String, password: String) {
    if let Err(error) = context.remote.auth.sign_up(&email, &password).await {
        log::error!("Sign up failed: {error}");
        let message = match error.api_message() {
            Some(message) if message.contains(ALREADY_REGISTERED) => {
                "Email is already in use. Please log in instead.".to_string()
            }
            Some(message) => message.to_string(),
            None => error.to_string(),
        };
        context
            .send_notification(NotificationType::Error, message)
            .await;
        return;
    }

    context
        .send_notification(
            NotificationType::Info,
            "Check your email to confirm your account before logging in.",
        )
        .await;
    end_session(context.clone()).await;
    context.navigate(routes::LOGIN);
}

/// Handles [`safecircle_bridge::MessageToBackend::RequestPasswordReset`].
pub async fn handle_password_reset_request(context: super::AppContextHandle, email: String) {
    let email = email.trim();
    if email.is_empty() {
        context
            .send_notification(NotificationType::Warning, "Please enter your email first.")
            .await;
        return;
    }

    let redirect_to = {
        let state = context.state.read().await;
        format!(
            "{}{}",
            state.config.backend.site_url.trim_end_matches('/'),
            routes::RESET_PASSWORD
        )
    };
    match context
        .remote
        .auth
        .request_password_reset(email, &redirect_to)
        .await
    {
        Ok(()) => {
            context
                .send_notification(
                    NotificationType::Success,
                    "Password reset email sent. Check your inbox.",
                )
                .await;
        }
        Err(error) => {
            log::error!("Password reset request failed: {error}");
            context
                .send_notification(
                    NotificationType::Error,
                    "Error sending reset email. Try again later.",
                )
                .await;
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::UpdatePassword`] for the
/// current (recovery) session.
pub async fn handle_update_password(context: super::AppContextHandle, password: String) {
    let result = match context.session().await {
        Some(session) => context
            .remote
            .auth
            .update_password(&session.auth, &password)
            .await
            .map_err(|error| error.to_string()),
        None => Err("no active session".to_string()),
    };

    match result {
        Ok(()) => {
            context
                .send_notification(
                    NotificationType::Success,
                    "Password reset successful. You can now log in.",
                )
                .await;
            context.navigate(routes::LOGIN);
        }
        Err(error) => {
            log::error!("Password update failed: {error}");
            context
                .send_notification(
                    NotificationType::Error,
                    "Failed to reset password. Try again.",
                )
                .await;
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::SignOut`].
pub async fn handle_sign_out(context: super::AppContextHandle) {
    if let Some(session) = context.session().await {
        if let Err(error) = context.remote.auth.sign_out(&session.auth).await {
            log::error!("Failed to revoke session: {error}");
        }
    }
    end_session(context.clone()).await;
    context.navigate(routes::ROOT);
}

/// Installs a new session and brings the alert pipeline up in order:
/// preferences, push registration, then the incident watcher.
pub async fn start_session(context: super::AppContextHandle, auth: AuthSession) {
    incident_watcher::deactivate(context.clone()).await;

    let data_dir = {
        let mut state = context.state.write().await;
        state.session = Some(Session::new(auth.clone()));
        state.data_dir.clone()
    };
    if let Some(data_dir) = data_dir {
        if let Err(error) = crate::config::save_session(&data_dir, &auth).await {
            log::error!("Failed to store session: {error}");
        }
    }
    context
        .send(MessageFromBackend::SessionChanged(Some(auth.user.clone())))
        .await;

    let preferences = preference_service::initialize(context.clone()).await;
    push_service::ensure_registered(context.clone()).await;
    if preferences.is_some() {
        incident_watcher::activate(context.clone()).await;
    }
}

/// Tears the session down: the watcher is cancelled first so that no event
/// is evaluated against a stale filter.
pub async fn end_session(context: super::AppContextHandle) {
    incident_watcher::deactivate(context.clone()).await;

    let (previous, data_dir) = {
        let mut state = context.state.write().await;
        (state.session.take(), state.data_dir.clone())
    };
    if previous.is_none() {
        return;
    }
    if let Some(data_dir) = data_dir {
        if let Err(error) = crate::config::clear_session(&data_dir).await {
            log::error!("Failed to remove stored session: {error}");
        }
    }
    log::info!("Signed out");
    context.send(MessageFromBackend::SessionChanged(None)).await;
}

/// Swaps the current session's tokens for fresh ones and stores them. The
/// preference filter is kept. Returns the new tokens, or `None` when there
/// was nothing to refresh or the auth service refused.
pub async fn refresh_session(context: super::AppContextHandle) -> Option<AuthSession> {
    let current = context.session().await?;
    let refreshed = exchange_refresh_token(&context, &current.auth).await?;

    let data_dir = {
        let mut state = context.state.write().await;
        match state.session.as_mut() {
            Some(session) if session.user_id() == refreshed.user.id => {
                session.auth = refreshed.clone();
            }
            _ => return None,
        }
        state.data_dir.clone()
    };
    if let Some(data_dir) = data_dir {
        if let Err(error) = crate::config::save_session(&data_dir, &refreshed).await {
            log::error!("Failed to store session: {error}");
        }
    }
    log::info!("Refreshed session of {}", refreshed.user.id);
    Some(refreshed)
}

async fn exchange_refresh_token(
    context: &super::AppContextHandle,
    auth: &AuthSession,
) -> Option<AuthSession> {
    let refresh_token = auth.refresh_token.as_deref()?;
    match context.remote.auth.refresh_session(refresh_token).await {
        Ok(refreshed) => Some(refreshed),
        Err(error) => {
            log::warn!("Failed to refresh session: {error}");
            None
        }
    }
}

/// Restores the session stored by a previous run. An expired access token is
/// refreshed before the session is given up.
pub async fn restore_session(context: super::AppContextHandle) {
    let Some(data_dir) = context.state.read().await.data_dir.clone() else {
        return;
    };
    let stored = match crate::config::load_session(&data_dir).await {
        Ok(Some(stored)) => stored,
        Ok(None) => return,
        Err(error) => {
            log::error!("Failed to read stored session: {error}");
            return;
        }
    };

    match context.remote.auth.current_user(&stored).await {
        Ok(user) => {
            log::info!("Restored session of {}", user.id);
            start_session(context, AuthSession { user, ..stored }).await;
        }
        Err(error) => {
            log::warn!("Stored access token was rejected: {error}");
            if let Some(refreshed) = exchange_refresh_token(&context, &stored).await {
                log::info!("Restored session of {} with a refreshed token", refreshed.user.id);
                start_session(context, refreshed).await;
                return;
            }
            log::warn!("Stored session is no longer valid");
            if let Err(error) = crate::config::clear_session(&data_dir).await {
                log::error!("Failed to remove stored session: {error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use safecircle_bridge::notification::NotificationMessage;

    use super::*;
    use crate::{
        memory::MemoryBackend,
        push::PushRegistrationState,
        remote::AuthApi,
        testing::{TestBackend, drain},
    };

    fn messages(received: &[MessageFromBackend]) -> Vec<String> {
        received
            .iter()
            .filter_map(|message| match message {
                MessageFromBackend::NotificationMessage(NotificationMessage { message, .. }) => {
                    Some(message.clone())
                }
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn sign_in_brings_the_pipeline_up() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;

        let state = context.state.read().await;
        assert!(state.current_preferences().is_some());
        assert!(state.watcher.is_some());
        assert!(matches!(
            state.push.as_ref().map(|push| push.state()),
            Some(PushRegistrationState::SubscriptionEstablished(_))
        ));
        assert_eq!(backend.platform.navigations(), [routes::DASHBOARD]);
    }

    #[tokio::test]
    async fn wrong_password_is_reported() {
        let backend = TestBackend::new();
        backend.memory.register_user("a@example.com", "secret");
        let (context, mut rx) = backend.context();

        handle_sign_in(context.clone(), "a@example.com".into(), "nope".into()).await;

        assert!(context.session().await.is_none());
        assert_eq!(
            messages(&drain(&mut rx)),
            ["Invalid login credentials. Please try again."]
        );
    }

    #[tokio::test]
    async fn unconfirmed_sign_in_is_reported() {
        let backend = TestBackend::with_memory(MemoryBackend::new().requiring_email_confirmation());
        let (context, mut rx) = backend.context();

        handle_sign_up(context.clone(), "a@example.com".into(), "pw".into()).await;
        handle_sign_in(context.clone(), "a@example.com".into(), "pw".into()).await;

        assert_eq!(
            messages(&drain(&mut rx)),
            [
                "Check your email to confirm your account before logging in.",
                "Login failed. Check your email for verification.",
            ]
        );
        assert_eq!(backend.platform.navigations(), [routes::LOGIN]);
    }

    #[tokio::test]
    async fn duplicate_sign_up_is_friendly() {
        let backend = TestBackend::new();
        backend.memory.register_user("a@example.com", "secret");
        let (context, mut rx) = backend.context();

        handle_sign_up(context.clone(), "a@example.com".into(), "pw".into()).await;

        assert_eq!(
            messages(&drain(&mut rx)),
            ["Email is already in use. Please log in instead."]
        );
    }

    #[tokio::test]
    async fn password_reset_needs_an_email() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.context();

        handle_password_reset_request(context.clone(), "  ".into()).await;
        handle_password_reset_request(context.clone(), "a@example.com".into()).await;

        assert_eq!(
            messages(&drain(&mut rx)),
            [
                "Please enter your email first.",
                "Password reset email sent. Check your inbox.",
            ]
        );
        assert_eq!(
            backend.memory.password_resets(),
            [(
                "a@example.com".to_string(),
                "http://localhost:5173/reset-password".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn password_update_needs_a_session() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.context();

        handle_update_password(context.clone(), "new".into()).await;
        assert_eq!(
            messages(&drain(&mut rx)),
            ["Failed to reset password. Try again."]
        );

        let (context, mut rx) = backend.signed_in_context("a@example.com").await;
        drain(&mut rx);
        handle_update_password(context.clone(), "new".into()).await;
        assert_eq!(
            messages(&drain(&mut rx)),
            ["Password reset successful. You can now log in."]
        );
    }

    #[tokio::test]
    async fn sign_out_clears_the_session() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.signed_in_context("a@example.com").await;
        drain(&mut rx);

        handle_sign_out(context.clone()).await;

        let state = context.state.read().await;
        assert!(state.session.is_none());
        assert!(state.watcher.is_none());
        assert!(drain(&mut rx)
            .iter()
            .any(|message| matches!(message, MessageFromBackend::SessionChanged(None))));
        assert_eq!(backend.platform.navigations().last().map(String::as_str), Some("/"));
    }

    #[tokio::test]
    async fn push_registration_runs_once_per_process() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;
        handle_sign_out(context.clone()).await;

        backend.memory.register_user("b@example.com", "secret");
        handle_sign_in(context.clone(), "b@example.com".into(), "secret".into()).await;

        assert_eq!(backend.platform.permission_prompts(), 1);
        assert_eq!(backend.platform.subscribe_calls(), 1);
    }

    #[tokio::test]
    async fn stored_sessions_are_restored() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TestBackend::new();
        let (first, _rx) = backend.context_with_data_dir(dir.path());
        backend.memory.register_user("a@example.com", "secret");
        handle_sign_in(first.clone(), "a@example.com".into(), "secret".into()).await;
        incident_watcher::deactivate(first).await;

        let (second, _rx) = backend.context_with_data_dir(dir.path());
        restore_session(second.clone()).await;

        let session = second.session().await.unwrap();
        assert_eq!(session.auth.user.email.as_deref(), Some("a@example.com"));
        assert!(session.preferences.is_some());
    }

    #[tokio::test]
    async fn expired_sessions_are_refreshed_on_restore() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TestBackend::new();
        let (first, _rx) = backend.context_with_data_dir(dir.path());
        backend.memory.register_user("a@example.com", "secret");
        handle_sign_in(first.clone(), "a@example.com".into(), "secret".into()).await;
        incident_watcher::deactivate(first.clone()).await;
        let expired = first.session().await.unwrap().auth;
        backend.memory.expire_access_tokens();

        let (second, _rx) = backend.context_with_data_dir(dir.path());
        restore_session(second.clone()).await;

        let session = second.session().await.unwrap();
        assert_eq!(session.auth.user, expired.user);
        assert_ne!(session.auth.access_token, expired.access_token);
        assert!(session.preferences.is_some());
        assert!(second.state.read().await.watcher.is_some());
        assert_eq!(
            crate::config::load_session(dir.path()).await.unwrap(),
            Some(session.auth)
        );
    }

    #[tokio::test]
    async fn refresh_keeps_the_preference_filter() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;
        let before = context.session().await.unwrap();

        let refreshed = refresh_session(context.clone()).await.unwrap();

        let after = context.session().await.unwrap();
        assert_eq!(after.auth, refreshed);
        assert_ne!(after.auth.access_token, before.auth.access_token);
        assert_eq!(after.preferences, before.preferences);
        assert!(backend.memory.current_user(&before.auth).await.is_err());
    }

    #[tokio::test]
    async fn revoked_sessions_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TestBackend::new();
        let (first, _rx) = backend.context_with_data_dir(dir.path());
        backend.memory.register_user("a@example.com", "secret");
        handle_sign_in(first.clone(), "a@example.com".into(), "secret".into()).await;
        let session = first.session().await.unwrap();
        backend.memory.sign_out(&session.auth).await.unwrap();

        let (second, _rx) = backend.context_with_data_dir(dir.path());
        restore_session(second.clone()).await;

        assert!(second.session().await.is_none());
        assert_eq!(crate::config::load_session(dir.path()).await.unwrap(), None);
    }
}
