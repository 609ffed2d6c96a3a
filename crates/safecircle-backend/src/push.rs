//! Push registration: permission prompt, background handler and push
//! subscription, run at most once per application session.

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::platform::{NotificationPlatform, Permission, PushSubscription};

/// Errors produced while decoding an application server key.
#[derive(Debug, thiserror::Error)]
pub enum KeyDecodeError {
    /// The key contains characters outside the base64url alphabet or has an
    /// impossible length.
    #[error("invalid base64url application server key: {0}")]
    Invalid(#[from] base64::DecodeError),
}

/// Decodes a base64url application server key into raw bytes.
///
/// The key is padded with `=` to a multiple of four characters, `-` and `_`
/// are mapped back to `+` and `/`, and the result is decoded with the
/// standard alphabet.
pub fn decode_application_server_key(key: &str) -> Result<Vec<u8>, KeyDecodeError> {
    let padding = (4 - key.len() % 4) % 4;
    let mut standard = String::with_capacity(key.len() + padding);
    for character in key.chars() {
        standard.push(match character {
            '-' => '+',
            '_' => '/',
            other => other,
        });
    }
    standard.extend(std::iter::repeat_n('=', padding));
    Ok(STANDARD.decode(standard)?)
}

/// Progress of the push registration flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PushRegistrationState {
    #[default]
    Unregistered,
    /// Terminal: the platform lacks a permission or background handler API.
    Unsupported,
    PermissionRequested,
    PermissionGranted,
    /// Terminal for the session, the prompt is never shown again.
    PermissionDenied,
    HandlerRegistered,
    /// Terminal: push delivery is available.
    SubscriptionEstablished(PushSubscription),
    /// Terminal for the session; the next attempt happens on a fresh start.
    SubscriptionFailed,
}

impl PushRegistrationState {
    /// Whether the flow has stopped, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PushRegistrationState::Unsupported
                | PushRegistrationState::PermissionDenied
                | PushRegistrationState::SubscriptionEstablished(_)
                | PushRegistrationState::SubscriptionFailed
        )
    }
}

/// Linear state machine driving a single push registration attempt.
#[derive(Debug, Default)]
pub struct PushRegistration {
    state: PushRegistrationState,
    #[cfg(test)]
    history: Vec<PushRegistrationState>,
}

impl PushRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PushRegistrationState {
        &self.state
    }

    /// Every state entered so far, oldest first.
    #[cfg(test)]
    pub fn history(&self) -> &[PushRegistrationState] {
        &self.history
    }

    fn enter(&mut self, state: PushRegistrationState) {
        log::debug!("Push registration: {:?} -> {state:?}", self.state);
        #[cfg(test)]
        self.history.push(state.clone());
        self.state = state;
    }

    /// Runs the flow to a terminal state. Calling it again after it has
    /// started does nothing.
    pub async fn run(
        &mut self,
        platform: &dyn NotificationPlatform,
        handler_script: &str,
        application_server_key: &str,
    ) -> &PushRegistrationState {
        if self.state != PushRegistrationState::Unregistered {
            return &self.state;
        }

        if !platform.capabilities().supports_push() {
            log::warn!("Push notifications are not supported on this platform");
            self.enter(PushRegistrationState::Unsupported);
            return &self.state;
        }

        self.enter(PushRegistrationState::PermissionRequested);
        if platform.request_permission().await == Permission::Denied {
            log::warn!("Notification permission denied");
            self.enter(PushRegistrationState::PermissionDenied);
            return &self.state;
        }
        self.enter(PushRegistrationState::PermissionGranted);
        log::info!("Notifications enabled");

        let handle = match platform.register_handler(handler_script).await {
            Ok(handle) => handle,
            Err(error) => {
                log::error!("Push subscription failed: {error}");
                self.enter(PushRegistrationState::SubscriptionFailed);
                return &self.state;
            }
        };
        log::info!("Notification handler registered: {handle:?}");
        self.enter(PushRegistrationState::HandlerRegistered);

        let key = match decode_application_server_key(application_server_key) {
            Ok(key) => key,
            Err(error) => {
                log::error!("Push subscription failed: {error}");
                self.enter(PushRegistrationState::SubscriptionFailed);
                return &self.state;
            }
        };

        match platform.subscribe(&handle, &key).await {
            Ok(subscription) => {
                log::info!("Push subscription: {}", subscription.endpoint);
                self.enter(PushRegistrationState::SubscriptionEstablished(subscription));
            }
            Err(error) => {
                log::error!("Push subscription failed: {error}");
                self.enter(PushRegistrationState::SubscriptionFailed);
            }
        }
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use safecircle_bridge::config::DEFAULT_APPLICATION_SERVER_KEY;

    use super::*;
    use crate::testing::RecordingPlatform;

    #[test]
    fn url_safe_key_matches_standard_decoding() {
        let url_safe = "-_-_ab8";
        let standard = "+/+/ab8=";
        assert_eq!(
            decode_application_server_key(url_safe).unwrap(),
            STANDARD.decode(standard).unwrap()
        );
    }

    #[test]
    fn default_key_is_an_uncompressed_point() {
        let key = decode_application_server_key(DEFAULT_APPLICATION_SERVER_KEY).unwrap();
        assert_eq!(key.len(), 65);
        assert_eq!(key[0], 0x04);
    }

    #[test]
    fn garbage_keys_are_rejected() {
        assert!(decode_application_server_key("not a key!").is_err());
    }

    #[tokio::test]
    async fn granted_permission_reaches_subscription() {
        let platform = RecordingPlatform::new();
        let mut registration = PushRegistration::new();

        let state = registration
            .run(&platform, "/serviceWorker.js", DEFAULT_APPLICATION_SERVER_KEY)
            .await
            .clone();

        assert!(matches!(state, PushRegistrationState::SubscriptionEstablished(_)));
        assert_eq!(
            registration.history()[..4],
            [
                PushRegistrationState::PermissionRequested,
                PushRegistrationState::PermissionGranted,
                PushRegistrationState::HandlerRegistered,
                state.clone(),
            ]
        );
        assert_eq!(platform.subscribe_calls(), 1);
    }

    #[tokio::test]
    async fn denied_permission_skips_registration() {
        let platform = RecordingPlatform::new().deny_permission();
        let mut registration = PushRegistration::new();

        let state = registration
            .run(&platform, "/serviceWorker.js", DEFAULT_APPLICATION_SERVER_KEY)
            .await;

        assert_eq!(*state, PushRegistrationState::PermissionDenied);
        assert_eq!(platform.register_calls(), 0);
        assert_eq!(platform.subscribe_calls(), 0);
    }

    #[tokio::test]
    async fn missing_capabilities_end_unsupported() {
        let platform = RecordingPlatform::new().without_background_handlers();
        let mut registration = PushRegistration::new();

        let state = registration
            .run(&platform, "/serviceWorker.js", DEFAULT_APPLICATION_SERVER_KEY)
            .await;

        assert_eq!(*state, PushRegistrationState::Unsupported);
        assert_eq!(platform.permission_prompts(), 0);
    }

    #[tokio::test]
    async fn subscribe_failure_is_terminal() {
        let platform = RecordingPlatform::new().failing_subscriptions();
        let mut registration = PushRegistration::new();

        registration
            .run(&platform, "/serviceWorker.js", DEFAULT_APPLICATION_SERVER_KEY)
            .await;
        assert_eq!(*registration.state(), PushRegistrationState::SubscriptionFailed);

        // no automatic retry
        registration
            .run(&platform, "/serviceWorker.js", DEFAULT_APPLICATION_SERVER_KEY)
            .await;
        assert_eq!(platform.subscribe_calls(), 1);
        assert!(registration.state().is_terminal());
    }
}
