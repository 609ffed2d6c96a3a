//! Matches live incident inserts against the signed-in user's preferences
//! and raises a system notification for each match.
//!
//! When the feed ends on its own (the server closed the channel, usually
//! because the access token expired) the watcher refreshes the session and
//! subscribes again with backoff. After the last attempt it gives up and
//! tells the user.

use std::time::Duration;

use safecircle_bridge::{
    incident::IncidentEvent,
    notification::{NotificationData, NotificationPayload, NotificationType},
    preferences::NotificationPreference,
    routes,
};
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;

use super::{
    auth_service,
    notification_service::{self, NOTIFICATION_ICON},
};
use crate::state::WatcherHandle;

pub const ALERT_TITLE: &str = "New Incident Reported";
const ALERT_VIBRATION: [u32; 3] = [200, 100, 200];

const RESUBSCRIBE_ATTEMPTS: u32 = 5;
const RESUBSCRIBE_BACKOFF: Duration = Duration::from_millis(250);
const FEED_LOST_MESSAGE: &str = "Live incident alerts stopped. Sign in again to resume them.";

/// Whether the event passes the user's type filter.
pub fn matches(preference: &NotificationPreference, event: &IncidentEvent) -> bool {
    preference.wants(&event.kind)
}

/// The notification raised for a matching insert.
pub fn alert_payload(event: &IncidentEvent) -> NotificationPayload {
    NotificationPayload {
        title: ALERT_TITLE.to_string(),
        body: format!("{} - {}", event.kind, event.description),
        icon: NOTIFICATION_ICON.to_string(),
        data: NotificationData {
            url: routes::VIEW_INCIDENTS.to_string(),
        },
        vibrate: Some(ALERT_VIBRATION.to_vec()),
        require_interaction: true,
    }
}

/// Subscribes to incident inserts for the signed-in user. Does nothing
/// unless a session with loaded preferences exists; a running subscription
/// is replaced.
pub async fn activate(context: super::AppContextHandle) {
    let Some(session) = context.session().await else {
        log::debug!("Not watching incidents: nobody is signed in");
        return;
    };
    if session.preferences.is_none() {
        log::debug!("Not watching incidents: preferences are not loaded");
        return;
    }

    deactivate(context.clone()).await;

    let cancel = CancellationToken::new();
    let events = match context
        .remote
        .feed
        .subscribe_incident_inserts(&session.auth, cancel.clone())
        .await
    {
        Ok(events) => events,
        Err(error) => {
            log::error!("Failed to subscribe to incident inserts: {error}");
            return;
        }
    };

    let user_id = session.user_id().to_string();
    log::info!("Watching incident inserts for {user_id}");
    let task = tokio::spawn(watch(
        context.clone(),
        user_id.clone(),
        events,
        cancel.clone(),
    ));
    context.state.write().await.watcher = Some(WatcherHandle {
        user_id,
        cancel,
        task,
    });
}

/// Cancels the running subscription, if any, and waits for it to stop.
pub async fn deactivate(context: super::AppContextHandle) {
    let Some(watcher) = context.state.write().await.watcher.take() else {
        return;
    };
    watcher.cancel.cancel();
    if let Err(error) = watcher.task.await {
        log::error!("Incident watcher task failed: {error}");
    }
    log::info!("Stopped watching incident inserts for {}", watcher.user_id);
}

async fn watch(
    context: super::AppContextHandle,
    user_id: String,
    mut events: Receiver<IncidentEvent>,
    cancel: CancellationToken,
) {
    loop {
        if !drain_feed(&context, &user_id, &mut events, &cancel).await {
            return;
        }
        log::warn!("Incident feed for {user_id} ended, subscribing again");
        match resubscribe(&context, &user_id, &cancel).await {
            Some(next) => events = next,
            None => {
                give_up(&context, &cancel).await;
                return;
            }
        }
    }
}

/// Evaluates events until the feed ends (`true`) or the watcher is
/// cancelled (`false`).
async fn drain_feed(
    context: &super::AppContextHandle,
    user_id: &str,
    events: &mut Receiver<IncidentEvent>,
    cancel: &CancellationToken,
) -> bool {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            event = events.recv() => match event {
                Some(event) => evaluate(context, user_id, &event).await,
                None => return true,
            },
        }
    }
}

/// Subscribes again with the session's current tokens, refreshing them when
/// the feed refuses. `None` when cancelled, signed out, or out of attempts.
async fn resubscribe(
    context: &super::AppContextHandle,
    user_id: &str,
    cancel: &CancellationToken,
) -> Option<Receiver<IncidentEvent>> {
    let mut delay = RESUBSCRIBE_BACKOFF;
    for attempt in 1..=RESUBSCRIBE_ATTEMPTS {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        delay *= 2;

        let session = match context.session().await {
            Some(session) if session.user_id() == user_id => session,
            _ => return None,
        };
        let error = match context
            .remote
            .feed
            .subscribe_incident_inserts(&session.auth, cancel.clone())
            .await
        {
            Ok(events) => return Some(events),
            Err(error) => error,
        };
        log::warn!("Incident feed attempt {attempt} failed: {error}");

        let Some(refreshed) = auth_service::refresh_session(context.clone()).await else {
            continue;
        };
        match context
            .remote
            .feed
            .subscribe_incident_inserts(&refreshed, cancel.clone())
            .await
        {
            Ok(events) => return Some(events),
            Err(error) => log::warn!("Incident feed rejected the refreshed session: {error}"),
        }
    }
    None
}

/// Drops this watcher from the state and tells the user alerts stopped.
async fn give_up(context: &super::AppContextHandle, cancel: &CancellationToken) {
    if cancel.is_cancelled() {
        return;
    }
    log::error!("Giving up on the incident feed after {RESUBSCRIBE_ATTEMPTS} attempts");
    cancel.cancel();
    context
        .send_notification(NotificationType::Warning, FEED_LOST_MESSAGE)
        .await;

    // a cancelled token in the state can only be this watcher's
    let mut state = context.state.write().await;
    if state
        .watcher
        .as_ref()
        .is_some_and(|watcher| watcher.cancel.is_cancelled())
    {
        state.watcher = None;
    }
}

/// Evaluates one event against the preferences held by the session at this
/// moment. Events are dropped once the owning user is no longer signed in.
async fn evaluate(context: &super::AppContextHandle, user_id: &str, event: &IncidentEvent) {
    let preference = {
        let state = context.state.read().await;
        match state.session.as_ref() {
            Some(session) if session.user_id() == user_id => session.preferences.clone(),
            _ => None,
        }
    };
    let Some(preference) = preference else {
        return;
    };

    if !matches(&preference, event) {
        log::debug!("Ignoring {} incident", event.kind);
        return;
    }
    notification_service::show(context.platform.as_ref(), alert_payload(event));
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use safecircle_bridge::preferences::AlertFrequency;

    use super::*;
    use crate::testing::TestBackend;

    fn event(kind: &str, description: &str) -> IncidentEvent {
        IncidentEvent {
            kind: kind.to_string(),
            description: description.to_string(),
        }
    }

    #[test]
    fn only_selected_types_match() {
        let preference = NotificationPreference {
            user_id: "u".into(),
            types: vec!["Theft".into()],
            frequency: AlertFrequency::Medium,
        };
        assert!(!matches(&preference, &event("Vandalism", "x")));
        assert!(matches(&preference, &event("Theft", "window broken")));
        assert!(!matches(&preference, &event("theft", "case differs")));
    }

    #[test]
    fn alert_payload_shape() {
        let payload = alert_payload(&event("Theft", "window broken"));
        assert_eq!(payload.title, ALERT_TITLE);
        assert_eq!(payload.body, "Theft - window broken");
        assert_eq!(payload.data.url, "/view-incidents");
        assert_eq!(payload.vibrate, Some(vec![200, 100, 200]));
        assert!(payload.require_interaction);
    }

    #[tokio::test]
    async fn no_subscription_without_session() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.context();

        activate(context.clone()).await;
        assert!(context.state.read().await.watcher.is_none());
    }

    #[tokio::test]
    async fn no_subscription_without_preferences() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.context();
        let session = backend.sign_in_user("a@example.com").await;
        context.state.write().await.session = Some(crate::state::Session::new(session));

        activate(context.clone()).await;
        assert!(context.state.read().await.watcher.is_none());
    }

    #[tokio::test]
    async fn matching_inserts_raise_one_notification() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;
        let reporter = backend.sign_in_user("b@example.com").await;

        backend.insert(&reporter, "Book Club", "not a safety issue").await;
        backend.insert(&reporter, "Theft", "window broken").await;

        let shown = backend.platform.wait_for_notifications(1, Duration::from_secs(2)).await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "Theft - window broken");
        assert!(context.state.read().await.watcher.is_some());
    }

    #[tokio::test]
    async fn expired_feeds_resume_with_a_refreshed_session() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;
        let before = context.session().await.unwrap().auth;

        backend.memory.expire_access_tokens();
        let reporter = backend.sign_in_user("b@example.com").await;
        tokio::time::sleep(RESUBSCRIBE_BACKOFF * 2).await;
        backend.insert(&reporter, "Theft", "after expiry").await;

        let shown = backend.platform.wait_for_notifications(1, Duration::from_secs(2)).await;
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].body, "Theft - after expiry");

        let after = context.session().await.unwrap().auth;
        assert_ne!(after.access_token, before.access_token);
        assert!(context.state.read().await.watcher.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn lost_feeds_are_reported_and_cleared() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.signed_in_context("a@example.com").await;
        crate::testing::drain(&mut rx);

        // no refresh token, so the expired session cannot be renewed
        context
            .state
            .write()
            .await
            .session
            .as_mut()
            .unwrap()
            .auth
            .refresh_token = None;
        backend.memory.expire_access_tokens();

        let watcher = context.state.read().await.watcher.as_ref().map(|w| w.cancel.clone());
        tokio::time::timeout(Duration::from_secs(60), async {
            while context.state.read().await.watcher.is_some() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();
        assert!(watcher.unwrap().is_cancelled());

        let warnings: Vec<_> = crate::testing::drain(&mut rx)
            .into_iter()
            .filter_map(|message| match message {
                safecircle_bridge::MessageFromBackend::NotificationMessage(message) => {
                    Some(message.message)
                }
                _ => None,
            })
            .collect();
        assert_eq!(warnings, [FEED_LOST_MESSAGE]);
    }

    #[tokio::test]
    async fn deactivate_stops_delivery() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.signed_in_context("a@example.com").await;
        let reporter = backend.sign_in_user("b@example.com").await;

        deactivate(context.clone()).await;
        assert!(context.state.read().await.watcher.is_none());

        backend.insert(&reporter, "Theft", "after teardown").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(backend.platform.shown().is_empty());
    }
}
