//! Rendering of system notifications and routing of notification clicks.

use safecircle_bridge::{
    notification::{
        ClickContext, NotificationData, NotificationId, NotificationPayload, SystemNotification,
    },
    routes,
};
use serde::Deserialize;

use crate::platform::{NotificationPlatform, PlatformError};

pub const NOTIFICATION_ICON: &str = "/notification-icon.png";
pub const DEFAULT_PUSH_TITLE: &str = "New Alert";
pub const DEFAULT_PUSH_BODY: &str = "Click to view more details.";

/// Body of a generic push message. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct PushMessage {
    title: Option<String>,
    body: Option<String>,
    url: Option<String>,
}

/// Plain payload carrying `url` as the click destination.
pub fn payload(
    title: impl Into<String>,
    body: impl Into<String>,
    url: impl Into<String>,
) -> NotificationPayload {
    NotificationPayload {
        title: title.into(),
        body: body.into(),
        icon: NOTIFICATION_ICON.to_string(),
        data: NotificationData { url: url.into() },
        vibrate: None,
        require_interaction: false,
    }
}

/// Builds the payload for a raw push body, filling in defaults for missing
/// fields. Unreadable bodies count as empty.
pub fn push_payload(body: Option<&str>) -> NotificationPayload {
    let message = match body {
        Some(body) => serde_json::from_str::<PushMessage>(body).unwrap_or_else(|error| {
            log::warn!("Ignoring unreadable push body: {error}");
            PushMessage::default()
        }),
        None => PushMessage::default(),
    };

    payload(
        message
            .title
            .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string()),
        message.body.unwrap_or_else(|| DEFAULT_PUSH_BODY.to_string()),
        message.url.unwrap_or_else(|| routes::ROOT.to_string()),
    )
}

/// Asks the platform to render a notification without waiting for it.
pub fn show(
    platform: &dyn NotificationPlatform,
    payload: NotificationPayload,
) -> Option<NotificationId> {
    let title = payload.title.clone();
    match platform.show_notification(payload) {
        Ok(id) => {
            log::debug!("Showing notification {id}: {title}");
            Some(id)
        }
        Err(error) => {
            log::error!("Failed to show notification `{title}`: {error}");
            None
        }
    }
}

/// Closes the clicked notification and brings its destination up.
///
/// Background clicks focus an open window already showing the destination
/// (exact URL match) or else open exactly one new window. Foreground clicks
/// navigate the current window.
pub async fn route_click(
    platform: &dyn NotificationPlatform,
    notification: &SystemNotification,
    context: ClickContext,
) -> Result<(), PlatformError> {
    platform.close_notification(notification.id);
    let url = notification.payload.data.url.as_str();

    match context {
        ClickContext::Foreground => {
            platform.navigate(url);
            Ok(())
        }
        ClickContext::Background => {
            let windows = platform.client_windows().await;
            match windows.iter().find(|window| window.url == url) {
                Some(window) => platform.focus_window(window.id).await,
                None => platform.open_window(url).await.map(|_| ()),
            }
        }
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::NotificationClicked`].
pub async fn handle_notification_clicked(
    context: super::AppContextHandle,
    notification: SystemNotification,
    click: ClickContext,
) {
    log::info!(
        "Notification {} clicked ({click:?}): {}",
        notification.id,
        notification.payload.data.url
    );
    if let Err(error) = route_click(context.platform.as_ref(), &notification, click).await {
        log::error!("Failed to route notification click: {error}");
    }
}

/// Handles [`safecircle_bridge::MessageToBackend::PushReceived`].
pub fn handle_push_received(context: super::AppContextHandle, body: Option<String>) {
    show(context.platform.as_ref(), push_payload(body.as_deref()));
}

#[cfg(test)]
mod tests {
    use safecircle_bridge::notification::WindowId;

    use super::*;
    use crate::testing::RecordingPlatform;

    fn clicked(url: &str) -> SystemNotification {
        SystemNotification {
            id: NotificationId(5),
            payload: payload("t", "b", url),
        }
    }

    #[test]
    fn push_defaults_fill_missing_fields() {
        let empty = push_payload(None);
        assert_eq!(empty.title, DEFAULT_PUSH_TITLE);
        assert_eq!(empty.body, DEFAULT_PUSH_BODY);
        assert_eq!(empty.data.url, "/");
        assert_eq!(empty.icon, NOTIFICATION_ICON);

        let partial = push_payload(Some(r#"{ "title": "Road closed", "url": "/dashboard" }"#));
        assert_eq!(partial.title, "Road closed");
        assert_eq!(partial.body, DEFAULT_PUSH_BODY);
        assert_eq!(partial.data.url, "/dashboard");

        assert_eq!(push_payload(Some("{oops")).title, DEFAULT_PUSH_TITLE);
    }

    #[tokio::test]
    async fn background_click_focuses_matching_window() {
        let platform = RecordingPlatform::new()
            .with_window("/dashboard")
            .with_window("/view-incidents");

        route_click(&platform, &clicked("/view-incidents"), ClickContext::Background)
            .await
            .unwrap();

        assert_eq!(platform.closed(), [NotificationId(5)]);
        assert_eq!(platform.focused(), [WindowId(1)]);
        assert!(platform.opened().is_empty());
    }

    #[tokio::test]
    async fn background_click_opens_one_window_without_match() {
        // no normalization: a trailing slash is a different URL
        let platform = RecordingPlatform::new().with_window("/view-incidents/");

        route_click(&platform, &clicked("/view-incidents"), ClickContext::Background)
            .await
            .unwrap();

        assert!(platform.focused().is_empty());
        assert_eq!(platform.opened(), ["/view-incidents"]);
    }

    #[tokio::test]
    async fn foreground_click_navigates_without_searching() {
        let platform = RecordingPlatform::new().with_window("/view-incidents");

        route_click(&platform, &clicked("/view-incidents"), ClickContext::Foreground)
            .await
            .unwrap();

        assert_eq!(platform.closed(), [NotificationId(5)]);
        assert_eq!(platform.navigations(), ["/view-incidents"]);
        assert!(platform.focused().is_empty());
        assert!(platform.opened().is_empty());
        assert_eq!(platform.window_queries(), 0);
    }
}
