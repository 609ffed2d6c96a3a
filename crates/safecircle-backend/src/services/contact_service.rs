use safecircle_bridge::{
    MessageFromBackend, contact::EmergencyContact, notification::NotificationType, routes,
};

/// Handles [`safecircle_bridge::MessageToBackend::EmergencyContactRequest`].
pub async fn handle_contact_request(context: super::AppContextHandle) {
    let Some(session) = super::require_session(&context).await else {
        return;
    };

    let contact = match context
        .remote
        .contacts
        .fetch_contact(&session.auth, session.user_id())
        .await
    {
        Ok(contact) => contact,
        Err(error) => {
            // shown as "no contact saved"
            log::error!("Error fetching emergency contact: {error}");
            None
        }
    };
    context
        .send(MessageFromBackend::EmergencyContactResponse(contact))
        .await;
}

/// Handles [`safecircle_bridge::MessageToBackend::SaveEmergencyContact`]. The
/// user's single contact is replaced.
pub async fn handle_save_contact(context: super::AppContextHandle, name: String, phone: String) {
    let Some(session) = super::require_session(&context).await else {
        return;
    };

    let contact = EmergencyContact {
        user_id: session.user_id().to_string(),
        name: name.trim().to_string(),
        phone: phone.trim().to_string(),
    };
    match context
        .remote
        .contacts
        .upsert_contact(&session.auth, &contact)
        .await
    {
        Ok(saved) => {
            context
                .send(MessageFromBackend::EmergencyContactResponse(Some(saved)))
                .await;
            context
                .send_notification(NotificationType::Success, "Contact saved!")
                .await;
            context.navigate(routes::EMERGENCY_CONTACTS);
        }
        Err(error) => {
            log::error!("Failed to save contact: {error}");
            context
                .send_notification(NotificationType::Error, "Failed to save contact")
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestBackend, drain};

    #[tokio::test]
    async fn saving_twice_keeps_one_contact() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.signed_in_context("a@example.com").await;

        handle_save_contact(context.clone(), "Mum".into(), "07700 900001".into()).await;
        handle_save_contact(context.clone(), " Dad ".into(), "07700 900002".into()).await;
        drain(&mut rx);

        handle_contact_request(context.clone()).await;
        match rx.recv().await {
            Some(MessageFromBackend::EmergencyContactResponse(Some(contact))) => {
                assert_eq!(contact.name, "Dad");
                assert_eq!(contact.dial_uri(), "tel:07700900002");
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(
            backend.platform.navigations().last().map(String::as_str),
            Some(routes::EMERGENCY_CONTACTS)
        );
    }

    #[tokio::test]
    async fn failed_save_is_reported() {
        let backend = TestBackend::new();
        let (context, mut rx) = backend.signed_in_context("a@example.com").await;
        drain(&mut rx);
        backend.memory.fail_requests(true);

        handle_save_contact(context.clone(), "Mum".into(), "07700 900001".into()).await;

        assert!(matches!(
            drain(&mut rx).as_slice(),
            [MessageFromBackend::NotificationMessage(message)]
                if message.message == "Failed to save contact"
        ));
    }

    #[tokio::test]
    async fn signed_out_requests_go_to_login() {
        let backend = TestBackend::new();
        let (context, _rx) = backend.context();

        handle_contact_request(context.clone()).await;

        assert_eq!(backend.platform.navigations(), [routes::LOGIN]);
    }
}
