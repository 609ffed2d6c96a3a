use crate::push::PushRegistration;

/// Starts the push registration flow unless it already ran in this process.
pub async fn ensure_registered(context: super::AppContextHandle) {
    let (handler_script, application_server_key) = {
        let mut state = context.state.write().await;
        if state.push.is_some() {
            return;
        }
        // claims the single run before the lock is released
        state.push = Some(PushRegistration::new());
        (
            state.config.push.handler_script.clone(),
            state.config.push.application_server_key.clone(),
        )
    };

    let mut registration = PushRegistration::new();
    registration
        .run(
            context.platform.as_ref(),
            &handler_script,
            &application_server_key,
        )
        .await;
    log::info!("Push registration finished: {:?}", registration.state());
    context.state.write().await.push = Some(registration);
}
