use safecircle_bridge::MessageFromBackend;

/// Handles an incoming configuration request (see
/// [`safecircle_bridge::MessageToBackend::ConfigurationRequest`]). The
/// frontend sends it once on start, so the restored user is reported too.
pub async fn handle_config_request(context: super::AppContextHandle) {
    let (config, user) = {
        let state = context.state.read().await;
        (
            state.config.clone(),
            state.session.as_ref().map(|session| session.auth.user.clone()),
        )
    };
    context
        .send(MessageFromBackend::ConfigurationResponse(config))
        .await;
    context.send(MessageFromBackend::SessionChanged(user)).await;
}
