//! Backend runtime setup and orchestration.
//!
//! This module wires together configuration, the remote collaborators, shared
//! state, and the message dispatch loop that listens to frontend bridge
//! requests.

use std::{path::PathBuf, sync::Arc, thread};

use safecircle_bridge::{MessageFromBackend, MessageToBackend, config::Config};
use tokio::sync::{
    RwLock,
    mpsc::{Receiver, Sender},
};

use crate::app::AppContext;
use crate::memory::MemoryBackend;
use crate::platform::{NotificationPlatform, desktop::DesktopPlatform};
use crate::remote::{
    Remote, RemoteError, geocode::OpenCageGeocoder, realtime::RealtimeClient, rest::SupabaseClient,
};
use crate::services;
use crate::state::State;

/// Builds the remote collaborators for the configured project, or the
/// offline backend when no project URL is set.
pub fn build_remote(config: &Config) -> Result<Remote, RemoteError> {
    let remote = match config.backend.url {
        None => {
            log::warn!("No backend URL configured, running against the offline backend");
            Remote::memory(Arc::new(MemoryBackend::new()))
        }
        Some(ref url) => {
            log::info!("Using backend at {url}");
            let client = Arc::new(SupabaseClient::new(&config.backend)?);
            Remote {
                auth: client.clone(),
                preferences: client.clone(),
                incidents: client.clone(),
                contacts: client,
                feed: Arc::new(RealtimeClient::new(&config.backend)?),
                geocoder: None,
            }
        }
    };

    match OpenCageGeocoder::from_config(&config.geocoding) {
        Ok(Some(geocoder)) => Ok(remote.with_geocoder(Arc::new(geocoder))),
        Ok(None) => {
            log::info!("No geocoding key configured, addresses will not be resolved");
            Ok(remote)
        }
        Err(error) => {
            log::error!("Failed to set up geocoding: {error}");
            Ok(remote)
        }
    }
}

/// Creates the application context and restores the previous session.
///
/// Push registration runs here only when configured to happen before sign
/// in; otherwise the first session start triggers it.
pub async fn start(
    config: Config,
    data_dir: Option<PathBuf>,
    remote: Remote,
    platform: Arc<dyn NotificationPlatform>,
    tx: Sender<MessageFromBackend>,
) -> Arc<AppContext> {
    let register_before_sign_in = config.push.register_before_sign_in;
    let context = Arc::new(AppContext {
        state: Arc::new(RwLock::new(State::new(config, data_dir))),
        tx,
        remote,
        platform,
    });

    if register_before_sign_in {
        services::push_service::ensure_registered(context.clone()).await;
    }
    services::auth_service::restore_session(context.clone()).await;
    context
}

/// Initialize backend state and start processing frontend messages.
async fn setup_backend(rx: Receiver<MessageToBackend>, tx: Sender<MessageFromBackend>) {
    let (config, data_dir) = match crate::config::load_config().await {
        Ok((config, data_dir)) => (config, Some(data_dir)),
        Err(error) => {
            log::error!("Failed to load config, using defaults: {error}");
            (Config::default(), None)
        }
    };

    let remote = match build_remote(&config) {
        Ok(remote) => remote,
        Err(error) => {
            log::error!("Invalid backend configuration, running offline: {error}");
            Remote::memory(Arc::new(MemoryBackend::new()))
        }
    };
    let platform = Arc::new(DesktopPlatform::new(tx.clone(), config.platform.clone()));

    let context = start(config, data_dir, remote, platform, tx).await;
    context.consume_bridge_messages(rx).await;
}

/// Spawn the backend runtime and begin processing bridge messages.
pub fn run(rx: Receiver<MessageToBackend>, tx: Sender<MessageFromBackend>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(error) => {
                log::error!("Failed to build tokio runtime: {error}");
                return;
            }
        };
        runtime.block_on(async { setup_backend(rx, tx).await });
    });
}
