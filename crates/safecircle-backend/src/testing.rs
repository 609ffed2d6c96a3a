//! Shared fixtures for unit tests.

use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use safecircle_bridge::{
    MessageFromBackend,
    auth::AuthSession,
    config::Config,
    incident::{Incident, NewIncident},
    notification::{NotificationId, NotificationPayload, WindowId},
};
use tokio::sync::{
    RwLock,
    mpsc::{self, Receiver},
};

use crate::{
    AppContext,
    memory::MemoryBackend,
    platform::{
        ClientWindow, HandlerHandle, NotificationPlatform, Permission, PlatformCapabilities,
        PlatformError, PushSubscription,
    },
    remote::{AuthApi, Geocoder, IncidentStore, Remote},
    services::auth_service,
    state::State,
};

pub const PASSWORD: &str = "secret";

#[derive(Debug, Default)]
struct Calls {
    permission_prompts: usize,
    register_calls: usize,
    subscribe_calls: usize,
    window_queries: usize,
    shown: Vec<NotificationPayload>,
    closed: Vec<NotificationId>,
    focused: Vec<WindowId>,
    opened: Vec<String>,
    navigations: Vec<String>,
    windows: Vec<ClientWindow>,
}

/// Notification platform that records every call.
#[derive(Debug)]
pub struct RecordingPlatform {
    capabilities: PlatformCapabilities,
    permission: Permission,
    fail_subscriptions: bool,
    calls: Mutex<Calls>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            capabilities: PlatformCapabilities {
                notifications: true,
                background_handlers: true,
            },
            permission: Permission::Granted,
            fail_subscriptions: false,
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn deny_permission(mut self) -> Self {
        self.permission = Permission::Denied;
        self
    }

    pub fn without_background_handlers(mut self) -> Self {
        self.capabilities.background_handlers = false;
        self
    }

    pub fn failing_subscriptions(mut self) -> Self {
        self.fail_subscriptions = true;
        self
    }

    /// Adds an open window; ids count up from 0.
    pub fn with_window(self, url: &str) -> Self {
        {
            let mut calls = self.calls();
            let id = WindowId(calls.windows.len() as u32);
            calls.windows.push(ClientWindow {
                id,
                url: url.to_string(),
            });
        }
        self
    }

    fn calls(&self) -> std::sync::MutexGuard<'_, Calls> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn permission_prompts(&self) -> usize {
        self.calls().permission_prompts
    }

    pub fn register_calls(&self) -> usize {
        self.calls().register_calls
    }

    pub fn subscribe_calls(&self) -> usize {
        self.calls().subscribe_calls
    }

    pub fn window_queries(&self) -> usize {
        self.calls().window_queries
    }

    pub fn shown(&self) -> Vec<NotificationPayload> {
        self.calls().shown.clone()
    }

    pub fn closed(&self) -> Vec<NotificationId> {
        self.calls().closed.clone()
    }

    pub fn focused(&self) -> Vec<WindowId> {
        self.calls().focused.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.calls().opened.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls().navigations.clone()
    }

    /// Polls until at least `count` notifications were shown or `timeout`
    /// passed, then returns everything shown so far.
    pub async fn wait_for_notifications(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<NotificationPayload> {
        let _ = tokio::time::timeout(timeout, async {
            while self.shown().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        self.shown()
    }
}

#[async_trait]
impl NotificationPlatform for RecordingPlatform {
    fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities
    }

    async fn request_permission(&self) -> Permission {
        self.calls().permission_prompts += 1;
        self.permission
    }

    async fn register_handler(&self, script: &str) -> Result<HandlerHandle, PlatformError> {
        self.calls().register_calls += 1;
        Ok(HandlerHandle {
            script: script.to_string(),
            scope: "/".to_string(),
        })
    }

    async fn subscribe(
        &self,
        _handle: &HandlerHandle,
        application_server_key: &[u8],
    ) -> Result<PushSubscription, PlatformError> {
        let attempt = {
            let mut calls = self.calls();
            calls.subscribe_calls += 1;
            calls.subscribe_calls
        };
        if self.fail_subscriptions {
            return Err(PlatformError::Subscription("push service unavailable".into()));
        }
        Ok(PushSubscription {
            endpoint: format!("test://push/{attempt}"),
            application_server_key: application_server_key.to_vec(),
        })
    }

    fn show_notification(
        &self,
        payload: NotificationPayload,
    ) -> Result<NotificationId, PlatformError> {
        let mut calls = self.calls();
        calls.shown.push(payload);
        Ok(NotificationId(calls.shown.len() as u64))
    }

    fn close_notification(&self, id: NotificationId) {
        self.calls().closed.push(id);
    }

    async fn client_windows(&self) -> Vec<ClientWindow> {
        let mut calls = self.calls();
        calls.window_queries += 1;
        calls.windows.clone()
    }

    async fn focus_window(&self, id: WindowId) -> Result<(), PlatformError> {
        self.calls().focused.push(id);
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<WindowId, PlatformError> {
        let mut calls = self.calls();
        let id = WindowId(calls.windows.len() as u32);
        calls.windows.push(ClientWindow {
            id,
            url: url.to_string(),
        });
        calls.opened.push(url.to_string());
        Ok(id)
    }

    fn navigate(&self, url: &str) {
        self.calls().navigations.push(url.to_string());
    }
}

/// Offline backend plus a recording platform, ready to build contexts.
pub struct TestBackend {
    pub memory: Arc<MemoryBackend>,
    pub remote: Remote,
    pub platform: Arc<RecordingPlatform>,
}

impl TestBackend {
    pub fn new() -> Self {
        Self::with_memory(MemoryBackend::new())
    }

    pub fn with_memory(memory: MemoryBackend) -> Self {
        let memory = Arc::new(memory);
        Self {
            remote: Remote::memory(memory.clone()),
            memory,
            platform: Arc::new(RecordingPlatform::new()),
        }
    }

    pub fn with_geocoder(geocoder: Arc<dyn Geocoder>) -> Self {
        let mut backend = Self::new();
        backend.remote = backend.remote.with_geocoder(geocoder);
        backend
    }

    /// Registers the account if needed and signs it in directly against
    /// the store, bypassing the services.
    pub async fn sign_in_user(&self, email: &str) -> AuthSession {
        self.memory.register_user(email, PASSWORD);
        self.memory
            .sign_in(email, PASSWORD)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn insert(&self, session: &AuthSession, kind: &str, description: &str) -> Incident {
        let incident = NewIncident {
            kind: kind.to_string(),
            description: description.to_string(),
            latitude: None,
            longitude: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.memory.insert_incident(session, &incident).await.unwrap()
    }

    pub fn context(&self) -> (Arc<AppContext>, Receiver<MessageFromBackend>) {
        self.build_context(State::new(Config::default(), None))
    }

    pub fn context_with_data_dir(
        &self,
        data_dir: &Path,
    ) -> (Arc<AppContext>, Receiver<MessageFromBackend>) {
        self.build_context(State::new(
            Config::default(),
            Some(data_dir.to_path_buf()),
        ))
    }

    /// A context whose user signed in through the regular sign in handler.
    pub async fn signed_in_context(
        &self,
        email: &str,
    ) -> (Arc<AppContext>, Receiver<MessageFromBackend>) {
        self.memory.register_user(email, PASSWORD);
        let (context, rx) = self.context();
        auth_service::handle_sign_in(context.clone(), email.to_string(), PASSWORD.to_string())
            .await;
        (context, rx)
    }

    fn build_context(&self, state: State) -> (Arc<AppContext>, Receiver<MessageFromBackend>) {
        let (tx, rx) = mpsc::channel(256);
        let context = Arc::new(AppContext {
            state: Arc::new(RwLock::new(state)),
            tx,
            remote: self.remote.clone(),
            platform: self.platform.clone(),
        });
        (context, rx)
    }
}

/// Everything currently queued on the bridge.
pub fn drain(rx: &mut Receiver<MessageFromBackend>) -> Vec<MessageFromBackend> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}
