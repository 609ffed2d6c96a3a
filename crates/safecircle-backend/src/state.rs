use std::{path::PathBuf, sync::Arc};

use safecircle_bridge::{auth::AuthSession, config::Config, preferences::NotificationPreference};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::push::PushRegistration;

/// The signed-in user's context.
///
/// The preference record is the matcher's only filter source. It is
/// replaced as a whole on every successful save and never edited in place.
#[derive(Debug, Clone)]
pub struct Session {
    pub auth: AuthSession,
    /// `None` until loaded, or when loading failed.
    pub preferences: Option<Arc<NotificationPreference>>,
}

impl Session {
    pub fn new(auth: AuthSession) -> Self {
        Self {
            auth,
            preferences: None,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.auth.user.id
    }
}

/// A running incident feed subscription.
#[derive(Debug)]
pub struct WatcherHandle {
    /// Owner of the subscription.
    pub user_id: String,
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

/// The core application state that holds configuration, the current session
/// and the lifecycle of the alert pipeline.
///
/// It is designed to be wrapped in thread-safe, async-friendly concurrency
/// primitives (see [`SharedState`]) to allow safe concurrent reads and
/// occasional writes from multiple tasks.
#[derive(Debug)]
pub struct State {
    /// The loaded application configuration.
    pub config: Config,
    /// Directory for the stored session. `None` keeps sessions in memory only.
    pub data_dir: Option<PathBuf>,
    /// The authenticated user, if any.
    pub session: Option<Session>,
    /// Push registration flow; `None` until it has been started, which
    /// happens at most once per process.
    pub push: Option<PushRegistration>,
    /// The active incident feed subscription.
    pub watcher: Option<WatcherHandle>,
}

impl State {
    pub fn new(config: Config, data_dir: Option<PathBuf>) -> Self {
        Self {
            config,
            data_dir,
            session: None,
            push: None,
            watcher: None,
        }
    }

    /// Filter of the current session, if both exist.
    pub fn current_preferences(&self) -> Option<Arc<NotificationPreference>> {
        self.session
            .as_ref()
            .and_then(|session| session.preferences.clone())
    }
}

/// Thread-safe, async-friendly shared reference to the application [`State`].
pub type SharedState = Arc<tokio::sync::RwLock<State>>;
