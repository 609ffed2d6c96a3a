use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use safecircle_bridge::{auth::AuthSession, config::Config};
use tokio::{
    fs::{OpenOptions, create_dir_all, read_to_string, remove_file},
    io::AsyncWriteExt,
};

const CONFIG_FILE: &str = "config.toml";
const SESSION_FILE: &str = "session.json";
/// The session file holds bearer tokens, only the owner may read it.
#[cfg(unix)]
const SESSION_FILE_MODE: u32 = 0o600;

const ENV_SUPABASE_URL: &str = "SAFECIRCLE_SUPABASE_URL";
const ENV_SUPABASE_KEY: &str = "SAFECIRCLE_SUPABASE_KEY";
const ENV_OPENCAGE_KEY: &str = "SAFECIRCLE_OPENCAGE_KEY";

/// Errors that can occur while loading or resolving application configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to determine the user's configuration or data directories. This
    /// usually occurs when required environment variables are missing (e.g.,
    /// `$HOME` on Unix or `%APPDATA%` on Windows).
    #[error("failed to obtain user's directories")]
    DirectoriesNotFound,
    /// An I/O error occurred while reading or writing a file.
    #[error("failed to read config: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid TOML or does not match the expected structure.
    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] toml::de::Error),
    /// Failed to serialize the configuration to TOML.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    /// The stored session is not valid JSON.
    #[error("failed to process stored session: {0}")]
    SessionError(#[from] serde_json::Error),
}

fn build_project_dirs() -> Result<(PathBuf, PathBuf), ConfigError> {
    match ProjectDirs::from("dev", "safecircle", "safecircle") {
        Some(path) => Ok((
            path.config_dir().to_path_buf(),
            path.data_dir().to_path_buf(),
        )),
        None => Err(ConfigError::DirectoriesNotFound),
    }
}

/// Loads the application configuration from disk and applies environment
/// overrides. Returns the config and the data directory.
pub async fn load_config() -> Result<(Config, PathBuf), ConfigError> {
    let (config_dir, data_dir) = build_project_dirs()?;
    if let Ok(path) = dotenvy::dotenv() {
        log::info!("Loaded environment from {path:?}");
    }

    let mut config = load_config_file(&config_dir.join(CONFIG_FILE)).await?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    Ok((config, data_dir))
}

/// Reads a config file, creating it with defaults when missing.
pub async fn load_config_file(config_path: &Path) -> Result<Config, ConfigError> {
    log::info!("Loading configuration from {config_path:?}");
    if config_path.exists() {
        let contents = read_to_string(config_path).await?;
        return Ok(toml::from_str(&contents)?);
    }

    let config = Config::default();
    if let Some(parent) = config_path.parent() {
        create_dir_all(parent).await?;
    }

    let contents = toml::to_string_pretty(&config)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(config_path)
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;

    Ok(config)
}

/// Overrides backend and geocoding credentials from the environment.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    if let Some(url) = present(ENV_SUPABASE_URL) {
        config.backend.url = Some(url);
    }
    if let Some(key) = present(ENV_SUPABASE_KEY) {
        config.backend.anon_key = Some(key);
    }
    if let Some(key) = present(ENV_OPENCAGE_KEY) {
        config.geocoding.api_key = Some(key);
    }
}

/// Reads the session stored by [`save_session`], if any.
pub async fn load_session(data_dir: &Path) -> Result<Option<AuthSession>, ConfigError> {
    let path = data_dir.join(SESSION_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = read_to_string(path).await?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Stores the session tokens so that the next start can restore them.
pub async fn save_session(data_dir: &Path, session: &AuthSession) -> Result<(), ConfigError> {
    create_dir_all(data_dir).await?;
    let path = data_dir.join(SESSION_FILE);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(SESSION_FILE_MODE);
    let mut file = options.open(&path).await?;

    // `mode` only applies on creation, older files get tightened here
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(SESSION_FILE_MODE))
            .await?;
    }

    let contents = serde_json::to_string(session)?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;

    Ok(())
}

pub async fn clear_session(data_dir: &Path) -> Result<(), ConfigError> {
    match remove_file(data_dir.join(SESSION_FILE)).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}
