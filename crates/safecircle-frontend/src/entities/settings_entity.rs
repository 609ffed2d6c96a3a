use safecircle_bridge::config::Config;

#[derive(Debug, Clone, Default)]
pub struct SettingsEntity {
    pub config: Config,
}

impl SettingsEntity {
    pub fn update(&mut self, config: Config) {
        self.config = config;
    }

    /// Host of the configured project, or a note that the app is offline.
    pub fn describe_backend(&self) -> String {
        match self.config.backend.url {
            Some(ref url) => format!("Connected to {url}"),
            None => "Running against the offline backend".to_string(),
        }
    }
}
