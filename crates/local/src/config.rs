use fitbooth_core::config::{self, Lookup};

/// Default address of the companion server on the kiosk.
pub const DEFAULT_LOCAL_API_URL: &str = "http://localhost:5000";

/// Local companion server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalServerConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
}

impl Default for LocalServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LOCAL_API_URL.to_string(),
        }
    }
}

impl LocalServerConfig {
    /// Load from the environment.
    ///
    /// | Env var         | Default                 |
    /// |-----------------|-------------------------|
    /// | `LOCAL_API_URL` | `http://localhost:5000` |
    pub fn from_env() -> Self {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        let url = config::optional_or(lookup, "LOCAL_API_URL", DEFAULT_LOCAL_API_URL);
        Self {
            base_url: config::trim_base_url(&url),
        }
    }
}
