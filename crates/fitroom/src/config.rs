use std::time::Duration;

use fitbooth_core::config::{self, Lookup};
use fitbooth_core::ConfigError;

pub const DEFAULT_API_URL: &str = "https://platform.fitroom.app/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Value shipped in sample env files; never a real key.
const PLACEHOLDER_KEY: &str = "your-api-key";
const MIN_KEY_LEN: usize = 10;

/// FitRoom service settings.
#[derive(Clone)]
pub struct FitRoomConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for FitRoomConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitRoomConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FitRoomConfig {
    /// Load from the environment.
    ///
    /// | Env var                | Required | Default                            |
    /// |------------------------|----------|------------------------------------|
    /// | `FITROOM_API_KEY`      | yes      | --                                 |
    /// | `FITROOM_API_URL`      | no       | `https://platform.fitroom.app/api` |
    /// | `FITROOM_TIMEOUT_SECS` | no       | `60`                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let api_key = config::required(lookup, "FITROOM_API_KEY")?;
        check_api_key(&api_key)?;
        let api_url = config::trim_base_url(&config::optional_or(lookup, "FITROOM_API_URL", DEFAULT_API_URL));
        let timeout_secs = config::parse_or(lookup, "FITROOM_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            api_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Reject the sample placeholder and obviously truncated keys.
pub fn check_api_key(key: &str) -> Result<(), ConfigError> {
    if key == PLACEHOLDER_KEY || key.len() < MIN_KEY_LEN {
        return Err(ConfigError::Invalid {
            name: "FITROOM_API_KEY",
            reason: "API key appears to be invalid or a placeholder".to_string(),
        });
    }
    Ok(())
}
