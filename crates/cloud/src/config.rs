use fitbooth_core::config::{self, Lookup};
use fitbooth_core::ConfigError;

pub const DEFAULT_BUCKET: &str = "ai_face_swap";
pub const DEFAULT_RESULTS_TABLE: &str = "tryon_results";

/// Supabase project settings.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL without a trailing slash.
    pub url: String,
    pub anon_key: String,
    /// Storage bucket holding the daily folders.
    pub bucket: String,
    pub results_table: String,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("results_table", &self.results_table)
            .finish()
    }
}

impl SupabaseConfig {
    /// Load from the environment.
    ///
    /// | Env var                  | Required | Default         |
    /// |--------------------------|----------|-----------------|
    /// | `SUPABASE_URL`           | yes      | --              |
    /// | `SUPABASE_ANON_KEY`      | yes      | --              |
    /// | `SUPABASE_BUCKET`        | no       | `ai_face_swap`  |
    /// | `SUPABASE_RESULTS_TABLE` | no       | `tryon_results` |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let url = config::trim_base_url(&config::required(lookup, "SUPABASE_URL")?);
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                name: "SUPABASE_URL",
                reason: format!("'{url}' is not an http(s) URL"),
            });
        }

        Ok(Self {
            url,
            anon_key: config::required(lookup, "SUPABASE_ANON_KEY")?,
            bucket: config::optional_or(lookup, "SUPABASE_BUCKET", DEFAULT_BUCKET),
            results_table: config::optional_or(lookup, "SUPABASE_RESULTS_TABLE", DEFAULT_RESULTS_TABLE),
        })
    }
}
