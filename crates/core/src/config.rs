//! Helpers for reading settings from the process environment.
//!
//! Every crate-level config struct exposes `from_env()` for production and
//! `from_lookup()` taking a lookup function, so tests can feed a plain map
//! without touching global process state.

use std::str::FromStr;

use crate::error::ConfigError;

/// Signature of a variable lookup: name in, value out.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read from the real process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// A variable that must be present and non-blank.
pub fn required(lookup: Lookup<'_>, name: &'static str) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// A variable with a default used when it is absent or blank.
pub fn optional_or(lookup: Lookup<'_>, name: &str, default: &str) -> String {
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

/// A parsed variable with a default; unparsable values are an error
/// rather than silently replaced.
pub fn parse_or<T>(lookup: Lookup<'_>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(v) if !v.trim().is_empty() => v.trim().parse().map_err(|e: T::Err| {
            ConfigError::Invalid {
                name,
                reason: e.to_string(),
            }
        }),
        _ => Ok(default),
    }
}

/// Strip a trailing slash so paths can be appended with `format!("{base}{path}")`.
pub fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
