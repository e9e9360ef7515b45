//! Mapping from error text to the short notice shown on the kiosk screen.
//!
//! Classification is by substring so that errors from any layer (remote
//! service, storage, transport) land in a sensible bucket without every
//! layer knowing about the display.

/// Category of user-facing notice for a failed try-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    /// API key missing or rejected.
    Configuration,
    /// The remote service throttled us.
    RateLimited,
    /// Network failure or timeout.
    Connection,
    /// Anything else.
    Generic,
}

impl UserNotice {
    /// Pick a notice for an error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if message.contains("API key") {
            Self::Configuration
        } else if lower.contains("rate limit") {
            Self::RateLimited
        } else if lower.contains("network") || lower.contains("timeout") || lower.contains("timed out") {
            Self::Connection
        } else {
            Self::Generic
        }
    }

    /// Text shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error: Please check API settings",
            Self::RateLimited => "Too many requests. Please wait and try again.",
            Self::Connection => "Connection error. Please check your internet and try again.",
            Self::Generic => "Try-on failed. Please try again.",
        }
    }
}
