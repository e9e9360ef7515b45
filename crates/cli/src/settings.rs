//! Process-wide settings that do not belong to a single client crate.

use std::path::PathBuf;

use fitbooth_core::config::{self, Lookup};

pub const DEFAULT_FRAME_TEMPLATE: &str = "images/photo_frame_portrait.png";

#[derive(Debug, Clone)]
pub struct KioskSettings {
    /// Frame asset for captured model photos.
    pub frame_template: PathBuf,
}

impl KioskSettings {
    /// | Env var               | Required | Default                           |
    /// |-----------------------|----------|-----------------------------------|
    /// | `FRAME_TEMPLATE_PATH` | no       | `images/photo_frame_portrait.png` |
    pub fn from_env() -> Self {
        Self::from_lookup(&config::process_env)
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Self {
        Self {
            frame_template: config::optional_or(lookup, "FRAME_TEMPLATE_PATH", DEFAULT_FRAME_TEMPLATE).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_template_defaults() {
        let settings = KioskSettings::from_lookup(&|_| None);
        assert_eq!(settings.frame_template, PathBuf::from(DEFAULT_FRAME_TEMPLATE));

        let settings = KioskSettings::from_lookup(&|k| (k == "FRAME_TEMPLATE_PATH").then(|| "/srv/frame.png".to_string()));
        assert_eq!(settings.frame_template, PathBuf::from("/srv/frame.png"));
    }
}
