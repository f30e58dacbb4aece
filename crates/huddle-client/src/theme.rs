//! Theme preference, persisted as one JSON blob in the cache's settings
//! store.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use huddle_cache::Cache;

const SETTING_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePreference {
    pub mode: ThemeMode,
    pub color: String,
    pub background: String,
}

impl Default for ThemePreference {
    fn default() -> Self {
        Self {
            mode: ThemeMode::Light,
            color: "blue".into(),
            background: "default".into(),
        }
    }
}

impl ThemePreference {
    /// Load the stored preference; anything unreadable falls back to the
    /// default rather than failing the caller.
    pub fn load(cache: &Cache) -> Self {
        match cache.setting(SETTING_KEY) {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_default(),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("theme load failed: {}", e);
                Self::default()
            }
        }
    }

    pub fn store(&self, cache: &Cache) -> Result<()> {
        cache.set_setting(SETTING_KEY, &serde_json::to_value(self)?)
    }
}
