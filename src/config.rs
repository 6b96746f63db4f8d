use serde::{Deserialize, Serialize};

use crate::user_stats::STATS_VERSION;

/// User preferences, stored as one record next to the results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub sound_enabled: bool,
    pub animations_enabled: bool,
    pub test_count: u32,
    pub debug_mode: bool,
    pub theme: String,
    pub version: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            animations_enabled: true,
            test_count: 5,
            debug_mode: false,
            theme: "default".to_string(),
            version: STATS_VERSION.to_string(),
        }
    }
}

/// Partial update: `None` fields keep their stored value
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesPatch {
    pub sound_enabled: Option<bool>,
    pub animations_enabled: Option<bool>,
    pub test_count: Option<u32>,
    pub debug_mode: Option<bool>,
    pub theme: Option<String>,
}

impl Preferences {
    pub fn merged(&self, patch: &PreferencesPatch) -> Self {
        Self {
            sound_enabled: patch.sound_enabled.unwrap_or(self.sound_enabled),
            animations_enabled: patch.animations_enabled.unwrap_or(self.animations_enabled),
            test_count: patch.test_count.unwrap_or(self.test_count),
            debug_mode: patch.debug_mode.unwrap_or(self.debug_mode),
            theme: patch.theme.clone().unwrap_or_else(|| self.theme.clone()),
            version: self.version.clone(),
        }
    }
}
