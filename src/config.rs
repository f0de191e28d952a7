use client::{content::ContentStore, tracing};
use serde::{Deserialize, Serialize};

/// Application instance specific config. Lives in the content store's config
/// file, not on any server.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LocalConfig {
    /// Homeserver media URLs are derived from.
    #[serde(default = "default_homeserver")]
    pub homeserver: String,
    /// Scale factor (pixels per point).
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,
}

fn default_homeserver() -> String {
    "https://chat.accord.rs".to_string()
}

fn default_scale_factor() -> f32 {
    1.45
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            homeserver: default_homeserver(),
            scale_factor: default_scale_factor(),
        }
    }
}

impl LocalConfig {
    pub fn load(store: &ContentStore) -> Self {
        let mut config: Self = store.read_config().unwrap_or_default();
        if config.scale_factor < 0.5 {
            config.scale_factor = default_scale_factor();
        }
        config
    }

    pub fn store(&self, store: &ContentStore) {
        if let Err(err) = store.write_config(self) {
            tracing::warn!("failed to write local config: {}", err);
        }
    }
}
