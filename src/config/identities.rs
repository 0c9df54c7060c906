use serde::Deserialize;

use crate::config::settings::SettingsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    /// registered at startup in this order; the first one is the default identity
    #[serde(default)]
    pub identities: Vec<IdentityConfig>,
}

/// ================================
/// Identities
/// ================================
#[derive(Deserialize, Clone)]
pub struct IdentityConfig {
    pub key: String,
    pub secret: String,
    pub name: Option<String>,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("key", &self.key)
            .field("secret", &"***")
            .field("name", &self.name)
            .finish()
    }
}
