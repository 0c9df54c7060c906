use thiserror::Error;

/// Failures surfaced by the token cache.
///
/// An expired token is never an error; it is the normal trigger for a refresh.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key was never registered (or the registry was flushed since).
    #[error("identity '{key}' is not registered, register it before requesting tokens")]
    UnregisteredKey { key: String },

    /// The token exchange collaborator failed. The entry keeps its previous state.
    #[error("token exchange for identity '{key}' failed: {source}")]
    ExchangeFailed {
        key: String,
        #[source]
        source: anyhow::Error,
    },
}

impl CacheError {
    pub fn unregistered(key: &str) -> Self {
        CacheError::UnregisteredKey { key: key.to_owned() }
    }

    pub fn key(&self) -> &str {
        match self {
            CacheError::UnregisteredKey { key } => key,
            CacheError::ExchangeFailed { key, .. } => key,
        }
    }
}
