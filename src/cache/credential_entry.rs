use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::cache::error::CacheError;
use crate::cache::token::{Exchanged, TokenResult};
use crate::helpers::time::{expires_after, Clock};

/// Mutable half of an entry. Only reachable while holding the entry lock.
#[derive(Debug)]
struct TokenState<T> {
    token: T,
    expires_at: DateTime<Utc>,
}

/// How a lookup was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Cached,
    Refreshed,
}

/// One registered identity: immutable credentials plus the lock-guarded token state.
///
/// The mutex is created with the entry and never replaced. Token and expiry are
/// written together, under the lock, and only after a successful exchange.
pub struct CredentialEntry<T> {
    key: String,
    secret: String,
    display_name: Option<String>,
    state: Mutex<TokenState<T>>,
}

impl<T> std::fmt::Debug for CredentialEntry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("key", &self.key)
            .field("secret", &"***")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Default> CredentialEntry<T> {
    /// New entry in the already-expired state, so the first access always exchanges.
    pub fn new(key: String, secret: String, display_name: Option<String>) -> Self {
        Self {
            key,
            secret,
            display_name,
            state: Mutex::new(TokenState {
                token: T::default(),
                expires_at: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Current token and expiry, without any refresh decision.
    pub async fn snapshot(&self) -> TokenResult<T> {
        let state = self.state.lock().await;
        TokenResult {
            token: state.token.clone(),
            expires_at: state.expires_at,
        }
    }

    /// Read-check-refresh-write under the entry lock.
    ///
    /// Refreshes when `force` is set or `now >= expires_at`. The lock is held across
    /// `exchange`, so concurrent callers for this entry wait and then see its result.
    /// On exchange failure the state is left untouched.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        force: bool,
        clock: &Clock,
        exchange: F,
    ) -> Result<(TokenResult<T>, Lookup), CacheError>
    where
        F: FnOnce(&str, &str) -> Fut,
        Fut: Future<Output = anyhow::Result<Exchanged<T>>>,
    {
        let mut state = self.state.lock().await;

        if !force && clock() < state.expires_at {
            return Ok((
                TokenResult {
                    token: state.token.clone(),
                    expires_at: state.expires_at,
                },
                Lookup::Cached,
            ));
        }

        let exchanged = exchange(&self.key, &self.secret)
            .await
            .map_err(|source| CacheError::ExchangeFailed {
                key: self.key.clone(),
                source,
            })?;

        // expiry counts from completion of the exchange, not from the request
        state.expires_at = expires_after(clock(), exchanged.lifetime_seconds);
        state.token = exchanged.token;

        Ok((
            TokenResult {
                token: state.token.clone(),
                expires_at: state.expires_at,
            },
            Lookup::Refreshed,
        ))
    }
}
