use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::credential_entry::Lookup;
use crate::cache::credential_registry::CredentialRegistry;
use crate::cache::error::CacheError;
use crate::cache::token::{AccessToken, TokenResult};
use crate::helpers::time::{get_instant, system_clock, Clock};
use crate::observability::metrics::{Metrics, LOOKUP_HIT, LOOKUP_REFRESH, LOOKUP_UNREGISTERED};
use crate::sources::TokenExchange;

/// Expiry-aware accessor over a [`CredentialRegistry`].
///
/// Tokens are refreshed lazily on access. At most one exchange runs per key at a
/// time; callers racing on the same stale key wait for it and reuse its result.
pub struct TokenCache<E: TokenExchange> {
    registry: Arc<CredentialRegistry<E::Token>>,
    exchange: E,
    metrics: Arc<Metrics>,
    clock: Clock,
}

impl<E: TokenExchange> TokenCache<E> {
    pub fn new(registry: Arc<CredentialRegistry<E::Token>>, exchange: E, metrics: Arc<Metrics>) -> Self {
        Self { registry, exchange, metrics, clock: system_clock() }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<CredentialRegistry<E::Token>> {
        &self.registry
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub async fn register(&self, key: &str, secret: &str, display_name: Option<&str>) {
        self.registry.register(key, secret, display_name).await;
        self.metrics.registered_identities.set(self.registry.len().await as i64);
    }

    pub async fn get_first_registered_key(&self) -> Option<String> {
        self.registry.first_key().await
    }

    pub async fn list_keys(&self) -> Vec<String> {
        self.registry.list_keys().await
    }

    pub async fn flush_all(&self) {
        self.registry.flush_all().await;
        self.metrics.registered_identities.set(0);
        self.metrics.cache_flushes.inc();
        info!("token cache flushed");
    }

    /// Current token for `key`, exchanging `exchange_input` first when the cached one
    /// is expired (`now >= expires_at`) or `force_refresh` is set.
    pub async fn get_token_result(
        &self,
        key: &str,
        exchange_input: &str,
        force_refresh: bool,
    ) -> Result<TokenResult<E::Token>, CacheError> {
        let Some(entry) = self.registry.lookup(key).await else {
            self.metrics.token_lookups.with_label_values(&[LOOKUP_UNREGISTERED]).inc();
            warn!("token requested for unregistered identity '{}'", key);
            return Err(CacheError::unregistered(key));
        };

        let exchange = &self.exchange;
        let metrics = &self.metrics;
        let (result, lookup) = entry
            .get_or_refresh(force_refresh, &self.clock, |identity, secret| {
                let identity = identity.to_owned();
                let secret = secret.to_owned();
                async move {
                    debug!("exchanging token for identity '{}'", identity);
                    let start = get_instant();
                    metrics.exchange_requests.with_label_values(&[identity.as_str()]).inc();
                    let exchanged = exchange.exchange(&identity, &secret, exchange_input).await;
                    metrics
                        .exchange_duration
                        .with_label_values(&[identity.as_str()])
                        .observe(start.elapsed().as_secs_f64());
                    if let Err(err) = &exchanged {
                        metrics.exchange_failures.with_label_values(&[identity.as_str()]).inc();
                        warn!("token exchange for identity '{}' failed: {}", identity, err);
                    }
                    exchanged
                }
            })
            .await?;

        match lookup {
            Lookup::Cached => {
                self.metrics.token_lookups.with_label_values(&[LOOKUP_HIT]).inc();
            }
            Lookup::Refreshed => {
                self.metrics.token_lookups.with_label_values(&[LOOKUP_REFRESH]).inc();
                info!("token for identity '{}' refreshed, expires at {}", entry.key(), result.expires_at);
            }
        }
        Ok(result)
    }

    /// Registers `key` when it is unknown or `force_refresh` is set, then returns its token.
    /// A registered key keeps its still-valid token.
    pub async fn get_or_register_then_get_token(
        &self,
        key: &str,
        secret: &str,
        exchange_input: &str,
        force_refresh: bool,
    ) -> Result<String, CacheError>
    where
        E::Token: AccessToken,
    {
        if self.registry.register_if_absent(key, secret, None, force_refresh).await {
            self.metrics.registered_identities.set(self.registry.len().await as i64);
        }
        // a fresh registration is already expired, so this exchanges exactly once
        self.get_token(key, exchange_input, false).await
    }

    pub async fn get_token(
        &self,
        key: &str,
        exchange_input: &str,
        force_refresh: bool,
    ) -> Result<String, CacheError>
    where
        E::Token: AccessToken,
    {
        self.get_token_result(key, exchange_input, force_refresh)
            .await
            .map(|result| result.access_token().to_owned())
    }
}
