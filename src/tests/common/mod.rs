// tests/common/mod.rs
#![cfg(test)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use axum::Router;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::cache::credential_registry::CredentialRegistry;
use crate::cache::token::{Exchanged, OAuthAccessToken};
use crate::cache::token_cache::TokenCache;
use crate::config::settings::{ExchangeConfig, LoggingConfig, MetricsConfig, ServerConfig, SettingsConfig};
use crate::helpers::time::Clock;
use crate::observability::metrics::Metrics;
use crate::sources::TokenExchange;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn test_settings(exchange_url: &str) -> SettingsConfig {
    SettingsConfig {
        retry: None,
        metrics: MetricsConfig { path: "/metrics".to_owned(), is_enabled: true },
        server: ServerConfig::default(),
        logging: Some(LoggingConfig::default()),
        exchange: ExchangeConfig { url: exchange_url.to_owned(), timeout_ms: 2000 },
    }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(unix_ts: i64) -> Self {
        let now = DateTime::from_timestamp(unix_ts, 0).expect("valid timestamp");
        Self { now: Arc::new(Mutex::new(now)) }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, seconds: i64) {
        *self.now.lock().unwrap() += TimeDelta::seconds(seconds);
    }

    pub fn clock(&self) -> Clock {
        let now = self.now.clone();
        Arc::new(move || *now.lock().unwrap())
    }
}

/// One recorded call to the exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeCall {
    pub key: String,
    pub secret: String,
    pub input: String,
}

/// In-memory authority: issues `token-<n>` for the n-th call.
pub struct StubExchange {
    calls: AtomicUsize,
    seen: Mutex<Vec<ExchangeCall>>,
    lifetime_seconds: u64,
    delay: Duration,
    fail: AtomicBool,
    blocked_key: Option<String>,
    release: Notify,
    during_exchange: Option<Box<dyn Fn() + Send + Sync>>,
}

impl StubExchange {
    pub fn new(lifetime_seconds: u64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            lifetime_seconds,
            delay: Duration::ZERO,
            fail: AtomicBool::new(false),
            blocked_key: None,
            release: Notify::new(),
            during_exchange: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Exchanges for `key` wait until `release` is called.
    pub fn blocking_key(mut self, key: &str) -> Self {
        self.blocked_key = Some(key.to_owned());
        self
    }

    /// Runs inside every exchange, before it completes.
    pub fn during_exchange(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.during_exchange = Some(Box::new(hook));
        self
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ExchangeCall> {
        self.seen.lock().unwrap().clone()
    }
}

impl TokenExchange for StubExchange {
    type Token = OAuthAccessToken;

    async fn exchange(&self, identity_key: &str, secret: &str, exchange_input: &str) -> Result<Exchanged<OAuthAccessToken>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen.lock().unwrap().push(ExchangeCall {
            key: identity_key.to_owned(),
            secret: secret.to_owned(),
            input: exchange_input.to_owned(),
        });

        if self.blocked_key.as_deref() == Some(identity_key) {
            self.release.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(hook) = &self.during_exchange {
            hook();
        }
        if self.fail.load(Ordering::SeqCst) {
            bail!("authority unavailable");
        }

        let token = OAuthAccessToken {
            access_token: format!("token-{n}"),
            expires_in: self.lifetime_seconds,
            openid: format!("openid-{identity_key}"),
            ..Default::default()
        };
        Ok(Exchanged::new(token, self.lifetime_seconds))
    }
}

pub fn stub_cache(exchange: StubExchange) -> TokenCache<StubExchange> {
    TokenCache::new(
        Arc::new(CredentialRegistry::new()),
        exchange,
        Metrics::new().expect("metrics"),
    )
}
