use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::cache::token::{Exchanged, OAuthAccessToken};
use crate::config::settings::ExchangeConfig;
use crate::resilience::retry::RetrySettings;
use crate::sources::TokenExchange;

const GRANT_TYPE: &str = "authorization_code";

/// The authority answered and refused the exchange. Never retried: the code may
/// already be consumed.
#[derive(Debug, Error)]
#[error("authority rejected code exchange: {0}")]
pub struct Rejected(String);

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: Option<String>,
    #[serde(flatten)]
    token: OAuthAccessToken,
}

/// Exchanges an authorization code for an access token over HTTP.
#[derive(Debug, Clone)]
pub struct OAuth2CodeExchange {
    pub url: String,
    pub client: Client,
    pub retry: RetrySettings,
}

impl OAuth2CodeExchange {
    pub fn new(cfg: &ExchangeConfig, retry: RetrySettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self { url: cfg.url.clone(), client, retry })
    }

    async fn exchange_once(&self, app_id: &str, secret: &str, code: &str) -> Result<Exchanged<OAuthAccessToken>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("appid", app_id),
                ("secret", secret),
                ("code", code),
                ("grant_type", GRANT_TYPE),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(Rejected(format!("HTTP {}", status)).into());
        }
        if !status.is_success() {
            return Err(anyhow!("code exchange request failed: {}", status));
        }

        let body: ExchangeResponse = response.json().await?;
        if body.errcode != 0 {
            return Err(Rejected(format!(
                "errcode={} errmsg={}",
                body.errcode,
                body.errmsg.unwrap_or_default()
            ))
            .into());
        }
        if body.token.access_token.is_empty() {
            return Err(Rejected("response carries no access_token".to_owned()).into());
        }

        let lifetime_seconds = body.token.expires_in;
        Ok(Exchanged::new(body.token, lifetime_seconds))
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if err.downcast_ref::<Rejected>().is_some() {
        return false;
    }
    // a malformed body means the authority answered; the code may be spent
    err.downcast_ref::<reqwest::Error>()
        .map(|e| !e.is_decode())
        .unwrap_or(true)
}

impl TokenExchange for OAuth2CodeExchange {
    type Token = OAuthAccessToken;

    async fn exchange(&self, identity_key: &str, secret: &str, exchange_input: &str) -> Result<Exchanged<OAuthAccessToken>> {
        debug!("code exchange for '{}' at {}", identity_key, self.url);
        self.retry
            .run_with_retry_if(|| self.exchange_once(identity_key, secret, exchange_input), is_retryable)
            .await
    }
}
