use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payloads that carry a bearer access token.
pub trait AccessToken {
    fn access_token(&self) -> &str;
}

/// OAuth access token issued for an authorization code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthAccessToken {
    pub access_token: String,
    /// lifetime in seconds, as declared by the authority
    pub expires_in: u64,
    pub refresh_token: String,
    pub openid: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unionid: Option<String>,
}

impl AccessToken for OAuthAccessToken {
    fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// Result of a successful exchange: the payload and its declared lifetime.
#[derive(Debug, Clone)]
pub struct Exchanged<T> {
    pub token: T,
    pub lifetime_seconds: u64,
}

impl<T> Exchanged<T> {
    pub fn new(token: T, lifetime_seconds: u64) -> Self {
        Self { token, lifetime_seconds }
    }
}

/// Token payload together with the instant it stops being served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenResult<T> {
    pub token: T,
    pub expires_at: DateTime<Utc>,
}

impl<T: AccessToken> TokenResult<T> {
    pub fn access_token(&self) -> &str {
        self.token.access_token()
    }
}
