//! Sources module
//!
//! The token exchange collaborator the cache calls when an entry must be refreshed.
use anyhow::Result;
use std::future::Future;

use crate::cache::token::Exchanged;

pub mod oauth2;

/// Performs the round trip to the remote authority.
///
/// Implementations own their transport, timeout and retry policy. The cache does not
/// interpret errors; whatever is returned here reaches the caller unchanged.
pub trait TokenExchange: Send + Sync {
    type Token: Clone + Default + Send + Sync + 'static;

    fn exchange(
        &self,
        identity_key: &str,
        secret: &str,
        exchange_input: &str,
    ) -> impl Future<Output = Result<Exchanged<Self::Token>>> + Send;
}
