//! # OAuth Token Agent Library
//!
//! Caches OAuth access tokens per registered identity and refreshes them lazily
//! from the remote authority when they expire, with at most one refresh in flight
//! per identity.
//!
//! Modules:
//! - `cache` — credential registry and the expiry-aware token cache
//! - `sources` — token exchange collaborator (authorization code over HTTP)
//! - `config` — service configuration and validation
//! - `server` — HTTP surface over the cache operations

pub mod config;
pub mod cache;
pub mod sources;
pub mod resilience;
pub mod tests;
pub mod observability;
pub mod server;
pub mod helpers;
pub mod utils;


pub use crate::cache::credential_registry::CredentialRegistry;
pub use crate::cache::error::CacheError;
pub use crate::cache::token_cache::TokenCache;
pub use crate::config::identities::ServiceConfig;
