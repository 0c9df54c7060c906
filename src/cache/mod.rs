//! In-memory credential cache.
//!
//! - `credential_registry` — identity key -> entry directory
//! - `credential_entry` — one identity with its lock-guarded token state
//! - `token_cache` — expiry-aware accessor with single-flight refresh per key
//! - `token` — token payload types

pub mod credential_entry;
pub mod credential_registry;
pub mod error;
pub mod token;
pub mod token_cache;
