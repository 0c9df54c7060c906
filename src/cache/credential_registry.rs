use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::credential_entry::CredentialEntry;

#[derive(Debug)]
struct Directory<T> {
    /// folded key -> entry
    entries: HashMap<String, Arc<CredentialEntry<T>>>,
    /// folded keys in order of first registration
    order: Vec<String>,
}

impl<T> Default for Directory<T> {
    fn default() -> Self {
        Self { entries: HashMap::new(), order: Vec::new() }
    }
}

/// Identity key -> credential entry directory.
///
/// Keys are matched case-insensitively. Entries are published as `Arc`s, so a
/// replacement is atomic: later lookups see the new entry while holders of the old
/// one keep a consistent (but orphaned) object.
#[derive(Debug)]
pub struct CredentialRegistry<T> {
    inner: RwLock<Directory<T>>,
}

impl<T> Default for CredentialRegistry<T> {
    fn default() -> Self {
        Self { inner: RwLock::new(Directory::default()) }
    }
}

fn fold_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

impl<T: Clone + Default> CredentialRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the entry for `key`. The new entry starts expired and any
    /// token cached under a previous entry is dropped.
    pub async fn register(&self, key: &str, secret: &str, display_name: Option<&str>) {
        let entry = Arc::new(CredentialEntry::new(
            key.to_owned(),
            secret.to_owned(),
            display_name.map(str::to_owned),
        ));
        let folded = fold_key(key);

        let mut directory = self.inner.write().await;
        if directory.entries.insert(folded.clone(), entry).is_some() {
            info!("identity '{}' re-registered, cached token discarded", key);
        } else {
            directory.order.push(folded);
            info!("identity '{}' registered", key);
        }
    }

    /// Register `key` unless it is already present; `replace` forces a new entry.
    /// Check and insert happen under one write guard. Returns whether a new entry
    /// was installed.
    pub async fn register_if_absent(
        &self,
        key: &str,
        secret: &str,
        display_name: Option<&str>,
        replace: bool,
    ) -> bool {
        let folded = fold_key(key);
        let mut directory = self.inner.write().await;
        let present = directory.entries.contains_key(&folded);
        if present && !replace {
            return false;
        }

        let entry = Arc::new(CredentialEntry::new(
            key.to_owned(),
            secret.to_owned(),
            display_name.map(str::to_owned),
        ));
        directory.entries.insert(folded.clone(), entry);
        if present {
            info!("identity '{}' re-registered, cached token discarded", key);
        } else {
            directory.order.push(folded);
            info!("identity '{}' registered", key);
        }
        true
    }

    pub async fn lookup(&self, key: &str) -> Option<Arc<CredentialEntry<T>>> {
        self.inner.read().await.entries.get(&fold_key(key)).cloned()
    }

    pub async fn is_registered(&self, key: &str) -> bool {
        self.inner.read().await.entries.contains_key(&fold_key(key))
    }

    /// Registered keys, as originally spelled, in order of first registration.
    pub async fn list_keys(&self) -> Vec<String> {
        let directory = self.inner.read().await;
        directory
            .order
            .iter()
            .filter_map(|folded| directory.entries.get(folded))
            .map(|entry| entry.key().to_owned())
            .collect()
    }

    /// First registered key, used as the default identity.
    pub async fn first_key(&self) -> Option<String> {
        let directory = self.inner.read().await;
        directory
            .order
            .first()
            .and_then(|folded| directory.entries.get(folded))
            .map(|entry| entry.key().to_owned())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry. Lookups fail until keys are registered again.
    pub async fn flush_all(&self) {
        let mut directory = self.inner.write().await;
        let flushed = directory.entries.len();
        *directory = Directory::default();
        debug!("registry flushed, {} entries removed", flushed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let registry: CredentialRegistry<String> = CredentialRegistry::new();
        registry.register("WxApp", "secret", Some("Main")).await;

        let entry = registry.lookup("wxapp").await.expect("registered");
        assert_eq!(entry.key(), "WxApp");
        assert_eq!(entry.display_name(), Some("Main"));
        assert!(registry.is_registered("WXAPP").await);
        assert!(registry.lookup("other").await.is_none());
    }

    #[tokio::test]
    async fn list_keys_keeps_first_registration_order() {
        let registry: CredentialRegistry<String> = CredentialRegistry::new();
        registry.register("b", "s", None).await;
        registry.register("a", "s", None).await;
        registry.register("c", "s", None).await;
        registry.register("B", "s2", None).await;

        assert_eq!(registry.list_keys().await, vec!["B", "a", "c"]);
        assert_eq!(registry.first_key().await.as_deref(), Some("B"));
        assert_eq!(registry.len().await, 3);
    }

    #[tokio::test]
    async fn register_replaces_entry_wholesale() {
        let registry: CredentialRegistry<String> = CredentialRegistry::new();
        registry.register("app", "s1", Some("old")).await;
        let old = registry.lookup("app").await.unwrap();

        registry.register("app", "s2", None).await;
        let new = registry.lookup("app").await.unwrap();

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(new.secret(), "s2");
        assert_eq!(new.display_name(), None);
        assert_eq!(old.secret(), "s1");
    }

    #[tokio::test]
    async fn register_if_absent_keeps_existing_entry_unless_replaced() {
        let registry: CredentialRegistry<String> = CredentialRegistry::new();

        assert!(registry.register_if_absent("App", "s1", None, false).await);
        let first = registry.lookup("app").await.unwrap();

        assert!(!registry.register_if_absent("APP", "s2", None, false).await);
        assert!(Arc::ptr_eq(&first, &registry.lookup("app").await.unwrap()));
        assert_eq!(registry.list_keys().await, vec!["App"]);

        assert!(registry.register_if_absent("app", "s2", None, true).await);
        let replaced = registry.lookup("app").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &replaced));
        assert_eq!(replaced.secret(), "s2");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn flush_all_clears_entries_and_order() {
        let registry: CredentialRegistry<String> = CredentialRegistry::new();
        registry.register("a", "s", None).await;
        registry.register("b", "s", None).await;

        registry.flush_all().await;

        assert!(registry.is_empty().await);
        assert!(registry.lookup("a").await.is_none());
        assert!(registry.first_key().await.is_none());

        registry.register("b", "s", None).await;
        assert_eq!(registry.list_keys().await, vec!["b"]);
    }
}
