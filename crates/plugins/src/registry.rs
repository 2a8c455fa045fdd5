//! In-memory plugin registry.

use std::{collections::BTreeMap, sync::Arc};

use {tokio::sync::RwLock, tracing::info};

use crate::{Error, PluginManifest, Result};

/// Registered plugins, keyed by command name. Registration never replaces
/// an existing entry: runs already holding a manifest keep the one they
/// started with, and the name stays stable for the catalog.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    inner: RwLock<BTreeMap<String, Arc<PluginManifest>>>,
}

impl PluginRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry from persisted manifests.
    pub async fn load(&self, manifests: Vec<PluginManifest>) {
        let mut inner = self.inner.write().await;
        for manifest in manifests {
            inner
                .entry(manifest.name.clone())
                .or_insert_with(|| Arc::new(manifest));
        }
    }

    /// Register a new plugin. Fails if the name is taken.
    pub async fn register(&self, manifest: PluginManifest) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.contains_key(&manifest.name) {
            return Err(Error::message(format!(
                "plugin '{}' is already registered",
                manifest.name
            )));
        }
        info!(name = %manifest.name, "plugin registered");
        inner.insert(manifest.name.clone(), Arc::new(manifest));
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<PluginManifest>> {
        self.inner.read().await.get(name).cloned()
    }

    /// `(name, description)` pairs in name order.
    pub async fn list(&self) -> Vec<(String, String)> {
        self.inner
            .read()
            .await
            .values()
            .map(|m| (m.name.clone(), m.description.clone()))
            .collect()
    }

    /// Unregister a plugin. Returns whether it existed.
    pub async fn remove(&self, name: &str) -> bool {
        self.inner.write().await.remove(name).is_some()
    }

    /// Names currently registered (used for collision checks).
    pub async fn names(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manifest(name: &str) -> PluginManifest {
        PluginManifest {
            name: name.into(),
            description: format!("{name} plugin"),
            prompt_template: "p".into(),
            allowed_tools: vec![],
        }
    }

    #[tokio::test]
    async fn register_and_lookup() {
        let registry = PluginRegistry::new();
        registry.register(manifest("poem")).await.unwrap();
        assert!(registry.get("poem").await.is_some());
        assert!(registry.get("other").await.is_none());
    }

    #[tokio::test]
    async fn register_never_overwrites() {
        let registry = PluginRegistry::new();
        let mut original = manifest("poem");
        original.description = "original".into();
        registry.register(original).await.unwrap();

        assert!(registry.register(manifest("poem")).await.is_err());
        assert_eq!(registry.get("poem").await.unwrap().description, "original");
    }

    #[tokio::test]
    async fn remove_frees_the_name() {
        let registry = PluginRegistry::new();
        registry.register(manifest("poem")).await.unwrap();
        assert!(registry.remove("poem").await);
        assert!(!registry.remove("poem").await);
        registry.register(manifest("poem")).await.unwrap();
    }

    #[tokio::test]
    async fn list_is_name_ordered() {
        let registry = PluginRegistry::new();
        registry.register(manifest("zeta")).await.unwrap();
        registry.register(manifest("alpha")).await.unwrap();
        let names: Vec<String> = registry.list().await.into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
