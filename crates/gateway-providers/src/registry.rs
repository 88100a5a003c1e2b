//! Provider registry.
//!
//! Name-keyed map of adapters guarded by a read/write lock. The lock is held
//! only for the map operation itself, never across a backend call.

use gateway_core::{GatewayError, GatewayResult, LLMProvider};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Registry of backend adapters
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn LLMProvider>>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own name.
    ///
    /// # Errors
    /// Returns [`GatewayError::DuplicateProvider`] if the name is taken
    pub fn register(&self, provider: Arc<dyn LLMProvider>) -> GatewayResult<()> {
        let name = provider.name().to_string();
        let mut providers = self.providers.write();

        if providers.contains_key(&name) {
            return Err(GatewayError::DuplicateProvider { name });
        }

        info!(provider = %name, models = provider.models().len(), "Provider registered");
        providers.insert(name, provider);
        Ok(())
    }

    /// Look up an adapter by name
    ///
    /// # Errors
    /// Returns [`GatewayError::ProviderNotFound`] if no adapter has that name
    pub fn get(&self, name: &str) -> GatewayResult<Arc<dyn LLMProvider>> {
        self.providers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::ProviderNotFound {
                name: name.to_string(),
            })
    }

    /// Snapshot of registered names; order is unspecified
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    /// `(provider, model)` pairs across every adapter
    #[must_use]
    pub fn all_models(&self) -> Vec<(String, String)> {
        self.providers
            .read()
            .iter()
            .flat_map(|(name, provider)| {
                provider
                    .models()
                    .iter()
                    .map(move |model| (name.clone(), model.clone()))
            })
            .collect()
    }

    /// Number of registered providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.list())
            .finish()
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    #[test]
    fn test_register_and_get_same_instance() {
        let registry = ProviderRegistry::new();
        let provider: Arc<dyn LLMProvider> = Arc::new(MockProvider::new("mock"));

        registry.register(Arc::clone(&provider)).unwrap();

        let found = registry.get("mock").unwrap();
        assert!(Arc::ptr_eq(&provider, &found));
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("mock"))).unwrap();

        let err = registry
            .register(Arc::new(MockProvider::new("mock")))
            .unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateProvider { ref name } if name == "mock"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.get("nope"),
            Err(GatewayError::ProviderNotFound { .. })
        ));
    }

    #[test]
    fn test_list_and_models() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockProvider::new("a"))).unwrap();
        registry.register(Arc::new(MockProvider::new("b"))).unwrap();

        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        let models = registry.all_models();
        assert!(models.iter().any(|(p, _)| p == "a"));
        assert!(models.iter().any(|(p, _)| p == "b"));
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ProviderRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let name = format!("p{}", i % 4);
                    let _ = registry.register(Arc::new(MockProvider::new(name.clone())));
                    registry.get(&name).is_ok()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(registry.len(), 4);
    }
}
