//! Static table of configured providers.

use crate::config::ProviderConfig;

/// The provider pool, fixed at startup.
///
/// Declaration order is preserved; it defines rotation order.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// Build a registry from the configured providers.
    ///
    /// Callers guarantee a non-empty pool (config validation rejects an empty one).
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self { providers }
    }

    /// Look up a provider by name.
    ///
    /// A provider without an API key is still returned; key presence is
    /// checked by the session, not here.
    pub fn get(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Provider at a pool position.
    pub fn at(&self, index: usize) -> Option<&ProviderConfig> {
        self.providers.get(index)
    }

    /// All providers in declaration order.
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
