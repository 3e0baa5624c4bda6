//! Provider selection logic.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::registry::ProviderRegistry;
use crate::config::{ApiKey, ProviderConfig};
use crate::error::{Error, Result};

/// A provider selected for one request.
#[derive(Debug, Clone)]
pub struct SelectedProvider {
    pub name: String,
    pub vendor: String,
    pub url: String,
    pub model: String,
    pub api_key: Option<ApiKey>,
}

impl From<&ProviderConfig> for SelectedProvider {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            name: config.name.clone(),
            vendor: config.vendor.clone(),
            url: config.url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

/// Chooses a provider per request: explicit name first, rotation otherwise.
///
/// The rotation cursor is shared by every request the process serves. It is
/// advanced with a single atomic read-modify-write, so concurrent unrotated
/// requests each get a distinct position.
#[derive(Debug)]
pub struct Selector {
    registry: ProviderRegistry,
    cursor: AtomicUsize,
}

impl Selector {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Select the provider for a request.
    ///
    /// A known `explicit` name is returned as-is and leaves the cursor alone.
    /// An unknown or absent name falls back to rotation.
    pub fn select(&self, explicit: Option<&str>) -> Result<SelectedProvider> {
        if let Some(name) = explicit {
            if let Some(provider) = self.registry.get(name) {
                tracing::debug!(provider = %name, "Matched explicit provider");
                return Ok(SelectedProvider::from(provider));
            }
            tracing::debug!(provider = %name, "Unknown provider requested, rotating");
        }

        self.rotate()
    }

    /// Take the provider at the cursor and advance it by one, wrapping.
    fn rotate(&self) -> Result<SelectedProvider> {
        let len = self.registry.len();
        if len == 0 {
            return Err(Error::Internal("provider pool is empty".to_string()));
        }

        let position = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some((c + 1) % len))
            .unwrap_or_else(|current| current);

        self.registry
            .at(position % len)
            .map(SelectedProvider::from)
            .ok_or_else(|| Error::Internal(format!("cursor {} out of range", position)))
    }

    /// Current rotation cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}
