//! Router module for provider selection.
//!
//! This module handles choosing the backend for a chat request:
//! - Explicit selection by provider name
//! - Round-robin rotation across the whole pool otherwise

mod registry;
mod selector;

pub use registry::ProviderRegistry;
pub use selector::{SelectedProvider, Selector};
