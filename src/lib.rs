//! chatrelay - rate-shaped streaming chat relay
//!
//! This library provides the relay's building blocks: configuration,
//! provider selection, the upstream client, the re-chunker and event-stream
//! session driver, and user-data storage.

pub mod config;
pub mod error;
pub mod proxy;
pub mod router;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
