//! Persisted-settings abstraction.
//!
//! The resolver treats its host's key-value settings store abstractly:
//! an async map of string keys to JSON values. [`MemoryStore`] is the
//! in-process implementation; embedders back the trait with whatever
//! their platform persists (browser sync storage, a config file, ...).

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Key holding the serialized registry configuration.
pub const REGISTRIES_KEY: &str = "registries";

/// Legacy key: flat array of raw self-describing schema documents.
pub const LEGACY_SCHEMA_LIST_KEY: &str = "schemalist";

/// Legacy key: flat array of bare repository URL strings.
pub const LEGACY_REPO_LIST_KEY: &str = "repolist";

/// Asynchronous persisted key-value store for resolver configuration.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
