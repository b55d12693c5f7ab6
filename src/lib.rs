//! # Iglu Resolver
//!
//! Async-first discovery and validation of self-describing JSON data
//! against Iglu schema registries.
//!
//! ## Features
//!
//! - **Composite resolution**: race every configured registry for a
//!   schema identity, first success wins, losers are ignored
//! - **Hit index**: the winning registry is remembered so repeat lookups
//!   skip the rest; a full [`Resolver::walk`] rebuilds the index
//! - **Four registry kinds**: local documents, static HTTP schema trees,
//!   Iglu Server APIs, and the managed console's data-structures catalog
//! - **Validation**: resolved schemas validate data with a three-state
//!   outcome — Valid, Invalid, or Unrecognised
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use iglu_resolver::{MemoryStore, Resolver, SchemaId};
//!
//! # async fn example() -> iglu_resolver::Result<()> {
//! let mut resolver = Resolver::open(Arc::new(MemoryStore::new())).await?;
//!
//! let id = SchemaId::parse("iglu:com.acme/click_event/jsonschema/1-0-0")
//!     .expect("well-formed iglu URI");
//! let schema = resolver.resolve(&id, &[]).await?;
//! let report = schema.validate(&serde_json::json!({ "target": "checkout" }));
//! println!("valid: {}", report.valid);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod types;
pub mod validation;

pub use error::{ResolverError, Result};
pub use registry::{
    Health, IgluServerRegistry, LocalRegistry, ManagedCatalogRegistry, Registry, RegistryKind,
    RegistrySpec, StaticRegistry, build_registry,
};
pub use resolver::Resolver;
pub use storage::{MemoryStore, SettingsStore};
pub use types::{ResolvedSchema, SchemaId};
pub use validation::{ValidationOutcome, ValidationResult, validate_document};
