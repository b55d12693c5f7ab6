use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ResolverError, Result};
use crate::registry::{Health, Registry, RegistryKind, RegistrySpec};
use crate::types::{ResolvedSchema, SchemaId};

/// Registry whose schemas live directly in its configuration. No network,
/// no health concept; resolution is a map lookup.
#[derive(Debug)]
pub struct LocalRegistry {
    spec: RegistrySpec,
    manifest: HashMap<SchemaId, Value>,
}

impl LocalRegistry {
    pub fn new(spec: RegistrySpec) -> Self {
        let mut manifest = HashMap::new();
        if let RegistryKind::Local { schemas } = &spec.kind {
            for doc in schemas {
                match SchemaId::from_self_description(doc) {
                    Some(id) => {
                        manifest.insert(id, doc.clone());
                    }
                    None => debug!(
                        registry = %spec.name,
                        "skipping local document without a valid self-description"
                    ),
                }
            }
        }
        Self { spec, manifest }
    }
}

#[async_trait]
impl Registry for LocalRegistry {
    fn spec(&self) -> &RegistrySpec {
        &self.spec
    }

    async fn resolve(self: Arc<Self>, id: &SchemaId) -> Result<ResolvedSchema> {
        let doc = self
            .manifest
            .get(id)
            .cloned()
            .ok_or_else(|| ResolverError::not_found(id.uri()))?;

        let registry: Arc<dyn Registry> = self.clone();
        id.try_resolve(doc, registry)
            .ok_or_else(|| ResolverError::not_found(id.uri()))
    }

    async fn status(&self) -> Health {
        Health::Ok
    }

    async fn walk(self: Arc<Self>) -> Result<Vec<SchemaId>> {
        Ok(self.manifest.keys().cloned().collect())
    }
}
