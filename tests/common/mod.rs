#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use iglu_resolver::{
    Health, Registry, RegistryKind, RegistrySpec, ResolvedSchema, ResolverError, SchemaId,
};

pub const SELF_DESC: &str =
    "http://iglucentral.com/schemas/com.snowplowanalytics.self-desc/schema/jsonschema/1-0-0#";

/// A self-describing schema requiring an integer property `x`.
pub fn schema_doc(vendor: &str, name: &str, version: &str) -> Value {
    json!({
        "$schema": SELF_DESC,
        "self": {
            "vendor": vendor,
            "name": name,
            "format": "jsonschema",
            "version": version
        },
        "type": "object",
        "properties": { "x": { "type": "integer" } },
        "required": ["x"]
    })
}

pub fn local_spec(name: &str, docs: Vec<Value>) -> RegistrySpec {
    RegistrySpec::new(name, RegistryKind::Local { schemas: docs })
}

pub fn static_spec(name: &str, uri: &str) -> RegistrySpec {
    RegistrySpec::new(
        name,
        RegistryKind::Static {
            uri: url::Url::parse(uri).expect("test URI parses"),
            manifest_uri: None,
        },
    )
}

pub fn iglu_server_spec(name: &str, uri: &str, api_key: Option<&str>) -> RegistrySpec {
    RegistrySpec::new(
        name,
        RegistryKind::IgluServer {
            uri: url::Url::parse(uri).expect("test URI parses"),
            api_key: api_key.map(str::to_string),
        },
    )
}

/// Registry that holds nothing but counts how often it is asked, so
/// tests can prove which registries a resolution consulted.
#[derive(Debug)]
pub struct ProbeRegistry {
    spec: RegistrySpec,
    resolve_calls: AtomicUsize,
}

impl ProbeRegistry {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            spec: RegistrySpec::new(name, RegistryKind::Local { schemas: vec![] }),
            resolve_calls: AtomicUsize::new(0),
        })
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for ProbeRegistry {
    fn spec(&self) -> &RegistrySpec {
        &self.spec
    }

    async fn resolve(self: Arc<Self>, id: &SchemaId) -> iglu_resolver::Result<ResolvedSchema> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        Err(ResolverError::not_found(id.uri()))
    }

    async fn status(&self) -> Health {
        Health::Ok
    }

    async fn walk(self: Arc<Self>) -> iglu_resolver::Result<Vec<SchemaId>> {
        Ok(Vec::new())
    }
}
