//! Registry abstraction: a named, configured source of schemas.
//!
//! The kind set is closed — local, static, iglu-server, managed-catalog —
//! and exhaustively matched everywhere (factory, sort order,
//! serialization), so the configuration side is a tagged sum rather than
//! an open trait hierarchy. The runtime side is the [`Registry`] trait,
//! one implementation per kind, all sharing the same three-operation
//! contract: `resolve`, `status`, `walk`.

pub mod iglu_server;
pub mod local;
pub mod managed_catalog;
pub mod static_http;

pub use iglu_server::IgluServerRegistry;
pub use local::LocalRegistry;
pub use managed_catalog::ManagedCatalogRegistry;
pub use static_http::StaticRegistry;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{ResolvedSchema, SchemaId};
use crate::validation::{ValidationResult, validate_document};

/// Per-request timeout applied to every registry HTTP client.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry health as reported by [`Registry::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Unhealthy,
}

/// How to build a registry: a stable id, a display name, optional
/// ordering hints, and the kind-specific options.
///
/// The `id` is generated once and never changed; it is the join key for
/// strict import and for removal. The kind is immutable for the lifetime
/// of a built registry — changing kind means replacing the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySpec {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u64>,
    #[serde(
        default,
        rename = "vendorPrefixes",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub vendor_prefixes: Vec<String>,
    #[serde(flatten)]
    pub kind: RegistryKind,
}

impl RegistrySpec {
    pub fn new(name: impl Into<String>, kind: RegistryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            priority: None,
            vendor_prefixes: Vec::new(),
            kind,
        }
    }

    pub fn with_priority(mut self, priority: u64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_vendor_prefixes(mut self, prefixes: impl IntoIterator<Item = String>) -> Self {
        self.vendor_prefixes = prefixes.into_iter().collect();
        self
    }
}

/// Kind-specific configuration, serialized with a `kind` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RegistryKind {
    /// Schemas stored directly in the configuration, no network.
    Local {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        schemas: Vec<Value>,
    },
    /// HTTP-hosted schema tree under the conventional `/schemas` layout.
    Static {
        uri: Url,
        #[serde(
            default,
            rename = "manifestUri",
            skip_serializing_if = "Option::is_none"
        )]
        manifest_uri: Option<Url>,
    },
    /// Full Iglu Server API, with health checks and optional API key.
    IgluServer {
        uri: Url,
        #[serde(default, rename = "apiKey", skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
    /// Authenticated managed-console data-structures catalog.
    ManagedCatalog {
        #[serde(rename = "organizationId")]
        organization_id: String,
        #[serde(rename = "apiKey")]
        api_key: String,
        #[serde(
            default,
            rename = "apiEndpoint",
            skip_serializing_if = "Option::is_none"
        )]
        api_endpoint: Option<Url>,
    },
}

impl RegistryKind {
    /// The serialized tag, also used in log lines.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Static { .. } => "static",
            Self::IgluServer { .. } => "iglu-server",
            Self::ManagedCatalog { .. } => "managed-catalog",
        }
    }

    /// Tie-break rank for display ordering: local < managed-catalog <
    /// iglu-server < static. Never consulted during resolution.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Self::Local { .. } => 0,
            Self::ManagedCatalog { .. } => 1,
            Self::IgluServer { .. } => 2,
            Self::Static { .. } => 3,
        }
    }

    pub(crate) fn is_local(&self) -> bool {
        matches!(self, Self::Local { .. })
    }

    /// Flattened option fields for the non-strict import comparison.
    /// Embedded local documents are deliberately excluded — local
    /// registries are matched by kind alone.
    fn option_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        match self {
            Self::Local { .. } => {}
            Self::Static { uri, manifest_uri } => {
                fields.push(("uri", uri.to_string()));
                if let Some(manifest) = manifest_uri {
                    fields.push(("manifestUri", manifest.to_string()));
                }
            }
            Self::IgluServer { uri, api_key } => {
                fields.push(("uri", uri.to_string()));
                if let Some(key) = api_key {
                    fields.push(("apiKey", key.clone()));
                }
            }
            Self::ManagedCatalog {
                organization_id,
                api_key,
                api_endpoint,
            } => {
                fields.push(("organizationId", organization_id.clone()));
                fields.push(("apiKey", api_key.clone()));
                if let Some(endpoint) = api_endpoint {
                    fields.push(("apiEndpoint", endpoint.to_string()));
                }
            }
        }
        fields
    }

    /// Do two same-kind option records share any configured field value?
    pub(crate) fn overlaps(&self, other: &RegistryKind) -> bool {
        if self.tag() != other.tag() {
            return false;
        }
        let theirs = other.option_fields();
        self.option_fields()
            .iter()
            .any(|field| theirs.contains(field))
    }

    /// True when both records carry exactly the same option fields.
    pub(crate) fn options_identical(&self, other: &RegistryKind) -> bool {
        self.tag() == other.tag() && self.option_fields() == other.option_fields()
    }
}

/// The three-operation contract every registry variant implements.
///
/// `resolve` fails when the schema is absent or the fetched content does
/// not pass the self-description gate. `walk` enumerates everything the
/// registry currently claims to hold; the resolver contains its failures.
/// `status` reports health; only Iglu Server has a meaningful check.
#[async_trait]
pub trait Registry: fmt::Debug + Send + Sync {
    fn spec(&self) -> &RegistrySpec;

    fn id(&self) -> Uuid {
        self.spec().id
    }

    fn name(&self) -> &str {
        &self.spec().name
    }

    fn priority(&self) -> Option<u64> {
        self.spec().priority
    }

    fn vendor_prefixes(&self) -> &[String] {
        &self.spec().vendor_prefixes
    }

    /// Whether this registry may be consulted for the given vendor.
    /// An empty prefix list means no restriction.
    fn covers_vendor(&self, vendor: &str) -> bool {
        let prefixes = self.vendor_prefixes();
        prefixes.is_empty() || prefixes.iter().any(|prefix| vendor.starts_with(prefix.as_str()))
    }

    /// Validate data against a schema document this registry supplied.
    fn validate(&self, schema: &Value, data: &Value) -> ValidationResult {
        validate_document(schema, data)
    }

    async fn resolve(self: Arc<Self>, id: &SchemaId) -> Result<ResolvedSchema>;

    async fn status(&self) -> Health;

    async fn walk(self: Arc<Self>) -> Result<Vec<SchemaId>>;
}

/// Build the runtime registry for a spec. The only place kinds map to
/// implementations.
pub fn build_registry(spec: RegistrySpec) -> Result<Arc<dyn Registry>> {
    Ok(match &spec.kind {
        RegistryKind::Local { .. } => Arc::new(LocalRegistry::new(spec)),
        RegistryKind::Static { .. } => Arc::new(StaticRegistry::new(spec)?),
        RegistryKind::IgluServer { .. } => Arc::new(IgluServerRegistry::new(spec)?),
        RegistryKind::ManagedCatalog { .. } => Arc::new(ManagedCatalogRegistry::new(spec)?),
    })
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}
