use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{ResolverError, Result};
use crate::registry::{Health, Registry, RegistryKind, RegistrySpec, http_client};
use crate::types::{ResolvedSchema, SchemaId};

const DEFAULT_API_ENDPOINT: &str = "https://console.snowplowanalytics.com/";

/// Issued access tokens are good for an hour.
const TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
}

/// One data structure as listed by the catalog API: a single
/// vendor/name/format with one or more deployed versions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogStructure {
    hash: String,
    organization_id: String,
    vendor: String,
    name: String,
    format: String,
    #[serde(default)]
    deployments: Vec<Deployment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Deployment {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub patch_level: u64,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub env: String,
    #[serde(default)]
    pub ts: String,
}

/// What resolve needs to fetch one concrete version: the structure hash
/// plus that version's deployment records.
#[derive(Debug, Clone)]
struct StructureHandle {
    hash: String,
    deployments: Vec<Deployment>,
}

#[derive(Debug)]
struct AccessToken {
    header_value: String,
    expires_at: Instant,
}

/// Registry backed by the managed console's organization-scoped
/// data-structures API. Reads only; write operations on the console are
/// not part of the resolution contract.
///
/// Authentication swaps the configured API key for a bearer token, cached
/// until shortly before expiry. The catalog listing (`walk`) doubles as
/// the metadata source resolution needs, so a cold `resolve` triggers a
/// walk first.
#[derive(Debug)]
pub struct ManagedCatalogRegistry {
    spec: RegistrySpec,
    endpoint: Url,
    organization_id: String,
    api_key: String,
    client: reqwest::Client,
    auth: RwLock<Option<AccessToken>>,
    cache: RwLock<HashMap<SchemaId, Value>>,
    metadata: RwLock<HashMap<SchemaId, StructureHandle>>,
}

impl ManagedCatalogRegistry {
    pub fn new(spec: RegistrySpec) -> Result<Self> {
        let RegistryKind::ManagedCatalog {
            organization_id,
            api_key,
            api_endpoint,
        } = &spec.kind
        else {
            return Err(ResolverError::storage(format!(
                "managed-catalog registry built from {} spec",
                spec.kind.tag()
            )));
        };

        let endpoint = match api_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => Url::parse(DEFAULT_API_ENDPOINT)?,
        };
        let organization_id = organization_id.clone();
        let api_key = api_key.clone();
        let client = http_client()?;

        Ok(Self {
            spec,
            endpoint,
            organization_id,
            api_key,
            client,
            auth: RwLock::new(None),
            cache: RwLock::new(HashMap::new()),
            metadata: RwLock::new(HashMap::new()),
        })
    }

    /// Exchange the API key for a bearer token, reusing a cached one
    /// while it is still live.
    async fn auth_header(&self) -> Result<String> {
        if let Some(token) = self.auth.read().await.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.header_value.clone());
            }
        }

        let url = self.endpoint.join(&format!(
            "api/msc/v1/organizations/{}/credentials/v2/token",
            self.organization_id
        ))?;
        let response = self
            .client
            .get(url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;
        if !response.status().is_success() {
            return Err(ResolverError::unreachable(
                &self.spec.name,
                format!("auth failed: HTTP {}", response.status()),
            ));
        }

        let issued: AuthResponse = response
            .json()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;
        let header_value = format!("Bearer {}", issued.access_token);

        *self.auth.write().await = Some(AccessToken {
            header_value: header_value.clone(),
            expires_at: Instant::now() + TOKEN_TTL,
        });
        Ok(header_value)
    }

    async fn fetch(&self, api_path: &str) -> Result<reqwest::Response> {
        let authorization = self.auth_header().await?;
        let url = self.endpoint.join(api_path)?;
        let response = self
            .client
            .get(url)
            .header("Authorization", authorization)
            .send()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;
        Ok(response)
    }

    /// Refresh the per-identity metadata map from the catalog listing.
    async fn load_catalog(&self) -> Result<Vec<SchemaId>> {
        let path = format!(
            "api/msc/v1/organizations/{}/data-structures/v1",
            self.organization_id
        );
        let response = self.fetch(&path).await?;
        if !response.status().is_success() {
            return Err(ResolverError::unreachable(
                &self.spec.name,
                format!("HTTP {}", response.status()),
            ));
        }

        let structures: Vec<CatalogStructure> = response
            .json()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;

        let mut catalog = Vec::new();
        let mut metadata = self.metadata.write().await;
        for structure in structures {
            if structure.organization_id != self.organization_id {
                continue;
            }

            let mut by_version: HashMap<String, Vec<Deployment>> = HashMap::new();
            for deployment in &structure.deployments {
                by_version
                    .entry(deployment.version.clone())
                    .or_default()
                    .push(deployment.clone());
            }

            for (version, deployments) in by_version {
                let id = SchemaId::new(
                    structure.vendor.clone(),
                    structure.name.clone(),
                    structure.format.clone(),
                    version,
                );
                metadata.insert(
                    id.clone(),
                    StructureHandle {
                        hash: structure.hash.clone(),
                        deployments,
                    },
                );
                catalog.push(id);
            }
        }

        Ok(catalog)
    }
}

/// Choose which deployment environment to fetch a version from. When all
/// deployments agree on content there is nothing to choose; when they
/// disagree, prefer the newest patch, breaking ties towards PROD, and pin
/// the request to that environment.
pub(crate) fn patch_env_query(deployments: &[Deployment]) -> String {
    let mut candidate: Option<&Deployment> = None;
    let mut divergent = false;

    for deployment in deployments {
        let replace = match candidate {
            None => true,
            Some(current) => {
                current.patch_level < deployment.patch_level
                    || current.ts < deployment.ts
                    || (current.env == "DEV" && deployment.env == "PROD")
            }
        };
        if replace {
            divergent = divergent
                || candidate.is_some_and(|current| current.content_hash != deployment.content_hash);
            candidate = Some(deployment);
        }
    }

    match candidate {
        Some(deployment) if divergent => format!("?env={}", deployment.env.to_lowercase()),
        _ => String::new(),
    }
}

#[async_trait]
impl Registry for ManagedCatalogRegistry {
    fn spec(&self) -> &RegistrySpec {
        &self.spec
    }

    async fn resolve(self: Arc<Self>, id: &SchemaId) -> Result<ResolvedSchema> {
        if !self.covers_vendor(&id.vendor) {
            return Err(ResolverError::not_found(id.uri()));
        }

        let registry: Arc<dyn Registry> = self.clone();

        if let Some(doc) = self.cache.read().await.get(id) {
            return id
                .try_resolve(doc.clone(), registry)
                .ok_or_else(|| ResolverError::not_found(id.uri()));
        }

        // The catalog listing is the only source of structure hashes.
        if self.metadata.read().await.is_empty() {
            debug!(registry = %self.spec.name, "no catalog metadata yet; walking first");
            self.load_catalog().await?;
        }

        let handle = self
            .metadata
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ResolverError::not_found(id.uri()))?;

        let path = format!(
            "api/msc/v1/organizations/{}/data-structures/v1/{}/versions/{}{}",
            self.organization_id,
            handle.hash,
            id.version,
            patch_env_query(&handle.deployments)
        );
        let response = self.fetch(&path).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolverError::not_found(id.uri()));
        }
        if !response.status().is_success() {
            return Err(ResolverError::unreachable(
                &self.spec.name,
                format!("HTTP {}", response.status()),
            ));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;

        match id.try_resolve(doc.clone(), registry) {
            Some(resolved) => {
                self.cache.write().await.insert(id.clone(), doc);
                Ok(resolved)
            }
            None => Err(ResolverError::not_found(id.uri())),
        }
    }

    async fn status(&self) -> Health {
        Health::Ok
    }

    async fn walk(self: Arc<Self>) -> Result<Vec<SchemaId>> {
        self.load_catalog().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(patch_level: u64, content_hash: &str, env: &str, ts: &str) -> Deployment {
        Deployment {
            version: "1-0-0".to_string(),
            patch_level,
            content_hash: content_hash.to_string(),
            env: env.to_string(),
            ts: ts.to_string(),
        }
    }

    #[test]
    fn agreeing_deployments_need_no_env_pin() {
        let deployments = vec![
            deployment(0, "abc", "DEV", "2024-01-01"),
            deployment(0, "abc", "PROD", "2024-01-02"),
        ];
        assert_eq!(patch_env_query(&deployments), "");
    }

    #[test]
    fn divergent_deployments_pin_newest_environment() {
        let deployments = vec![
            deployment(0, "abc", "PROD", "2024-01-01"),
            deployment(1, "def", "DEV", "2024-02-01"),
        ];
        assert_eq!(patch_env_query(&deployments), "?env=dev");
    }

    #[test]
    fn prod_beats_dev_on_equal_patches() {
        let deployments = vec![
            deployment(1, "abc", "DEV", "2024-01-01"),
            deployment(1, "def", "PROD", "2024-01-01"),
        ];
        assert_eq!(patch_env_query(&deployments), "?env=prod");
    }

    #[test]
    fn empty_deployments_are_harmless() {
        assert_eq!(patch_env_query(&[]), "");
    }

    #[tokio::test]
    async fn status_has_no_health_concept() {
        let registry = ManagedCatalogRegistry::new(RegistrySpec::new(
            "Console",
            RegistryKind::ManagedCatalog {
                organization_id: "11111111-1111-1111-1111-111111111111".to_string(),
                api_key: "22222222-2222-2222-2222-222222222222".to_string(),
                api_endpoint: Some(Url::parse("http://127.0.0.1:1/").unwrap()),
            },
        ))
        .unwrap();
        assert_eq!(registry.status().await, Health::Ok);
    }

    #[test]
    fn builder_rejects_mismatched_kind() {
        let spec = RegistrySpec::new("Wrong", RegistryKind::Local { schemas: vec![] });
        assert!(ManagedCatalogRegistry::new(spec).is_err());
    }
}
