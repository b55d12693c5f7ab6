use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{ResolverError, Result};
use crate::registry::{Health, Registry, RegistryKind, RegistrySpec, http_client};
use crate::types::{ResolvedSchema, SchemaId};

/// Registry backed by a full Iglu Server API: schema lookup and catalog
/// listing under `/api/schemas`, with an optional `apikey` header for
/// non-public schemas, and a chained health check under `/api/meta`.
#[derive(Debug)]
pub struct IgluServerRegistry {
    spec: RegistrySpec,
    base: Url,
    api_key: Option<String>,
    client: reqwest::Client,
    cache: RwLock<HashMap<SchemaId, Value>>,
    state: RwLock<ServerState>,
}

/// Last-known health and server details, kept until the next explicit
/// `status` call re-checks them.
#[derive(Debug, Default)]
struct ServerState {
    last_health: Option<Health>,
    server_info: Option<Value>,
    status_reason: Option<String>,
}

impl IgluServerRegistry {
    pub fn new(spec: RegistrySpec) -> Result<Self> {
        let RegistryKind::IgluServer { uri, api_key } = &spec.kind else {
            return Err(ResolverError::storage(format!(
                "iglu-server registry built from {} spec",
                spec.kind.tag()
            )));
        };

        let base = uri.clone();
        let api_key = api_key.clone();
        let client = http_client()?;

        Ok(Self {
            spec,
            base,
            api_key,
            client,
            cache: RwLock::new(HashMap::new()),
            state: RwLock::new(ServerState::default()),
        })
    }

    /// Health reported by the most recent check, if any.
    pub async fn last_status(&self) -> Option<Health> {
        self.state.read().await.last_health
    }

    /// Server details captured by the last successful health chain.
    pub async fn server_info(&self) -> Option<Value> {
        self.state.read().await.server_info.clone()
    }

    async fn fetch(&self, api_path: &str) -> Result<reqwest::Response> {
        let url = self.base.join(api_path)?;
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;
        Ok(response)
    }

    async fn mark_unhealthy(&self, reason: impl Into<String>) {
        let mut state = self.state.write().await;
        state.last_health = Some(Health::Unhealthy);
        state.status_reason = Some(reason.into());
    }

    /// One step of the health chain: fetch a meta endpoint and require a
    /// literal `OK` body.
    async fn health_step(&self, api_path: &str) -> Result<bool> {
        let response = self.fetch(api_path).await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let body = response
            .text()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;
        Ok(body.trim() == "OK")
    }

    /// Liveness, then database connectivity, then server info; the first
    /// failing step wins.
    async fn run_health_chain(&self) -> Health {
        match self.health_step("api/meta/health").await {
            Ok(true) => {}
            _ => {
                self.mark_unhealthy("REGISTRY_ERROR").await;
                return Health::Unhealthy;
            }
        }

        match self.health_step("api/meta/health/db").await {
            Ok(true) => {}
            _ => {
                self.mark_unhealthy("REGISTRY_DB_ERROR").await;
                return Health::Unhealthy;
            }
        }

        let info = match self.fetch("api/meta/server").await {
            Ok(response) if response.status().is_success() => response.json::<Value>().await.ok(),
            _ => None,
        };
        let Some(info) = info else {
            self.mark_unhealthy("REGISTRY_INFO_ERROR").await;
            return Health::Unhealthy;
        };

        let mut state = self.state.write().await;
        state.last_health = Some(Health::Ok);
        state.server_info = Some(info);
        state.status_reason = None;
        Health::Ok
    }
}

#[async_trait]
impl Registry for IgluServerRegistry {
    fn spec(&self) -> &RegistrySpec {
        &self.spec
    }

    async fn resolve(self: Arc<Self>, id: &SchemaId) -> Result<ResolvedSchema> {
        let registry: Arc<dyn Registry> = self.clone();

        if let Some(doc) = self.cache.read().await.get(id) {
            return id
                .try_resolve(doc.clone(), registry)
                .ok_or_else(|| ResolverError::not_found(id.uri()));
        }

        let path = format!(
            "api/schemas/{}/{}/{}/{}",
            id.vendor, id.name, id.format, id.version
        );
        let response = match self.fetch(&path).await {
            Ok(response) => response,
            Err(err) => {
                self.mark_unhealthy(err.to_string()).await;
                return Err(err);
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ResolverError::not_found(id.uri()));
        }
        if !response.status().is_success() {
            let reason = format!("HTTP {}", response.status());
            self.mark_unhealthy(reason.clone()).await;
            return Err(ResolverError::unreachable(&self.spec.name, reason));
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;

        match id.try_resolve(doc.clone(), registry) {
            Some(resolved) => {
                self.cache.write().await.insert(id.clone(), doc);
                self.state.write().await.last_health = Some(Health::Ok);
                Ok(resolved)
            }
            None => {
                debug!(registry = %self.spec.name, uri = %id.uri(),
                       "server returned content that does not describe the requested schema");
                Err(ResolverError::not_found(id.uri()))
            }
        }
    }

    async fn status(&self) -> Health {
        self.run_health_chain().await
    }

    async fn walk(self: Arc<Self>) -> Result<Vec<SchemaId>> {
        let response = self.fetch("api/schemas").await?;
        if !response.status().is_success() {
            let reason = format!("HTTP {}", response.status());
            self.mark_unhealthy(reason.clone()).await;
            return Err(ResolverError::unreachable(&self.spec.name, reason));
        }

        let listing: Value = response
            .json()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;

        match listing {
            Value::Array(entries) => Ok(entries
                .iter()
                .filter_map(Value::as_str)
                .filter_map(SchemaId::parse)
                .collect()),
            _ => {
                self.mark_unhealthy("unexpected schema listing shape").await;
                Err(ResolverError::unreachable(
                    &self.spec.name,
                    "schema listing was not an array",
                ))
            }
        }
    }
}
