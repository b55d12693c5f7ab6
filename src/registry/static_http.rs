use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{ResolverError, Result};
use crate::registry::{Health, Registry, RegistryKind, RegistrySpec, http_client};
use crate::types::{ResolvedSchema, SchemaId};

/// Properties a manifest object may list its schema paths under.
const FILE_LIST_PROPS: [&str; 3] = ["tree", "files", "paths"];

fn schema_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(([^/]+)/([^/]+)/jsonschema/(\d+-\d+-\d+))(\.json(schema)?)?$")
            .expect("schema path pattern is valid")
    })
}

/// Registry backed by a statically hosted schema tree: plain HTTP `GET`s
/// under `{base}/schemas/{vendor}/{name}/{format}/{version}`, no auth.
///
/// Results are cached per identity, including confirmed absences, so a
/// busy resolver does not hammer the host for schemas it does not have.
#[derive(Debug)]
pub struct StaticRegistry {
    spec: RegistrySpec,
    base: Url,
    manifest: Url,
    client: reqwest::Client,
    cache: RwLock<HashMap<SchemaId, Option<Value>>>,
}

impl StaticRegistry {
    pub fn new(spec: RegistrySpec) -> Result<Self> {
        let RegistryKind::Static { uri, manifest_uri } = &spec.kind else {
            return Err(ResolverError::storage(format!(
                "static registry built from {} spec",
                spec.kind.tag()
            )));
        };

        let base = uri.clone();
        let manifest = match manifest_uri {
            Some(manifest) => manifest.clone(),
            None => base.join("schemas")?,
        };
        let client = http_client()?;

        Ok(Self {
            spec,
            base,
            manifest,
            client,
            cache: RwLock::new(HashMap::new()),
        })
    }

    async fn fetch_schema(&self, id: &SchemaId) -> Result<Option<Value>> {
        let url = self.base.join(&format!(
            "schemas/{}/{}/{}/{}",
            id.vendor, id.name, id.format, id.version
        ))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ResolverError::unreachable(&self.spec.name, err.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
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
        Ok(Some(doc))
    }

    async fn fetch_manifest(&self) -> Option<Value> {
        let response = self.client.get(self.manifest.clone()).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

/// Harvest schema identities out of a manifest document. Accepts a bare
/// array of entries or an object carrying any of `tree`/`files`/`paths`
/// arrays; entries are path strings or `{path}` objects. Paths ending in
/// `vendor/name/jsonschema/M-R-A` count, with or without an `iglu:`
/// prefix or a `.json`/`.jsonschema` suffix.
pub(crate) fn parse_manifest_listing(manifest: &Value) -> Vec<SchemaId> {
    let mut entries: Vec<&Value> = Vec::new();
    match manifest {
        Value::Array(list) => entries.extend(list),
        Value::Object(obj) => {
            for prop in FILE_LIST_PROPS {
                if let Some(Value::Array(list)) = obj.get(prop) {
                    entries.extend(list);
                }
            }
        }
        _ => {}
    }

    entries
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(path) => Some(path.as_str()),
            Value::Object(obj) => obj.get("path").and_then(Value::as_str),
            _ => None,
        })
        .filter_map(|path| {
            let captured = schema_path_pattern().captures(path)?;
            let tail = captured.get(1)?.as_str();
            let uri = if tail.starts_with("iglu:") {
                tail.to_string()
            } else {
                format!("iglu:{tail}")
            };
            SchemaId::parse(&uri)
        })
        .collect()
}

#[async_trait]
impl Registry for StaticRegistry {
    fn spec(&self) -> &RegistrySpec {
        &self.spec
    }

    async fn resolve(self: Arc<Self>, id: &SchemaId) -> Result<ResolvedSchema> {
        if !self.covers_vendor(&id.vendor) {
            return Err(ResolverError::not_found(id.uri()));
        }

        let registry: Arc<dyn Registry> = self.clone();

        if let Some(cached) = self.cache.read().await.get(id) {
            return match cached {
                Some(doc) => id
                    .try_resolve(doc.clone(), registry)
                    .ok_or_else(|| ResolverError::not_found(id.uri())),
                None => Err(ResolverError::not_found(id.uri())),
            };
        }

        match self.fetch_schema(id).await? {
            Some(doc) => match id.try_resolve(doc.clone(), registry) {
                Some(resolved) => {
                    self.cache.write().await.insert(id.clone(), Some(doc));
                    Ok(resolved)
                }
                None => {
                    // Served content that does not self-describe as the
                    // requested identity counts as absent.
                    self.cache.write().await.insert(id.clone(), None);
                    Err(ResolverError::not_found(id.uri()))
                }
            },
            None => {
                self.cache.write().await.insert(id.clone(), None);
                Err(ResolverError::not_found(id.uri()))
            }
        }
    }

    async fn status(&self) -> Health {
        Health::Ok
    }

    async fn walk(self: Arc<Self>) -> Result<Vec<SchemaId>> {
        let claimed = match self.fetch_manifest().await {
            Some(manifest) => parse_manifest_listing(&manifest),
            None => {
                debug!(registry = %self.spec.name, "no readable manifest; walking cache only");
                Vec::new()
            }
        };

        // Schemas already fetched but missing from the manifest still count.
        let cache = self.cache.read().await;
        let extra: Vec<SchemaId> = cache
            .iter()
            .filter(|(id, doc)| doc.is_some() && !claimed.contains(id))
            .map(|(id, _)| id.clone())
            .collect();
        drop(cache);

        let mut all = claimed;
        all.extend(extra);
        Ok(all)
    }
}
