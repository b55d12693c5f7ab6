use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::registry::Registry;
use crate::validation::ValidationResult;

/// URI scheme for Iglu schema identities.
pub const IGLU_SCHEMA_URI_SCHEME: &str = "iglu";

/// Meta-schema every self-describing schema document must declare.
pub const SELF_DESCRIBING_META: &str =
    "http://iglucentral.com/schemas/com.snowplowanalytics.self-desc/schema/jsonschema/1-0-0#";

/// Depth cap for the search-index walk over schema documents.
const SEARCH_WALK_DEPTH: usize = 8;

/// The four-part coordinate naming a schema, independent of where it is
/// stored: `iglu:{vendor}/{name}/{format}/{version}`.
///
/// Two identities are equivalent iff all four fields match. The fields
/// are opaque strings; no version arithmetic happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaId {
    pub vendor: String,
    pub name: String,
    pub format: String,
    pub version: String,
}

impl SchemaId {
    pub fn new(
        vendor: impl Into<String>,
        name: impl Into<String>,
        format: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            name: name.into(),
            format: format.into(),
            version: version.into(),
        }
    }

    /// Parse an `iglu:` URI. Any shape other than a scheme plus exactly
    /// four path segments yields `None`; malformed input is an absence,
    /// not an error.
    pub fn parse(uri: &str) -> Option<Self> {
        let body = uri
            .strip_prefix(IGLU_SCHEMA_URI_SCHEME)?
            .strip_prefix(':')?;
        let segments: Vec<&str> = body.split('/').collect();
        match segments.as_slice() {
            [vendor, name, format, version] => {
                Some(Self::new(*vendor, *name, *format, *version))
            }
            _ => None,
        }
    }

    /// Canonical URI form, round-tripping through [`SchemaId::parse`].
    pub fn uri(&self) -> String {
        format!(
            "{IGLU_SCHEMA_URI_SCHEME}:{}/{}/{}/{}",
            self.vendor, self.name, self.format, self.version
        )
    }

    /// Lowercased haystack of the identity fields, used for substring
    /// filtering in directory views. Never consulted during resolution.
    pub fn search_index(&self) -> String {
        format!(
            "{} {} {} {}",
            self.vendor, self.name, self.format, self.version
        )
        .to_lowercase()
    }

    /// Read the identity a self-describing document claims for itself.
    /// Requires the expected `$schema` marker and a complete `self` block.
    pub fn from_self_description(doc: &Value) -> Option<Self> {
        let obj = doc.as_object()?;
        if obj.get("$schema")?.as_str()? != SELF_DESCRIBING_META {
            return None;
        }
        let own = obj.get("self")?.as_object()?;
        Some(Self::new(
            own.get("vendor")?.as_str()?,
            own.get("name")?.as_str()?,
            own.get("format")?.as_str()?,
            own.get("version")?.as_str()?,
        ))
    }

    /// The gate turning "a registry returned *something*" into "a
    /// registry returned *this* schema": succeeds only if `doc` is a
    /// self-describing schema whose embedded identity exactly equals
    /// this one. A near-miss (say, only the version differs) is `None`.
    pub fn try_resolve(
        &self,
        doc: Value,
        registry: Arc<dyn Registry>,
    ) -> Option<ResolvedSchema> {
        let claimed = Self::from_self_description(&doc)?;
        if claimed == *self {
            Some(ResolvedSchema::new(self.clone(), registry, doc))
        } else {
            None
        }
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// A schema identity plus the JSON-Schema document some registry supplied
/// for it, and which registry that was.
///
/// Immutable once constructed. The resolver exclusively manages registry
/// lifetime; a resolved schema merely points back at its origin.
#[derive(Debug, Clone)]
pub struct ResolvedSchema {
    id: SchemaId,
    registry: Arc<dyn Registry>,
    data: Value,
    search: OnceLock<String>,
}

impl ResolvedSchema {
    pub(crate) fn new(id: SchemaId, registry: Arc<dyn Registry>, data: Value) -> Self {
        Self {
            id,
            registry,
            data,
            search: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    /// The registry that won the resolution race for this schema.
    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// The raw JSON-Schema document.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn uri(&self) -> String {
        self.id.uri()
    }

    /// Validate `data` against this schema via the owning registry's
    /// validator. Results are not cached.
    pub fn validate(&self, data: &Value) -> ValidationResult {
        self.registry.validate(&self.data, data)
    }

    /// Search haystack: the identity fields plus the document's title,
    /// description, type, property names and enum values, harvested by a
    /// bounded depth-first walk. Built on first use.
    pub fn search_index(&self) -> &str {
        self.search.get_or_init(|| {
            let mut terms = vec![self.id.search_index()];
            harvest_terms(&self.data, SEARCH_WALK_DEPTH, &mut terms);
            terms.join(" ").to_lowercase()
        })
    }
}

/// Collect human-searchable strings out of a schema document, depth-first
/// with a hard depth cap to keep pathological documents cheap.
fn harvest_terms(doc: &Value, depth: usize, terms: &mut Vec<String>) {
    if depth == 0 {
        return;
    }

    match doc {
        Value::Object(obj) => {
            for key in ["title", "description", "type"] {
                if let Some(text) = obj.get(key).and_then(Value::as_str) {
                    terms.push(text.to_string());
                }
            }
            if let Some(props) = obj.get("properties").and_then(Value::as_object) {
                for (name, prop) in props {
                    terms.push(name.clone());
                    harvest_terms(prop, depth - 1, terms);
                }
            }
            if let Some(variants) = obj.get("enum").and_then(Value::as_array) {
                for variant in variants {
                    if let Some(text) = variant.as_str() {
                        terms.push(text.to_string());
                    }
                }
            }
            for key in ["items", "patternProperties", "oneOf", "anyOf", "allOf"] {
                if let Some(nested) = obj.get(key) {
                    harvest_terms(nested, depth - 1, terms);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                harvest_terms(item, depth - 1, terms);
            }
        }
        _ => {}
    }
}
