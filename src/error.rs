use thiserror::Error;

/// Errors surfaced by the resolver and its registries.
///
/// Individual registry failures are contained at the registry boundary:
/// during a resolution race they merely remove that registry from
/// contention, and during a walk they degrade the registry to an empty
/// catalog. Only total failure (every candidate failed) reaches callers,
/// as [`ResolverError::NotFound`].
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("schema not found: {uri}")]
    NotFound { uri: String },

    #[error("registry {registry} unreachable: {reason}")]
    Unreachable { registry: String, reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("HTTP error: {message}")]
    Http { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl ResolverError {
    pub fn not_found(uri: impl Into<String>) -> Self {
        Self::NotFound { uri: uri.into() }
    }

    pub fn unreachable(registry: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            registry: registry.into(),
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// True for the "no registry held this schema" outcome, which callers
    /// must keep distinct from a validation failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolverError>;
