//! JSON-Schema validation glue.
//!
//! The validation algorithm itself is the off-the-shelf `jsonschema`
//! crate; this module adapts it to the resolver's outcome model. A
//! validation failure ([`ValidationOutcome::Invalid`]) is a different
//! animal from a resolution failure ([`ValidationOutcome::Unrecognised`])
//! and the two are never collapsed into a boolean.

use serde_json::Value;

/// Result of validating a piece of data against one resolved schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

/// Three-state outcome for "is this self-describing data any good?".
///
/// UIs built on the resolver render these as Valid / Invalid /
/// Unrecognised; the last means no registry held the schema at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(Vec<String>),
    Unrecognised,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validate `data` against a raw JSON-Schema document.
///
/// Self-describing schemas carry the Iglu meta-schema in `$schema`, which
/// the validator does not recognise as a draft identifier; it is stripped
/// before compilation and the document is compiled against the default
/// draft. A document that fails to compile at all counts as invalid with
/// a single explanatory error.
pub fn validate_document(schema: &Value, data: &Value) -> ValidationResult {
    let mut schema = schema.clone();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
    }

    match jsonschema::validator_for(&schema) {
        Ok(validator) => {
            let errors: Vec<String> = validator
                .iter_errors(data)
                .map(|err| err.to_string())
                .collect();
            if errors.is_empty() {
                ValidationResult::ok()
            } else {
                ValidationResult::failed(errors)
            }
        }
        Err(err) => ValidationResult::failed(vec![format!("schema did not compile: {err}")]),
    }
}
