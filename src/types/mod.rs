pub mod schema;

pub use schema::{IGLU_SCHEMA_URI_SCHEME, SELF_DESCRIBING_META, ResolvedSchema, SchemaId};
