//! Declarative provisioning manifest.

pub mod parser;
pub mod schema;

pub use parser::{builtin_manifest, parse_manifest, parse_manifest_json, parse_manifest_str};
pub use schema::{FinalizeStrategy, ItemSpec, Manifest, ManifestError, REDIRECT_URIS_PROPERTY};
