pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{apply_edit, apply_patch, check_patch, resolve_edit, ApplicationError};
pub use loader::{load_from_path, load_from_str, ConfigError, LoadedSpec};
pub use schema::{
    HashAlgorithm, Metadata, PatchConfig, PatchDefinition, ValidationError, ValidationIssue,
    Verify,
};
