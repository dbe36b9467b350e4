pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{
    apply_patches, check_patches, ApplicationError, ApplyOptions, ApplyReport, FileChange,
    PatchOutcomes, PatchResult, PatchStatus,
};
pub use loader::{discover_patch_files, load_from_path, load_from_str, ConfigError};
pub use schema::{
    HashAlgorithm, Metadata, Occurrences, Operation, PatchConfig, PatchDefinition, Query,
    ValidationError, ValidationIssue, Verify,
};
