//! Text Patcher: idempotent anchor-based patching of text files
//!
//! A patch names an anchor, a replacement and a matching strategy. Applying
//! it either rewrites the located text or reports that the anchor is absent,
//! leaving the content byte-for-byte untouched. Once applied, the anchor is
//! gone, so a second run reports `NotFound` instead of patching twice.
//!
//! # Architecture
//!
//! All edit operations compile down to a single primitive: [`Edit`], which
//! represents a verified byte-span replacement. Intelligence lives in span
//! acquisition (the [`locate`] strategies), not in the application logic.
//!
//! # Safety
//!
//! - Edits can verify expected before-text before applying
//! - Atomic file writes (tempfile + fsync + rename)
//! - Workspace boundary enforcement
//! - UTF-8 validation
//!
//! # Example
//!
//! ```
//! use text_patcher::{apply_patch, Operation, Outcome, PatchDefinition, Query};
//!
//! let patch = PatchDefinition::new(
//!     "rename-marker",
//!     "notes.txt",
//!     Query::exact("<X>"),
//!     Operation::replace("<Y>"),
//! );
//!
//! match apply_patch("abc<X>def", &patch).unwrap() {
//!     Outcome::Applied { content, .. } => assert_eq!(content, "abc<Y>def"),
//!     Outcome::NotFound => unreachable!(),
//! }
//! ```

pub mod cache;
pub mod config;
pub mod diagnose;
pub mod edit;
pub mod locate;
pub mod logging;
pub mod patch;
pub mod safety;

// Re-exports
pub use config::{
    apply_patches, check_patches, load_from_path, load_from_str, ApplicationError,
    ApplyOptions, ApplyReport, ConfigError, Occurrences, Operation, PatchConfig,
    PatchDefinition, PatchResult, PatchStatus, Query,
};
pub use diagnose::{near_miss, NearMiss};
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use locate::{LocateError, Region};
pub use patch::{apply_patch, looks_applied, ApplyError, Outcome};
pub use safety::{SafetyError, WorkspaceGuard};
