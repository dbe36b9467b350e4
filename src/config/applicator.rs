//! Patch runner - applies a patch configuration to a workspace
//!
//! This module:
//! - Resolves every target file inside the workspace before touching anything
//! - Groups patches by file, keeping config order
//! - Applies each file's patches in sequence, in memory
//! - Writes each changed file once, atomically
//! - Reports a result for each patch

use crate::config::schema::{PatchConfig, PatchDefinition};
use crate::diagnose::{near_miss, NearMiss};
use crate::edit::{atomic_write, EditError};
use crate::patch::{apply_patch, looks_applied, ApplyError, Outcome};
use crate::safety::{SafetyError, WorkspaceGuard};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of applying a single patch
#[derive(Debug, Clone, PartialEq)]
#[must_use = "PatchResult should be checked for success/failure"]
pub enum PatchResult {
    /// Anchor located and the file content changed
    Applied { file: PathBuf, regions: usize },
    /// Anchor located but the replacement was identical
    Unchanged { file: PathBuf },
    /// Anchor absent; nothing changed
    NotFound {
        file: PathBuf,
        near_miss: Option<NearMiss>,
    },
}

impl fmt::Display for PatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchResult::Applied { file, regions } => {
                write!(f, "Applied to {} ({} region(s))", file.display(), regions)
            }
            PatchResult::Unchanged { file } => write!(f, "Unchanged in {}", file.display()),
            PatchResult::NotFound { file, .. } => write!(f, "NOT FOUND in {}", file.display()),
        }
    }
}

/// Read-only classification of a patch against the current workspace
#[derive(Debug, Clone, PartialEq)]
pub enum PatchStatus {
    /// Anchor present; applying would change the file
    Pending { file: PathBuf },
    /// Anchor gone and replacement present, or replacement identical
    AlreadyApplied { file: PathBuf },
    /// Neither anchor nor replacement present
    NotFound {
        file: PathBuf,
        near_miss: Option<NearMiss>,
    },
}

/// Errors during patch application
#[derive(Debug)]
pub enum ApplicationError {
    /// Target file missing, unreadable or not UTF-8
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Target file outside the workspace or in a forbidden directory
    Safety(SafetyError),
    /// Anchor ambiguous, window out of bounds, verification mismatch, ...
    Apply { file: PathBuf, source: ApplyError },
    /// Writing the patched file failed
    Write { file: PathBuf, source: EditError },
    /// Not written because another patch for the same file failed under fail-fast
    Aborted { file: PathBuf },
}

impl ApplicationError {
    /// I/O failures end the run; everything else is per-patch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApplicationError::Io { .. } | ApplicationError::Write { .. }
        )
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::Io { path, source } => {
                write!(f, "I/O error on {}: {}", path.display(), source)
            }
            ApplicationError::Safety(e) => write!(f, "unsafe target: {}", e),
            ApplicationError::Apply { file, source } => {
                write!(f, "{} in {}", source, file.display())
            }
            ApplicationError::Write { file, source } => {
                write!(f, "failed to write {}: {}", file.display(), source)
            }
            ApplicationError::Aborted { file } => {
                write!(f, "{} not written: run aborted", file.display())
            }
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Io { source, .. } => Some(source),
            ApplicationError::Safety(e) => Some(e),
            ApplicationError::Apply { source, .. } => Some(source),
            ApplicationError::Write { source, .. } => Some(source),
            ApplicationError::Aborted { .. } => None,
        }
    }
}

impl From<SafetyError> for ApplicationError {
    fn from(e: SafetyError) -> Self {
        ApplicationError::Safety(e)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Compute results and diffs without writing
    pub dry_run: bool,
    /// Stop at the first missing anchor or error
    pub fail_fast: bool,
}

/// Before/after content of one target file.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub file: PathBuf,
    pub before: String,
    pub after: String,
    pub written: bool,
}

pub type PatchOutcomes<T> = Vec<(String, Result<T, ApplicationError>)>;

#[derive(Debug)]
pub struct ApplyReport {
    /// One entry per processed patch, in config order
    pub results: PatchOutcomes<PatchResult>,
    /// Files whose content changed
    pub changes: Vec<FileChange>,
    /// Processing stopped early (fail-fast or fatal error)
    pub aborted: bool,
}

/// Apply a patch configuration to a workspace.
pub fn apply_patches(
    config: &PatchConfig,
    workspace_root: &Path,
    options: ApplyOptions,
) -> ApplyReport {
    let mut report = ApplyReport {
        results: Vec::new(),
        changes: Vec::new(),
        aborted: false,
    };

    let groups = match group_by_file(config, workspace_root) {
        Ok(groups) => groups,
        Err(failures) => {
            report.results = failures.into_iter().map(|(id, e)| (id, Err(e))).collect();
            report.aborted = true;
            return report;
        }
    };

    let mut groups = groups.into_iter();
    while let Some((file_path, patches)) = groups.next() {
        let original = match read_target(&file_path) {
            Ok(content) => content,
            Err(err) => {
                report.results.extend(
                    fail_group(&patches, &file_path, &err)
                        .into_iter()
                        .map(|(id, e)| (id, Err(e))),
                );
                for (file, rest) in groups.by_ref() {
                    report.results.extend(rest.iter().map(|patch| {
                        (
                            patch.id.clone(),
                            Err(ApplicationError::Aborted { file: file.clone() }),
                        )
                    }));
                }
                report.aborted = true;
                break;
            }
        };

        let run = run_file(&file_path, &patches, &original);
        let failed = run.steps.iter().any(|step| {
            !matches!(
                step.result,
                Ok(PatchResult::Applied { .. } | PatchResult::Unchanged { .. })
            )
        });

        if options.fail_fast && failed {
            warn!(file = %file_path.display(), "aborting run; file left untouched");
            for (id, step) in patches.iter().map(|p| &p.id).zip(run.steps) {
                let result = match step.result {
                    Ok(PatchResult::Applied { .. }) => Err(ApplicationError::Aborted {
                        file: file_path.clone(),
                    }),
                    other => other,
                };
                report.results.push((id.clone(), result));
            }
            report.aborted = true;
            break;
        }

        let mut results: PatchOutcomes<PatchResult> = patches
            .iter()
            .map(|p| p.id.clone())
            .zip(run.steps.into_iter().map(|step| step.result))
            .collect();

        if run.content != original {
            let mut written = false;
            if options.dry_run {
                debug!(file = %file_path.display(), "dry run; not writing");
            } else {
                match atomic_write(&file_path, run.content.as_bytes()) {
                    Ok(()) => {
                        info!(file = %file_path.display(), "wrote patched file");
                        written = true;
                    }
                    Err(source) => {
                        // EditError is not Clone; each applied patch gets its own copy
                        let message = source.to_string();
                        for (_, result) in results.iter_mut() {
                            if matches!(result, Ok(PatchResult::Applied { .. })) {
                                *result = Err(ApplicationError::Write {
                                    file: file_path.clone(),
                                    source: EditError::Io(std::io::Error::other(message.clone())),
                                });
                            }
                        }
                        report.results.extend(results);
                        report.aborted = true;
                        break;
                    }
                }
            }
            report.changes.push(FileChange {
                file: file_path.clone(),
                before: original,
                after: run.content,
                written,
            });
        }

        report.results.extend(results);
    }

    report
}

/// Check patch status without writing anything.
///
/// Patches for one file are evaluated in sequence, so a patch whose anchor is
/// produced by an earlier patch still reports `Pending`.
pub fn check_patches(config: &PatchConfig, workspace_root: &Path) -> PatchOutcomes<PatchStatus> {
    let groups = match group_by_file(config, workspace_root) {
        Ok(groups) => groups,
        Err(failures) => return failures.into_iter().map(|(id, e)| (id, Err(e))).collect(),
    };

    let mut statuses = Vec::new();

    for (file_path, patches) in groups {
        let original = match read_target(&file_path) {
            Ok(content) => content,
            Err(err) => {
                statuses.extend(
                    fail_group(&patches, &file_path, &err)
                        .into_iter()
                        .map(|(id, e)| (id, Err(e))),
                );
                continue;
            }
        };

        let run = run_file(&file_path, &patches, &original);
        for (patch, step) in patches.iter().zip(run.steps) {
            let status = step.result.map(|result| match result {
                PatchResult::Applied { file, .. } => PatchStatus::Pending { file },
                PatchResult::Unchanged { file } => PatchStatus::AlreadyApplied { file },
                PatchResult::NotFound { file, .. } if step.looks_applied => {
                    PatchStatus::AlreadyApplied { file }
                }
                PatchResult::NotFound { file, near_miss } => {
                    PatchStatus::NotFound { file, near_miss }
                }
            });
            statuses.push((patch.id.clone(), status));
        }
    }

    statuses
}

struct Step {
    result: Result<PatchResult, ApplicationError>,
    looks_applied: bool,
}

struct FileRun {
    steps: Vec<Step>,
    content: String,
}

/// Apply one file's patches in order against an evolving in-memory copy.
fn run_file(file_path: &Path, patches: &[&PatchDefinition], original: &str) -> FileRun {
    let mut content = original.to_string();
    let mut steps = Vec::with_capacity(patches.len());

    for patch in patches {
        let step = match apply_patch(&content, patch) {
            Ok(Outcome::Applied {
                content: patched,
                regions,
            }) => {
                let result = if patched == content {
                    debug!(patch = %patch.id, "replacement identical to located text");
                    PatchResult::Unchanged {
                        file: file_path.to_path_buf(),
                    }
                } else {
                    debug!(patch = %patch.id, regions, "applied in memory");
                    PatchResult::Applied {
                        file: file_path.to_path_buf(),
                        regions,
                    }
                };
                content = patched;
                Step {
                    result: Ok(result),
                    looks_applied: false,
                }
            }
            Ok(Outcome::NotFound) => {
                debug!(patch = %patch.id, file = %file_path.display(), "anchor not found");
                Step {
                    looks_applied: looks_applied(&content, patch),
                    result: Ok(PatchResult::NotFound {
                        file: file_path.to_path_buf(),
                        near_miss: near_miss(&content, patch.query.anchor()),
                    }),
                }
            }
            Err(source) => {
                debug!(patch = %patch.id, error = %source, "patch failed");
                Step {
                    result: Err(ApplicationError::Apply {
                        file: file_path.to_path_buf(),
                        source,
                    }),
                    looks_applied: false,
                }
            }
        };
        steps.push(step);
    }

    FileRun { steps, content }
}

type FileGroups<'a> = Vec<(PathBuf, Vec<&'a PatchDefinition>)>;

/// Resolve and validate every target, grouping patches by canonical path.
///
/// Any resolution failure fails the whole run before a single write.
fn group_by_file<'a>(
    config: &'a PatchConfig,
    workspace_root: &Path,
) -> Result<FileGroups<'a>, Vec<(String, ApplicationError)>> {
    let guard = WorkspaceGuard::new(workspace_root).map_err(|e| {
        let members: Vec<&PatchDefinition> = config.patches.iter().collect();
        let err = ApplicationError::Io {
            path: workspace_root.to_path_buf(),
            source: std::io::Error::other(e.to_string()),
        };
        fail_group(&members, workspace_root, &err)
    })?;

    let resolved: Vec<(&PatchDefinition, Result<PathBuf, ApplicationError>)> = config
        .patches
        .iter()
        .map(|patch| {
            (
                patch,
                resolve_target(&guard, patch, config.meta.workspace_relative),
            )
        })
        .collect();

    if resolved.iter().any(|(_, target)| target.is_err()) {
        // every patch is reported; resolvable ones were never attempted
        return Err(resolved
            .into_iter()
            .map(|(patch, target)| {
                let err = match target {
                    Ok(file) => ApplicationError::Aborted { file },
                    Err(err) => err,
                };
                (patch.id.clone(), err)
            })
            .collect());
    }

    let mut groups: FileGroups<'a> = Vec::new();
    for (patch, target) in resolved {
        let Ok(path) = target else { continue };
        match groups.iter_mut().find(|(p, _)| *p == path) {
            Some((_, members)) => members.push(patch),
            None => groups.push((path, vec![patch])),
        }
    }
    Ok(groups)
}

fn resolve_target(
    guard: &WorkspaceGuard,
    patch: &PatchDefinition,
    workspace_relative: bool,
) -> Result<PathBuf, ApplicationError> {
    let raw = Path::new(&patch.file);
    let candidate = if workspace_relative || raw.is_absolute() {
        raw.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| ApplicationError::Io {
                path: raw.to_path_buf(),
                source,
            })?
            .join(raw)
    };

    guard.validate_path(&candidate).map_err(|e| match e {
        SafetyError::Canonicalize { path, source } => ApplicationError::Io { path, source },
        other => ApplicationError::Safety(other),
    })
}

fn read_target(path: &Path) -> Result<String, ApplicationError> {
    fs::read_to_string(path).map_err(|source| ApplicationError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Report one I/O failure against every patch of a file.
fn fail_group(
    patches: &[&PatchDefinition],
    file_path: &Path,
    err: &ApplicationError,
) -> Vec<(String, ApplicationError)> {
    // std::io::Error is not Clone; rebuild one per patch from kind + message
    let (kind, message) = match err {
        ApplicationError::Io { source, .. } => (source.kind(), source.to_string()),
        other => (std::io::ErrorKind::Other, other.to_string()),
    };
    patches
        .iter()
        .map(|patch| {
            (
                patch.id.clone(),
                ApplicationError::Io {
                    path: file_path.to_path_buf(),
                    source: std::io::Error::new(kind, message.clone()),
                },
            )
        })
        .collect()
}
