//! The patch applier: a pure function from (content, patch) to an outcome.
//!
//! Nothing here touches the filesystem. Locating goes through [`crate::locate`],
//! substitution through [`Edit::splice`], so every change is a verified
//! byte-span replacement.

use crate::config::schema::{Occurrences, Operation, PatchDefinition, Query, Verify};
use crate::edit::{Edit, EditError, EditVerification};
use crate::locate::{self, LineSpan, LocateError, Region, Window};
use std::ops::Range;
use std::path::PathBuf;
use thiserror::Error;
use tracing::trace;

/// Terminal state of one patch against one content snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Outcome carries the patched content"]
pub enum Outcome {
    /// Anchor located; `content` is the patched text
    Applied { content: String, regions: usize },
    /// Anchor absent; the input is untouched
    NotFound,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }
}

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("anchor matched {count} locations, expected exactly 1")]
    AmbiguousAnchor { count: usize },

    #[error("{operation} is not supported for {query} queries")]
    Unsupported {
        operation: &'static str,
        query: &'static str,
    },

    #[error("invalid hash value: {0}")]
    InvalidHash(String),

    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// Apply `patch` to `content`.
///
/// A missing anchor is [`Outcome::NotFound`], never an error. More matches
/// than the query's [`Occurrences`] allows is [`ApplyError::AmbiguousAnchor`].
pub fn apply_patch(content: &str, patch: &PatchDefinition) -> Result<Outcome, ApplyError> {
    let Some(edits) = plan_edits(content, patch)? else {
        trace!(patch = %patch.id, "anchor not found");
        return Ok(Outcome::NotFound);
    };

    let regions = edits.len();
    let (patched, _) = Edit::splice(content, &edits)?;
    trace!(patch = %patch.id, regions, "anchor located");

    Ok(Outcome::Applied {
        content: patched,
        regions,
    })
}

/// Compute the edits for `patch` without applying them.
///
/// `Ok(None)` means the anchor was not found. An empty list means the anchor
/// was found but every insertion is already in place.
pub fn plan_edits(content: &str, patch: &PatchDefinition) -> Result<Option<Vec<Edit>>, ApplyError> {
    let file = PathBuf::from(&patch.file);

    let planned: Vec<(Region, String)> = match &patch.query {
        Query::Exact { search, .. } => {
            let regions = locate::find_exact(content, search);
            match replacement_edits(patch, regions)? {
                Some(planned) => planned,
                None => return Ok(None),
            }
        }
        Query::Escaped { search, .. } => {
            let regions = locate::find_escaped(content, search)?;
            match replacement_edits(patch, regions)? {
                Some(planned) => planned,
                None => return Ok(None),
            }
        }
        Query::LineRange { trigger, offset, .. } => {
            let triggers = locate::marker_lines(content, trigger);
            let Some(trigger_line) = single(&triggers, Occurrences::Unique)? else {
                return Ok(None);
            };
            let window = patch
                .query
                .window()
                .ok_or(ApplyError::Unsupported {
                    operation: patch.operation.kind(),
                    query: "line-range without count or until",
                })?;
            let text = match &patch.operation {
                Operation::Replace { text } => text,
                other => return Err(unsupported(other, &patch.query)),
            };
            let lines = locate::line_spans(content);
            // the trigger survives the patch; a counted window must not be
            // replaced again once it starts with the replacement
            if matches!(window, Window::Count(_))
                && window_holds(content, &lines, trigger_line, *offset, text)
            {
                trace!(patch = %patch.id, "window already holds replacement");
                return Ok(Some(Vec::new()));
            }
            let Some(region) =
                locate::window_after(content, &lines, trigger_line, *offset, &window)?
            else {
                return Ok(None);
            };
            vec![(region, as_line_block(text, region.text(content), eol_of(content)))]
        }
        Query::Marker { marker, .. } => {
            let found = locate::marker_lines(content, marker);
            // lines of an earlier insertion can carry the marker themselves
            let copies = inserted_copies(content, &found, &patch.operation);
            let found: Vec<LineSpan> = found
                .into_iter()
                .filter(|line| !copies.iter().any(|copy| copy.contains(&line.start)))
                .collect();
            if found.is_empty() {
                return Ok(None);
            }
            check_count(found.len(), patch.query.occurrences())?;
            found
                .iter()
                .filter_map(|line| marker_edit(content, line, &patch.operation))
                .collect()
        }
    };

    planned
        .into_iter()
        .map(|(region, new_text)| {
            let verification = verification_for(patch, region.text(content))?;
            Ok(Edit::with_verification(
                file.clone(),
                region.start,
                region.end,
                new_text,
                verification,
            ))
        })
        .collect::<Result<Vec<_>, ApplyError>>()
        .map(Some)
}

/// Whether content with a missing anchor already holds the replacement.
///
/// Used by read-only status checks to tell "already applied" from "drifted".
pub fn looks_applied(content: &str, patch: &PatchDefinition) -> bool {
    match &patch.operation {
        Operation::Replace { text } if !text.trim().is_empty() => {
            normalize_eol(content).contains(normalize_eol(text).as_str())
        }
        _ => false,
    }
}

fn replacement_edits(
    patch: &PatchDefinition,
    regions: Vec<Region>,
) -> Result<Option<Vec<(Region, String)>>, ApplyError> {
    if regions.is_empty() {
        return Ok(None);
    }
    check_count(regions.len(), patch.query.occurrences())?;

    let text = match &patch.operation {
        Operation::Replace { text } => text,
        other => return Err(unsupported(other, &patch.query)),
    };

    Ok(Some(
        regions
            .into_iter()
            .map(|region| (region, text.clone()))
            .collect(),
    ))
}

fn marker_edit(content: &str, line: &LineSpan, operation: &Operation) -> Option<(Region, String)> {
    let terminator = line.terminator(content);
    let eol = if terminator.is_empty() {
        eol_of(content)
    } else {
        terminator
    };
    let block = strip_eol(operation.text());

    match operation {
        Operation::Replace { .. } => Some((Region::new(line.start, line.end), block.to_string())),
        Operation::InsertAfter { .. } => {
            if terminator.is_empty() {
                return Some((Region::new(line.end, line.end), format!("{eol}{block}")));
            }
            let insertion = format!("{block}{eol}");
            let following = &content[line.next..];
            if following.starts_with(&insertion) || following == block {
                return None;
            }
            Some((Region::new(line.next, line.next), insertion))
        }
        Operation::InsertBefore { .. } => {
            let insertion = format!("{block}{eol}");
            if content[..line.start].ends_with(&insertion) {
                return None;
            }
            Some((Region::new(line.start, line.start), insertion))
        }
    }
}

/// Byte ranges holding a copy of an insert block next to a marker line.
fn inserted_copies(content: &str, found: &[LineSpan], operation: &Operation) -> Vec<Range<usize>> {
    let block = strip_eol(operation.text());
    if block.is_empty() {
        return Vec::new();
    }

    found
        .iter()
        .filter_map(|line| {
            let terminator = line.terminator(content);
            let eol = if terminator.is_empty() {
                eol_of(content)
            } else {
                terminator
            };
            let insertion = format!("{block}{eol}");
            match operation {
                Operation::InsertAfter { .. } => {
                    let following = &content[line.next..];
                    (following.starts_with(&insertion) || following == block)
                        .then(|| line.next..line.next + block.len())
                }
                Operation::InsertBefore { .. } => content[..line.start]
                    .ends_with(&insertion)
                    .then(|| line.start - insertion.len()..line.start),
                Operation::Replace { .. } => None,
            }
        })
        .collect()
}

/// Whether the lines `offset` after the trigger already start with `text`.
fn window_holds(
    content: &str,
    lines: &[LineSpan],
    trigger: &LineSpan,
    offset: usize,
    text: &str,
) -> bool {
    let block = strip_eol(text);
    if block.is_empty() {
        return false;
    }
    let start = lines
        .get(trigger.index + offset)
        .map_or(content.len(), |line| line.start);
    let rest = &content[start..];
    rest.starts_with(&format!("{block}{}", eol_of(content))) || rest == block
}

fn single<'a>(
    found: &'a [LineSpan],
    occurrences: Occurrences,
) -> Result<Option<&'a LineSpan>, ApplyError> {
    if found.is_empty() {
        return Ok(None);
    }
    check_count(found.len(), occurrences)?;
    Ok(found.first())
}

fn check_count(count: usize, occurrences: Occurrences) -> Result<(), ApplyError> {
    if occurrences == Occurrences::Unique && count > 1 {
        return Err(ApplyError::AmbiguousAnchor { count });
    }
    Ok(())
}

fn verification_for(patch: &PatchDefinition, current: &str) -> Result<EditVerification, ApplyError> {
    match &patch.verify {
        Some(Verify::ExactMatch { expected_text }) => {
            Ok(EditVerification::ExactMatch(expected_text.clone()))
        }
        Some(Verify::Hash { expected, .. }) => EditVerification::from_hex(expected)
            .ok_or_else(|| ApplyError::InvalidHash(expected.clone())),
        None => Ok(EditVerification::from_text(current)),
    }
}

fn unsupported(operation: &Operation, query: &Query) -> ApplyError {
    ApplyError::Unsupported {
        operation: operation.kind(),
        query: query.kind(),
    }
}

/// Shape replacement text as whole lines for a line window.
fn as_line_block(text: &str, window: &str, eol: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let window_eol = if window.ends_with("\r\n") {
        "\r\n"
    } else if window.ends_with('\n') || window.is_empty() {
        eol
    } else {
        // window ran to an unterminated last line
        return strip_eol(text).to_string();
    };
    format!("{}{}", strip_eol(text), window_eol)
}

/// The content's dominant line ending, judged by its first line break.
fn eol_of(content: &str) -> &'static str {
    match content.find('\n') {
        Some(idx) if idx > 0 && content.as_bytes()[idx - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

fn strip_eol(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}

fn normalize_eol(text: &str) -> String {
    text.replace("\r\n", "\n")
}
