use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Verified byte-span replacement.
///
/// Every patch strategy compiles down to one or more of these. Locators decide
/// *where*; an `Edit` only checks that the span still holds what the locator
/// saw and swaps it out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until applied"]
pub struct Edit {
    /// File the span belongs to
    pub file: PathBuf,
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Text written into [byte_start, byte_end)
    pub new_text: String,
    /// What the span must contain before the edit
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text
    Hash(u64),
}

impl EditVerification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Build a verification from text, hashing anything over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    /// Parse a hex digest such as `0x1f2e3d4c5b6a7988`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        u64::from_str_radix(hex.trim().trim_start_matches("0x"), 16)
            .ok()
            .map(EditVerification::Hash)
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Before-text verification failed at {file}:{byte_start}")]
    BeforeTextMismatch {
        file: PathBuf,
        byte_start: usize,
        byte_end: usize,
        expected: String,
        found: String,
    },

    #[error("Invalid byte range: [{byte_start}, {byte_end}) in file of length {file_len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        file_len: usize,
    },

    #[error("Overlapping edits at [{byte_start}, {byte_end})")]
    Overlap { byte_start: usize, byte_end: usize },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 validation error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Edit splits a UTF-8 character at byte {0}")]
    CharBoundary(usize),
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for applied/unchanged"]
pub enum EditResult {
    Applied { file: PathBuf, bytes_changed: usize },
    /// Span already held `new_text`
    Unchanged { file: PathBuf },
}

impl Edit {
    pub fn new(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: impl Into<String>,
    ) -> Self {
        let expected = expected_before.into();
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(&expected),
        }
    }

    pub fn with_verification(
        file: impl Into<PathBuf>,
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        verification: EditVerification,
    ) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// Check the span against `content` and return the text it currently holds.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                file_len: content.len(),
            });
        }
        for offset in [self.byte_start, self.byte_end] {
            if !content.is_char_boundary(offset) {
                return Err(EditError::CharBoundary(offset));
            }
        }

        let current = &content[self.byte_start..self.byte_end];
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                file: self.file.clone(),
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                expected: format!("{:?}", self.expected_before),
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Apply edits to in-memory content.
    ///
    /// Edits may arrive in any order; they are validated against the original
    /// content, checked for overlap, then spliced bottom-to-top so earlier
    /// offsets stay valid. Zero-width edits at the same offset keep their
    /// input order.
    pub fn splice(content: &str, edits: &[Edit]) -> Result<(String, Vec<EditResult>), EditError> {
        let mut order: Vec<usize> = (0..edits.len()).collect();
        order.sort_by(|&a, &b| {
            edits[b]
                .byte_start
                .cmp(&edits[a].byte_start)
                .then(b.cmp(&a))
        });

        for &idx in &order {
            edits[idx].validate(content)?;
        }

        // sorted descending: each later edit must end before the previous starts
        for pair in order.windows(2) {
            let (later, earlier) = (&edits[pair[0]], &edits[pair[1]]);
            if earlier.byte_end > later.byte_start
                && !(earlier.byte_start == earlier.byte_end && later.byte_start == later.byte_end)
            {
                return Err(EditError::Overlap {
                    byte_start: later.byte_start,
                    byte_end: earlier.byte_end,
                });
            }
        }

        let mut output = content.to_string();
        let mut results = vec![None; edits.len()];

        for &idx in &order {
            let edit = &edits[idx];
            let result = if content[edit.byte_start..edit.byte_end] == edit.new_text {
                EditResult::Unchanged {
                    file: edit.file.clone(),
                }
            } else {
                output.replace_range(edit.byte_start..edit.byte_end, &edit.new_text);
                EditResult::Applied {
                    file: edit.file.clone(),
                    bytes_changed: edit.new_text.len(),
                }
            };
            results[idx] = Some(result);
        }

        Ok((output, results.into_iter().flatten().collect()))
    }

    /// Apply this edit to its file atomically.
    pub fn apply(&self) -> Result<EditResult, EditError> {
        let mut results = Edit::apply_batch(vec![self.clone()])?;
        Ok(results.remove(0))
    }

    /// Apply edits grouped by file, one atomic write per changed file.
    ///
    /// Results come back in input order.
    pub fn apply_batch(edits: Vec<Edit>) -> Result<Vec<EditResult>, EditError> {
        let mut files: Vec<PathBuf> = Vec::new();
        for edit in &edits {
            if !files.contains(&edit.file) {
                files.push(edit.file.clone());
            }
        }

        let mut results: Vec<Option<EditResult>> = vec![None; edits.len()];

        for file in files {
            let (indices, file_edits): (Vec<usize>, Vec<Edit>) = edits
                .iter()
                .enumerate()
                .filter(|(_, e)| e.file == file)
                .map(|(i, e)| (i, e.clone()))
                .unzip();

            let bytes = fs::read(&file)?;
            let original = std::str::from_utf8(&bytes)?;
            let (updated, file_results) = Edit::splice(original, &file_edits)?;

            if updated != original {
                atomic_write(&file, updated.as_bytes())?;
            }

            for (idx, result) in indices.into_iter().zip(file_results) {
                results[idx] = Some(result);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

/// Atomic file write: tempfile + fsync + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // same directory keeps the rename on one filesystem
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        // keep the target's mode; NamedTempFile creates 0600
        temp.as_file().set_permissions(metadata.permissions())?;
    }

    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
