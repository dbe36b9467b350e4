use crate::locate::Window;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PatchConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub patches: Vec<PatchDefinition>,
}

impl PatchConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.patches.is_empty() {
            issues.push(ValidationIssue::EmptyPatchList);
        }

        let mut seen = HashSet::new();

        for patch in &self.patches {
            let id = Some(patch.id.clone());

            if patch.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: None,
                    field: "id",
                });
            } else if !seen.insert(patch.id.as_str()) {
                issues.push(ValidationIssue::DuplicateId {
                    patch_id: patch.id.clone(),
                });
            }

            if patch.file.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    patch_id: id.clone(),
                    field: "file",
                });
            }

            match &patch.query {
                Query::Exact { search, .. } | Query::Escaped { search, .. } => {
                    if search.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: id.clone(),
                            field: "query.search",
                        });
                    }
                }
                Query::LineRange {
                    trigger,
                    count,
                    until,
                    ..
                } => {
                    if trigger.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: id.clone(),
                            field: "query.trigger",
                        });
                    }
                    match (count, until) {
                        (Some(_), Some(_)) => issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: "line-range takes either count or until, not both"
                                .to_string(),
                        }),
                        (None, None) => issues.push(ValidationIssue::MissingField {
                            patch_id: id.clone(),
                            field: "query.count",
                        }),
                        (Some(0), None) => issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: "line-range count must be at least 1".to_string(),
                        }),
                        (None, Some(end)) if end.trim().is_empty() => {
                            issues.push(ValidationIssue::MissingField {
                                patch_id: id.clone(),
                                field: "query.until",
                            })
                        }
                        _ => {}
                    }
                    if count.is_some() && patch.operation.text().trim().is_empty() {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: "line-range count cannot delete lines; use until"
                                .to_string(),
                        });
                    }
                }
                Query::Marker { marker, .. } => {
                    if marker.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: id.clone(),
                            field: "query.marker",
                        });
                    }
                }
            }

            match &patch.operation {
                Operation::Replace { .. } => {}
                Operation::InsertAfter { text } | Operation::InsertBefore { text } => {
                    if text.is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            patch_id: id.clone(),
                            field: "operation.text",
                        });
                    }
                    if !matches!(patch.query, Query::Marker { .. }) {
                        issues.push(ValidationIssue::InvalidCombo {
                            patch_id: id.clone(),
                            message: format!(
                                "{} requires a marker query",
                                patch.operation.kind()
                            ),
                        });
                    }
                }
            }

            if patch.verify.is_some() && !matches!(patch.operation, Operation::Replace { .. }) {
                issues.push(ValidationIssue::InvalidCombo {
                    patch_id: id.clone(),
                    message: "verify only applies to replace operations".to_string(),
                });
            }

            if let Some(Verify::Hash { expected, .. }) = &patch.verify {
                if u64::from_str_radix(expected.trim().trim_start_matches("0x"), 16).is_err() {
                    issues.push(ValidationIssue::InvalidCombo {
                        patch_id: id.clone(),
                        message: format!("invalid hash value: {expected}"),
                    });
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolve `file` against the workspace root instead of the current directory
    #[serde(default)]
    pub workspace_relative: bool,
}

/// One (anchor, replacement, strategy) record.
#[derive(Debug, Deserialize, Clone)]
pub struct PatchDefinition {
    pub id: String,
    pub file: String,
    pub query: Query,
    pub operation: Operation,
    #[serde(default)]
    pub verify: Option<Verify>,
}

impl PatchDefinition {
    pub fn new(
        id: impl Into<String>,
        file: impl Into<String>,
        query: Query,
        operation: Operation,
    ) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            query,
            operation,
            verify: None,
        }
    }
}

/// How an anchor is located.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Query {
    /// Verbatim substring
    Exact {
        search: String,
        #[serde(default)]
        occurrences: Occurrences,
    },
    /// Regex-escaped substring, tolerant of `\r\n` line endings
    Escaped {
        search: String,
        #[serde(default)]
        occurrences: Occurrences,
    },
    /// Window of lines after a unique trigger line
    LineRange {
        trigger: String,
        #[serde(default = "default_offset")]
        offset: usize,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        until: Option<String>,
    },
    /// Every line containing a marker substring
    Marker {
        marker: String,
        #[serde(default)]
        occurrences: Occurrences,
    },
}

fn default_offset() -> usize {
    1
}

impl Query {
    pub fn exact(search: impl Into<String>) -> Self {
        Query::Exact {
            search: search.into(),
            occurrences: Occurrences::Unique,
        }
    }

    pub fn escaped(search: impl Into<String>) -> Self {
        Query::Escaped {
            search: search.into(),
            occurrences: Occurrences::Unique,
        }
    }

    pub fn marker(marker: impl Into<String>) -> Self {
        Query::Marker {
            marker: marker.into(),
            occurrences: Occurrences::Unique,
        }
    }

    /// The text used to locate the region.
    pub fn anchor(&self) -> &str {
        match self {
            Query::Exact { search, .. } | Query::Escaped { search, .. } => search,
            Query::LineRange { trigger, .. } => trigger,
            Query::Marker { marker, .. } => marker,
        }
    }

    pub fn occurrences(&self) -> Occurrences {
        match self {
            Query::Exact { occurrences, .. }
            | Query::Escaped { occurrences, .. }
            | Query::Marker { occurrences, .. } => *occurrences,
            Query::LineRange { .. } => Occurrences::Unique,
        }
    }

    /// Window for line-range queries.
    pub fn window(&self) -> Option<Window> {
        match self {
            Query::LineRange {
                count: Some(count), ..
            } => Some(Window::Count(*count)),
            Query::LineRange {
                until: Some(until), ..
            } => Some(Window::Until(until.clone())),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Query::Exact { .. } => "exact",
            Query::Escaped { .. } => "escaped",
            Query::LineRange { .. } => "line-range",
            Query::Marker { .. } => "marker",
        }
    }
}

/// How many matches an anchor may have.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Occurrences {
    /// Exactly one match; more is an ambiguity error
    #[default]
    Unique,
    /// Every match is patched
    All,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Operation {
    Replace { text: String },
    InsertAfter { text: String },
    InsertBefore { text: String },
}

impl Operation {
    pub fn replace(text: impl Into<String>) -> Self {
        Operation::Replace { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Operation::Replace { text }
            | Operation::InsertAfter { text }
            | Operation::InsertBefore { text } => text,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Replace { .. } => "replace",
            Operation::InsertAfter { .. } => "insert-after",
            Operation::InsertBefore { .. } => "insert-before",
        }
    }
}

/// Expected contents of each located region before it is replaced.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        expected_text: String,
    },
    Hash {
        #[serde(default)]
        algorithm: Option<HashAlgorithm>,
        expected: String,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Xxh3,
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        patch_id: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        patch_id: String,
    },
    InvalidCombo {
        patch_id: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch config contains no patches"),
            ValidationIssue::MissingField { patch_id, field } => match patch_id {
                Some(id) => write!(f, "patch '{id}' missing required field '{field}'"),
                None => write!(f, "patch missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { patch_id } => {
                write!(f, "patch id '{patch_id}' is used more than once")
            }
            ValidationIssue::InvalidCombo { patch_id, message } => match patch_id {
                Some(id) => write!(f, "patch '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid patch configuration: {message}"),
            },
        }
    }
}
