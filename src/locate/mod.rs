//! Anchor locators.
//!
//! Each matching strategy turns an anchor into byte spans of the content.
//! Locators never decide whether a match count is acceptable; that is the
//! applier's job.

pub mod errors;
pub mod lines;
pub mod literal;

pub use errors::LocateError;
pub use lines::{line_spans, marker_lines, window_after, LineSpan, Window};
pub use literal::{find_escaped, find_exact};

/// A located byte range `[start, end)` in the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }
}
