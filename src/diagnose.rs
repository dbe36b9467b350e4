//! Near-miss diagnostics for anchors that were not found.
//!
//! When an anchor drifts (whitespace, renamed identifier, escaped quotes),
//! the most useful thing to show is where it probably went.

use crate::locate::line_spans;

/// Lines of context shown on either side of a near miss.
pub const CONTEXT_LINES: usize = 5;

/// Below this similarity the best line is not worth reporting.
const MIN_SIMILARITY: f64 = 0.6;

/// The region of content most similar to a missing anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct NearMiss {
    /// 1-based line number of the closest line
    pub line: usize,
    /// Normalized Levenshtein similarity in [0, 1]
    pub similarity: f64,
    /// Surrounding lines as (1-based line number, text)
    pub context: Vec<(usize, String)>,
}

/// Find the line closest to the anchor's first non-blank line.
pub fn near_miss(content: &str, anchor: &str) -> Option<NearMiss> {
    let needle = anchor.lines().map(str::trim).find(|l| !l.is_empty())?;
    let lines = line_spans(content);

    let (best, similarity) = lines
        .iter()
        .map(|line| {
            let text = line.text(content).trim();
            (line.index, strsim::normalized_levenshtein(text, needle))
        })
        .fold(None, |best: Option<(usize, f64)>, (idx, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((idx, score)),
        })?;

    if similarity < MIN_SIMILARITY {
        return None;
    }

    let first = best.saturating_sub(CONTEXT_LINES);
    let last = (best + CONTEXT_LINES).min(lines.len() - 1);
    let context = lines[first..=last]
        .iter()
        .map(|line| (line.index + 1, line.text(content).to_string()))
        .collect();

    Some(NearMiss {
        line: best + 1,
        similarity,
        context,
    })
}
