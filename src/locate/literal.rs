use crate::cache;
use crate::locate::{LocateError, Region};

/// Find every non-overlapping verbatim occurrence of `search`.
pub fn find_exact(content: &str, search: &str) -> Vec<Region> {
    if search.is_empty() {
        return Vec::new();
    }
    content
        .match_indices(search)
        .map(|(start, m)| Region::new(start, start + m.len()))
        .collect()
}

/// Find `search` as an escaped literal pattern.
///
/// Special characters are escaped, and every line break in the anchor matches
/// either `\n` or `\r\n`, so an LF anchor still finds CRLF content.
pub fn find_escaped(content: &str, search: &str) -> Result<Vec<Region>, LocateError> {
    let pattern = escaped_pattern(search);
    // a lone "\r" strips to an empty pattern, which would match everywhere
    if pattern.is_empty() {
        return Ok(Vec::new());
    }
    let re = cache::get_or_compile(&pattern)?;
    Ok(re
        .find_iter(content)
        .map(|m| Region::new(m.start(), m.end()))
        .collect())
}

fn escaped_pattern(search: &str) -> String {
    search
        .split('\n')
        .map(|line| regex::escape(line.strip_suffix('\r').unwrap_or(line)))
        .collect::<Vec<_>>()
        .join(r"\r?\n")
}
