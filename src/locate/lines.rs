use crate::locate::{LocateError, Region};

/// One line of the content, as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    /// 0-based line index
    pub index: usize,
    /// Start of the line
    pub start: usize,
    /// End of the line text, before any `\r\n` / `\n`
    pub end: usize,
    /// Start of the following line (or end of content)
    pub next: usize,
}

impl LineSpan {
    pub fn text<'a>(&self, content: &'a str) -> &'a str {
        &content[self.start..self.end]
    }

    /// The line terminator, empty on an unterminated last line.
    pub fn terminator<'a>(&self, content: &'a str) -> &'a str {
        &content[self.end..self.next]
    }
}

/// How far a line-range window extends past its start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Window {
    /// A fixed number of lines
    Count(usize),
    /// Up to, not including, the next line containing this marker
    Until(String),
}

/// Split content into line spans. A trailing newline does not start an extra
/// empty line.
pub fn line_spans(content: &str) -> Vec<LineSpan> {
    let mut spans = Vec::new();
    let mut offset = 0;

    for (index, line) in content.split_inclusive('\n').enumerate() {
        let body = line.strip_suffix('\n').unwrap_or(line);
        let body = body.strip_suffix('\r').unwrap_or(body);
        spans.push(LineSpan {
            index,
            start: offset,
            end: offset + body.len(),
            next: offset + line.len(),
        });
        offset += line.len();
    }

    spans
}

/// Lines whose text contains `marker`, in order.
pub fn marker_lines(content: &str, marker: &str) -> Vec<LineSpan> {
    if marker.is_empty() {
        return Vec::new();
    }
    line_spans(content)
        .into_iter()
        .filter(|line| line.text(content).contains(marker))
        .collect()
}

/// Resolve the window starting `offset` lines after `trigger`.
///
/// Returns `Ok(None)` when an `Until` end marker never appears.
pub fn window_after(
    content: &str,
    lines: &[LineSpan],
    trigger: &LineSpan,
    offset: usize,
    window: &Window,
) -> Result<Option<Region>, LocateError> {
    let first = trigger.index + offset;
    let line_count = lines.len();
    let byte_at = |idx: usize| lines.get(idx).map_or(content.len(), |l| l.start);

    match window {
        Window::Count(count) => {
            let last = first + count;
            if last > line_count {
                return Err(LocateError::WindowOutOfBounds {
                    start: first,
                    end: last,
                    line_count,
                });
            }
            Ok(Some(Region::new(byte_at(first), byte_at(last))))
        }
        Window::Until(marker) => {
            if first > line_count {
                return Err(LocateError::WindowOutOfBounds {
                    start: first,
                    end: first,
                    line_count,
                });
            }
            Ok(lines[first..]
                .iter()
                .find(|line| line.text(content).contains(marker.as_str()))
                .map(|end_line| Region::new(byte_at(first), end_line.start)))
        }
    }
}
