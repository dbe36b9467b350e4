use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("invalid anchor pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("line window [{start}, {end}) runs past end of file ({line_count} lines)")]
    WindowOutOfBounds {
        start: usize,
        end: usize,
        line_count: usize,
    },
}
