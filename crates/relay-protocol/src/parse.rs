//! Decoding of client lines.

use thiserror::Error;

/// Default upper bound on a single client line, terminator excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Errors produced while decoding a client line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    #[error("Line too long: {size} bytes (max: {max})")]
    TooLong { size: usize, max: usize },
}

/// Strips the line terminator (`\n` or `\r\n`) and enforces the length limit.
///
/// The remaining text is returned verbatim. A final line that arrived
/// without a terminator (peer closed mid-line) is accepted as is.
///
/// # Errors
///
/// Returns `LineError::TooLong` if the text exceeds `max_len` bytes.
pub fn decode_line(raw: &str, max_len: usize) -> Result<&str, LineError> {
    let line = raw.strip_suffix('\n').unwrap_or(raw);
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.len() > max_len {
        return Err(LineError::TooLong {
            size: line.len(),
            max: max_len,
        });
    }

    Ok(line)
}
