//! JSON-lines framing shared by both ends of a socket channel.

use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;

/// Largest accepted line, including the newline delimiter.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Serializes `message` followed by a newline.
///
/// # Errors
///
/// Returns [`SchemaError::Encode`] if serialization fails.
pub fn encode_line<T: Serialize + ?Sized>(message: &T) -> Result<Vec<u8>, SchemaError> {
    let mut line = serde_json::to_vec(message).map_err(SchemaError::Encode)?;
    line.push(b'\n');
    Ok(line)
}

/// Decodes a line into an untyped value without checking its shape.
///
/// # Errors
///
/// Returns an error when the line is empty, too large, or not JSON.
pub fn decode_value(line: &[u8]) -> Result<Value, SchemaError> {
    let trimmed = checked_line(line)?;
    serde_json::from_slice(trimmed).map_err(SchemaError::from_json_error)
}

/// Rejects oversized lines.
///
/// # Errors
///
/// Returns [`SchemaError::TooLarge`] when `size` exceeds [`MAX_MESSAGE_BYTES`].
pub fn enforce_limit(size: usize) -> Result<(), SchemaError> {
    if size > MAX_MESSAGE_BYTES {
        return Err(SchemaError::TooLarge {
            size,
            max_size: MAX_MESSAGE_BYTES,
        });
    }
    Ok(())
}

pub(crate) fn checked_line(line: &[u8]) -> Result<&[u8], SchemaError> {
    enforce_limit(line.len())?;
    let trimmed = trim_trailing_whitespace(line);
    if trimmed.is_empty() {
        return Err(SchemaError::Empty);
    }
    Ok(trimmed)
}

/// Trims trailing ASCII whitespace from a byte slice.
fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
