use crate::domain::error::{AppError, Result};
use encoding_rs::{Encoding, UTF_8};

/// Decode uploaded bytes as text. A BOM selects UTF-8/UTF-16 and is
/// stripped; without one the bytes must be valid UTF-8. Malformed input is
/// a `ParseError` rather than being silently replaced.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let (encoding, bom_len) = Encoding::for_bom(bytes).unwrap_or((UTF_8, 0));

    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .map(|text| text.into_owned())
        .ok_or_else(|| {
            AppError::ParseError(format!("File is not readable as {} text", encoding.name()))
        })
}
