//! Object key derivation and metadata validation for uploads.
//!
//! Stored objects are keyed by `{uuid}-{mockup name}-{extension}` so a key
//! alone identifies which mockup an overlay belongs to. The uuid comes
//! first to keep keys unique even when the same mockup is uploaded twice.

use crate::error::{Error, Result};
use uuid::Uuid;

/// Token used in place of a file extension when the filename has none.
pub const FALLBACK_EXTENSION: &str = "unknown";

/// Delimiter joining the key segments.
pub const KEY_DELIMITER: char = '-';

/// Maximum accepted metadata value length in characters.
pub const MAX_METADATA_VALUE_LEN: usize = 255;

/// Maximum extension length carried into a key.
const MAX_EXTENSION_LEN: usize = 16;

/// Extract the extension from a filename: the text after the last `.`.
///
/// Filenames without a `.` have no extension and map to
/// [`FALLBACK_EXTENSION`]. Note `archive.tar.gz` maps to `gz`.
pub fn file_extension(filename: &str) -> &str {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or(FALLBACK_EXTENSION)
}

/// Extension as embedded into object keys.
///
/// Keys feed path-style backends, so only short ASCII-alphanumeric
/// extensions are kept; anything else falls back to [`FALLBACK_EXTENSION`].
fn safe_extension(filename: &str) -> &str {
    let ext = file_extension(filename);
    let ok = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    if ok { ext } else { FALLBACK_EXTENSION }
}

/// Validate a metadata field value before it is allowed to gate an upload.
///
/// The value becomes part of the object key, so path separators and
/// control characters are rejected outright.
pub fn validate_metadata_value(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidMetadataValue("value is empty".to_string()));
    }
    if value.len() > MAX_METADATA_VALUE_LEN {
        return Err(Error::InvalidMetadataValue(format!(
            "value exceeds {MAX_METADATA_VALUE_LEN} characters"
        )));
    }
    if value.contains(['/', '\\']) || value.contains("..") {
        return Err(Error::InvalidMetadataValue(
            "value contains path separators".to_string(),
        ));
    }
    if value.chars().any(char::is_control) {
        return Err(Error::InvalidMetadataValue(
            "value contains control characters".to_string(),
        ));
    }
    Ok(())
}

/// Derive the destination object key for an upload.
///
/// The caller is expected to have validated `metadata_value` with
/// [`validate_metadata_value`] first.
pub fn derive_object_key(metadata_value: &str, filename: &str) -> String {
    let id = Uuid::new_v4();
    let extension = safe_extension(filename);
    format!("{id}{KEY_DELIMITER}{metadata_value}{KEY_DELIMITER}{extension}")
}
