//! Defensive decoding of persisted JSON columns
//!
//! Array-valued columns (dietary tags, keywords, ingredients, instructions) and
//! the nutrition map are stored as serialized text. Rows written by older schema
//! versions or edited by hand may hold NULL, an empty string or broken JSON.
//! Every such column passes through [`safe_decode`] before it leaves the
//! repository, so callers never see a decoding failure.

use serde::de::DeserializeOwned;
use tracing::warn;

/// Decode a nullable serialized value, returning `fallback` on NULL, empty or malformed input
///
/// Malformed input is logged with the column name and never raised.
///
/// # Examples
///
/// ```
/// use pairing_common::decode::safe_decode;
///
/// let tags: Vec<String> = safe_decode("dietary_tags", Some(r#"["vegan"]"#), Vec::new());
/// assert_eq!(tags, vec!["vegan".to_string()]);
///
/// let broken: Vec<String> = safe_decode("dietary_tags", Some("invalid json{"), Vec::new());
/// assert!(broken.is_empty());
/// ```
pub fn safe_decode<T: DeserializeOwned>(column: &str, raw: Option<&str>, fallback: T) -> T {
    let text = match raw.map(str::trim) {
        None | Some("") | Some("null") => return fallback,
        Some(text) => text,
    };

    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(column, error = %e, "Malformed persisted value, using fallback");
            fallback
        }
    }
}

/// Serialize a value for storage in a text column
///
/// Vectors of strings and JSON maps cannot fail to serialize; the empty array
/// keeps the column decodable if that ever changes.
pub fn encode_column<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}
