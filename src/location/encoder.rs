//! Location encoding for manifest records
//!
//! Manifest records are comma separated and newline terminated, so the
//! location field is base64 (standard alphabet, padded) over the UTF-8
//! rendering of the fully-qualified location. The alphabet contains neither
//! delimiter.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::DataLocation;
use crate::errors::{ReplError, ReplResult};

/// Encodes a location for a manifest record.
pub fn encode(location: &DataLocation) -> String {
    STANDARD.encode(location.to_string().as_bytes())
}

/// Parses `raw` as a location and encodes it.
///
/// # Errors
///
/// Returns `ReplError::Encoding` if `raw` is not a valid absolute location.
pub fn encode_str(raw: &str) -> ReplResult<String> {
    Ok(encode(&DataLocation::parse(raw)?))
}

/// Decodes a manifest location field.
///
/// # Errors
///
/// Returns `ReplError::Encoding` if the field is not base64, not UTF-8, or
/// does not hold a valid absolute location.
pub fn decode(encoded: &str) -> ReplResult<DataLocation> {
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ReplError::encoding(format!("invalid base64 location: {}", e)))?;
    let raw = String::from_utf8(bytes)
        .map_err(|e| ReplError::encoding(format!("location is not UTF-8: {}", e)))?;
    DataLocation::parse(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encoding() {
        let loc = DataLocation::parse("/ext/t1").unwrap();
        assert_eq!(encode(&loc), "L2V4dC90MQ==");
        assert_eq!(decode("L2V4dC90MQ==").unwrap(), loc);
    }

    #[test]
    fn test_no_delimiters_in_output() {
        let loc = DataLocation::parse("hdfs://nn:8020/a,b/c d/ü/\u{1F600}").unwrap();
        let encoded = encode(&loc);
        assert!(!encoded.contains(','));
        assert!(!encoded.contains('\n'));
        assert_eq!(decode(&encoded).unwrap(), loc);
    }

    #[test]
    fn test_encode_str_rejects_malformed() {
        assert!(matches!(encode_str("relative"), Err(ReplError::Encoding(_))));
        assert!(matches!(encode_str(""), Err(ReplError::Encoding(_))));
        assert!(encode_str("/abs").is_ok());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("!!!not base64").is_err());
        // valid base64 of a relative path
        assert!(decode(&STANDARD.encode("rel/path")).is_err());
        // valid base64 of invalid UTF-8
        assert!(decode(&STANDARD.encode([0xff, 0xfe])).is_err());
    }
}
