//! Opaque record encoding.
//!
//! Base64 over the serialized JSON. This hides records from casual
//! inspection only; it is reversible without any key.

use crate::store::StoreError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Wrap serialized text in the opaque encoding.
pub fn encode(plain: &str) -> String {
    BASE64.encode(plain.as_bytes())
}

/// Reverse [`encode`].
pub fn decode(encoded: &str) -> Result<String, StoreError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| StoreError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_text_is_not_plain_json() {
        let encoded = encode(r#"[{"activity":"Monitoring"}]"#);
        assert!(!encoded.contains("Monitoring"));
        assert!(serde_json::from_str::<serde_json::Value>(&encoded).is_err());
        assert_eq!(decode(&encoded).unwrap(), r#"[{"activity":"Monitoring"}]"#);
    }

    #[test]
    fn test_plain_json_is_not_decodable() {
        assert!(decode(r#"[{"a":1}]"#).is_err());
    }
}
