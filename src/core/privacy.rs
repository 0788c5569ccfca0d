//! Key pseudonymisation for privacy mode.

/// Length of the pseudonymous key identifier.
pub const KEY_HASH_LEN: usize = 6;

const HASH_SEED: u32 = 5381;
const HASH_MULTIPLIER: u32 = 33;

/// Hash a physical key code into a short stable pseudonym.
///
/// Rolling polynomial hash over UTF-16 code units, folded to `u32`, rendered
/// as lowercase hex, zero-padded and truncated to exactly [`KEY_HASH_LEN`]
/// characters. Not a cryptographic hash.
pub fn hash_key_code(code: &str) -> String {
    let hash = code.encode_utf16().fold(HASH_SEED, |h, unit| {
        h.wrapping_mul(HASH_MULTIPLIER).wrapping_add(u32::from(unit))
    });
    let mut hex = format!("{hash:0width$x}", width = KEY_HASH_LEN);
    hex.truncate(KEY_HASH_LEN);
    hex
}

/// Identifier used for a key in computed metrics and outbound payloads.
pub fn key_identifier(code: &str, privacy_mode: bool) -> String {
    if privacy_mode {
        hash_key_code(code)
    } else {
        code.strip_prefix("Key").unwrap_or(code).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_key_code("KeyA"), hash_key_code("KeyA"));
    }

    #[test]
    fn test_hash_is_always_six_chars() {
        for code in ["", "A", "KeyA", "Backspace", "Digit1", "ShiftLeft", "Enter"] {
            assert_eq!(hash_key_code(code).len(), KEY_HASH_LEN, "code {code:?}");
        }
    }

    #[test]
    fn test_hash_distinguishes_keys() {
        let codes = ["KeyA", "KeyB", "KeyS", "Space", "Backspace", "Digit1", "ShiftLeft"];
        let hashes: std::collections::HashSet<String> =
            codes.iter().map(|c| hash_key_code(c)).collect();
        assert_eq!(hashes.len(), codes.len());
    }

    #[test]
    fn test_hash_known_value() {
        // 5381 * 33 + 'A' (65) = 177638 = 0x2b5e6
        assert_eq!(hash_key_code("A"), "02b5e6");
        // Empty input leaves the seed: 5381 = 0x1505
        assert_eq!(hash_key_code(""), "001505");
    }

    #[test]
    fn test_identifier_strips_key_prefix() {
        assert_eq!(key_identifier("KeyA", false), "A");
        assert_eq!(key_identifier("Backspace", false), "Backspace");
        assert_eq!(key_identifier("KeyA", true), hash_key_code("KeyA"));
    }
}
