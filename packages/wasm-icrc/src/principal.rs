//! Principal text helpers
//!
//! A principal string that fails textual decoding is treated as absent
//! wherever a principal is required.

use candid::Principal;

/// Decode principal text, `None` if it is malformed
pub fn parse_principal(text: &str) -> Option<Principal> {
    Principal::from_text(text.trim()).ok()
}

/// Validate principal text
pub fn is_valid_principal(text: &str) -> bool {
    parse_principal(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_principals() {
        assert!(is_valid_principal("qvwlv-uyaaa-aaaas-aidpq-cai"));
        assert!(is_valid_principal("2vxsx-fae"));
        assert!(is_valid_principal(" 7pail-xaaaa-aaaas-aabmq-cai "));
    }

    #[test]
    fn test_invalid_principals() {
        assert!(!is_valid_principal(""));
        assert!(!is_valid_principal("not-a-principal"));
        // checksum mismatch
        assert!(!is_valid_principal("qvwlv-uyaaa-aaaas-aidpq-cay"));
    }
}
