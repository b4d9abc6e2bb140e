//! Store aliases derived from certificate subjects.
//!
//! The digest only namespaces entries compactly. It is not a trust boundary:
//! two certificates with the same subject map to the same alias and the most
//! recently added one replaces the other.

use md5::{Digest, Md5};

/// Alias for a DER-encoded subject name: first 4 bytes of its MD5 digest as a
/// little-endian u32, rendered as 8 lowercase hex chars.
pub fn alias_for_subject(subject_der: &[u8]) -> String {
    let digest = Md5::digest(subject_der);
    let n = u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("{n:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digests() {
        // md5("") = d41d8cd9...
        assert_eq!(alias_for_subject(b""), "d98c1dd4");
        assert_eq!(alias_for_subject(b"abc"), "98500190");
    }

    #[test]
    fn always_eight_chars() {
        for i in 0u16..512 {
            let a = alias_for_subject(&i.to_be_bytes());
            assert_eq!(a.len(), 8);
            assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }
}
