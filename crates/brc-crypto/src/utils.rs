//! Constant-time comparison helpers.
//!
//! Nonce echoes, shared secrets and private scalars are compared through
//! these so that equality checks do not leak a matching-prefix length.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time.
///
/// ```rust
/// use brc_crypto::utils::constant_time_compare;
///
/// assert!(constant_time_compare(b"nonce", b"nonce"));
/// assert!(!constant_time_compare(b"nonce", b"other"));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

/// Compare two fixed-size arrays in constant time.
pub fn constant_time_compare_array<const N: usize>(a: &[u8; N], b: &[u8; N]) -> bool {
    constant_time_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare(&[0u8; 32], &[0u8; 33]));
        assert!(constant_time_compare(&[], &[]));
    }

    #[test]
    fn test_constant_time_compare_array_single_bit() {
        let a = [0xAAu8; 32];
        let mut b = a;
        assert!(constant_time_compare_array(&a, &b));
        b[31] ^= 0x01;
        assert!(!constant_time_compare_array(&a, &b));
    }
}
