//! Constant-time comparison helpers.
//!
//! MAC verification goes through these so that a mismatch does not leak
//! how many leading bytes matched.

use constant_time_eq::constant_time_eq;

/// Compare two byte slices in constant time.
///
/// Slices of different length compare unequal.
///
/// ```rust
/// use obt_crypto::utils::constant_time_compare;
///
/// let mac1 = [0u8; 32];
/// let mac2 = [0u8; 32];
/// assert!(constant_time_compare(&mac1, &mac2));
///
/// let mac3 = [1u8; 32];
/// assert!(!constant_time_compare(&mac1, &mac3));
/// ```
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    constant_time_eq(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare_equal() {
        let a = b"hello world";
        let b = b"hello world";
        assert!(constant_time_compare(a, b));
    }

    #[test]
    fn test_constant_time_compare_different() {
        let a = b"hello world";
        let b = b"hello worlD";
        assert!(!constant_time_compare(a, b));
    }

    #[test]
    fn test_constant_time_compare_different_length() {
        let a = b"hello";
        let b = b"hello world";
        assert!(!constant_time_compare(a, b));
    }

    #[test]
    fn test_constant_time_compare_mac_sized() {
        let mac1 = [0u8; 32];
        let mut mac2 = [0u8; 32];
        assert!(constant_time_compare(&mac1, &mac2));

        mac2[31] = 1;
        assert!(!constant_time_compare(&mac1, &mac2));
    }
}
