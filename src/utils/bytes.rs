//! Substring search over raw byte buffers.
//!
//! Serial output is not guaranteed to be valid UTF-8, so markers are searched
//! for in the bytes as received.

/// Offset of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Offset of the last occurrence of `needle` in `haystack`.
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(haystack.len());
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn find_first_and_last() {
    let haystack = b"abc--abc--";
    assert_eq!(find(haystack, b"abc"), Some(0));
    assert_eq!(rfind(haystack, b"abc"), Some(5));
}

#[test]
fn missing_needle() {
    assert_eq!(find(b"abc", b"abd"), None);
    assert_eq!(rfind(b"ab", b"abc"), None);
}

#[test]
fn empty_needle() {
    assert_eq!(find(b"abc", b""), Some(0));
    assert_eq!(rfind(b"abc", b""), Some(3));
}
