//! Tag scanner: locates fixed ASCII marker sequences inside raw container bytes

/// Find the first occurrence of `tag` in `haystack`.
///
/// Pure byte-level substring search with no alignment assumption; markers may
/// appear anywhere, including inside payload data, so callers disambiguate by
/// structural position. Absence is a normal result, not an error.
pub fn find_tag(haystack: &[u8], tag: &[u8]) -> Option<usize> {
    find_tag_from(haystack, tag, 0)
}

/// Find the first occurrence of `tag` at or after byte position `start`.
pub fn find_tag_from(haystack: &[u8], tag: &[u8], start: usize) -> Option<usize> {
    if tag.is_empty() || start >= haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(tag.len())
        .position(|window| window == tag)
        .map(|pos| start + pos)
}
