//! Canonical logical paths and their 32-bit lookup keys.
//!
//! The package format never stores path strings.  Both the builder and the
//! reader reduce every logical path to a CRC-32 of its canonical form, so the
//! two sides must normalize identically or lookups silently miss.

/// Reduce a logical path to its canonical form: ASCII lower-case, forward
/// slashes only, no leading slash, no duplicate separators.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c.to_ascii_lowercase() };
        if c == '/' && (out.is_empty() || out.ends_with('/')) {
            continue;
        }
        out.push(c);
    }
    out
}

/// Hash a canonical path to its table key.
///
/// CRC-32 is deterministic across runs and platforms; never swap this for a
/// seeded or pointer-dependent hasher.
pub fn key_of(canonical: &str) -> u32 {
    crc32fast::hash(canonical.as_bytes())
}

/// Prepend the mount prefix to a logical path before normalization.
pub fn join_mount(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    let mut joined = prefix.replace('\\', "/");
    if !joined.ends_with('/') {
        joined.push('/');
    }
    joined.push_str(path.trim_start_matches(['/', '\\']));
    joined
}

/// Normalize and hash in one step, under a mount prefix.
pub fn logical_key(prefix: &str, path: &str) -> u32 {
    key_of(&normalize(&join_mount(prefix, path)))
}
