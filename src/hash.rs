//! String hashing and qualified-name helpers.
//!
//! Every registry key is the hash of a string, and every externally visible
//! service or event name has the form `"<plugin>.<local>"`.

/// Hash type used as key by [`OrderedMap`](crate::OrderedMap).
pub type Hash = u64;

/// Namespace used for listeners and events owned by the runtime itself.
pub const BUILTIN_NAMESPACE: &str = "builtin";

/// Separator between a namespace and a local name, and between tree segments.
pub const SEPARATOR: char = '.';

/// Deterministic Jenkins one-at-a-time hash, computed in 64 bits.
///
/// The value is stable across runs and platforms, so hashes may be stored.
pub fn hash_str(s: &str) -> Hash {
    let mut hash: Hash = 0;
    for &byte in s.as_bytes() {
        hash = hash.wrapping_add(Hash::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Build `"<namespace>.<local>"`.
pub fn qualified_name(namespace: &str, local: &str) -> String {
    let mut full = String::with_capacity(namespace.len() + local.len() + 1);
    full.push_str(namespace);
    full.push(SEPARATOR);
    full.push_str(local);
    full
}

/// Build the `"<namespace>."` prefix that scopes everything a plugin owns.
pub fn namespace_of(namespace: &str) -> String {
    let mut prefix = String::with_capacity(namespace.len() + 1);
    prefix.push_str(namespace);
    prefix.push(SEPARATOR);
    prefix
}

/// Whether `full_name` lives in `namespace`.
///
/// Matches on the whole `"<namespace>."` prefix, so `"foo"` does not claim
/// `"foobar.x"`.
pub fn in_namespace(full_name: &str, namespace: &str) -> bool {
    full_name
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with(SEPARATOR))
}
