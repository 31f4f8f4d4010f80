//! Canonical-JSON content hashing and proof-of-work bit counting.
//!
//! Everything that gets hashed or signed in this crate goes through
//! [`canonicalize`] first, so that two nodes serializing the same logical
//! value always agree byte-for-byte, independent of map insertion order or
//! how a particular `Serialize` impl happens to emit numbers.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Renders a `serde_json::Value` into a canonical string: object keys sorted
/// lexicographically, no insignificant whitespace, arrays and scalars in
/// their ordinary JSON form.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let body = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), canonicalize(v)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{body}}}")
        }
        Value::Array(items) => {
            let body = items.iter().map(canonicalize).collect::<Vec<_>>().join(",");
            format!("[{body}]")
        }
        other => other.to_string(),
    }
}

/// Serializes `value` to its canonical JSON form.
///
/// # Panics
///
/// Panics if `value`'s `Serialize` impl fails, which only happens for maps
/// with non-string keys or similarly malformed data — not expected for any
/// type in this crate.
#[must_use]
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    let as_value = serde_json::to_value(value).expect("value must serialize to JSON");
    canonicalize(&as_value)
}

/// Computes the content hash of a sequence of already-canonicalized
/// argument strings: joins them with `^` (a character that cannot appear at
/// the top level of a canonical JSON rendering) and returns the lowercase
/// hex SHA-256 digest.
#[must_use]
pub fn hash_joined(canonical_args: &[String]) -> String {
    let joined = canonical_args.join("^");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// Computes the content hash of heterogeneous serializable values, in
/// order. Reordering the arguments produces a different digest.
#[must_use]
pub fn hash_values(values: &[Value]) -> String {
    let canonical: Vec<String> = values.iter().map(canonicalize).collect();
    hash_joined(&canonical)
}

/// Convenience macro mirroring a variadic content hash: each argument is
/// converted to a JSON value via `Serialize`, then hashed with
/// [`hash_values`]. Argument order is significant.
#[macro_export]
macro_rules! canonical_hash {
    ($($arg:expr),+ $(,)?) => {
        $crate::hash::hash_values(&[$(::serde_json::to_value(&$arg).expect("value must serialize to JSON")),+])
    };
}

/// Expands each character of a hex string to its 4-bit binary string and
/// concatenates the result. Accepts both upper- and lower-case hex digits.
#[must_use]
pub fn hex_to_binary(hex_str: &str) -> String {
    hex_str
        .chars()
        .map(|c| {
            let nibble = c.to_digit(16).expect("hex digest must contain only hex digits");
            format!("{nibble:04b}")
        })
        .collect()
}

/// Counts the leading zero bits in the binary expansion of a hex digest.
#[must_use]
pub fn leading_zero_bits(hex_str: &str) -> u32 {
    hex_to_binary(hex_str)
        .chars()
        .take_while(|&c| c == '0')
        .count() as u32
}

/// Returns true if `hex_str`'s binary expansion starts with at least
/// `difficulty` zero bits.
#[must_use]
pub fn meets_difficulty(hex_str: &str, difficulty: u64) -> bool {
    leading_zero_bits(hex_str) as u64 >= difficulty
}
