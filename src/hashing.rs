//! Deterministic hashing. The standard library's `HashMap` is randomly seeded
//! per process, which would make iteration order (and anything derived from
//! it) differ between runs with the same random seed. Use these aliases
//! instead, constructed with `HashMap::default()`.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Stable 64-bit hash of a string, used to derive per-stream seed offsets.
#[must_use]
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
