//! Hash tables for the generation sweep and the in-memory listener table.
//!
//! `ahash` over `hashbrown` by default; the `std-hash` feature swaps in the
//! standard library tables and SipHash.

#[cfg(not(feature = "std-hash"))]
pub type FiberHasher = ahash::RandomState;
#[cfg(feature = "std-hash")]
pub type FiberHasher = std::collections::hash_map::RandomState;

#[cfg(not(feature = "std-hash"))]
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FiberHasher>;
#[cfg(not(feature = "std-hash"))]
pub type HashSet<K> = hashbrown::HashSet<K, FiberHasher>;

#[cfg(feature = "std-hash")]
pub type HashMap<K, V> = std::collections::HashMap<K, V, FiberHasher>;
#[cfg(feature = "std-hash")]
pub type HashSet<K> = std::collections::HashSet<K, FiberHasher>;
