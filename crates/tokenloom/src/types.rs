//! # Common Types

/// Token identifier.
///
/// The public façade reports `-1` for absent tokens; internal lookups use
/// `Option<TokenId>` and convert at the surface.
pub type TokenId = i32;

/// Sentinel id reported by the façade for absent tokens.
pub const NO_TOKEN: TokenId = -1;

/// Type alias for hash maps in this crate.
pub type LoomHashMap<K, V> = ahash::AHashMap<K, V>;

/// Type alias for hash sets in this crate.
pub type LoomHashSet<V> = ahash::AHashSet<V>;
