//! Binary envelope for server-cache payloads.
//!
//! Responses held by the server cache are stored as bytes so any
//! [`CacheBackend`](crate::backend::CacheBackend) can keep them. Each payload
//! is wrapped in a small envelope:
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "QKIT"              u32                postcard::to_allocvec(T)
//! ```
//!
//! A magic or version mismatch is reported as an error; the server cache
//! treats such an entry as absent and reloads it from upstream.
//!
//! # Example
//!
//! ```rust
//! use query_kit::serialization::{serialize_for_cache, deserialize_from_cache};
//! use query_kit::entity::Post;
//!
//! # fn main() -> query_kit::Result<()> {
//! let posts = vec![Post { user_id: 1, id: 1, title: "t".into(), body: "b".into() }];
//! let bytes = serialize_for_cache(&posts)?;
//! let back: Vec<Post> = deserialize_from_cache(&bytes)?;
//! assert_eq!(posts, back);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for query-kit cache payloads.
pub const CACHE_MAGIC: [u8; 4] = *b"QKIT";

/// Current schema version.
///
/// Bump when a cached type changes shape (fields added, removed, reordered
/// or retyped). Entries written under another version are reloaded.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope around a cached payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value inside the envelope.
///
/// # Errors
///
/// Returns `Error::SerializationError` if postcard rejects the value.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value, validating magic and schema version first.
///
/// # Errors
///
/// - `Error::DeserializationError`: truncated or corrupted bytes
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: payload written by another schema version
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        error!("Cache deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
