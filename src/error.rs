//! Error taxonomy for the indexing core.
//!
//! All failures here are local and narrow: a bad hash string or a mismatched
//! embedding never aborts the surrounding batch. Callers log and continue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// A stored hash string could not be decoded back into a 64-bit value.
    /// The affected image is treated as "hash unavailable" by callers.
    #[error("malformed perceptual hash: {0:?}")]
    MalformedHash(String),

    /// Two embeddings of different dimensionality were compared, e.g. after
    /// an embedding model upgrade. The offending stored exemplar is skipped;
    /// matching continues against the rest of the store.
    #[error("embedding dimension mismatch: query has {query} dims, stored exemplar has {stored}")]
    DimensionMismatch { query: usize, stored: usize },
}
