//! Image similarity and multi-modal search indexing.
//!
//! This crate turns noisy, high-dimensional photo signals into small,
//! comparable, indexable keys:
//!
//! - [`hash`] derives 64-bit perceptual fingerprints from decoded pixels and
//!   scores similarity between them for near-duplicate detection.
//! - [`detect`] cleans raw ML bounding boxes via two suppression variants
//!   (legacy overlap suppression and confidence-ranked NMS).
//! - [`identity`] resolves face embeddings to stable person identities
//!   against a growing embedding store.
//! - [`search`] compiles free-text queries plus structured filters into
//!   parameterized multi-source SQL (AND across terms, UNION across sources).
//! - [`db`] persists the index in SQLite with FTS5 term tables and sliced
//!   perceptual-hash columns for pre-filtered similarity lookups.
//! - [`pipeline`] wires the pieces into an ingest flow fed by external
//!   decoders and detectors.
//!
//! Image decoding, ML inference, and the query-result presentation layer are
//! external collaborators; this crate only defines the algorithms and the
//! index they feed.

pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod hash;
pub mod identity;
pub mod logging;
pub mod pipeline;
pub mod search;

pub use config::Config;
pub use db::Database;
pub use detect::{DetectionBox, Suppression};
pub use error::IndexError;
pub use hash::PerceptualHash;
pub use identity::{EmbeddingStore, IdentityResolver, Metric, PersonKey, Resolution};
pub use pipeline::Indexer;
pub use search::{CompiledQuery, SearchQuery, SourceSet};
