pub mod content;
pub mod phash;

pub use content::{sha256_bytes, sha256_stream};
pub use phash::{PerceptualHash, HASH_BITS, SLICE_COUNT};
