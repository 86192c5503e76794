//! 64-bit perceptual hash: computation, hex-slice codec, similarity.
//!
//! The hash is stored as four 4-character hex slices so the database can
//! pre-filter candidates on slice equality before paying for a full Hamming
//! comparison. Encoding is most-significant slice first and round-trips
//! exactly.

use image::{imageops::FilterType, DynamicImage};
use std::fmt;

use crate::error::IndexError;

/// Width of the hash in bits.
pub const HASH_BITS: u32 = 64;

/// Number of hex slices the hash is stored as.
pub const SLICE_COUNT: usize = 4;

/// Hex characters per slice (16 bits each).
const SLICE_CHARS: usize = 4;

/// Downsample edge length for hash computation (8x8 = 64 bits).
const GRID: u32 = 8;

/// A 64-bit perceptual fingerprint of image content.
///
/// Visually similar images produce hashes with small Hamming distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    /// Compute the average hash of a decoded image.
    ///
    /// The image is reduced to an 8x8 grayscale grid (Triangle filter, fast
    /// on large sources) and each cell contributes one bit: set when the
    /// cell is brighter than the grid mean. Bits are laid out row-major,
    /// most significant first, so the top-left cell is bit 63.
    pub fn from_image(img: &DynamicImage) -> Self {
        let grid = img.resize_exact(GRID, GRID, FilterType::Triangle).to_luma8();

        let sum: u32 = grid.pixels().map(|p| p.0[0] as u32).sum();
        let mean = sum as f64 / (GRID * GRID) as f64;

        let mut hash = 0u64;
        for pixel in grid.pixels() {
            hash <<= 1;
            if pixel.0[0] as f64 > mean {
                hash |= 1;
            }
        }
        Self(hash)
    }

    /// Split the hash into four 4-character hex slices, most significant
    /// first. Total function: every 64-bit value encodes.
    pub fn encode(self) -> [String; 4] {
        let hex = format!("{:016x}", self.0);
        [
            hex[0..4].to_string(),
            hex[4..8].to_string(),
            hex[8..12].to_string(),
            hex[12..16].to_string(),
        ]
    }

    /// Reassemble a hash from its four hex slices.
    ///
    /// The concatenation must be exactly 16 hex characters; anything else is
    /// a [`IndexError::MalformedHash`] and the caller treats the image as
    /// "hash unavailable".
    pub fn decode<S: AsRef<str>>(slices: &[S; 4]) -> Result<Self, IndexError> {
        let joined: String = slices.iter().map(|s| s.as_ref()).collect();
        Self::from_hex(&joined)
    }

    /// Parse a hash from a hex string, left-padding with `0` to 16 chars.
    /// Shorter strings round-trip losslessly through `to_hex` this way.
    pub fn from_hex(hex: &str) -> Result<Self, IndexError> {
        if hex.len() > SLICE_COUNT * SLICE_CHARS {
            return Err(IndexError::MalformedHash(hex.to_string()));
        }
        let padded = format!("{:0>16}", hex);
        if !padded.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IndexError::MalformedHash(hex.to_string()));
        }
        let value = u64::from_str_radix(&padded, 16)
            .map_err(|_| IndexError::MalformedHash(hex.to_string()))?;
        Ok(Self(value))
    }

    /// Full 16-character lowercase hex form.
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }

    /// Count of differing bits between two hashes.
    pub fn hamming(self, other: Self) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Normalized similarity in [0, 1]: `1 - hamming / 64`.
    ///
    /// Identical hashes score 1.0, maximally different hashes 0.0. Pure and
    /// symmetric.
    pub fn similarity(self, other: Self) -> f64 {
        1.0 - self.hamming(other) as f64 / HASH_BITS as f64
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
