//! Content hashing for change detection.
//!
//! A perceptual hash is computed once per image version and replaced when
//! the source bytes change; the SHA-256 content hash is how the surrounding
//! system notices that change.

use anyhow::Result;
use sha2::{Digest, Sha256};
use std::io::Read;

/// Hash a byte buffer already held in memory.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Hash a stream without loading it whole.
pub fn sha256_stream<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_and_stream_agree() {
        let data = b"the same bytes either way";
        assert_eq!(sha256_bytes(data), sha256_stream(&data[..]).unwrap());
    }

    #[test]
    fn empty_input_known_digest() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
