//! Text-safe encoding of opaque parameter blobs.
//!
//! Plain blobs are written as lowercase hex. Compressed blobs are written as
//! [`COMPRESSED_TAG`], a two digit size factor, and the base64 form of the
//! zstd-compressed bytes. The factor only sizes the first decode buffer.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

/// Prefix marking a compressed blob.
pub const COMPRESSED_TAG: &str = "zs";
/// Upper bound on the decode buffer for a single blob.
pub const MAX_DECODED_LEN: usize = 64 * 1024 * 1024;
const DEFAULT_LEVEL: i32 = 3;
/// Error name zstd reports when the destination buffer is undersized.
const DST_TOO_SMALL: &str = "Destination buffer is too small";
const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Reasons a blob text cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A character outside `0-9a-f`.
    #[error("invalid hex digit at position {position}")]
    InvalidHex {
        /// Byte offset of the offending character.
        position: usize,
    },
    /// Hex text with a dangling half byte.
    #[error("hex text has odd length {0}")]
    OddLength(usize),
    /// Missing or non-numeric size factor after the tag.
    #[error("invalid compression factor `{0}`")]
    BadFactor(String),
    /// Payload after the factor is not base64.
    #[error("invalid base64 payload: {0}")]
    Base64(String),
    /// zstd rejected the payload.
    #[error("decompression failed with buffer of {capacity} bytes: {detail}")]
    Decompress {
        /// Buffer size of the failing attempt.
        capacity: usize,
        /// Error reported by zstd.
        detail: String,
    },
}

/// When the document writer compresses a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionPolicy {
    /// Always hex.
    Never,
    /// Compress blobs strictly longer than `threshold` bytes.
    LargeOnly {
        /// Largest length still written as hex.
        threshold: usize,
    },
    /// Compress every blob.
    Always,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::LargeOnly { threshold: 100 }
    }
}

impl CompressionPolicy {
    /// Whether a blob of `len` bytes is written compressed.
    pub fn should_compress(&self, len: usize) -> bool {
        match *self {
            Self::Never => false,
            Self::LargeOnly { threshold } => len > threshold,
            Self::Always => true,
        }
    }
}

/// Encodes `bytes`, compressing when asked to.
pub fn encode(bytes: &[u8], compress: bool) -> String {
    encode_with_level(bytes, compress, DEFAULT_LEVEL)
}

/// Like [`encode`] with an explicit zstd level.
///
/// Falls back to hex when the compressor reports an error.
pub fn encode_with_level(bytes: &[u8], compress: bool, level: i32) -> String {
    if compress {
        match zstd::bulk::compress(bytes, level) {
            Ok(compressed) => {
                let factor = (bytes.len() / compressed.len().max(1) + 1).min(99);
                return format!("{COMPRESSED_TAG}{factor:02}{}", BASE64.encode(&compressed));
            }
            Err(err) => {
                tracing::warn!(len = bytes.len(), error = %err, "blob compression failed, writing hex");
            }
        }
    }
    encode_hex(bytes)
}

/// Decodes text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    match text.strip_prefix(COMPRESSED_TAG) {
        Some(rest) => decode_compressed(rest),
        None => decode_hex(text),
    }
}

/// Lowercase hex, two digits per byte.
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX_DIGITS[usize::from(b >> 4)]));
        out.push(char::from(HEX_DIGITS[usize::from(b & 0x0f)]));
    }
    out
}

/// Strict lowercase hex decoding.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, CodecError> {
    let raw = text.as_bytes();
    let mut out = Vec::with_capacity(raw.len() / 2);
    for (pair_idx, pair) in raw.chunks(2).enumerate() {
        let position = pair_idx * 2;
        let hi = hex_value(pair[0]).ok_or(CodecError::InvalidHex { position })?;
        let Some(&lo_char) = pair.get(1) else {
            return Err(CodecError::OddLength(raw.len()));
        };
        let lo = hex_value(lo_char).ok_or(CodecError::InvalidHex {
            position: position + 1,
        })?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

fn decode_compressed(rest: &str) -> Result<Vec<u8>, CodecError> {
    let factor_text = rest.get(..2).ok_or_else(|| CodecError::BadFactor(rest.to_string()))?;
    let factor: usize = factor_text
        .parse()
        .map_err(|_| CodecError::BadFactor(factor_text.to_string()))?;
    let compressed = BASE64
        .decode(&rest[2..])
        .map_err(|err| CodecError::Base64(err.to_string()))?;

    let mut capacity = (factor.max(1) * compressed.len()).clamp(64, MAX_DECODED_LEN);
    // Only an undersized buffer is worth another attempt.
    loop {
        match zstd::bulk::decompress(&compressed, capacity) {
            Ok(bytes) => return Ok(bytes),
            Err(err) if capacity < MAX_DECODED_LEN && is_buffer_too_small(&err) => {
                tracing::trace!(capacity, error = %err, "growing blob decode buffer");
                capacity = (capacity * 2).min(MAX_DECODED_LEN);
            }
            Err(err) => {
                return Err(CodecError::Decompress {
                    capacity,
                    detail: err.to_string(),
                });
            }
        }
    }
}

fn is_buffer_too_small(err: &std::io::Error) -> bool {
    err.to_string().contains(DST_TOO_SMALL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_pairs() {
        assert_eq!(encode(&[0xde, 0xad, 0xbe, 0xef], false), "deadbeef");
        assert_eq!(decode("deadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn hex_rejects_foreign_characters() {
        assert_eq!(decode("dead_eef"), Err(CodecError::InvalidHex { position: 4 }));
        assert_eq!(decode("DEAD"), Err(CodecError::InvalidHex { position: 0 }));
        assert_eq!(decode("abc"), Err(CodecError::OddLength(3)));
    }

    #[test]
    fn compressed_form_carries_tag_and_factor() {
        let bytes = vec![7u8; 4096];
        let text = encode(&bytes, true);
        assert!(text.starts_with(COMPRESSED_TAG));
        let factor: usize = text[2..4].parse().unwrap();
        assert!(factor > 1 && factor <= 99);
        assert_eq!(decode(&text).unwrap(), bytes);
    }

    #[test]
    fn understated_factor_still_decodes() {
        let bytes: Vec<u8> = (0..20_000u32).map(|i| (i % 7) as u8).collect();
        let text = encode(&bytes, true);
        let lowered = format!("{COMPRESSED_TAG}01{}", &text[4..]);
        assert_eq!(decode(&lowered).unwrap(), bytes);
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        let text = format!("{COMPRESSED_TAG}04{}", BASE64.encode(b"not zstd at all"));
        assert!(matches!(decode(&text), Err(CodecError::Decompress { capacity: 64, .. })));
        assert!(matches!(decode("zsxx"), Err(CodecError::BadFactor(_))));
    }

    #[test]
    fn corrupt_payload_fails_on_first_buffer() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 256) as u8).collect();
        let text = format!("{COMPRESSED_TAG}10{}", BASE64.encode(&payload));
        match decode(&text) {
            Err(CodecError::Decompress { capacity, .. }) => assert_eq!(capacity, 10 * payload.len()),
            other => panic!("expected decompress error, got {other:?}"),
        }
    }

    #[test]
    fn undersized_buffer_error_is_recognised() {
        let compressed = zstd::bulk::compress(&[9u8; 8192], 3).unwrap();
        let err = zstd::bulk::decompress(&compressed, 16).unwrap_err();
        assert!(is_buffer_too_small(&err));
    }

    #[test]
    fn policy_thresholds() {
        let policy = CompressionPolicy::LargeOnly { threshold: 100 };
        assert!(!policy.should_compress(100));
        assert!(policy.should_compress(101));
        assert!(!CompressionPolicy::Never.should_compress(10_000));
        assert!(CompressionPolicy::Always.should_compress(0));
    }
}
