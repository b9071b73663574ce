//! Binary/textual identifier conversion and opaque pagination cursors
//! used across the storage layer.
//!
//! Cursors are a deliberate contract: callers must never parse them. The
//! decoded value is just `[height]` or `[height, block_transaction_index]`
//! JSON, base64-encoded — but nothing outside this module should assume
//! that shape.

use crate::error::{IndexError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use digest::Digest;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;

/// Encode raw bytes as URL-safe base64 without padding.
pub fn encode_base64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode URL-safe, unpadded base64 back to raw bytes.
pub fn decode_base64(s: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|e| IndexError::InvalidArgument(format!("invalid base64: {e}")))
}

/// SHA-1 fingerprint used to index tag names and tag values. This is a
/// join/index key, not a security token — collisions would corrupt
/// queries, so callers must treat the fingerprint as unique per input.
pub fn tag_fingerprint(bytes: &[u8]) -> Vec<u8> {
    Sha1::digest(bytes).to_vec()
}

/// SHA-256 of a transaction owner's public modulus, used as the wallet's
/// compact address.
pub fn wallet_address(public_modulus: &[u8]) -> Vec<u8> {
    Sha256::digest(public_modulus).to_vec()
}

/// Exclusive pagination bound over `(height, block_transaction_index)`.
/// Ordering is 2-tuple lexicographic, per the Open Question decision in
/// SPEC_FULL.md — not the `height * 1000 + index` encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionCursor {
    pub height: i64,
    pub block_transaction_index: i64,
}

impl TransactionCursor {
    pub fn new(height: i64, block_transaction_index: i64) -> Self {
        TransactionCursor { height, block_transaction_index }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_string(&(self.height, self.block_transaction_index))
            .expect("tuple serialization cannot fail");
        encode_base64(json.as_bytes())
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let bytes = decode_base64(cursor).map_err(|_| bad_cursor(cursor))?;
        let (height, block_transaction_index): (i64, i64) =
            serde_json::from_slice(&bytes).map_err(|_| bad_cursor(cursor))?;
        Ok(TransactionCursor { height, block_transaction_index })
    }

    /// Decode an optional cursor; `None` means "no bound".
    pub fn decode_opt(cursor: Option<&str>) -> Result<Option<Self>> {
        cursor.map(TransactionCursor::decode).transpose()
    }
}

/// Exclusive pagination bound over `height` alone, used for block queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCursor {
    pub height: i64,
}

impl BlockCursor {
    pub fn new(height: i64) -> Self {
        BlockCursor { height }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_string(&(self.height,)).expect("tuple serialization cannot fail");
        encode_base64(json.as_bytes())
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let bytes = decode_base64(cursor).map_err(|_| bad_cursor(cursor))?;
        let (height,): (i64,) = serde_json::from_slice(&bytes).map_err(|_| bad_cursor(cursor))?;
        Ok(BlockCursor { height })
    }

    pub fn decode_opt(cursor: Option<&str>) -> Result<Option<Self>> {
        cursor.map(BlockCursor::decode).transpose()
    }
}

fn bad_cursor(cursor: &str) -> IndexError {
    IndexError::BadCursor(format!("malformed cursor: {cursor}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_cursor_round_trips() {
        let cursor = TransactionCursor::new(1138, 42);
        let encoded = cursor.encode();
        assert_eq!(encoded, "WzExMzgsNDJd");
        assert_eq!(TransactionCursor::decode(&encoded).unwrap(), cursor);
    }

    #[test]
    fn block_cursor_round_trips() {
        let cursor = BlockCursor::new(982_575);
        let encoded = cursor.encode();
        assert_eq!(BlockCursor::decode(&encoded).unwrap(), cursor);
    }

    #[test]
    fn malformed_cursor_is_bad_cursor() {
        let err = TransactionCursor::decode("123").unwrap_err();
        assert!(matches!(err, IndexError::BadCursor(_)));
    }

    #[test]
    fn absent_cursor_decodes_to_none() {
        assert!(TransactionCursor::decode_opt(None).unwrap().is_none());
    }

    #[test]
    fn base64_round_trips() {
        let bytes = b"arbitrary transaction id bytes";
        assert_eq!(decode_base64(&encode_base64(bytes)).unwrap(), bytes);
    }

    #[test]
    fn tag_fingerprint_is_deterministic_and_distinct() {
        let a = tag_fingerprint(b"Content-Type");
        let b = tag_fingerprint(b"Content-Type");
        let c = tag_fingerprint(b"content-type");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 20);
    }

    #[test]
    fn wallet_address_is_sha256_of_modulus() {
        let addr = wallet_address(b"fake-modulus-bytes");
        assert_eq!(addr.len(), 32);
    }
}
