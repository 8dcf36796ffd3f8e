//! Content fingerprints
//!
//! [`ContentHash`] is the Blake3 digest of an artifact's text. Equal text
//! means equal fingerprint, which is what the render-result cache keys on.
//! On the wire it is always the 64-char lowercase hex form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DIGEST_LEN: usize = 32;

/// Blake3 fingerprint of artifact text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash([u8; DIGEST_LEN]);

impl ContentHash {
    /// Fingerprint of arbitrary bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Fingerprint of a piece of text
    #[inline]
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        Self::compute(text.as_bytes())
    }

    /// Digest bytes
    #[inline]
    #[must_use]
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Leading 16 hex chars, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..DIGEST_LEN / 4])
    }

    /// Parse the full hex form
    ///
    /// # Errors
    /// Returns [`HashError`] unless `text` is exactly 64 hex digits.
    pub fn from_hex(text: &str) -> Result<Self, HashError> {
        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(text, &mut digest).map_err(|source| match source {
            hex::FromHexError::InvalidStringLength | hex::FromHexError::OddLength => {
                HashError::Length(text.len())
            }
            other => HashError::Hex(other),
        })?;
        Ok(Self(digest))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::from_hex(&text)
    }
}

/// Text that is not a fingerprint
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Wrong number of hex digits
    #[error("fingerprint must be 64 hex digits, got {0}")]
    Length(usize),

    /// Not hex
    #[error("fingerprint is not hex: {0}")]
    Hex(hex::FromHexError),
}
