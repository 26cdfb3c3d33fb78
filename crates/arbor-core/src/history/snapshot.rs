//! Whole-document snapshots for snapshot-discipline history steps.
//!
//! A snapshot is the canonical JSON encoding of the document arena plus its
//! SHA256 digest. Restoring verifies the digest before decoding, so a damaged
//! payload surfaces as a serialization failure instead of a wrong document.
//!
//! The arena is captured verbatim (slots, generations, free list), so node
//! handles taken before a capture still resolve after a restore, provided the
//! node existed at capture time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::{ArborError, Result};
use crate::model::Document;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    json: String,
    digest: String,
}

impl DocumentSnapshot {
    /// Capture the current state of a document
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the document cannot be encoded, including
    /// when a member holds a NaN or infinite float, which JSON cannot carry.
    pub fn capture(doc: &Document) -> Result<Self> {
        reject_non_finite(doc)?;
        let json = serde_json::to_string(doc)?;
        let digest = hash_string(&json);
        Ok(Self { json, digest })
    }

    /// Hex-encoded SHA256 of the encoded document (64 characters)
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn size_bytes(&self) -> usize {
        self.json.len()
    }

    /// Decode the captured document
    ///
    /// # Errors
    ///
    /// Returns `SnapshotDigestMismatch` if the payload no longer matches its
    /// digest and `Serialization` if it cannot be decoded.
    pub fn restore(&self) -> Result<Document> {
        let actual = hash_string(&self.json);
        if actual != self.digest {
            return Err(ArborError::SnapshotDigestMismatch {
                expected: self.digest.clone(),
                actual,
            });
        }
        Ok(serde_json::from_str(&self.json)?)
    }

    #[cfg(test)]
    pub(crate) fn corrupt(&mut self) {
        self.json.push(' ');
    }
}

fn reject_non_finite(doc: &Document) -> Result<()> {
    for (id, record) in doc.live_nodes() {
        for (name, value) in &record.fields {
            if let Some(f) = value.find_non_finite() {
                return Err(ArborError::Serialization {
                    message: format!("member {} of node {} holds non-finite float {}", name, id, f),
                });
            }
        }
    }
    Ok(())
}

fn hash_string(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
