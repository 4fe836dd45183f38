//! Schema fingerprint generation.
//!
//! A short stable digest of a candidate field map, computed over the
//! canonical (sorted) structure. Commits log it so drift between adjacent
//! ledger entries can be eyeballed without diffing whole field maps.

use sha2::{Digest, Sha256};
use shapesense_core::SchemaFields;

/// Compute a stable fingerprint for a candidate field map.
///
/// Hashes paths, sorted type lists, presence counts and optionality flags
/// in map order, which `SchemaFields` keeps deterministic. Two field maps
/// are equal iff their fingerprints match (modulo hash collisions), so the
/// fingerprint tracks exactly the structural comparison the coordinator
/// performs.
///
/// Returns the first 8 bytes of the SHA-256 hex encoded (16 chars).
pub fn compute_fingerprint(fields: &SchemaFields) -> String {
    let mut hasher = Sha256::new();

    for (path, spec) in fields {
        hasher.update(path.as_bytes());
        hasher.update(b":");
        for tag in &spec.types {
            hasher.update(tag.as_str().as_bytes());
            hasher.update(b"|");
        }
        hasher.update(spec.present_count.to_be_bytes());
        hasher.update([u8::from(spec.optional)]);
        hasher.update(b";");
    }

    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}
