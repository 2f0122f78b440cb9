//! Integrity hashes for the audit log.
//!
//! Every row's hash covers the previous row's hash, so editing or removing a
//! row breaks the chain from that point on.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stands in for the previous hash of the first entry.
const CHAIN_SEED: &str = "MARQUEE_AUDIT_CHAIN_V1";

/// SHA-256 over `"{prev}|{entry_data}"`, hex-encoded.
pub fn compute_integrity_hash(prev_hash: Option<&str>, entry_data: &str) -> String {
  let prev = prev_hash.unwrap_or(CHAIN_SEED);
  hex::encode(Sha256::digest(format!("{prev}|{entry_data}").as_bytes()))
}

/// Outcome of [`crate::SqliteStore::verify_audit_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
  /// Entries whose hash matched, counted from the start of the log.
  pub verified_entries: usize,
  /// The first entry whose stored hash does not match.
  pub first_break:      Option<Uuid>,
}

impl ChainReport {
  pub fn is_intact(&self) -> bool { self.first_break.is_none() }
}
