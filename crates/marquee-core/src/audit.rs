//! Audit trail types and the `AuditSink` trait.
//!
//! Every placement mutation writes one entry. Entries are append-only and
//! have no update path.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the actor did.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditAction {
  PlacementCreate,
  PlacementDeactivate,
}

/// The kind of record an entry points at.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuditTarget {
  Placement,
}

/// Input to [`AuditSink::record`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditEntry {
  pub actor_id:    Uuid,
  pub action:      AuditAction,
  pub target_type: AuditTarget,
  pub target_id:   Uuid,
  pub metadata:    serde_json::Value,
}

/// A persisted audit entry. `recorded_at` is assigned by the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub entry_id:    Uuid,
  pub recorded_at: DateTime<Utc>,
  pub actor_id:    Uuid,
  pub action:      AuditAction,
  pub target_type: AuditTarget,
  pub target_id:   Uuid,
  pub metadata:    serde_json::Value,
}

impl AuditEntry {
  pub fn from_new(input: NewAuditEntry, recorded_at: DateTime<Utc>) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      recorded_at,
      actor_id: input.actor_id,
      action: input.action,
      target_type: input.target_type,
      target_id: input.target_id,
      metadata: input.metadata,
    }
  }
}

/// Append-only write target for audit entries.
pub trait AuditSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn record(
    &self,
    entry: NewAuditEntry,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;
}

// ─── Mutation results ────────────────────────────────────────────────────────

/// Whether the audit write that accompanied a mutation landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
  Recorded { entry_id: Uuid },
  /// The mutation stands; only its audit entry is missing.
  Failed { message: String },
}

impl AuditStatus {
  pub fn is_recorded(&self) -> bool { matches!(self, Self::Recorded { .. }) }
}

/// A mutation result bundled with the fate of its audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audited<T> {
  pub value: T,
  pub audit: AuditStatus,
}
