//! Audited placement writes.
//!
//! [`Ledger`] pairs a [`PlacementStore`] with an [`AuditSink`] so that every
//! mutation writes its audit entry in the same logical operation. The
//! placement change is primary: a failed audit write is logged and reported
//! back through [`AuditStatus::Failed`], never rolled into an error.

use std::{future::Future, sync::Arc};

use serde_json::json;
use uuid::Uuid;

use crate::{
  audit::{AuditAction, AuditSink, AuditStatus, AuditTarget, Audited, NewAuditEntry},
  placement::{NewPlacement, Placement},
  store::{PlacementQuery, PlacementStore},
};

// ─── Writer seam ─────────────────────────────────────────────────────────────

/// The write path used by the conduction workflow.
///
/// Implemented in-process by [`Ledger`] and remotely by HTTP clients.
pub trait PlacementWriter: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create a new placement row. Never touches existing rows.
  fn commit(
    &self,
    input: NewPlacement,
  ) -> impl Future<Output = Result<Audited<Placement>, Self::Error>> + Send + '_;

  /// Deactivate a placement. `None` if it does not exist.
  fn revert(
    &self,
    id: Uuid,
    actor: Uuid,
    reason: Option<String>,
  ) -> impl Future<Output = Result<Option<Audited<Placement>>, Self::Error>> + Send + '_;

  /// Placement history for the inspector.
  fn history<'a>(
    &'a self,
    query: &'a PlacementQuery,
  ) -> impl Future<Output = Result<Vec<Placement>, Self::Error>> + Send + 'a;
}

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// A placement store whose writes are audited.
pub struct Ledger<S, A> {
  store: Arc<S>,
  audit: Arc<A>,
}

impl<S, A> Clone for Ledger<S, A> {
  fn clone(&self) -> Self { Self { store: self.store.clone(), audit: self.audit.clone() } }
}

impl<S, A> Ledger<S, A>
where
  S: PlacementStore,
  A: AuditSink,
{
  pub fn new(store: Arc<S>, audit: Arc<A>) -> Self { Self { store, audit } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  async fn record(&self, entry: NewAuditEntry) -> AuditStatus {
    let target_id = entry.target_id;
    let action = entry.action;
    match self.audit.record(entry).await {
      Ok(recorded) => AuditStatus::Recorded { entry_id: recorded.entry_id },
      Err(e) => {
        tracing::warn!(%target_id, %action, error = %e, "audit write failed; mutation kept");
        AuditStatus::Failed { message: e.to_string() }
      }
    }
  }

  /// Insert a placement and audit it.
  pub async fn create(&self, input: NewPlacement) -> Result<Audited<Placement>, S::Error> {
    let placement = self.store.create(input).await?;
    tracing::info!(
      placement_id = %placement.placement_id,
      slot_key = %placement.slot_key,
      content_type = %placement.content_type,
      priority = placement.priority,
      "placement created"
    );

    let audit = self
      .record(NewAuditEntry {
        actor_id:    placement.updated_by,
        action:      AuditAction::PlacementCreate,
        target_type: AuditTarget::Placement,
        target_id:   placement.placement_id,
        metadata:    json!({
          "slot_key":     placement.slot_key,
          "content_type": placement.content_type,
          "content_id":   placement.content_id,
          "priority":     placement.priority,
          "device_scope": placement.device_scope,
          "reason":       placement.reason(),
        }),
      })
      .await;

    Ok(Audited { value: placement, audit })
  }

  /// Deactivate a placement and audit it. Repeats are audited too, flagged
  /// with `already_inactive`. Returns `None` without auditing if the id is
  /// unknown.
  pub async fn deactivate(
    &self,
    id: Uuid,
    actor: Uuid,
    reason: Option<String>,
  ) -> Result<Option<Audited<Placement>>, S::Error> {
    let was_active = self
      .store
      .get_placement(id)
      .await?
      .map(|p| p.active);

    let Some(placement) = self.store.deactivate(id, actor).await? else {
      tracing::debug!(placement_id = %id, "deactivate: placement not found");
      return Ok(None);
    };
    tracing::info!(placement_id = %id, slot_key = %placement.slot_key, "placement deactivated");

    let audit = self
      .record(NewAuditEntry {
        actor_id:    actor,
        action:      AuditAction::PlacementDeactivate,
        target_type: AuditTarget::Placement,
        target_id:   id,
        metadata:    json!({
          "slot_key":         placement.slot_key,
          "reason":           reason,
          "already_inactive": was_active == Some(false),
        }),
      })
      .await;

    Ok(Some(Audited { value: placement, audit }))
  }
}

impl<S, A> PlacementWriter for Ledger<S, A>
where
  S: PlacementStore,
  A: AuditSink,
{
  type Error = S::Error;

  async fn commit(&self, input: NewPlacement) -> Result<Audited<Placement>, S::Error> {
    self.create(input).await
  }

  async fn revert(
    &self,
    id: Uuid,
    actor: Uuid,
    reason: Option<String>,
  ) -> Result<Option<Audited<Placement>>, S::Error> {
    self.deactivate(id, actor, reason).await
  }

  async fn history(&self, query: &PlacementQuery) -> Result<Vec<Placement>, S::Error> {
    self.store.history(query).await
  }
}
