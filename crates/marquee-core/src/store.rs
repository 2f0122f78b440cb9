//! The `PlacementStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `marquee-store-sqlite`).
//! The resolver and the conduction workflow depend on this abstraction and
//! never see how a backend builds its queries.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::placement::{NewPlacement, Placement, SlotKey};

// ─── Fetch outcome ───────────────────────────────────────────────────────────

/// The result of a cancellable read.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
  Ready(T),
  /// The caller's token fired first. Carries no information, good or bad.
  Cancelled,
}

impl<T> Fetch<T> {
  pub fn ready(self) -> Option<T> {
    match self {
      Self::Ready(v) => Some(v),
      Self::Cancelled => None,
    }
  }
}

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`PlacementStore::history`].
#[derive(Debug, Clone)]
pub struct PlacementQuery {
  pub slot_key:         SlotKey,
  /// If `false`, only `active` rows are returned.
  pub include_inactive: bool,
  pub limit:            Option<usize>,
}

impl PlacementQuery {
  pub const DEFAULT_LIMIT: usize = 100;

  pub fn for_slot(slot_key: SlotKey) -> Self {
    Self { slot_key, include_inactive: true, limit: None }
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a placement store backend.
///
/// Writes are additive: `create` always inserts a new row and `deactivate` is
/// the only in-place change, an idempotent flip of `active`. Rows are never
/// deleted.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait PlacementStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// All active placements for `slot_key`, ordered by priority (descending),
  /// then `created_at` (descending), then insertion order (latest first).
  ///
  /// Returns [`Fetch::Cancelled`] if `cancel` fires before the query
  /// completes.
  fn active_for_slot<'a>(
    &'a self,
    slot_key: &'a SlotKey,
    cancel: &'a CancellationToken,
  ) -> impl Future<Output = Result<Fetch<Vec<Placement>>, Self::Error>> + Send + 'a;

  /// Retrieve a placement by id. Returns `None` if not found.
  fn get_placement(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Placement>, Self::Error>> + Send + '_;

  /// Every placement recorded for a slot, newest first.
  fn history<'a>(
    &'a self,
    query: &'a PlacementQuery,
  ) -> impl Future<Output = Result<Vec<Placement>, Self::Error>> + Send + 'a;

  /// Persist a new placement. `placement_id` and `created_at` are assigned by
  /// the store and the row starts active.
  fn create(
    &self,
    input: NewPlacement,
  ) -> impl Future<Output = Result<Placement, Self::Error>> + Send + '_;

  /// Set `active = false`. Repeating the call on an inactive row succeeds
  /// and leaves it unchanged. Returns `None` if the id does not exist.
  fn deactivate(
    &self,
    id: Uuid,
    actor: Uuid,
  ) -> impl Future<Output = Result<Option<Placement>, Self::Error>> + Send + '_;
}
