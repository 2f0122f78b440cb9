//! Slot resolution: pick the single winning placement for a slot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
  Error, Result,
  device::Device,
  placement::{Placement, SlotKey},
  store::{Fetch, PlacementStore},
};

/// The requesting context a slot is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveContext {
  pub device: Device,
  pub now:    DateTime<Utc>,
}

impl ResolveContext {
  pub fn new(device: Device, now: DateTime<Utc>) -> Self { Self { device, now } }

  /// Context for `device` at the current instant.
  pub fn current(device: Device) -> Self { Self::new(device, Utc::now()) }
}

/// Outcome of a resolution that reached a verdict or was cancelled.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  Resolved(Placement),
  /// No eligible placement: the slot shows its own default.
  Vacant,
  /// Superseded before the store answered; carries no information.
  Cancelled,
}

impl Resolution {
  pub fn placement(&self) -> Option<&Placement> {
    match self {
      Self::Resolved(p) => Some(p),
      _ => None,
    }
  }
}

/// Choose the winner among `candidates` for `ctx`.
///
/// Eligible placements are active, admit `ctx.device`, and are inside their
/// window at `ctx.now`. The highest priority wins; equal priorities go to the
/// latest `created_at`. On a full tie the earlier candidate in iteration
/// order wins, so stores list the most recently inserted row first.
pub fn select_winner<I>(candidates: I, ctx: &ResolveContext) -> Option<Placement>
where
  I: IntoIterator<Item = Placement>,
{
  candidates
    .into_iter()
    .filter(|p| p.active && p.device_scope.admits(ctx.device) && p.in_window(ctx.now))
    .reduce(|best, next| {
      let beats = (next.priority, next.created_at) > (best.priority, best.created_at);
      if beats { next } else { best }
    })
}

/// Resolves slot keys against a [`PlacementStore`].
pub struct Resolver<S> {
  store: Arc<S>,
}

impl<S> Clone for Resolver<S> {
  fn clone(&self) -> Self { Self { store: self.store.clone() } }
}

impl<S: PlacementStore> Resolver<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Resolve `slot_key` for `ctx`.
  ///
  /// A store failure is returned as [`Error::ResolutionUnavailable`]; a fired
  /// `cancel` token yields [`Resolution::Cancelled`].
  pub async fn resolve(
    &self,
    slot_key: &SlotKey,
    ctx: &ResolveContext,
    cancel: &CancellationToken,
  ) -> Result<Resolution> {
    let fetched = tokio::select! {
      biased;
      () = cancel.cancelled() => Fetch::Cancelled,
      res = self.store.active_for_slot(slot_key, cancel) => {
        res.map_err(|e| Error::ResolutionUnavailable {
          slot_key: slot_key.clone(),
          source:   Box::new(e),
        })?
      }
    };

    let Some(candidates) = fetched.ready() else {
      tracing::debug!(%slot_key, "resolution cancelled");
      return Ok(Resolution::Cancelled);
    };
    let considered = candidates.len();

    Ok(match select_winner(candidates, ctx) {
      Some(winner) => {
        tracing::debug!(
          %slot_key,
          device = %ctx.device,
          considered,
          placement_id = %winner.placement_id,
          "slot resolved"
        );
        Resolution::Resolved(winner)
      }
      None => {
        tracing::debug!(%slot_key, device = %ctx.device, considered, "slot vacant");
        Resolution::Vacant
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use uuid::Uuid;

  use super::*;
  use crate::{
    memory::MemoryStore,
    placement::{ContentType, DeviceScope, NewPlacement},
  };

  fn hero() -> SlotKey { SlotKey::new("home.hero").unwrap() }

  fn placement(priority: i32, created_at: DateTime<Utc>) -> Placement {
    Placement {
      placement_id: Uuid::new_v4(),
      slot_key: hero(),
      content_type: ContentType::Video,
      content_id: Some(format!("p{priority}")),
      priority,
      active: true,
      starts_at: None,
      ends_at: None,
      device_scope: DeviceScope::All,
      metadata: serde_json::json!({}),
      created_at,
      updated_by: Uuid::new_v4(),
    }
  }

  fn desktop_now() -> ResolveContext { ResolveContext::current(Device::Desktop) }

  #[test]
  fn empty_set_has_no_winner() {
    assert!(select_winner(Vec::new(), &desktop_now()).is_none());
  }

  #[test]
  fn highest_priority_wins() {
    let now = Utc::now();
    let p1 = placement(1, now);
    let p5 = placement(5, now - Duration::hours(1));
    let winner = select_winner(vec![p1, p5.clone()], &desktop_now()).unwrap();
    assert_eq!(winner.placement_id, p5.placement_id);
  }

  #[test]
  fn equal_priority_goes_to_most_recent() {
    let now = Utc::now();
    let older = placement(3, now - Duration::minutes(10));
    let newer = placement(3, now - Duration::minutes(1));
    let winner = select_winner(vec![older.clone(), newer.clone()], &desktop_now()).unwrap();
    assert_eq!(winner.placement_id, newer.placement_id);

    // Order of candidates does not matter.
    let winner = select_winner(vec![newer.clone(), older], &desktop_now()).unwrap();
    assert_eq!(winner.placement_id, newer.placement_id);
  }

  #[test]
  fn expired_placement_is_never_returned() {
    let now = Utc::now();
    let mut expired = placement(100, now - Duration::days(2));
    expired.ends_at = Some(now - Duration::days(1));
    assert!(select_winner(vec![expired], &ResolveContext::new(Device::Desktop, now)).is_none());
  }

  #[test]
  fn not_yet_started_placement_is_skipped() {
    let now = Utc::now();
    let mut future = placement(9, now);
    future.starts_at = Some(now + Duration::hours(1));
    let current = placement(1, now - Duration::hours(1));
    let ctx = ResolveContext::new(Device::Desktop, now);
    let winner = select_winner(vec![future, current.clone()], &ctx).unwrap();
    assert_eq!(winner.placement_id, current.placement_id);
  }

  #[test]
  fn device_scope_excludes_other_devices() {
    let mut mobile_only = placement(10, Utc::now());
    mobile_only.device_scope = DeviceScope::Mobile;
    assert!(select_winner(vec![mobile_only.clone()], &desktop_now()).is_none());

    let ctx = ResolveContext::current(Device::Mobile);
    assert!(select_winner(vec![mobile_only], &ctx).is_some());
  }

  #[test]
  fn inactive_rows_are_ignored_even_if_passed_in() {
    let mut retired = placement(10, Utc::now());
    retired.active = false;
    assert!(select_winner(vec![retired], &desktop_now()).is_none());
  }

  #[tokio::test]
  async fn resolve_against_store() {
    let store = Arc::new(MemoryStore::default());
    let resolver = Resolver::new(store.clone());
    let cancel = CancellationToken::new();
    let actor = Uuid::new_v4();

    let out = resolver.resolve(&hero(), &desktop_now(), &cancel).await.unwrap();
    assert_eq!(out, Resolution::Vacant);

    let mut low = NewPlacement::new(hero(), ContentType::Video, Some("1".into()), actor);
    low.priority = 1;
    let mut high = NewPlacement::new(hero(), ContentType::Article, Some("5".into()), actor);
    high.priority = 5;
    store.create(low).await.unwrap();
    let high = store.create(high).await.unwrap();
    store.create(NewPlacement::new(hero(), ContentType::Video, Some("0".into()), actor)).await.unwrap();

    let out = resolver.resolve(&hero(), &desktop_now(), &cancel).await.unwrap();
    assert_eq!(out.placement().map(|p| p.placement_id), Some(high.placement_id));
  }

  #[tokio::test]
  async fn store_failure_is_resolution_unavailable() {
    let store = Arc::new(MemoryStore::default());
    store.set_unavailable(true);
    let resolver = Resolver::new(store);

    let err = resolver
      .resolve(&hero(), &desktop_now(), &CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ResolutionUnavailable { .. }));
  }

  #[tokio::test]
  async fn cancelled_token_yields_no_information() {
    let store = Arc::new(MemoryStore::default());
    store
      .create(NewPlacement::new(hero(), ContentType::Video, Some("42".into()), Uuid::new_v4()))
      .await
      .unwrap();
    let resolver = Resolver::new(store);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let out = resolver.resolve(&hero(), &desktop_now(), &cancel).await.unwrap();
    assert_eq!(out, Resolution::Cancelled);
  }
}
