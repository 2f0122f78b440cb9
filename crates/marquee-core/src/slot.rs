//! The declarative slot binding.
//!
//! A page declares a [`Slot`] with a key, the content types it accepts, and a
//! fallback. The slot asks the [`Resolver`] for an override and renders
//! either the resolved content or its fallback. It never fails and never
//! knows whether anyone is editing the page.

use std::{
  collections::BTreeMap,
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
  },
};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  Error, Result,
  placement::{ContentType, Placement, SlotKey},
  resolver::{Resolution, ResolveContext, Resolver},
  store::PlacementStore,
};

// ─── Descriptor ──────────────────────────────────────────────────────────────

/// Attribute carrying the slot key on a rendered region.
pub const ATTR_SLOT_KEY: &str = "data-slot-key";
/// Attribute carrying the comma-separated accepted types on a rendered region.
pub const ATTR_SLOT_ACCEPTS: &str = "data-slot-accepts";

/// Attributes of a rendered, addressable region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionAttributes(BTreeMap<String, String>);

impl RegionAttributes {
  pub fn get(&self, name: &str) -> Option<&str> { self.0.get(name).map(String::as_str) }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RegionAttributes {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
  }
}

/// The addressable label of a slot: its key and the types it accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDescriptor {
  pub key:     SlotKey,
  pub accepts: Vec<ContentType>,
}

impl SlotDescriptor {
  pub fn new(key: SlotKey, accepts: impl IntoIterator<Item = ContentType>) -> Self {
    let mut unique = Vec::new();
    for content_type in accepts {
      if !unique.contains(&content_type) {
        unique.push(content_type);
      }
    }
    Self { key, accepts: unique }
  }

  pub fn accepts(&self, content_type: ContentType) -> bool { self.accepts.contains(&content_type) }

  /// Stable element id for the rendered region.
  pub fn region_id(&self) -> String { format!("slot-{}", self.key.as_str().replace('.', "-")) }

  /// The attributes a renderer puts on the region so it can be discovered.
  pub fn region(&self) -> RegionAttributes {
    [
      ("id", self.region_id()),
      (ATTR_SLOT_KEY, self.key.to_string()),
      (ATTR_SLOT_ACCEPTS, ContentType::join(&self.accepts)),
    ]
    .into_iter()
    .collect()
  }

  /// Map a discovered region back to its descriptor.
  pub fn from_region(attrs: &RegionAttributes) -> Result<Self> {
    let key: SlotKey = attrs
      .get(ATTR_SLOT_KEY)
      .ok_or_else(|| Error::Validation(format!("region has no {ATTR_SLOT_KEY} attribute")))?
      .parse()?;
    let accepts = ContentType::parse_list(attrs.get(ATTR_SLOT_ACCEPTS).unwrap_or_default())?;
    if accepts.is_empty() {
      return Err(Error::Validation(format!("slot {key} accepts no content types")));
    }
    Ok(Self::new(key, accepts))
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// The slots a site declares, keyed by slot key.
#[derive(Debug, Clone, Default)]
pub struct SlotRegistry {
  slots: BTreeMap<SlotKey, SlotDescriptor>,
}

impl SlotRegistry {
  /// Declare a slot, replacing any earlier declaration of the same key.
  pub fn declare(&mut self, descriptor: SlotDescriptor) {
    self.slots.insert(descriptor.key.clone(), descriptor);
  }

  pub fn get(&self, key: &SlotKey) -> Option<&SlotDescriptor> { self.slots.get(key) }

  pub fn iter(&self) -> impl Iterator<Item = &SlotDescriptor> { self.slots.values() }

  pub fn len(&self) -> usize { self.slots.len() }

  pub fn is_empty(&self) -> bool { self.slots.is_empty() }
}

impl FromIterator<SlotDescriptor> for SlotRegistry {
  fn from_iter<I: IntoIterator<Item = SlotDescriptor>>(iter: I) -> Self {
    let mut registry = Self::default();
    for d in iter {
      registry.declare(d);
    }
    registry
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// What the render function receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContent {
  pub placement_id: Uuid,
  pub content_type: ContentType,
  pub content_id:   String,
  pub metadata:     serde_json::Value,
}

/// Why a slot is showing its fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "content_type", rename_all = "snake_case")]
pub enum FallbackReason {
  /// No placement is eligible.
  Vacant,
  /// The winning placement intentionally carries no content.
  Cleared,
  /// The winning placement's type is not accepted by this slot.
  TypeMismatch(ContentType),
  /// The placement store could not be reached.
  Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
  /// No resolution has settled yet; the fallback is shown.
  Pending,
  Showing { content: ResolvedContent },
  Fallback { reason: FallbackReason },
}

// ─── Slot ────────────────────────────────────────────────────────────────────

/// A region that shows an override when one exists and its fallback
/// otherwise.
///
/// Consecutive [`Slot::refresh`] calls are cancel-and-replace: starting a new
/// one cancels the previous fetch, and a result that arrives after a newer
/// refresh began is discarded. Dropping the slot cancels any fetch in flight.
pub struct Slot<S, F> {
  descriptor: SlotDescriptor,
  fallback:   F,
  resolver:   Resolver<S>,
  generation: AtomicU64,
  inflight:   Mutex<CancellationToken>,
  state:      watch::Sender<SlotState>,
}

impl<S, F> Slot<S, F>
where
  S: PlacementStore,
  F: Clone,
{
  pub fn new(descriptor: SlotDescriptor, fallback: F, resolver: Resolver<S>) -> Self {
    let (state, _) = watch::channel(SlotState::Pending);
    Self {
      descriptor,
      fallback,
      resolver,
      generation: AtomicU64::new(0),
      inflight: Mutex::new(CancellationToken::new()),
      state,
    }
  }

  pub fn descriptor(&self) -> &SlotDescriptor { &self.descriptor }

  pub fn state(&self) -> SlotState { self.state.borrow().clone() }

  /// Watch for state changes, e.g. to re-render.
  pub fn subscribe(&self) -> watch::Receiver<SlotState> { self.state.subscribe() }

  fn inflight(&self) -> MutexGuard<'_, CancellationToken> {
    self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Cancel the fetch in flight, if any. The current state is kept.
  pub fn cancel(&self) { self.inflight().cancel(); }

  /// Resolve the slot for `ctx` and apply the result unless a newer refresh
  /// started meanwhile. Returns the state after this call.
  pub async fn refresh(&self, ctx: ResolveContext) -> SlotState {
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let token = CancellationToken::new();
    std::mem::replace(&mut *self.inflight(), token.clone()).cancel();

    let key = &self.descriptor.key;
    let next = match self.resolver.resolve(key, &ctx, &token).await {
      Ok(Resolution::Cancelled) => return self.state(),
      Ok(Resolution::Vacant) => SlotState::Fallback { reason: FallbackReason::Vacant },
      Ok(Resolution::Resolved(placement)) => self.admit(placement),
      Err(e) => {
        tracing::warn!(slot_key = %key, error = %e, "slot resolution unavailable; showing fallback");
        SlotState::Fallback { reason: FallbackReason::Unavailable }
      }
    };

    let mut stale = false;
    self.state.send_if_modified(|current| {
      if self.generation.load(Ordering::SeqCst) != generation {
        stale = true;
        return false;
      }
      let changed = *current != next;
      *current = next.clone();
      changed
    });
    if stale {
      tracing::debug!(slot_key = %key, generation, "discarding stale resolution");
    }
    self.state()
  }

  fn admit(&self, placement: Placement) -> SlotState {
    if !self.descriptor.accepts(placement.content_type) {
      tracing::warn!(
        slot_key = %self.descriptor.key,
        placement_id = %placement.placement_id,
        content_type = %placement.content_type,
        "resolved placement has a type this slot does not accept; showing fallback"
      );
      return SlotState::Fallback {
        reason: FallbackReason::TypeMismatch(placement.content_type),
      };
    }
    match placement.content_id {
      Some(content_id) => SlotState::Showing {
        content: ResolvedContent {
          placement_id: placement.placement_id,
          content_type: placement.content_type,
          content_id,
          metadata: placement.metadata,
        },
      },
      None => SlotState::Fallback { reason: FallbackReason::Cleared },
    }
  }

  /// Render the current state: `f` for resolved content, the fallback
  /// otherwise (including while pending).
  pub fn render(&self, f: impl FnOnce(&ResolvedContent) -> F) -> F {
    match self.state() {
      SlotState::Showing { content } => f(&content),
      SlotState::Pending | SlotState::Fallback { .. } => self.fallback.clone(),
    }
  }
}

impl<S, F> Drop for Slot<S, F> {
  fn drop(&mut self) {
    self.inflight.get_mut().unwrap_or_else(PoisonError::into_inner).cancel();
  }
}
