//! In-memory backends.
//!
//! [`MemoryStore`] implements every storage trait in this crate and
//! [`MemoryCatalog`] implements [`ContentCatalog`]. Both are useful for tests
//! and for embedding the engine without a database.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
  audit::{AuditEntry, AuditSink, NewAuditEntry},
  content::{ContentCatalog, ContentMirror, ContentQuery, ContentRef, ContentSummary},
  placement::{NewPlacement, Placement, SlotKey},
  store::{Fetch, PlacementQuery, PlacementStore},
  walkthrough::WalkthroughMemory,
};

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
  #[error("store unavailable")]
  Unavailable,
}

#[derive(Default)]
struct Inner {
  /// Insertion order is significant: it is the last tie-break.
  placements:   Vec<Placement>,
  audit:        Vec<AuditEntry>,
  walkthroughs: HashSet<Uuid>,
}

/// A placement store, audit sink and walkthrough memory held in process.
#[derive(Default)]
pub struct MemoryStore {
  inner:       Mutex<Inner>,
  unavailable: AtomicBool,
}

impl MemoryStore {
  fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }

  fn check(&self) -> Result<(), MemoryError> {
    if self.unavailable.load(Ordering::SeqCst) {
      Err(MemoryError::Unavailable)
    } else {
      Ok(())
    }
  }

  /// Make every subsequent call fail with [`MemoryError::Unavailable`].
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  /// Snapshot of the audit trail in write order.
  pub fn audit_entries(&self) -> Vec<AuditEntry> { self.lock().audit.clone() }
}

impl PlacementStore for MemoryStore {
  type Error = MemoryError;

  async fn active_for_slot(
    &self,
    slot_key: &SlotKey,
    cancel: &CancellationToken,
  ) -> Result<Fetch<Vec<Placement>>, MemoryError> {
    if cancel.is_cancelled() {
      return Ok(Fetch::Cancelled);
    }
    self.check()?;

    let inner = self.lock();
    let mut rows: Vec<(usize, &Placement)> = inner
      .placements
      .iter()
      .enumerate()
      .filter(|(_, p)| p.active && &p.slot_key == slot_key)
      .collect();
    rows.sort_by(|(ia, a), (ib, b)| {
      b.priority
        .cmp(&a.priority)
        .then(b.created_at.cmp(&a.created_at))
        .then(ib.cmp(ia))
    });
    Ok(Fetch::Ready(rows.into_iter().map(|(_, p)| p.clone()).collect()))
  }

  async fn get_placement(&self, id: Uuid) -> Result<Option<Placement>, MemoryError> {
    self.check()?;
    Ok(self.lock().placements.iter().find(|p| p.placement_id == id).cloned())
  }

  async fn history(&self, query: &PlacementQuery) -> Result<Vec<Placement>, MemoryError> {
    self.check()?;
    let inner = self.lock();
    Ok(
      inner
        .placements
        .iter()
        .rev()
        .filter(|p| p.slot_key == query.slot_key && (query.include_inactive || p.active))
        .take(query.limit.unwrap_or(PlacementQuery::DEFAULT_LIMIT))
        .cloned()
        .collect(),
    )
  }

  async fn create(&self, input: NewPlacement) -> Result<Placement, MemoryError> {
    self.check()?;
    let mut inner = self.lock();

    // Keep created_at strictly increasing so recency is never ambiguous.
    let mut created_at = Utc::now();
    if let Some(last) = inner.placements.iter().map(|p| p.created_at).max()
      && created_at <= last
    {
      created_at = last + Duration::microseconds(1);
    }

    let placement = Placement {
      placement_id: Uuid::new_v4(),
      slot_key: input.slot_key,
      content_type: input.content_type,
      content_id: input.content_id,
      priority: input.priority,
      active: true,
      starts_at: input.starts_at,
      ends_at: input.ends_at,
      device_scope: input.device_scope,
      metadata: input.metadata,
      created_at,
      updated_by: input.updated_by,
    };
    inner.placements.push(placement.clone());
    Ok(placement)
  }

  async fn deactivate(&self, id: Uuid, actor: Uuid) -> Result<Option<Placement>, MemoryError> {
    self.check()?;
    let mut inner = self.lock();
    let Some(row) = inner.placements.iter_mut().find(|p| p.placement_id == id) else {
      return Ok(None);
    };
    if row.active {
      row.active = false;
      row.updated_by = actor;
    }
    Ok(Some(row.clone()))
  }
}

impl AuditSink for MemoryStore {
  type Error = MemoryError;

  async fn record(&self, entry: NewAuditEntry) -> Result<AuditEntry, MemoryError> {
    self.check()?;
    let entry = AuditEntry::from_new(entry, Utc::now());
    self.lock().audit.push(entry.clone());
    Ok(entry)
  }
}

impl WalkthroughMemory for MemoryStore {
  type Error = MemoryError;

  async fn is_completed(&self, operator_id: Uuid) -> Result<bool, MemoryError> {
    self.check()?;
    Ok(self.lock().walkthroughs.contains(&operator_id))
  }

  async fn mark_completed(&self, operator_id: Uuid) -> Result<(), MemoryError> {
    self.check()?;
    self.lock().walkthroughs.insert(operator_id);
    Ok(())
  }
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// A content catalog held in process.
#[derive(Default)]
pub struct MemoryCatalog {
  items: Mutex<HashMap<ContentRef, ContentSummary>>,
}

impl MemoryCatalog {
  pub fn insert(&self, summary: ContentSummary) {
    self
      .items
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(summary.content.clone(), summary);
  }
}

impl ContentCatalog for MemoryCatalog {
  type Error = std::convert::Infallible;

  async fn describe(&self, content: &ContentRef) -> Result<Option<ContentSummary>, Self::Error> {
    Ok(self.items.lock().unwrap_or_else(PoisonError::into_inner).get(content).cloned())
  }

  async fn candidates(&self, query: &ContentQuery) -> Result<Vec<ContentSummary>, Self::Error> {
    let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
    let mut found: Vec<_> = items.values().filter(|s| query.matches(s)).cloned().collect();
    found.sort_by(|a, b| a.title.cmp(&b.title));
    found.truncate(query.limit.unwrap_or(ContentQuery::DEFAULT_LIMIT));
    Ok(found)
  }
}

impl ContentMirror for MemoryCatalog {
  async fn register(&self, summary: ContentSummary) -> Result<(), Self::Error> {
    self.insert(summary);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::placement::ContentType;

  fn summary(content_type: ContentType, id: &str, title: &str) -> ContentSummary {
    ContentSummary {
      content:       ContentRef { content_type, content_id: id.into() },
      title:         title.into(),
      thumbnail_url: None,
      href:          None,
    }
  }

  #[tokio::test]
  async fn catalog_filters_and_replaces() {
    let catalog = MemoryCatalog::default();
    catalog.register(summary(ContentType::Video, "42", "Launch keynote")).await.unwrap();
    catalog.register(summary(ContentType::Article, "7", "Launch recap")).await.unwrap();
    catalog.register(summary(ContentType::Video, "9", "Behind the scenes")).await.unwrap();

    let launch = catalog
      .candidates(&ContentQuery { text: Some("LAUNCH".into()), ..Default::default() })
      .await
      .unwrap();
    assert_eq!(launch.len(), 2);

    let videos = catalog
      .candidates(&ContentQuery { content_types: vec![ContentType::Video], ..Default::default() })
      .await
      .unwrap();
    assert_eq!(
      videos.iter().map(|s| s.title.as_str()).collect::<Vec<_>>(),
      ["Behind the scenes", "Launch keynote"]
    );

    catalog.register(summary(ContentType::Video, "42", "Keynote (final)")).await.unwrap();
    let key = ContentRef { content_type: ContentType::Video, content_id: "42".into() };
    assert_eq!(catalog.describe(&key).await.unwrap().map(|s| s.title), Some("Keynote (final)".into()));
  }

  #[tokio::test]
  async fn unavailable_store_fails_every_call() {
    let store = MemoryStore::default();
    let hero = SlotKey::new("home.hero").unwrap();
    store.set_unavailable(true);
    assert!(store.active_for_slot(&hero, &CancellationToken::new()).await.is_err());
    assert!(store.is_completed(Uuid::new_v4()).await.is_err());

    store.set_unavailable(false);
    let fetched = store.active_for_slot(&hero, &CancellationToken::new()).await.unwrap();
    assert_eq!(fetched, Fetch::Ready(vec![]));
  }

  #[tokio::test]
  async fn created_at_is_strictly_increasing() {
    let store = MemoryStore::default();
    let hero = SlotKey::new("home.hero").unwrap();
    let mut previous = None;
    for i in 0..5 {
      let input = NewPlacement::new(hero.clone(), ContentType::Video, Some(i.to_string()), Uuid::nil());
      let created = store.create(input).await.unwrap();
      if let Some(prev) = previous {
        assert!(created.created_at > prev);
      }
      previous = Some(created.created_at);
    }
  }
}
