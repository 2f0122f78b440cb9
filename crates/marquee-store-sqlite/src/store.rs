//! [`SqliteStore`]: the SQLite implementation of the core storage traits.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use marquee_core::{
  audit::{AuditEntry, AuditSink, NewAuditEntry},
  content::{ContentCatalog, ContentMirror, ContentQuery, ContentRef, ContentSummary},
  placement::{NewPlacement, Placement, SlotKey},
  store::{Fetch, PlacementQuery, PlacementStore},
  walkthrough::WalkthroughMemory,
};

use crate::{
  Error, Result,
  chain::{ChainReport, compute_integrity_hash},
  encode::{
    AUDIT_COLUMNS, PLACEMENT_COLUMNS, RawAuditEntry, RawContent, RawPlacement,
    encode_content_type, encode_device_scope, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Marquee store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn active_rows(&self, slot_key: &SlotKey) -> Result<Vec<Placement>> {
    let key = slot_key.as_str().to_owned();

    let raws: Vec<RawPlacement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PLACEMENT_COLUMNS} FROM placements
           WHERE slot_key = ?1 AND active = 1
           ORDER BY priority DESC, created_at DESC, seq DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key], RawPlacement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPlacement::into_placement).collect()
  }

  // ── Content catalog mirror ────────────────────────────────────────────────

  /// Insert or replace a content item in the local catalog.
  pub async fn register_content(&self, summary: ContentSummary) -> Result<()> {
    let type_str = encode_content_type(summary.content.content_type);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO content_items (content_type, content_id, title, thumbnail_url, href)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (content_type, content_id) DO UPDATE SET
             title = excluded.title,
             thumbnail_url = excluded.thumbnail_url,
             href = excluded.href",
          rusqlite::params![
            type_str,
            summary.content.content_id,
            summary.title,
            summary.thumbnail_url,
            summary.href,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Audit reads ───────────────────────────────────────────────────────────

  async fn audit_rows(&self, target_id: Option<Uuid>) -> Result<Vec<RawAuditEntry>> {
    let target = target_id.map(encode_uuid);

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {AUDIT_COLUMNS} FROM audit_log
           WHERE ?1 IS NULL OR target_id = ?1
           ORDER BY seq"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![target], RawAuditEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(raws)
  }

  /// Audit entries in write order, optionally only those about `target_id`.
  pub async fn audit_entries(&self, target_id: Option<Uuid>) -> Result<Vec<AuditEntry>> {
    self
      .audit_rows(target_id)
      .await?
      .into_iter()
      .map(RawAuditEntry::into_entry)
      .collect()
  }

  /// Recompute the hash chain from the first entry and report where, if
  /// anywhere, it breaks.
  pub async fn verify_audit_chain(&self) -> Result<ChainReport> {
    let rows = self.audit_rows(None).await?;

    let mut verified_entries = 0;
    let mut prev: Option<String> = None;
    for row in rows {
      let expected = compute_integrity_hash(prev.as_deref(), &row.chain_payload());
      if expected != row.integrity_hash {
        // A mangled id still marks the break, as the nil uuid.
        let first_break = Uuid::parse_str(&row.entry_id).unwrap_or(Uuid::nil());
        tracing::warn!(%first_break, verified_entries, "audit chain broken");
        return Ok(ChainReport { verified_entries, first_break: Some(first_break) });
      }
      verified_entries += 1;
      prev = Some(row.integrity_hash);
    }

    Ok(ChainReport { verified_entries, first_break: None })
  }
}

// ─── PlacementStore impl ─────────────────────────────────────────────────────

impl PlacementStore for SqliteStore {
  type Error = Error;

  async fn active_for_slot(
    &self,
    slot_key: &SlotKey,
    cancel: &CancellationToken,
  ) -> Result<Fetch<Vec<Placement>>> {
    // The query itself runs to completion on the connection thread; a fired
    // token only discards its result.
    tokio::select! {
      biased;
      () = cancel.cancelled() => Ok(Fetch::Cancelled),
      rows = self.active_rows(slot_key) => rows.map(Fetch::Ready),
    }
  }

  async fn get_placement(&self, id: Uuid) -> Result<Option<Placement>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawPlacement> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PLACEMENT_COLUMNS} FROM placements WHERE placement_id = ?1"),
              rusqlite::params![id_str],
              RawPlacement::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPlacement::into_placement).transpose()
  }

  async fn history(&self, query: &PlacementQuery) -> Result<Vec<Placement>> {
    let key = query.slot_key.as_str().to_owned();
    let include_inactive = query.include_inactive;
    let limit = query.limit.unwrap_or(PlacementQuery::DEFAULT_LIMIT) as i64;

    let raws: Vec<RawPlacement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PLACEMENT_COLUMNS} FROM placements
           WHERE slot_key = ?1 AND (?2 OR active = 1)
           ORDER BY seq DESC
           LIMIT ?3"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![key, include_inactive, limit], RawPlacement::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPlacement::into_placement).collect()
  }

  async fn create(&self, input: NewPlacement) -> Result<Placement> {
    input.validate()?;

    let placement = Placement {
      placement_id: Uuid::new_v4(),
      slot_key:     input.slot_key,
      content_type: input.content_type,
      content_id:   input.content_id,
      priority:     input.priority,
      active:       true,
      starts_at:    input.starts_at,
      ends_at:      input.ends_at,
      device_scope: input.device_scope,
      metadata:     input.metadata,
      created_at:   Utc::now(),
      updated_by:   input.updated_by,
    };

    let id_str       = encode_uuid(placement.placement_id);
    let key_str      = placement.slot_key.as_str().to_owned();
    let type_str     = encode_content_type(placement.content_type);
    let content_id   = placement.content_id.clone();
    let priority     = placement.priority;
    let starts_str   = placement.starts_at.map(encode_dt);
    let ends_str     = placement.ends_at.map(encode_dt);
    let scope_str    = encode_device_scope(placement.device_scope);
    let metadata_str = serde_json::to_string(&placement.metadata)?;
    let created_str  = encode_dt(placement.created_at);
    let by_str       = encode_uuid(placement.updated_by);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO placements (
             placement_id, slot_key, content_type, content_id, priority, active,
             starts_at, ends_at, device_scope, metadata, created_at, updated_by
           ) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            id_str,
            key_str,
            type_str,
            content_id,
            priority,
            starts_str,
            ends_str,
            scope_str,
            metadata_str,
            created_str,
            by_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(placement)
  }

  async fn deactivate(&self, id: Uuid, actor: Uuid) -> Result<Option<Placement>> {
    let id_str = encode_uuid(id);
    let actor_str = encode_uuid(actor);

    let raw: Option<RawPlacement> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "UPDATE placements SET active = 0, updated_by = ?2
           WHERE placement_id = ?1 AND active = 1",
          rusqlite::params![id_str, actor_str],
        )?;
        let row = tx
          .query_row(
            &format!("SELECT {PLACEMENT_COLUMNS} FROM placements WHERE placement_id = ?1"),
            rusqlite::params![id_str],
            RawPlacement::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(row)
      })
      .await?;

    raw.map(RawPlacement::into_placement).transpose()
  }
}

// ─── AuditSink impl ──────────────────────────────────────────────────────────

impl AuditSink for SqliteStore {
  type Error = Error;

  async fn record(&self, input: NewAuditEntry) -> Result<AuditEntry> {
    let entry = AuditEntry::from_new(input, Utc::now());
    let mut raw = RawAuditEntry::encode(&entry)?;

    self
      .conn
      .call(move |conn| {
        // Reading the tail and appending must not interleave with another
        // writer, or two entries would chain to the same predecessor.
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let prev: Option<String> = tx
          .query_row(
            "SELECT integrity_hash FROM audit_log ORDER BY seq DESC LIMIT 1",
            [],
            |r| r.get(0),
          )
          .optional()?;
        raw.integrity_hash = compute_integrity_hash(prev.as_deref(), &raw.chain_payload());

        tx.execute(
          "INSERT INTO audit_log (
             entry_id, recorded_at, actor_id, action, target_type, target_id,
             metadata, integrity_hash
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            raw.entry_id,
            raw.recorded_at,
            raw.actor_id,
            raw.action,
            raw.target_type,
            raw.target_id,
            raw.metadata,
            raw.integrity_hash,
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }
}

// ─── ContentCatalog impl ─────────────────────────────────────────────────────

impl ContentCatalog for SqliteStore {
  type Error = Error;

  async fn describe(&self, content: &ContentRef) -> Result<Option<ContentSummary>> {
    let type_str = encode_content_type(content.content_type);
    let id = content.content_id.clone();

    let raw: Option<RawContent> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT content_type, content_id, title, thumbnail_url, href
               FROM content_items WHERE content_type = ?1 AND content_id = ?2",
              rusqlite::params![type_str, id],
              RawContent::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawContent::into_summary).transpose()
  }

  async fn candidates(&self, query: &ContentQuery) -> Result<Vec<ContentSummary>> {
    let pattern = query.text.as_deref().map(|t| format!("%{t}%"));

    let raws: Vec<RawContent> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT content_type, content_id, title, thumbnail_url, href
           FROM content_items
           WHERE ?1 IS NULL OR title LIKE ?1
           ORDER BY title, content_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], RawContent::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut found = Vec::new();
    for raw in raws {
      let summary = raw.into_summary()?;
      if query.matches(&summary) {
        found.push(summary);
      }
    }
    found.truncate(query.limit.unwrap_or(ContentQuery::DEFAULT_LIMIT));
    Ok(found)
  }
}

impl ContentMirror for SqliteStore {
  async fn register(&self, summary: ContentSummary) -> Result<()> { self.register_content(summary).await }
}

// ─── WalkthroughMemory impl ──────────────────────────────────────────────────

impl WalkthroughMemory for SqliteStore {
  type Error = Error;

  async fn is_completed(&self, operator_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(operator_id);

    let found = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM walkthrough_completions WHERE operator_id = ?1",
              rusqlite::params![id_str],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;
    Ok(found)
  }

  async fn mark_completed(&self, operator_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(operator_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO walkthrough_completions (operator_id, completed_at)
           VALUES (?1, ?2)",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
