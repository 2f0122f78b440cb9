//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with nanoseconds, so
//! they sort lexically in time order. Enums use their snake_case names.
//! UUIDs are stored as hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use marquee_core::{
  audit::{AuditAction, AuditEntry, AuditTarget},
  content::{ContentRef, ContentSummary},
  placement::{ContentType, DeviceScope, Placement, SlotKey},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Nanos, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Parse a strum-backed enum column.
fn decode_variant<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| Error::UnknownVariant { column, value: s.to_owned() })
}

pub fn encode_content_type(t: ContentType) -> &'static str { t.into() }

pub fn encode_device_scope(d: DeviceScope) -> &'static str { d.into() }

// ─── Placement rows ──────────────────────────────────────────────────────────

pub const PLACEMENT_COLUMNS: &str = "placement_id, slot_key, content_type, content_id, priority, \
                                     active, starts_at, ends_at, device_scope, metadata, \
                                     created_at, updated_by";

/// Raw values read directly from a `placements` row.
pub struct RawPlacement {
  pub placement_id: String,
  pub slot_key:     String,
  pub content_type: String,
  pub content_id:   Option<String>,
  pub priority:     i32,
  pub active:       bool,
  pub starts_at:    Option<String>,
  pub ends_at:      Option<String>,
  pub device_scope: String,
  pub metadata:     String,
  pub created_at:   String,
  pub updated_by:   String,
}

impl RawPlacement {
  /// Read a row selected with [`PLACEMENT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      placement_id: row.get(0)?,
      slot_key:     row.get(1)?,
      content_type: row.get(2)?,
      content_id:   row.get(3)?,
      priority:     row.get(4)?,
      active:       row.get(5)?,
      starts_at:    row.get(6)?,
      ends_at:      row.get(7)?,
      device_scope: row.get(8)?,
      metadata:     row.get(9)?,
      created_at:   row.get(10)?,
      updated_by:   row.get(11)?,
    })
  }

  pub fn into_placement(self) -> Result<Placement> {
    Ok(Placement {
      placement_id: decode_uuid(&self.placement_id)?,
      slot_key:     SlotKey::new(self.slot_key)?,
      content_type: decode_variant("content_type", &self.content_type)?,
      content_id:   self.content_id,
      priority:     self.priority,
      active:       self.active,
      starts_at:    self.starts_at.as_deref().map(decode_dt).transpose()?,
      ends_at:      self.ends_at.as_deref().map(decode_dt).transpose()?,
      device_scope: decode_variant("device_scope", &self.device_scope)?,
      metadata:     serde_json::from_str(&self.metadata)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_by:   decode_uuid(&self.updated_by)?,
    })
  }
}

// ─── Audit rows ──────────────────────────────────────────────────────────────

pub const AUDIT_COLUMNS: &str =
  "entry_id, recorded_at, actor_id, action, target_type, target_id, metadata, integrity_hash";

/// Raw strings read directly from an `audit_log` row.
pub struct RawAuditEntry {
  pub entry_id:       String,
  pub recorded_at:    String,
  pub actor_id:       String,
  pub action:         String,
  pub target_type:    String,
  pub target_id:      String,
  pub metadata:       String,
  pub integrity_hash: String,
}

impl RawAuditEntry {
  /// Build the row for `entry`; `integrity_hash` is filled in by the writer.
  pub fn encode(entry: &AuditEntry) -> Result<Self> {
    Ok(Self {
      entry_id:       encode_uuid(entry.entry_id),
      recorded_at:    encode_dt(entry.recorded_at),
      actor_id:       encode_uuid(entry.actor_id),
      action:         <&'static str>::from(entry.action).to_owned(),
      target_type:    <&'static str>::from(entry.target_type).to_owned(),
      target_id:      encode_uuid(entry.target_id),
      metadata:       serde_json::to_string(&entry.metadata)?,
      integrity_hash: String::new(),
    })
  }

  /// Read a row selected with [`AUDIT_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:       row.get(0)?,
      recorded_at:    row.get(1)?,
      actor_id:       row.get(2)?,
      action:         row.get(3)?,
      target_type:    row.get(4)?,
      target_id:      row.get(5)?,
      metadata:       row.get(6)?,
      integrity_hash: row.get(7)?,
    })
  }

  /// The stored columns the integrity hash covers, in a fixed order.
  pub fn chain_payload(&self) -> String {
    format!(
      "{}|{}|{}|{}|{}|{}|{}",
      self.entry_id,
      self.recorded_at,
      self.actor_id,
      self.action,
      self.target_type,
      self.target_id,
      self.metadata
    )
  }

  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      entry_id:    decode_uuid(&self.entry_id)?,
      recorded_at: decode_dt(&self.recorded_at)?,
      actor_id:    decode_uuid(&self.actor_id)?,
      action:      decode_variant::<AuditAction>("action", &self.action)?,
      target_type: decode_variant::<AuditTarget>("target_type", &self.target_type)?,
      target_id:   decode_uuid(&self.target_id)?,
      metadata:    serde_json::from_str(&self.metadata)?,
    })
  }
}

// ─── Content rows ────────────────────────────────────────────────────────────

/// Raw strings read directly from a `content_items` row.
pub struct RawContent {
  pub content_type:  String,
  pub content_id:    String,
  pub title:         String,
  pub thumbnail_url: Option<String>,
  pub href:          Option<String>,
}

impl RawContent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      content_type:  row.get(0)?,
      content_id:    row.get(1)?,
      title:         row.get(2)?,
      thumbnail_url: row.get(3)?,
      href:          row.get(4)?,
    })
  }

  pub fn into_summary(self) -> Result<ContentSummary> {
    Ok(ContentSummary {
      content:       ContentRef {
        content_type: decode_variant("content_type", &self.content_type)?,
        content_id:   self.content_id,
      },
      title:         self.title,
      thumbnail_url: self.thumbnail_url,
      href:          self.href,
    })
  }
}
