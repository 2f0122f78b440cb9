//! Placement types, the unit of slot override.
//!
//! A placement binds a slot key to a content reference for a window of time
//! and a device scope. Placements are append-mostly: the only in-place change
//! a store ever makes is flipping `active` to `false`.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, content::ContentRef, device::Device};

// ─── SlotKey ─────────────────────────────────────────────────────────────────

/// Identifier of a named page region, e.g. `home.hero` or `sidebar.left.sky`.
///
/// Dot-separated segments of `[a-z0-9_-]`, at most 128 bytes in total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotKey(String);

impl SlotKey {
  pub const MAX_LEN: usize = 128;

  pub fn new(key: impl Into<String>) -> Result<Self, Error> {
    let key = key.into();
    let valid_segment = |seg: &str| {
      !seg.is_empty()
        && seg
          .bytes()
          .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    };
    if key.is_empty() || key.len() > Self::MAX_LEN || !key.split('.').all(valid_segment) {
      return Err(Error::InvalidSlotKey(key));
    }
    Ok(Self(key))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SlotKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl FromStr for SlotKey {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> { Self::new(s) }
}

impl TryFrom<String> for SlotKey {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Self::Error> { Self::new(s) }
}

impl From<SlotKey> for String {
  fn from(key: SlotKey) -> Self { key.0 }
}

// ─── ContentType ─────────────────────────────────────────────────────────────

/// The kind of content a placement points at.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentType {
  Video,
  Article,
  Gallery,
  Ad,
  Post,
  Product,
}

impl ContentType {
  /// Parse a comma-separated list such as `video,article`.
  pub fn parse_list(s: &str) -> Result<Vec<Self>, Error> {
    s.split(',')
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(|t| {
        t.parse()
          .map_err(|_| Error::Validation(format!("unknown content type: {t:?}")))
      })
      .collect()
  }

  /// Render a list back into its comma-separated form.
  pub fn join(types: &[Self]) -> String {
    types
      .iter()
      .map(|t| <&'static str>::from(*t))
      .collect::<Vec<_>>()
      .join(",")
  }
}

// ─── DeviceScope ─────────────────────────────────────────────────────────────

/// Which requesting devices a placement is eligible for.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceScope {
  #[default]
  All,
  Mobile,
  Desktop,
}

impl DeviceScope {
  pub fn admits(self, device: Device) -> bool {
    match self {
      Self::All => true,
      Self::Mobile => device == Device::Mobile,
      Self::Desktop => device == Device::Desktop,
    }
  }
}

// ─── Placement ───────────────────────────────────────────────────────────────

/// A persisted placement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
  pub placement_id: Uuid,
  pub slot_key:     SlotKey,
  pub content_type: ContentType,
  /// `None` when the operator intentionally cleared the slot.
  pub content_id:   Option<String>,
  /// Higher wins among simultaneously eligible placements.
  pub priority:     i32,
  /// Soft off-switch; distinct from window expiry.
  pub active:       bool,
  pub starts_at:    Option<DateTime<Utc>>,
  pub ends_at:      Option<DateTime<Utc>>,
  pub device_scope: DeviceScope,
  /// Free-form JSON object; `reason` holds the operator's note.
  pub metadata:     serde_json::Value,
  /// Store-assigned; never changes after creation.
  pub created_at:   DateTime<Utc>,
  pub updated_by:   Uuid,
}

impl Placement {
  /// Whether `now` falls inside `[starts_at, ends_at)`.
  pub fn in_window(&self, now: DateTime<Utc>) -> bool {
    self.starts_at.is_none_or(|start| start <= now)
      && self.ends_at.is_none_or(|end| end > now)
  }

  pub fn reason(&self) -> Option<&str> { self.metadata.get("reason").and_then(|r| r.as_str()) }

  pub fn content_ref(&self) -> Option<ContentRef> {
    self
      .content_id
      .as_ref()
      .map(|id| ContentRef { content_type: self.content_type, content_id: id.clone() })
  }
}

// ─── NewPlacement ────────────────────────────────────────────────────────────

/// Input to [`crate::store::PlacementStore::create`].
/// `placement_id`, `created_at` and `active` are always set by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlacement {
  pub slot_key:     SlotKey,
  pub content_type: ContentType,
  pub content_id:   Option<String>,
  #[serde(default)]
  pub priority:     i32,
  pub starts_at:    Option<DateTime<Utc>>,
  pub ends_at:      Option<DateTime<Utc>>,
  #[serde(default)]
  pub device_scope: DeviceScope,
  #[serde(default = "empty_metadata")]
  pub metadata:     serde_json::Value,
  pub updated_by:   Uuid,
}

fn empty_metadata() -> serde_json::Value { serde_json::Value::Object(Default::default()) }

impl NewPlacement {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(
    slot_key: SlotKey,
    content_type: ContentType,
    content_id: Option<String>,
    updated_by: Uuid,
  ) -> Self {
    Self {
      slot_key,
      content_type,
      content_id,
      priority: 0,
      starts_at: None,
      ends_at: None,
      device_scope: DeviceScope::All,
      metadata: empty_metadata(),
      updated_by,
    }
  }

  pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
    if !self.metadata.is_object() {
      self.metadata = empty_metadata();
    }
    if let Some(map) = self.metadata.as_object_mut() {
      map.insert("reason".into(), serde_json::Value::String(reason.into()));
    }
    self
  }

  /// Reject windows that can never be live.
  pub fn validate(&self) -> Result<(), Error> {
    if let (Some(start), Some(end)) = (self.starts_at, self.ends_at)
      && end <= start
    {
      return Err(Error::Validation(format!(
        "placement window ends ({end}) before it starts ({start})"
      )));
    }
    if self.content_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
      return Err(Error::Validation("content id must not be blank".into()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;

  #[test]
  fn slot_keys_are_validated() {
    assert!(SlotKey::new("home.hero").is_ok());
    assert!(SlotKey::new("sidebar.left.sky").is_ok());
    assert!(SlotKey::new("merch_2-col").is_ok());
    assert!(SlotKey::new("").is_err());
    assert!(SlotKey::new("home..hero").is_err());
    assert!(SlotKey::new("Home.Hero").is_err());
    assert!(SlotKey::new("home hero").is_err());
    assert!(SlotKey::new("a".repeat(SlotKey::MAX_LEN + 1)).is_err());
  }

  #[test]
  fn slot_key_rejects_invalid_json() {
    let ok: SlotKey = serde_json::from_str("\"home.hero\"").unwrap();
    assert_eq!(ok.as_str(), "home.hero");
    assert!(serde_json::from_str::<SlotKey>("\"home.\"").is_err());
  }

  #[test]
  fn content_type_list_parsing() {
    let types = ContentType::parse_list("video, article,").unwrap();
    assert_eq!(types, vec![ContentType::Video, ContentType::Article]);
    assert_eq!(ContentType::join(&types), "video,article");
    assert!(ContentType::parse_list("video,podcast").is_err());
  }

  #[test]
  fn device_scope_admission() {
    assert!(DeviceScope::All.admits(Device::Mobile));
    assert!(DeviceScope::Mobile.admits(Device::Mobile));
    assert!(!DeviceScope::Mobile.admits(Device::Desktop));
    assert!(!DeviceScope::Desktop.admits(Device::Mobile));
  }

  #[test]
  fn windows_are_half_open() {
    let now = Utc::now();
    let mut p = Placement {
      placement_id: Uuid::new_v4(),
      slot_key:     SlotKey::new("home.hero").unwrap(),
      content_type: ContentType::Video,
      content_id:   Some("42".into()),
      priority:     0,
      active:       true,
      starts_at:    Some(now),
      ends_at:      Some(now + Duration::hours(1)),
      device_scope: DeviceScope::All,
      metadata:     serde_json::json!({}),
      created_at:   now,
      updated_by:   Uuid::new_v4(),
    };
    assert!(p.in_window(now));
    assert!(!p.in_window(now + Duration::hours(1)));
    assert!(!p.in_window(now - Duration::seconds(1)));

    p.starts_at = None;
    p.ends_at = None;
    assert!(p.in_window(now - Duration::days(365)));
  }

  #[test]
  fn new_placement_validation() {
    let key = SlotKey::new("home.hero").unwrap();
    let now = Utc::now();
    let mut input = NewPlacement::new(key, ContentType::Video, Some("42".into()), Uuid::new_v4())
      .with_reason("world cup final");
    assert!(input.validate().is_ok());
    assert_eq!(input.metadata["reason"], "world cup final");

    input.starts_at = Some(now);
    input.ends_at = Some(now - Duration::minutes(5));
    assert!(matches!(input.validate(), Err(Error::Validation(_))));

    input.ends_at = None;
    input.content_id = Some("  ".into());
    assert!(matches!(input.validate(), Err(Error::Validation(_))));
  }
}
