//! Operator presence: who is looking at which slot.
//!
//! Sits beside the resolution contract and never feeds into it. Sessions
//! publish on a [`PresenceHub`]; anyone interested keeps a [`PresenceRoster`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::placement::SlotKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "activity", rename_all = "snake_case")]
pub enum Activity {
  /// Conduction mode is on but no slot is selected.
  Idle,
  Inspecting { slot_key: SlotKey },
  Editing { slot_key: SlotKey },
  Left,
}

impl Activity {
  pub fn slot_key(&self) -> Option<&SlotKey> {
    match self {
      Self::Inspecting { slot_key } | Self::Editing { slot_key } => Some(slot_key),
      Self::Idle | Self::Left => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
  pub operator_id:  Uuid,
  pub display_name: String,
  pub activity:     Activity,
  pub at:           DateTime<Utc>,
}

/// Broadcast channel for presence events. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct PresenceHub {
  tx: broadcast::Sender<PresenceEvent>,
}

impl Default for PresenceHub {
  fn default() -> Self { Self::new(64) }
}

impl PresenceHub {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> { self.tx.subscribe() }

  /// Publish an event; returns how many subscribers received it.
  pub fn publish(&self, event: PresenceEvent) -> usize { self.tx.send(event).unwrap_or(0) }
}

/// Latest activity per operator.
#[derive(Debug, Clone, Default)]
pub struct PresenceRoster {
  latest: HashMap<Uuid, PresenceEvent>,
}

impl PresenceRoster {
  pub fn apply(&mut self, event: PresenceEvent) {
    if event.activity == Activity::Left {
      self.latest.remove(&event.operator_id);
    } else {
      self.latest.insert(event.operator_id, event);
    }
  }

  /// Operators currently inspecting or editing `slot_key`.
  pub fn on_slot(&self, slot_key: &SlotKey) -> Vec<&PresenceEvent> {
    let mut here: Vec<_> = self
      .latest
      .values()
      .filter(|e| e.activity.slot_key() == Some(slot_key))
      .collect();
    here.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    here
  }

  pub fn len(&self) -> usize { self.latest.len() }

  pub fn is_empty(&self) -> bool { self.latest.is_empty() }
}
