//! Error types for `marquee-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::placement::{ContentType, SlotKey};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The placement store could not be reached while resolving a slot.
  #[error("resolution unavailable for slot {slot_key}: {source}")]
  ResolutionUnavailable {
    slot_key: SlotKey,
    #[source]
    source:   BoxError,
  },

  #[error("slot {slot_key} does not accept {content_type} content")]
  TypeMismatch {
    slot_key:     SlotKey,
    content_type: ContentType,
  },

  #[error("placement not found: {0}")]
  PlacementNotFound(Uuid),

  #[error("operator {0} may not conduct placements")]
  Unauthorized(Uuid),

  #[error("{0}")]
  Validation(String),

  #[error("invalid slot key: {0:?}")]
  InvalidSlotKey(String),

  #[error("cannot {action} while {state}")]
  InvalidState {
    action: &'static str,
    state:  &'static str,
  },

  #[error("backend error: {0}")]
  Backend(#[source] BoxError),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Backend(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
