//! Public slot endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/slots` | Declared slots and what they accept |
//! | `GET`  | `/slots/{key}/resolve` | Winning placement, if any; optional `?device=&at=` |
//! | `GET`  | `/slots/{key}/content` | What the slot renders; optional `?device=&at=&fallback=` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use marquee_core::{
  content::{ContentCatalog as _, ContentRef, ContentSummary},
  device::Device,
  placement::{Placement, SlotKey},
  resolver::{ResolveContext, Resolution},
  slot::{ResolvedContent, Slot, SlotDescriptor, SlotState},
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{ApiState, Backend, Catalog, device::RequestDevice, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct ResolveParams {
  /// Overrides the device detected from request headers.
  pub device:   Option<Device>,
  /// Resolve as of this instant instead of now.
  pub at:       Option<DateTime<Utc>>,
  /// Opaque value echoed back when the slot falls back.
  pub fallback: Option<String>,
}

impl ResolveParams {
  fn context(&self, detected: Device) -> ResolveContext {
    ResolveContext::new(self.device.unwrap_or(detected), self.at.unwrap_or_else(Utc::now))
  }
}

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /slots`
pub async fn list<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
) -> Json<Vec<SlotDescriptor>> {
  Json(state.slots.iter().cloned().collect())
}

// ─── Resolve ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
  pub slot_key:  SlotKey,
  pub device:    Device,
  pub at:        DateTime<Utc>,
  /// `None` when the slot is vacant.
  pub placement: Option<Placement>,
}

/// `GET /slots/{key}/resolve`
pub async fn resolve<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Path(key): Path<String>,
  RequestDevice(detected): RequestDevice,
  Query(params): Query<ResolveParams>,
) -> Result<Json<ResolveResponse>, ApiError> {
  let slot_key = state.slot(&key)?.key.clone();
  let ctx = params.context(detected);

  let resolution = state.resolver.resolve(&slot_key, &ctx, &CancellationToken::new()).await?;
  let placement = match resolution {
    Resolution::Resolved(p) => Some(p),
    Resolution::Vacant | Resolution::Cancelled => None,
  };

  Ok(Json(ResolveResponse { slot_key, device: ctx.device, at: ctx.now, placement }))
}

// ─── Content ─────────────────────────────────────────────────────────────────

/// What a slot renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rendered {
  Content {
    content: ResolvedContent,
    /// Display metadata from the content catalog, when it knows the item.
    summary: Option<ContentSummary>,
  },
  Fallback {
    fallback: Option<String>,
  },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotContentResponse {
  pub slot_key: SlotKey,
  pub device:   Device,
  pub state:    SlotState,
  pub rendered: Rendered,
}

/// `GET /slots/{key}/content`
///
/// Binds the slot server-side. Resolution failures never surface as errors
/// here: the slot falls back and `state` says why.
pub async fn content<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Path(key): Path<String>,
  RequestDevice(detected): RequestDevice,
  Query(params): Query<ResolveParams>,
) -> Result<Json<SlotContentResponse>, ApiError> {
  let descriptor = state.slot(&key)?.clone();
  let ctx = params.context(detected);

  let slot = Slot::new(
    descriptor,
    Rendered::Fallback { fallback: params.fallback.clone() },
    state.resolver.clone(),
  );
  let slot_state = slot.refresh(ctx).await;

  let mut rendered =
    slot.render(|c| Rendered::Content { content: c.clone(), summary: None });
  if let Rendered::Content { content, summary } = &mut rendered {
    let content_ref = ContentRef {
      content_type: content.content_type,
      content_id:   content.content_id.clone(),
    };
    *summary = match state.catalog.describe(&content_ref).await {
      Ok(found) => found,
      Err(e) => {
        tracing::warn!(content_id = %content_ref.content_id, error = %e, "content catalog lookup failed");
        None
      }
    };
  }

  Ok(Json(SlotContentResponse {
    slot_key: slot.descriptor().key.clone(),
    device: ctx.device,
    state: slot_state,
    rendered,
  }))
}
