//! Operator placement endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/placements` | `?slot_key` required; optional `include_inactive` (default `true`), `limit` |
//! | `POST` | `/placements` | Body: [`CommitBody`]; returns 201 + audited placement |
//! | `POST` | `/placements/{id}/revert` | Body: `{"reason":"..."}`; 404 if the id is unknown |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use marquee_core::{
  Error as CoreError,
  audit::Audited,
  operator::Operator,
  placement::{ContentType, DeviceScope, NewPlacement, Placement, SlotKey},
  store::{PlacementQuery, PlacementStore as _},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, Backend, Catalog, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

fn default_true() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub slot_key:         String,
  #[serde(default = "default_true")]
  pub include_inactive: bool,
  pub limit:            Option<usize>,
}

/// `GET /placements?slot_key=<key>[&include_inactive=false][&limit=n]`
///
/// History of a slot, newest first. The key need not be declared, so rows
/// left behind by retired slots stay inspectable.
pub async fn list<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Placement>>, ApiError> {
  let query = PlacementQuery {
    slot_key:         params.slot_key.parse()?,
    include_inactive: params.include_inactive,
    limit:            params.limit,
  };
  let placements = state.store().history(&query).await.map_err(ApiError::store)?;
  Ok(Json(placements))
}

// ─── Commit ──────────────────────────────────────────────────────────────────

/// A placement to create. The same shape as [`NewPlacement`] without
/// `updated_by`, which is always the authenticated operator; a client that
/// sends one has it ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitBody {
  pub slot_key:     SlotKey,
  pub content_type: ContentType,
  /// `null` deliberately clears the slot.
  pub content_id:   Option<String>,
  #[serde(default)]
  pub priority:     i32,
  #[serde(default)]
  pub starts_at:    Option<DateTime<Utc>>,
  #[serde(default)]
  pub ends_at:      Option<DateTime<Utc>>,
  #[serde(default)]
  pub device_scope: DeviceScope,
  #[serde(default)]
  pub metadata:     Option<serde_json::Value>,
}

impl CommitBody {
  fn into_new_placement(self, actor: Uuid) -> NewPlacement {
    let mut input = NewPlacement::new(self.slot_key, self.content_type, self.content_id, actor);
    input.priority = self.priority;
    input.starts_at = self.starts_at;
    input.ends_at = self.ends_at;
    input.device_scope = self.device_scope;
    if let Some(metadata) = self.metadata.filter(serde_json::Value::is_object) {
      input.metadata = metadata;
    }
    input
  }
}

/// `POST /placements`
pub async fn commit<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Extension(operator): Extension<Operator>,
  Json(body): Json<CommitBody>,
) -> Result<impl IntoResponse, ApiError> {
  operator.ensure_may_conduct()?;

  let slot = state.slot(body.slot_key.as_str())?;
  if !slot.accepts(body.content_type) {
    return Err(
      CoreError::TypeMismatch { slot_key: slot.key.clone(), content_type: body.content_type }
        .into(),
    );
  }

  let input = body.into_new_placement(operator.operator_id);
  input.validate()?;

  let created = state.ledger.create(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Revert ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RevertBody {
  pub reason: Option<String>,
}

/// `POST /placements/{id}/revert`
pub async fn revert<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Extension(operator): Extension<Operator>,
  Path(id): Path<Uuid>,
  Json(body): Json<RevertBody>,
) -> Result<Json<Audited<Placement>>, ApiError> {
  operator.ensure_may_conduct()?;

  let reverted = state
    .ledger
    .deactivate(id, operator.operator_id, body.reason)
    .await
    .map_err(ApiError::store)?
    .ok_or(CoreError::PlacementNotFound(id))?;
  Ok(Json(reverted))
}
