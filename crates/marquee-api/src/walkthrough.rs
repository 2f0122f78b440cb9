//! First-run tour endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/walkthrough` | Steps and whether this operator has finished them |
//! | `POST` | `/walkthrough` | Record completion (or dismissal) |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::State,
  http::StatusCode,
};
use marquee_core::{
  operator::Operator,
  walkthrough::{STEPS, TourStep, WalkthroughMemory as _},
};
use serde::Serialize;

use crate::{ApiState, Backend, Catalog, error::ApiError};

#[derive(Debug, Serialize)]
pub struct WalkthroughStatus {
  pub completed: bool,
  pub steps:     &'static [TourStep],
}

/// `GET /walkthrough`
pub async fn status<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Extension(operator): Extension<Operator>,
) -> Result<Json<WalkthroughStatus>, ApiError> {
  let completed = state
    .store()
    .is_completed(operator.operator_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(WalkthroughStatus { completed, steps: STEPS }))
}

/// `POST /walkthrough`
pub async fn complete<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Extension(operator): Extension<Operator>,
) -> Result<StatusCode, ApiError> {
  state
    .store()
    .mark_completed(operator.operator_id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
