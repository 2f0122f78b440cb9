//! Operator content-picker endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/content` | Optional `?types=video,article&text=...&limit=n` |
//! | `PUT`  | `/content/{type}/{id}` | Body: `{"title":"...","thumbnail_url":null,"href":null}` |

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use marquee_core::{
  content::{ContentCatalog as _, ContentMirror as _, ContentQuery, ContentRef, ContentSummary},
  operator::Operator,
  placement::ContentType,
};
use serde::Deserialize;

use crate::{ApiState, Backend, Catalog, error::ApiError};

#[derive(Debug, Deserialize, Default)]
pub struct CandidateParams {
  /// Comma-separated content types, e.g. `video,article`.
  pub types: Option<String>,
  pub text:  Option<String>,
  pub limit: Option<usize>,
}

/// `GET /content[?types=...][&text=...][&limit=...]`
pub async fn candidates<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Query(params): Query<CandidateParams>,
) -> Result<Json<Vec<ContentSummary>>, ApiError> {
  let query = ContentQuery {
    content_types: params.types.as_deref().map(ContentType::parse_list).transpose()?.unwrap_or_default(),
    text:          params.text.filter(|t| !t.trim().is_empty()),
    limit:         params.limit,
  };
  let found = state.catalog.candidates(&query).await.map_err(ApiError::store)?;
  Ok(Json(found))
}

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub title:         String,
  #[serde(default)]
  pub thumbnail_url: Option<String>,
  #[serde(default)]
  pub href:          Option<String>,
}

/// `PUT /content/{type}/{id}`
pub async fn register<S: Backend, C: Catalog>(
  State(state): State<Arc<ApiState<S, C>>>,
  Extension(operator): Extension<Operator>,
  Path((content_type, content_id)): Path<(ContentType, String)>,
  Json(body): Json<RegisterBody>,
) -> Result<StatusCode, ApiError> {
  operator.ensure_may_conduct()?;
  if body.title.trim().is_empty() {
    return Err(ApiError::BadRequest("title must not be blank".into()));
  }

  state
    .catalog
    .register(ContentSummary {
      content:       ContentRef { content_type, content_id },
      title:         body.title,
      thumbnail_url: body.thumbnail_url,
      href:          body.href,
    })
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
