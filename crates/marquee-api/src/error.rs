//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  /// The placement store could not be reached.
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
      ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<marquee_core::Error> for ApiError {
  fn from(e: marquee_core::Error) -> Self {
    use marquee_core::Error as E;
    match e {
      E::PlacementNotFound(_) => ApiError::NotFound(e.to_string()),
      E::Unauthorized(_) => ApiError::Forbidden(e.to_string()),
      E::ResolutionUnavailable { .. } => ApiError::Unavailable(e.to_string()),
      E::TypeMismatch { .. }
      | E::Validation(_)
      | E::InvalidSlotKey(_)
      | E::InvalidState { .. } => ApiError::BadRequest(e.to_string()),
      E::Backend(_) | E::Serialization(_) => ApiError::Store(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self {
      ApiError::NotFound(m)
      | ApiError::BadRequest(m)
      | ApiError::Forbidden(m)
      | ApiError::Unavailable(m) => m.clone(),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        e.to_string()
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use marquee_core::placement::{ContentType, SlotKey};
  use uuid::Uuid;

  use super::*;

  #[test]
  fn core_errors_map_to_statuses() {
    let status = |e: marquee_core::Error| ApiError::from(e).status();
    assert_eq!(status(marquee_core::Error::PlacementNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(status(marquee_core::Error::Unauthorized(Uuid::nil())), StatusCode::FORBIDDEN);
    assert_eq!(
      status(marquee_core::Error::TypeMismatch {
        slot_key:     SlotKey::new("home.hero").unwrap(),
        content_type: ContentType::Ad,
      }),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(
      status(marquee_core::Error::InvalidSlotKey("Home".into())),
      StatusCode::BAD_REQUEST
    );
  }
}
