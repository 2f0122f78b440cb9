//! `GET /whoami`

use axum::{Extension, Json};
use marquee_core::operator::Operator;

/// Echo the authenticated operator.
pub async fn whoami(Extension(operator): Extension<Operator>) -> Json<Operator> { Json(operator) }
