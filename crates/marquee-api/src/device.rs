//! Request device extraction.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use marquee_core::device::{self, Device};

/// The device class of the requester, from `Sec-CH-UA-Mobile` and
/// `User-Agent`. Handlers let an explicit `?device=` win over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestDevice(pub Device);

impl<S: Send + Sync> FromRequestParts<S> for RequestDevice {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    Ok(Self(device::detect(header("user-agent"), header("sec-ch-ua-mobile"))))
  }
}
