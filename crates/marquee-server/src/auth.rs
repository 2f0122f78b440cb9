//! HTTP Basic-auth verifier and the middleware guarding the admin routes.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use marquee_core::operator::Operator;

use crate::error::Error;

/// One login accepted by this server instance.
#[derive(Debug, Clone)]
pub struct Credential {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub operator:      Operator,
}

/// Every login accepted by this server instance.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub credentials: Vec<Credential>,
}

impl AuthConfig {
  fn find(&self, username: &str) -> Option<&Credential> {
    self.credentials.iter().find(|c| c.username == username)
  }
}

/// Verify credentials from headers and return the operator they belong to.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Operator, Error> {
  let header_val = headers
    .get(axum::http::header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  let credential = config.find(username).ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&credential.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(credential.operator.clone())
}

/// Rejects unauthenticated requests with 401 and hands the operator to the
/// handlers as an `Extension<Operator>`.
pub async fn require_operator(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let operator = verify_auth(req.headers(), &auth)?;
  tracing::debug!(operator = %operator.operator_id, path = %req.uri().path(), "authenticated");
  req.extensions_mut().insert(operator);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::{HeaderValue, header};
  use uuid::Uuid;

  fn make_config(password: &str) -> AuthConfig {
    use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
    use rand_core::OsRng;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AuthConfig {
      credentials: vec![Credential {
        username:      "ana".to_string(),
        password_hash: hash,
        operator:      Operator {
          operator_id:  Uuid::new_v4(),
          display_name: "Ana".to_string(),
          may_conduct:  true,
        },
      }],
    }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials() {
    let config = make_config("secret");
    let operator = verify_auth(&headers(&basic("ana", "secret")), &config).unwrap();
    assert_eq!(operator, config.credentials[0].operator);
  }

  #[test]
  fn wrong_password() {
    let config = make_config("secret");
    let res = verify_auth(&headers(&basic("ana", "wrong")), &config);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn unknown_user() {
    let config = make_config("secret");
    let res = verify_auth(&headers(&basic("bo", "secret")), &config);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn missing_header() {
    let config = make_config("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &config), Err(Error::Unauthorized)));
  }

  #[test]
  fn invalid_base64() {
    let config = make_config("secret");
    let res = verify_auth(&headers("Basic !!!not-base64!!!"), &config);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }

  #[test]
  fn bearer_scheme_is_rejected() {
    let config = make_config("secret");
    let res = verify_auth(&headers("Bearer abc"), &config);
    assert!(matches!(res, Err(Error::Unauthorized)));
  }
}
