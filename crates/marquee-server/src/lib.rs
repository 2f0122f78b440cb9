//! HTTP server for Marquee.
//!
//! Mounts the public resolution routes under `/api` and the operator routes
//! under `/api/admin`, the latter behind HTTP Basic auth. Operators and
//! declared slots come from [`ServerConfig`].

pub mod auth;
pub mod error;

pub use error::Error;

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use axum::{Router, middleware};
use marquee_api::{ApiState, Backend, Catalog};
use marquee_core::{
  operator::Operator,
  placement::{ContentType, SlotKey},
  slot::{SlotDescriptor, SlotRegistry},
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use auth::{AuthConfig, Credential};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub operators:  Vec<OperatorConfig>,
  #[serde(default)]
  pub slots:      Vec<SlotConfig>,
}

/// One `[[operators]]` table.
#[derive(Deserialize, Clone)]
pub struct OperatorConfig {
  pub operator_id:   Uuid,
  pub username:      String,
  pub display_name:  String,
  /// Generate with `marquee-server --hash-password`.
  pub password_hash: String,
  #[serde(default)]
  pub may_conduct:   bool,
}

/// One `[[slots]]` table.
#[derive(Deserialize, Clone)]
pub struct SlotConfig {
  pub key:     SlotKey,
  pub accepts: Vec<ContentType>,
}

impl ServerConfig {
  /// The declared slots. Every slot must accept at least one type and be
  /// declared once.
  pub fn slot_registry(&self) -> Result<SlotRegistry, Error> {
    let mut seen = HashSet::new();
    for slot in &self.slots {
      if slot.accepts.is_empty() {
        return Err(Error::Config(format!("slot {} accepts no content types", slot.key)));
      }
      if !seen.insert(&slot.key) {
        return Err(Error::Config(format!("slot {} is declared twice", slot.key)));
      }
    }
    Ok(
      self
        .slots
        .iter()
        .map(|s| SlotDescriptor::new(s.key.clone(), s.accepts.iter().copied()))
        .collect(),
    )
  }

  pub fn auth_config(&self) -> Result<AuthConfig, Error> {
    let mut seen = HashSet::new();
    let credentials = self
      .operators
      .iter()
      .map(|o| {
        if !seen.insert(o.username.as_str()) {
          return Err(Error::Config(format!("username {:?} is used twice", o.username)));
        }
        Ok(Credential {
          username:      o.username.clone(),
          password_hash: o.password_hash.clone(),
          operator:      Operator {
            operator_id:  o.operator_id,
            display_name: o.display_name.clone(),
            may_conduct:  o.may_conduct,
          },
        })
      })
      .collect::<Result<_, _>>()?;
    Ok(AuthConfig { credentials })
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs.
pub struct AppState<S, C> {
  pub api:  Arc<ApiState<S, C>>,
  pub auth: Arc<AuthConfig>,
}

impl<S: Backend, C: Catalog> AppState<S, C> {
  pub fn from_config(config: &ServerConfig, store: Arc<S>, catalog: Arc<C>) -> Result<Self, Error> {
    Ok(Self {
      api:  Arc::new(ApiState::new(store, catalog, config.slot_registry()?)),
      auth: Arc::new(config.auth_config()?),
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full axum [`Router`].
pub fn router<S: Backend, C: Catalog>(state: AppState<S, C>) -> Router {
  let admin = marquee_api::admin_router(state.api.clone())
    .layer(middleware::from_fn_with_state(state.auth, auth::require_operator));

  let api = marquee_api::public_router(state.api).nest("/admin", admin);

  Router::new()
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::OnceLock;

  use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
  };
  use base64::Engine as _;
  use marquee_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt;

  const PASSWORD: &str = "secret";

  fn ana_id() -> Uuid { Uuid::from_u128(1) }

  fn password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH
      .get_or_init(|| {
        use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
        use rand_core::OsRng;
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
          .hash_password(PASSWORD.as_bytes(), &salt)
          .unwrap()
          .to_string()
      })
      .clone()
  }

  fn test_config() -> ServerConfig {
    ServerConfig {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from(":memory:"),
      operators:  vec![
        OperatorConfig {
          operator_id:   ana_id(),
          username:      "ana".to_string(),
          display_name:  "Ana".to_string(),
          password_hash: password_hash(),
          may_conduct:   true,
        },
        OperatorConfig {
          operator_id:   Uuid::from_u128(2),
          username:      "bo".to_string(),
          display_name:  "Bo".to_string(),
          password_hash: password_hash(),
          may_conduct:   false,
        },
      ],
      slots:      vec![
        SlotConfig {
          key:     SlotKey::new("home.hero").unwrap(),
          accepts: vec![ContentType::Video, ContentType::Article],
        },
        SlotConfig {
          key:     SlotKey::new("sidebar.left.sky").unwrap(),
          accepts: vec![ContentType::Ad],
        },
      ],
    }
  }

  async fn app() -> Router {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    router(AppState::from_config(&test_config(), store.clone(), store).unwrap())
  }

  fn basic(user: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{PASSWORD}"));
    format!("Basic {encoded}")
  }

  struct Call<'a> {
    method:  Method,
    uri:     &'a str,
    user:    Option<&'a str>,
    headers: Vec<(&'static str, &'a str)>,
    body:    Option<Value>,
  }

  impl<'a> Call<'a> {
    fn get(uri: &'a str) -> Self {
      Self { method: Method::GET, uri, user: None, headers: vec![], body: None }
    }

    fn post(uri: &'a str, body: Value) -> Self {
      Self { method: Method::POST, uri, user: None, headers: vec![], body: Some(body) }
    }

    fn put(uri: &'a str, body: Value) -> Self {
      Self { method: Method::PUT, uri, user: None, headers: vec![], body: Some(body) }
    }

    fn as_user(mut self, user: &'a str) -> Self {
      self.user = Some(user);
      self
    }

    fn header(mut self, name: &'static str, value: &'a str) -> Self {
      self.headers.push((name, value));
      self
    }

    async fn send(self, app: &Router) -> (StatusCode, HeaderMap, Value) {
      let mut req = Request::builder().method(self.method).uri(self.uri);
      if let Some(user) = self.user {
        req = req.header(header::AUTHORIZATION, basic(user));
      }
      for (name, value) in self.headers {
        req = req.header(name, value);
      }
      let req = match self.body {
        Some(body) => req
          .header(header::CONTENT_TYPE, "application/json")
          .body(Body::from(body.to_string()))
          .unwrap(),
        None => req.body(Body::empty()).unwrap(),
      };

      let resp = app.clone().oneshot(req).await.unwrap();
      let status = resp.status();
      let headers = resp.headers().clone();
      let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
      let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
      (status, headers, json)
    }
  }

  // ─── Config ────────────────────────────────────────────────────────────────

  #[test]
  fn slot_without_types_is_rejected() {
    let mut config = test_config();
    config.slots[0].accepts.clear();
    assert!(matches!(config.slot_registry(), Err(Error::Config(_))));
  }

  #[test]
  fn duplicate_username_is_rejected() {
    let mut config = test_config();
    config.operators[1].username = "ana".to_string();
    assert!(matches!(config.auth_config(), Err(Error::Config(_))));
  }

  // ─── Auth ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn public_routes_need_no_auth() {
    let app = app().await;
    let (status, _, body) = Call::get("/api/slots").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
  }

  #[tokio::test]
  async fn admin_routes_require_auth() {
    let app = app().await;
    let (status, headers, body) = Call::get("/api/admin/whoami").send(&app).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Basic realm=\"marquee\"");
    assert_eq!(body["error"], "unauthorized");
  }

  #[tokio::test]
  async fn whoami_returns_the_operator() {
    let app = app().await;
    let (status, _, body) = Call::get("/api/admin/whoami").as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display_name"], "Ana");
    assert_eq!(body["may_conduct"], true);
  }

  #[tokio::test]
  async fn viewer_may_inspect_but_not_commit() {
    let app = app().await;
    let (status, _, _) = Call::get("/api/admin/placements?slot_key=home.hero")
      .as_user("bo")
      .send(&app)
      .await;
    assert_eq!(status, StatusCode::OK);

    let commit = json!({ "slot_key": "home.hero", "content_type": "video", "content_id": "42" });
    let (status, _, _) = Call::post("/api/admin/placements", commit).as_user("bo").send(&app).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
  }

  // ─── Conduction over HTTP ──────────────────────────────────────────────────

  #[tokio::test]
  async fn hero_commit_resolve_revert() {
    let app = app().await;

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve").send(&app).await;
    assert!(body["placement"].is_null());

    let (_, _, body) = Call::get("/api/slots/home.hero/content?fallback=house-promo").send(&app).await;
    assert_eq!(body["rendered"]["kind"], "fallback");
    assert_eq!(body["rendered"]["fallback"], "house-promo");
    assert_eq!(body["state"]["reason"]["reason"], "vacant");

    let (status, _, _) = Call::put("/api/admin/content/video/42", json!({ "title": "Launch keynote" }))
      .as_user("ana")
      .send(&app)
      .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let commit = json!({
      "slot_key": "home.hero",
      "content_type": "video",
      "content_id": "42",
      "metadata": { "reason": "launch" },
    });
    let (status, _, created) = Call::post("/api/admin/placements", commit).as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["value"]["updated_by"], ana_id().to_string());
    assert_eq!(created["audit"]["status"], "recorded");
    let id = created["value"]["placement_id"].as_str().unwrap().to_string();

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve").send(&app).await;
    assert_eq!(body["placement"]["content_id"], "42");

    let (_, _, body) = Call::get("/api/slots/home.hero/content").send(&app).await;
    assert_eq!(body["rendered"]["kind"], "content");
    assert_eq!(body["rendered"]["content"]["content_id"], "42");
    assert_eq!(body["rendered"]["summary"]["title"], "Launch keynote");

    let (_, _, history) = Call::get("/api/admin/placements?slot_key=home.hero")
      .as_user("ana")
      .send(&app)
      .await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let revert_uri = format!("/api/admin/placements/{id}/revert");
    let (status, _, reverted) = Call::post(&revert_uri, json!({ "reason": "rollback" }))
      .as_user("ana")
      .send(&app)
      .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reverted["value"]["active"], false);

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve").send(&app).await;
    assert!(body["placement"].is_null());

    let (_, _, body) = Call::get("/api/slots/home.hero/content?fallback=house-promo").send(&app).await;
    assert_eq!(body["rendered"]["kind"], "fallback");
    assert_eq!(body["rendered"]["fallback"], "house-promo");
    assert_eq!(body["state"]["reason"]["reason"], "vacant");

    let (status, _, _) = Call::post(&revert_uri, json!({})).as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::OK);
  }

  #[tokio::test]
  async fn unknown_placement_revert_is_404() {
    let app = app().await;
    let uri = format!("/api/admin/placements/{}/revert", Uuid::new_v4());
    let (status, _, body) = Call::post(&uri, json!({})).as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
  }

  #[tokio::test]
  async fn undeclared_and_malformed_slots() {
    let app = app().await;
    let (status, _, _) = Call::get("/api/slots/home.footer/resolve").send(&app).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = Call::get("/api/slots/Home/resolve").send(&app).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unaccepted_type_is_rejected() {
    let app = app().await;
    let commit = json!({ "slot_key": "home.hero", "content_type": "ad", "content_id": "ad-1" });
    let (status, _, _) = Call::post("/api/admin/placements", commit).as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve").send(&app).await;
    assert!(body["placement"].is_null());
  }

  #[tokio::test]
  async fn device_scope_follows_the_request() {
    let app = app().await;
    let commit = json!({
      "slot_key": "home.hero",
      "content_type": "video",
      "content_id": "42",
      "device_scope": "mobile",
    });
    let (status, _, _) = Call::post("/api/admin/placements", commit).as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve")
      .header("sec-ch-ua-mobile", "?1")
      .send(&app)
      .await;
    assert_eq!(body["device"], "mobile");
    assert_eq!(body["placement"]["content_id"], "42");

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve").send(&app).await;
    assert_eq!(body["device"], "desktop");
    assert!(body["placement"].is_null());

    let (_, _, body) = Call::get("/api/slots/home.hero/resolve?device=mobile").send(&app).await;
    assert_eq!(body["placement"]["content_id"], "42");
  }

  #[tokio::test]
  async fn walkthrough_is_remembered_per_operator() {
    let app = app().await;
    let (_, _, body) = Call::get("/api/admin/walkthrough").as_user("ana").send(&app).await;
    assert_eq!(body["completed"], false);
    assert!(!body["steps"].as_array().unwrap().is_empty());

    let (status, _, _) = Call::post("/api/admin/walkthrough", json!({})).as_user("ana").send(&app).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) = Call::get("/api/admin/walkthrough").as_user("ana").send(&app).await;
    assert_eq!(body["completed"], true);

    let (_, _, body) = Call::get("/api/admin/walkthrough").as_user("bo").send(&app).await;
    assert_eq!(body["completed"], false);
  }
}
