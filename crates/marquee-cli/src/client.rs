//! Async HTTP client wrapping the Marquee JSON API.

use std::time::Duration;

use chrono::{DateTime, Utc};
use marquee_core::{
  audit::Audited,
  content::ContentSummary,
  device::Device,
  ledger::PlacementWriter,
  operator::Operator,
  placement::{ContentType, NewPlacement, Placement, SlotKey},
  slot::SlotDescriptor,
  store::PlacementQuery,
  walkthrough::WalkthroughMemory,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Connection settings for the Marquee API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub username: String,
  pub password: String,
}

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The server answered with a non-success status.
  #[error("{method} {path} → {status}: {message}")]
  Status {
    method:  Method,
    path:    String,
    status:  StatusCode,
    message: String,
  },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// The server's answer to `GET /api/slots/{key}/resolve`.
#[derive(Debug, Clone, Deserialize)]
pub struct Resolved {
  pub slot_key:  SlotKey,
  pub device:    Device,
  pub at:        DateTime<Utc>,
  pub placement: Option<Placement>,
}

#[derive(Deserialize)]
struct WalkthroughStatus {
  completed: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Async HTTP client for the Marquee JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let req = self.client.request(method, self.url(path));
    if self.config.username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.username, Some(&self.config.password))
    }
  }

  async fn send(&self, method: Method, path: &str, req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let message = match resp.json::<ErrorBody>().await {
      Ok(body) => body.error,
      Err(_) => status.canonical_reason().unwrap_or("no details").to_string(),
    };
    Err(ClientError::Status { method, path: path.to_string(), status, message })
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
    let req = self.request(Method::GET, path).query(query);
    Ok(self.send(Method::GET, path, req).await?.json().await?)
  }

  // ── Public ────────────────────────────────────────────────────────────────

  /// `GET /api/slots`
  pub async fn slots(&self) -> Result<Vec<SlotDescriptor>> { self.get("/slots", &[]).await }

  /// `GET /api/slots/{key}/resolve[?device=]`
  pub async fn resolve(&self, slot_key: &SlotKey, device: Option<Device>) -> Result<Resolved> {
    let query: Vec<_> = device.map(|d| ("device", d.to_string())).into_iter().collect();
    self.get(&format!("/slots/{slot_key}/resolve"), &query).await
  }

  // ── Admin ─────────────────────────────────────────────────────────────────

  /// `GET /api/admin/whoami`
  pub async fn whoami(&self) -> Result<Operator> { self.get("/admin/whoami", &[]).await }

  /// `GET /api/admin/content`
  pub async fn candidates(
    &self,
    types: &[ContentType],
    text: Option<&str>,
    limit: Option<usize>,
  ) -> Result<Vec<ContentSummary>> {
    let mut query = Vec::new();
    if !types.is_empty() {
      query.push(("types", ContentType::join(types)));
    }
    if let Some(text) = text {
      query.push(("text", text.to_string()));
    }
    if let Some(limit) = limit {
      query.push(("limit", limit.to_string()));
    }
    self.get("/admin/content", &query).await
  }

  /// `GET /api/admin/placements`
  pub async fn placements(&self, query: &PlacementQuery) -> Result<Vec<Placement>> {
    let mut params = vec![
      ("slot_key", query.slot_key.to_string()),
      ("include_inactive", query.include_inactive.to_string()),
    ];
    if let Some(limit) = query.limit {
      params.push(("limit", limit.to_string()));
    }
    self.get("/admin/placements", &params).await
  }

  /// `POST /api/admin/placements`. The server stamps `updated_by` itself.
  pub async fn create_placement(&self, input: &NewPlacement) -> Result<Audited<Placement>> {
    let path = "/admin/placements";
    let req = self.request(Method::POST, path).json(input);
    Ok(self.send(Method::POST, path, req).await?.json().await?)
  }

  /// `POST /api/admin/placements/{id}/revert`. `None` if the id is unknown.
  pub async fn revert_placement(
    &self,
    id: Uuid,
    reason: Option<String>,
  ) -> Result<Option<Audited<Placement>>> {
    let path = format!("/admin/placements/{id}/revert");
    let req = self.request(Method::POST, &path).json(&json!({ "reason": reason }));
    match self.send(Method::POST, &path, req).await {
      Ok(resp) => Ok(Some(resp.json().await?)),
      Err(ClientError::Status { status: StatusCode::NOT_FOUND, .. }) => Ok(None),
      Err(e) => Err(e),
    }
  }
}

// ─── Core traits ──────────────────────────────────────────────────────────────

impl PlacementWriter for ApiClient {
  type Error = ClientError;

  async fn commit(&self, input: NewPlacement) -> Result<Audited<Placement>> {
    self.create_placement(&input).await
  }

  /// The actor is whoever the client authenticates as.
  async fn revert(
    &self,
    id: Uuid,
    _actor: Uuid,
    reason: Option<String>,
  ) -> Result<Option<Audited<Placement>>> {
    self.revert_placement(id, reason).await
  }

  async fn history(&self, query: &PlacementQuery) -> Result<Vec<Placement>> {
    self.placements(query).await
  }
}

/// Completion is tracked for the authenticated operator; the id is ignored.
impl WalkthroughMemory for ApiClient {
  type Error = ClientError;

  async fn is_completed(&self, _operator_id: Uuid) -> Result<bool> {
    let status: WalkthroughStatus = self.get("/admin/walkthrough", &[]).await?;
    Ok(status.completed)
  }

  async fn mark_completed(&self, _operator_id: Uuid) -> Result<()> {
    let path = "/admin/walkthrough";
    let req = self.request(Method::POST, path);
    self.send(Method::POST, path, req).await?;
    Ok(())
  }
}
