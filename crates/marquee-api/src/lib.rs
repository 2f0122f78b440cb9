//! JSON REST API for Marquee.
//!
//! Exposes two axum [`Router`]s backed by any storage backend:
//! [`public_router`] for page-side resolution and [`admin_router`] for the
//! conduction workflow. Authentication is the caller's responsibility; admin
//! handlers expect the authenticated [`Operator`] as a request extension.
//!
//! # Mounting
//!
//! ```rust,ignore
//! Router::new()
//!   .nest("/api", marquee_api::public_router(state.clone()))
//!   .nest("/api/admin", marquee_api::admin_router(state).layer(auth))
//! ```
//!
//! [`Operator`]: marquee_core::operator::Operator

pub mod content;
pub mod device;
pub mod error;
pub mod operator;
pub mod placements;
pub mod slots;
pub mod walkthrough;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use marquee_core::{
  audit::AuditSink,
  content::ContentMirror,
  ledger::Ledger,
  placement::SlotKey,
  resolver::Resolver,
  slot::{SlotDescriptor, SlotRegistry},
  store::PlacementStore,
  walkthrough::WalkthroughMemory,
};

pub use error::ApiError;

// ─── Backend bounds ──────────────────────────────────────────────────────────

/// Everything the API needs from a storage backend.
pub trait Backend: PlacementStore + AuditSink + WalkthroughMemory + 'static {}

impl<T> Backend for T where T: PlacementStore + AuditSink + WalkthroughMemory + 'static {}

/// Everything the API needs from the content catalog.
pub trait Catalog: ContentMirror + 'static {}

impl<T> Catalog for T where T: ContentMirror + 'static {}

// ─── State ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S, C> {
  pub ledger:   Ledger<S, S>,
  pub resolver: Resolver<S>,
  pub catalog:  Arc<C>,
  pub slots:    Arc<SlotRegistry>,
}

impl<S: Backend, C: Catalog> ApiState<S, C> {
  pub fn new(store: Arc<S>, catalog: Arc<C>, slots: SlotRegistry) -> Self {
    Self {
      ledger: Ledger::new(store.clone(), store.clone()),
      resolver: Resolver::new(store),
      catalog,
      slots: Arc::new(slots),
    }
  }

  pub fn store(&self) -> &Arc<S> { self.ledger.store() }

  /// Look up a declared slot by its raw key.
  pub fn slot(&self, raw_key: &str) -> Result<&SlotDescriptor, ApiError> {
    let key: SlotKey = raw_key.parse()?;
    self
      .slots
      .get(&key)
      .ok_or_else(|| ApiError::NotFound(format!("slot {key} is not declared")))
  }
}

// ─── Routers ─────────────────────────────────────────────────────────────────

/// Routes the live site calls to resolve slots. No authentication.
pub fn public_router<S: Backend, C: Catalog>(state: Arc<ApiState<S, C>>) -> Router<()> {
  Router::new()
    .route("/slots", get(slots::list::<S, C>))
    .route("/slots/{key}/resolve", get(slots::resolve::<S, C>))
    .route("/slots/{key}/content", get(slots::content::<S, C>))
    .with_state(state)
}

/// Routes for operators. Every handler requires an `Operator` extension.
pub fn admin_router<S: Backend, C: Catalog>(state: Arc<ApiState<S, C>>) -> Router<()> {
  Router::new()
    .route("/whoami", get(operator::whoami))
    // Placements
    .route("/placements", get(placements::list::<S, C>).post(placements::commit::<S, C>))
    .route("/placements/{id}/revert", post(placements::revert::<S, C>))
    // Content picker
    .route("/content", get(content::candidates::<S, C>))
    .route("/content/{content_type}/{content_id}", put(content::register::<S, C>))
    // Walkthrough
    .route("/walkthrough", get(walkthrough::status::<S, C>).post(walkthrough::complete::<S, C>))
    .with_state(state)
}
