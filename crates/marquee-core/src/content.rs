//! The narrow view of the external content store.
//!
//! Placements only ever hold a `(content_type, content_id)` reference. The
//! catalog turns a reference into something displayable and offers
//! candidates to the operator's content picker.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::placement::ContentType;

/// An opaque reference into the content store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
  pub content_type: ContentType,
  pub content_id:   String,
}

/// Renderable metadata for a content reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSummary {
  #[serde(flatten)]
  pub content:       ContentRef,
  pub title:         String,
  pub thumbnail_url: Option<String>,
  pub href:          Option<String>,
}

/// Parameters for [`ContentCatalog::candidates`].
#[derive(Debug, Clone, Default)]
pub struct ContentQuery {
  /// Restrict to these types; empty means any.
  pub content_types: Vec<ContentType>,
  /// Case-insensitive substring match on the title.
  pub text:          Option<String>,
  pub limit:         Option<usize>,
}

impl ContentQuery {
  pub const DEFAULT_LIMIT: usize = 25;

  pub fn matches(&self, summary: &ContentSummary) -> bool {
    let type_ok = self.content_types.is_empty()
      || self.content_types.contains(&summary.content.content_type);
    let text_ok = self
      .text
      .as_deref()
      .is_none_or(|t| summary.title.to_lowercase().contains(&t.to_lowercase()));
    type_ok && text_ok
  }
}

/// Read access to the content store.
pub trait ContentCatalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up display metadata for a reference. `None` if the store does not
  /// know it.
  fn describe<'a>(
    &'a self,
    content: &'a ContentRef,
  ) -> impl Future<Output = Result<Option<ContentSummary>, Self::Error>> + Send + 'a;

  /// Candidates for the operator's content picker.
  fn candidates<'a>(
    &'a self,
    query: &'a ContentQuery,
  ) -> impl Future<Output = Result<Vec<ContentSummary>, Self::Error>> + Send + 'a;
}

/// A local copy of the content store that can be written to.
pub trait ContentMirror: ContentCatalog {
  /// Insert `summary`, replacing any entry with the same reference.
  fn register(
    &self,
    summary: ContentSummary,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
