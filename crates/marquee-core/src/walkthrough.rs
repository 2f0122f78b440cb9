//! First-run guided tour for operators.
//!
//! `Welcome → Step(0) → … → Step(n-1) → Done`. The tour can be dismissed at
//! any stage; either way completion is remembered per operator so it is shown
//! once.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

/// Persists which operators have finished (or dismissed) the tour.
pub trait WalkthroughMemory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn is_completed(
    &self,
    operator_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn mark_completed(
    &self,
    operator_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// One page of the tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TourStep {
  pub title: &'static str,
  pub body:  &'static str,
}

pub const STEPS: &[TourStep] = &[
  TourStep {
    title: "Find a slot",
    body:  "Turn on conduction mode and every overridable region of the live site is outlined.",
  },
  TourStep {
    title: "Inspect it",
    body:  "Select a slot to see what it accepts and every placement it has had.",
  },
  TourStep {
    title: "Swap the content",
    body:  "Open the editor, pick content of an accepted type and say why. Commits are never instant.",
  },
  TourStep {
    title: "Undo",
    body:  "Revert retires a placement. History is kept, and the slot falls back to its default.",
  },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "index", rename_all = "snake_case")]
pub enum Stage {
  Welcome,
  Step(usize),
  Done,
}

#[derive(Debug, Clone)]
pub struct Walkthrough {
  stage: Stage,
  steps: &'static [TourStep],
}

impl Default for Walkthrough {
  fn default() -> Self { Self::new(STEPS) }
}

impl Walkthrough {
  pub fn new(steps: &'static [TourStep]) -> Self { Self { stage: Stage::Welcome, steps } }

  /// Start at `Done` if the operator has already seen the tour.
  pub async fn resume<M: WalkthroughMemory>(
    memory: &M,
    operator_id: Uuid,
  ) -> Result<Self, M::Error> {
    let mut tour = Self::default();
    if memory.is_completed(operator_id).await? {
      tour.stage = Stage::Done;
    }
    Ok(tour)
  }

  pub fn stage(&self) -> Stage { self.stage }

  pub fn is_done(&self) -> bool { self.stage == Stage::Done }

  pub fn current_step(&self) -> Option<&TourStep> {
    match self.stage {
      Stage::Step(i) => self.steps.get(i),
      _ => None,
    }
  }

  pub fn advance(&mut self) -> Stage {
    self.stage = match self.stage {
      Stage::Welcome if self.steps.is_empty() => Stage::Done,
      Stage::Welcome => Stage::Step(0),
      Stage::Step(i) if i + 1 < self.steps.len() => Stage::Step(i + 1),
      Stage::Step(_) | Stage::Done => Stage::Done,
    };
    self.stage
  }

  pub fn back(&mut self) -> Stage {
    self.stage = match self.stage {
      Stage::Step(0) => Stage::Welcome,
      Stage::Step(i) => Stage::Step(i - 1),
      other => other,
    };
    self.stage
  }

  pub fn dismiss(&mut self) { self.stage = Stage::Done; }

  /// Persist completion once the tour is over. No-op before then.
  pub async fn remember<M: WalkthroughMemory>(
    &self,
    memory: &M,
    operator_id: Uuid,
  ) -> Result<(), M::Error> {
    if self.is_done() {
      memory.mark_completed(operator_id).await?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::memory::MemoryStore;

  #[test]
  fn walks_every_step_then_finishes() {
    let mut tour = Walkthrough::default();
    assert_eq!(tour.stage(), Stage::Welcome);
    assert!(tour.current_step().is_none());

    for i in 0..STEPS.len() {
      assert_eq!(tour.advance(), Stage::Step(i));
      assert_eq!(tour.current_step(), Some(&STEPS[i]));
    }
    assert_eq!(tour.advance(), Stage::Done);
    assert_eq!(tour.advance(), Stage::Done);
  }

  #[test]
  fn back_returns_to_welcome() {
    let mut tour = Walkthrough::default();
    tour.advance();
    tour.advance();
    assert_eq!(tour.back(), Stage::Step(0));
    assert_eq!(tour.back(), Stage::Welcome);
    assert_eq!(tour.back(), Stage::Welcome);
  }

  #[tokio::test]
  async fn dismissal_is_remembered() {
    let memory = MemoryStore::default();
    let operator = Uuid::new_v4();

    let mut tour = Walkthrough::resume(&memory, operator).await.unwrap();
    assert_eq!(tour.stage(), Stage::Welcome);
    tour.advance();

    // Not done yet: nothing persisted.
    tour.remember(&memory, operator).await.unwrap();
    assert!(!memory.is_completed(operator).await.unwrap());

    tour.dismiss();
    tour.remember(&memory, operator).await.unwrap();

    let again = Walkthrough::resume(&memory, operator).await.unwrap();
    assert!(again.is_done());

    let other = Walkthrough::resume(&memory, Uuid::new_v4()).await.unwrap();
    assert!(!other.is_done());
  }
}
