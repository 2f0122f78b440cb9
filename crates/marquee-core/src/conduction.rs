//! The conduction workflow: an operator inspecting slots on the live site and
//! committing or reverting placements.
//!
//! ```text
//! Inactive ─activate→ Active ─select→ Inspecting ─open editor→ Editing
//!                        ↑                ↑  │ revert               │ commit
//!                        │                └──┘                      ↓
//!                        └─────────────── (ok) ────────────── Committing
//! ```
//!
//! A session is owned by one task; every transition takes `&mut self`.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  audit::{AuditStatus, Audited},
  ledger::PlacementWriter,
  operator::Operator,
  placement::{ContentType, DeviceScope, NewPlacement, Placement},
  presence::{Activity, PresenceEvent, PresenceHub},
  slot::{RegionAttributes, SlotDescriptor},
  store::PlacementQuery,
};

// ─── Pacing ──────────────────────────────────────────────────────────────────

/// How long a commit is held before the session returns to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPacing {
  Immediate,
  /// The commit takes at least this long, overlapping the write itself.
  MinimumLatency(Duration),
}

impl Default for CommitPacing {
  fn default() -> Self { Self::MinimumLatency(Duration::from_secs(2)) }
}

impl CommitPacing {
  async fn wait(self) {
    if let Self::MinimumLatency(d) = self {
      tokio::time::sleep(d).await;
    }
  }
}

// ─── Draft ───────────────────────────────────────────────────────────────────

/// Editor contents for a new placement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementDraft {
  pub content_type: Option<ContentType>,
  pub content_id:   Option<String>,
  pub priority:     i32,
  pub device_scope: DeviceScope,
  pub starts_at:    Option<DateTime<Utc>>,
  pub ends_at:      Option<DateTime<Utc>>,
  pub reason:       Option<String>,
}

impl PlacementDraft {
  /// A fresh draft that outranks the slot's current placements by default.
  fn for_history(history: &[Placement]) -> Self {
    let priority = history.iter().filter(|p| p.active).map(|p| p.priority).max().unwrap_or(0);
    Self { priority, ..Self::default() }
  }

  fn to_new_placement(&self, slot: &SlotDescriptor, actor: Uuid) -> Result<NewPlacement> {
    let content_id = self
      .content_id
      .as_deref()
      .map(str::trim)
      .filter(|id| !id.is_empty())
      .ok_or_else(|| Error::Validation("select content before committing".into()))?;
    let content_type = self
      .content_type
      .ok_or_else(|| Error::Validation("select content before committing".into()))?;
    if !slot.accepts(content_type) {
      return Err(Error::TypeMismatch { slot_key: slot.key.clone(), content_type });
    }

    let mut input =
      NewPlacement::new(slot.key.clone(), content_type, Some(content_id.to_owned()), actor);
    input.priority = self.priority;
    input.device_scope = self.device_scope;
    input.starts_at = self.starts_at;
    input.ends_at = self.ends_at;
    if let Some(reason) = self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
      input = input.with_reason(reason);
    }
    input.validate()?;
    Ok(input)
  }
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ConductionState {
  Inactive,
  Active,
  Inspecting {
    slot:       SlotDescriptor,
    placements: Vec<Placement>,
  },
  Editing {
    slot:       SlotDescriptor,
    placements: Vec<Placement>,
    draft:      PlacementDraft,
  },
  Committing {
    slot: SlotDescriptor,
  },
}

impl ConductionState {
  pub fn name(&self) -> &'static str {
    match self {
      Self::Inactive => "inactive",
      Self::Active => "active",
      Self::Inspecting { .. } => "inspecting",
      Self::Editing { .. } => "editing",
      Self::Committing { .. } => "committing",
    }
  }

  pub fn slot(&self) -> Option<&SlotDescriptor> {
    match self {
      Self::Inspecting { slot, .. } | Self::Editing { slot, .. } | Self::Committing { slot } => {
        Some(slot)
      }
      Self::Inactive | Self::Active => None,
    }
  }

  /// History loaded for the selected slot, newest first.
  pub fn placements(&self) -> &[Placement] {
    match self {
      Self::Inspecting { placements, .. } | Self::Editing { placements, .. } => placements,
      _ => &[],
    }
  }
}

/// Operator input coming from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
  /// Pick a slot region for inspection.
  Select(RegionAttributes),
  /// Pick a slot region and go straight to the editor.
  OpenEditor(RegionAttributes),
  Dismiss,
}

// ─── Feedback ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
  Success,
  Warning,
  Failure,
}

/// A short message for the operator after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
  pub tone:    Tone,
  pub message: String,
}

impl Toast {
  fn with_audit(audit: &AuditStatus, message: String) -> Self {
    match audit {
      AuditStatus::Recorded { .. } => Self { tone: Tone::Success, message },
      AuditStatus::Failed { message: why } => Self {
        tone:    Tone::Warning,
        message: format!("{message}, but the audit entry was not recorded: {why}"),
      },
    }
  }

  pub fn committed(audited: &Audited<Placement>) -> Self {
    let p = &audited.value;
    let what = p.content_id.as_deref().unwrap_or("nothing");
    Self::with_audit(
      &audited.audit,
      format!("Placed {} {what} in {}", p.content_type, p.slot_key),
    )
  }

  pub fn reverted(outcome: &RevertOutcome) -> Self {
    match outcome {
      RevertOutcome::Reverted(audited) => Self::with_audit(
        &audited.audit,
        format!("Reverted placement in {}", audited.value.slot_key),
      ),
      RevertOutcome::AlreadyGone(id) => Self {
        tone:    Tone::Success,
        message: format!("Placement {id} no longer exists"),
      },
    }
  }

  pub fn failed(error: &Error) -> Self { Self { tone: Tone::Failure, message: error.to_string() } }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevertOutcome {
  Reverted(Audited<Placement>),
  /// The placement was not found; nothing changed.
  AlreadyGone(Uuid),
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Puts the editor back unless disarmed, so a failed or dropped commit leaves
/// the draft in place. A dropped commit may still have been written.
struct RestoreEditor<'a> {
  state:   &'a mut ConductionState,
  editing: Option<ConductionState>,
}

impl Drop for RestoreEditor<'_> {
  fn drop(&mut self) {
    if let Some(editing) = self.editing.take() {
      *self.state = editing;
    }
  }
}

pub struct ConductionSession<W> {
  operator: Operator,
  writer:   Arc<W>,
  pacing:   CommitPacing,
  presence: Option<PresenceHub>,
  state:    ConductionState,
}

impl<W: PlacementWriter> ConductionSession<W> {
  pub fn new(operator: Operator, writer: Arc<W>) -> Self {
    Self {
      operator,
      writer,
      pacing: CommitPacing::default(),
      presence: None,
      state: ConductionState::Inactive,
    }
  }

  pub fn with_pacing(mut self, pacing: CommitPacing) -> Self {
    self.pacing = pacing;
    self
  }

  pub fn with_presence(mut self, hub: PresenceHub) -> Self {
    self.presence = Some(hub);
    self
  }

  pub fn operator(&self) -> &Operator { &self.operator }

  pub fn state(&self) -> &ConductionState { &self.state }

  fn announce(&self, activity: Activity) {
    if let Some(hub) = &self.presence {
      hub.publish(PresenceEvent {
        operator_id: self.operator.operator_id,
        display_name: self.operator.display_name.clone(),
        activity,
        at: Utc::now(),
      });
    }
  }

  fn invalid(&self, action: &'static str) -> Error {
    Error::InvalidState { action, state: self.state.name() }
  }

  /// Turn conduction mode on. Requires conduct rights.
  pub fn activate(&mut self) -> Result<()> {
    self.operator.ensure_may_conduct()?;
    if matches!(self.state, ConductionState::Inactive) {
      self.state = ConductionState::Active;
      tracing::info!(operator_id = %self.operator.operator_id, "conduction mode on");
      self.announce(Activity::Idle);
    }
    Ok(())
  }

  /// Turn conduction mode off, discarding any selection or draft.
  pub fn deactivate(&mut self) {
    if matches!(self.state, ConductionState::Inactive) {
      return;
    }
    self.state = ConductionState::Inactive;
    tracing::info!(operator_id = %self.operator.operator_id, "conduction mode off");
    self.announce(Activity::Left);
  }

  /// Route a page interaction. Ignored entirely while inactive.
  pub async fn handle(&mut self, interaction: Interaction) -> Result<()> {
    if matches!(self.state, ConductionState::Inactive) {
      tracing::trace!(?interaction, "ignoring interaction while inactive");
      return Ok(());
    }
    match interaction {
      Interaction::Select(attrs) => {
        let slot = SlotDescriptor::from_region(&attrs)?;
        self.inspect(slot).await
      }
      Interaction::OpenEditor(attrs) => {
        let slot = SlotDescriptor::from_region(&attrs)?;
        self.inspect(slot).await?;
        self.open_editor()?;
        Ok(())
      }
      Interaction::Dismiss => {
        self.dismiss();
        Ok(())
      }
    }
  }

  /// Select `slot` and load its history. Switching slots drops any draft.
  pub async fn inspect(&mut self, slot: SlotDescriptor) -> Result<()> {
    match self.state {
      ConductionState::Inactive | ConductionState::Committing { .. } => {
        return Err(self.invalid("inspect a slot"));
      }
      _ => {}
    }
    let placements = self.load_history(&slot).await?;
    self.announce(Activity::Inspecting { slot_key: slot.key.clone() });
    self.state = ConductionState::Inspecting { slot, placements };
    Ok(())
  }

  async fn load_history(&self, slot: &SlotDescriptor) -> Result<Vec<Placement>> {
    let query = PlacementQuery::for_slot(slot.key.clone());
    self.writer.history(&query).await.map_err(Error::backend)
  }

  /// Open the editor on the inspected slot.
  pub fn open_editor(&mut self) -> Result<&mut PlacementDraft> {
    let state = std::mem::replace(&mut self.state, ConductionState::Active);
    let (slot, placements) = match state {
      ConductionState::Inspecting { slot, placements } => (slot, placements),
      other => {
        self.state = other;
        return Err(self.invalid("open the editor"));
      }
    };
    self.announce(Activity::Editing { slot_key: slot.key.clone() });
    let draft = PlacementDraft::for_history(&placements);
    self.state = ConductionState::Editing { slot, placements, draft };
    self.draft_mut()
  }

  pub fn draft(&self) -> Option<&PlacementDraft> {
    match &self.state {
      ConductionState::Editing { draft, .. } => Some(draft),
      _ => None,
    }
  }

  pub fn draft_mut(&mut self) -> Result<&mut PlacementDraft> {
    let state = self.state.name();
    match &mut self.state {
      ConductionState::Editing { draft, .. } => Ok(draft),
      _ => Err(Error::InvalidState { action: "edit a draft", state }),
    }
  }

  /// Put content into the draft. Rejects types the slot does not accept.
  pub fn select_content(
    &mut self,
    content_type: ContentType,
    content_id: impl Into<String>,
  ) -> Result<()> {
    let state = self.state.name();
    let ConductionState::Editing { slot, draft, .. } = &mut self.state else {
      return Err(Error::InvalidState { action: "select content", state });
    };
    if !slot.accepts(content_type) {
      return Err(Error::TypeMismatch { slot_key: slot.key.clone(), content_type });
    }
    draft.content_type = Some(content_type);
    draft.content_id = Some(content_id.into());
    Ok(())
  }

  pub fn set_priority(&mut self, priority: i32) -> Result<()> {
    self.draft_mut()?.priority = priority;
    Ok(())
  }

  pub fn set_device_scope(&mut self, scope: DeviceScope) -> Result<()> {
    self.draft_mut()?.device_scope = scope;
    Ok(())
  }

  /// Set the live window. Rejects windows that end before they start.
  pub fn set_window(
    &mut self,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
  ) -> Result<()> {
    if let (Some(start), Some(end)) = (starts_at, ends_at)
      && end <= start
    {
      return Err(Error::Validation(format!("window ends ({end}) before it starts ({start})")));
    }
    let draft = self.draft_mut()?;
    draft.starts_at = starts_at;
    draft.ends_at = ends_at;
    Ok(())
  }

  pub fn set_reason(&mut self, reason: impl Into<String>) -> Result<()> {
    self.draft_mut()?.reason = Some(reason.into());
    Ok(())
  }

  /// Step back one level: editor to inspector, inspector to active.
  pub fn dismiss(&mut self) {
    let state = std::mem::replace(&mut self.state, ConductionState::Active);
    self.state = match state {
      ConductionState::Editing { slot, placements, .. } => {
        self.announce(Activity::Inspecting { slot_key: slot.key.clone() });
        ConductionState::Inspecting { slot, placements }
      }
      ConductionState::Inspecting { .. } => {
        self.announce(Activity::Idle);
        ConductionState::Active
      }
      other => other,
    };
  }

  /// Commit the draft as a new placement.
  ///
  /// Nothing reaches the writer unless the operator may conduct and the draft
  /// names content the slot accepts. On success the session returns to
  /// `Active`; on failure it stays in the editor with the draft intact.
  pub async fn commit(&mut self) -> Result<Audited<Placement>> {
    self.operator.ensure_may_conduct()?;
    let ConductionState::Editing { slot, draft, .. } = &self.state else {
      return Err(self.invalid("commit"));
    };
    let input = draft.to_new_placement(slot, self.operator.operator_id)?;
    let slot = slot.clone();

    let editing = std::mem::replace(&mut self.state, ConductionState::Committing { slot });
    let mut restore = RestoreEditor { state: &mut self.state, editing: Some(editing) };
    let (result, ()) = tokio::join!(self.writer.commit(input), self.pacing.wait());

    match result {
      Ok(audited) => {
        restore.editing = None;
        *restore.state = ConductionState::Active;
        drop(restore);
        tracing::info!(
          operator_id = %self.operator.operator_id,
          placement_id = %audited.value.placement_id,
          slot_key = %audited.value.slot_key,
          "placement committed"
        );
        self.announce(Activity::Idle);
        Ok(audited)
      }
      Err(e) => {
        drop(restore);
        tracing::warn!(operator_id = %self.operator.operator_id, error = %e, "commit failed");
        Err(Error::backend(e))
      }
    }
  }

  /// Deactivate a placement of the selected slot, then reload its history.
  pub async fn revert(
    &mut self,
    placement_id: Uuid,
    reason: Option<String>,
  ) -> Result<RevertOutcome> {
    self.operator.ensure_may_conduct()?;
    let slot = match &self.state {
      ConductionState::Inspecting { slot, .. } | ConductionState::Editing { slot, .. } => {
        slot.clone()
      }
      _ => return Err(self.invalid("revert")),
    };

    let outcome = match self
      .writer
      .revert(placement_id, self.operator.operator_id, reason)
      .await
      .map_err(Error::backend)?
    {
      Some(audited) => RevertOutcome::Reverted(audited),
      None => RevertOutcome::AlreadyGone(placement_id),
    };

    match self.load_history(&slot).await {
      Ok(placements) => {
        self.announce(Activity::Inspecting { slot_key: slot.key.clone() });
        self.state = ConductionState::Inspecting { slot, placements };
      }
      Err(e) => tracing::warn!(slot_key = %slot.key, error = %e, "history reload failed after revert"),
    }
    Ok(outcome)
  }
}

#[cfg(test)]
mod tests {
  use tokio::time::Instant;

  use super::*;
  use crate::{
    device::Device,
    ledger::Ledger,
    memory::MemoryStore,
    placement::SlotKey,
    resolver::{ResolveContext, Resolver},
    slot::Slot,
    store::PlacementStore,
  };

  type MemLedger = Ledger<MemoryStore, MemoryStore>;

  fn conductor(may_conduct: bool) -> Operator {
    Operator { operator_id: Uuid::new_v4(), display_name: "ana".into(), may_conduct }
  }

  fn hero() -> SlotDescriptor {
    SlotDescriptor::new(SlotKey::new("home.hero").unwrap(), [ContentType::Video, ContentType::Article])
  }

  fn session(may_conduct: bool) -> (Arc<MemoryStore>, ConductionSession<MemLedger>) {
    let store = Arc::new(MemoryStore::default());
    let ledger = Arc::new(Ledger::new(store.clone(), store.clone()));
    let session =
      ConductionSession::new(conductor(may_conduct), ledger).with_pacing(CommitPacing::Immediate);
    (store, session)
  }

  #[tokio::test]
  async fn interactions_are_ignored_while_inactive() {
    let (_, mut session) = session(true);
    session.handle(Interaction::Select(hero().region())).await.unwrap();
    assert_eq!(session.state(), &ConductionState::Inactive);
  }

  #[test]
  fn activate_requires_rights() {
    let (_, mut session) = session(false);
    assert!(matches!(session.activate(), Err(Error::Unauthorized(_))));
    assert_eq!(session.state(), &ConductionState::Inactive);
  }

  #[tokio::test]
  async fn select_then_edit_then_dismiss() {
    let (_, mut session) = session(true);
    session.activate().unwrap();

    session.handle(Interaction::Select(hero().region())).await.unwrap();
    assert_eq!(session.state().name(), "inspecting");
    assert_eq!(session.state().slot(), Some(&hero()));

    session.open_editor().unwrap();
    assert_eq!(session.state().name(), "editing");

    session.handle(Interaction::Dismiss).await.unwrap();
    assert_eq!(session.state().name(), "inspecting");
    session.handle(Interaction::Dismiss).await.unwrap();
    assert_eq!(session.state(), &ConductionState::Active);
  }

  #[tokio::test]
  async fn commit_without_content_never_reaches_the_store() {
    let (store, mut session) = session(true);
    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();

    let err = session.commit().await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(session.state().name(), "editing");
    assert!(store.audit_entries().is_empty());
  }

  #[tokio::test]
  async fn select_content_rejects_unaccepted_type() {
    let (_, mut session) = session(true);
    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();

    let err = session.select_content(ContentType::Ad, "ad-1").unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { content_type: ContentType::Ad, .. }));
    assert_eq!(session.draft().and_then(|d| d.content_id.clone()), None);
  }

  #[tokio::test]
  async fn commit_creates_audited_placement_and_returns_to_active() {
    let (store, mut session) = session(true);
    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    session.select_content(ContentType::Video, "42").unwrap();
    session.set_reason("launch").unwrap();
    session.set_device_scope(DeviceScope::Mobile).unwrap();
    let now = Utc::now();
    assert!(matches!(
      session.set_window(Some(now), Some(now - chrono::Duration::hours(1))),
      Err(Error::Validation(_))
    ));
    session.set_window(None, Some(now + chrono::Duration::days(1))).unwrap();

    let audited = session.commit().await.unwrap();
    assert!(audited.audit.is_recorded());
    assert_eq!(audited.value.content_id.as_deref(), Some("42"));
    assert_eq!(audited.value.reason(), Some("launch"));
    assert_eq!(session.state(), &ConductionState::Active);
    assert_eq!(Toast::committed(&audited).tone, Tone::Success);

    let active = store
      .active_for_slot(&hero().key, &Default::default())
      .await
      .unwrap()
      .ready()
      .unwrap();
    assert_eq!(active.len(), 1);
  }

  #[tokio::test]
  async fn store_failure_keeps_the_draft() {
    let (store, mut session) = session(true);
    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    session.select_content(ContentType::Article, "7").unwrap();

    store.set_unavailable(true);
    let err = session.commit().await.unwrap_err();
    assert!(matches!(err, Error::Backend(_)));
    assert_eq!(Toast::failed(&err).tone, Tone::Failure);
    assert_eq!(session.draft().and_then(|d| d.content_id.as_deref()), Some("7"));
  }

  #[tokio::test(start_paused = true)]
  async fn commit_honours_minimum_latency() {
    let (_, session) = session(true);
    let mut session = session.with_pacing(CommitPacing::MinimumLatency(Duration::from_secs(2)));
    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    session.select_content(ContentType::Video, "42").unwrap();

    let started = Instant::now();
    session.commit().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(2));
  }

  #[tokio::test(start_paused = true)]
  async fn dropped_commit_restores_the_editor() {
    let (_, session) = session(true);
    let mut session = session.with_pacing(CommitPacing::MinimumLatency(Duration::from_secs(2)));
    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    session.select_content(ContentType::Video, "42").unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(100), session.commit()).await;
    assert!(timed_out.is_err());
    assert_eq!(session.state().name(), "editing");
    assert_eq!(session.draft().and_then(|d| d.content_id.as_deref()), Some("42"));

    session.inspect(hero()).await.unwrap();
    assert_eq!(session.state().name(), "inspecting");
  }

  #[tokio::test]
  async fn commit_keeps_existing_placements_active() {
    let (store, mut session) = session(true);
    let existing = store
      .create(NewPlacement::new(hero().key, ContentType::Article, Some("7".into()), Uuid::new_v4()))
      .await
      .unwrap();

    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    session.select_content(ContentType::Video, "42").unwrap();
    let audited = session.commit().await.unwrap();

    assert!(store.get_placement(existing.placement_id).await.unwrap().unwrap().active);
    let active = store
      .active_for_slot(&hero().key, &Default::default())
      .await
      .unwrap()
      .ready()
      .unwrap();
    let ids: Vec<_> = active.iter().map(|p| p.placement_id).collect();
    assert_eq!(ids, [audited.value.placement_id, existing.placement_id]);
  }

  #[tokio::test]
  async fn hero_scenario_end_to_end() {
    let (store, mut session) = session(true);
    let slot = Slot::new(hero(), "PostA".to_string(), Resolver::new(store.clone()));
    let render = |slot: &Slot<MemoryStore, String>| slot.render(|c| format!("content {}", c.content_id));

    slot.refresh(ResolveContext::current(Device::Desktop)).await;
    assert_eq!(render(&slot), "PostA");

    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    session.select_content(ContentType::Video, "42").unwrap();
    session.set_reason("launch").unwrap();
    let audited = session.commit().await.unwrap();

    slot.refresh(ResolveContext::current(Device::Desktop)).await;
    assert_eq!(render(&slot), "content 42");

    session.handle(Interaction::Select(hero().region())).await.unwrap();
    let outcome = session.revert(audited.value.placement_id, Some("rollback".into())).await.unwrap();
    assert!(matches!(outcome, RevertOutcome::Reverted(_)));

    slot.refresh(ResolveContext::current(Device::Desktop)).await;
    assert_eq!(render(&slot), "PostA");
  }

  #[tokio::test]
  async fn draft_priority_defaults_to_current_highest() {
    let (store, mut session) = session(true);
    let mut existing =
      NewPlacement::new(hero().key, ContentType::Video, Some("1".into()), Uuid::new_v4());
    existing.priority = 7;
    store.create(existing).await.unwrap();

    session.activate().unwrap();
    session.handle(Interaction::OpenEditor(hero().region())).await.unwrap();
    assert_eq!(session.draft().map(|d| d.priority), Some(7));
  }

  #[tokio::test]
  async fn revert_reloads_history_and_handles_missing() {
    let (store, mut session) = session(true);
    let created = store
      .create(NewPlacement::new(hero().key, ContentType::Video, Some("42".into()), Uuid::new_v4()))
      .await
      .unwrap();

    session.activate().unwrap();
    session.handle(Interaction::Select(hero().region())).await.unwrap();
    assert!(session.state().placements()[0].active);

    let outcome = session.revert(created.placement_id, Some("wrong clip".into())).await.unwrap();
    assert!(matches!(&outcome, RevertOutcome::Reverted(a) if !a.value.active));
    assert_eq!(session.state().name(), "inspecting");
    assert!(!session.state().placements()[0].active);

    let missing = Uuid::new_v4();
    let outcome = session.revert(missing, None).await.unwrap();
    assert_eq!(outcome, RevertOutcome::AlreadyGone(missing));
    let toast = Toast::reverted(&outcome);
    assert_eq!(toast.tone, Tone::Success);
    assert!(toast.message.contains("no longer exists"));
  }

  #[tokio::test]
  async fn presence_follows_the_session() {
    let hub = PresenceHub::default();
    let mut rx = hub.subscribe();
    let (_, session) = session(true);
    let mut session = session.with_presence(hub);

    session.activate().unwrap();
    session.handle(Interaction::Select(hero().region())).await.unwrap();
    session.deactivate();

    assert_eq!(rx.recv().await.unwrap().activity, Activity::Idle);
    assert_eq!(
      rx.recv().await.unwrap().activity,
      Activity::Inspecting { slot_key: hero().key }
    );
    assert_eq!(rx.recv().await.unwrap().activity, Activity::Left);
  }
}
