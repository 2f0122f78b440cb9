//! `marquee`: command-line conduction for a Marquee server.
//!
//! # Usage
//!
//! ```
//! marquee --url http://localhost:8080 --user ana --password secret slots
//! marquee --config ~/.config/marquee/config.toml commit home.hero video 42 --reason launch
//! ```

mod client;

use std::{
  io::{self, BufRead, Write},
  path::PathBuf,
  sync::Arc,
  time::Duration,
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use marquee_core::{
  conduction::{CommitPacing, ConductionSession, Interaction, Toast, Tone},
  device::Device,
  ledger::PlacementWriter as _,
  placement::{ContentType, DeviceScope, Placement, SlotKey},
  slot::SlotDescriptor,
  store::PlacementQuery,
  walkthrough::{Stage, Walkthrough},
};
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "marquee", about = "Inspect and override what Marquee slots show")]
struct Args {
  /// Path to a TOML config file (url, username, password, pacing_ms).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the marquee server (default: http://localhost:8080).
  #[arg(long, env = "MARQUEE_URL")]
  url: Option<String>,

  /// API username.
  #[arg(long, env = "MARQUEE_USER")]
  user: Option<String>,

  /// API password (plaintext).
  #[arg(long, env = "MARQUEE_PASSWORD")]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List declared slots.
  Slots,

  /// Show which placement a slot resolves to right now.
  Resolve {
    slot: SlotKey,
    /// Resolve as this device instead of the server's guess.
    #[arg(long)]
    device: Option<Device>,
  },

  /// Show a slot's placement history, newest first.
  History {
    slot: SlotKey,
    #[arg(long)]
    active_only: bool,
    #[arg(long)]
    limit: Option<usize>,
  },

  /// Search the content catalog.
  Content {
    /// Comma-separated content types, e.g. `video,article`.
    #[arg(long, value_delimiter = ',')]
    types: Vec<ContentType>,
    text: Option<String>,
    #[arg(long)]
    limit: Option<usize>,
  },

  /// Place content into a slot.
  Commit {
    slot: SlotKey,
    content_type: ContentType,
    content_id: String,
    /// Defaults to the highest active priority in the slot.
    #[arg(long)]
    priority: Option<i32>,
    #[arg(long, default_value = "all")]
    device: DeviceScope,
    #[arg(long)]
    starts_at: Option<DateTime<Utc>>,
    #[arg(long)]
    ends_at: Option<DateTime<Utc>>,
    #[arg(long)]
    reason: Option<String>,
  },

  /// Deactivate a placement of a slot.
  Revert {
    slot: SlotKey,
    placement_id: Uuid,
    #[arg(long)]
    reason: Option<String>,
  },

  /// Walk through the first-run tour.
  Tour {
    /// Show the tour even if it was already completed.
    #[arg(long)]
    again: bool,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:       String,
  #[serde(default)]
  username:  String,
  #[serde(default)]
  password:  String,
  /// Minimum time a commit takes; `0` disables pacing.
  pacing_ms: Option<u64>,
}

impl ConfigFile {
  fn pacing(&self) -> CommitPacing {
    match self.pacing_ms {
      None => CommitPacing::default(),
      Some(0) => CommitPacing::Immediate,
      Some(ms) => CommitPacing::MinimumLatency(Duration::from_millis(ms)),
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let api_config = ApiConfig {
    base_url: args
      .url
      .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    username: args
      .user
      .or_else(|| (!file_cfg.username.is_empty()).then(|| file_cfg.username.clone()))
      .unwrap_or_default(),
    password: args
      .password
      .or_else(|| (!file_cfg.password.is_empty()).then(|| file_cfg.password.clone()))
      .unwrap_or_default(),
  };

  let client = Arc::new(ApiClient::new(api_config)?);

  match args.command {
    Command::Slots => {
      for slot in client.slots().await? {
        println!("{:<32} {}", slot.key, ContentType::join(&slot.accepts));
      }
    }
    Command::Resolve { slot, device } => {
      let resolved = client.resolve(&slot, device).await?;
      match resolved.placement {
        Some(p) => println!("{} ({}): {}", resolved.slot_key, resolved.device, describe(&p)),
        None => println!("{} ({}): vacant, showing fallback", resolved.slot_key, resolved.device),
      }
    }
    Command::History { slot, active_only, limit } => {
      let query = PlacementQuery { slot_key: slot, include_inactive: !active_only, limit };
      let placements = client.history(&query).await?;
      if placements.is_empty() {
        println!("no placements");
      }
      for p in &placements {
        println!("{}  {}", p.placement_id, describe(p));
      }
    }
    Command::Content { types, text, limit } => {
      let found = client
        .candidates(&types, text.as_deref(), limit)
        .await?;
      for item in found {
        println!(
          "{:<8} {:<24} {}",
          item.content.content_type, item.content.content_id, item.title
        );
      }
    }
    Command::Commit { slot, content_type, content_id, priority, device, starts_at, ends_at, reason } => {
      let mut session = open_session(&client, file_cfg.pacing()).await?;
      let descriptor = find_slot(&client, &slot).await?;

      session.handle(Interaction::OpenEditor(descriptor.region())).await?;
      session.select_content(content_type, content_id)?;
      if let Some(priority) = priority {
        session.set_priority(priority)?;
      }
      session.set_device_scope(device)?;
      session.set_window(starts_at, ends_at)?;
      if let Some(reason) = reason {
        session.set_reason(reason)?;
      }

      eprintln!("committing…");
      let toast = match session.commit().await {
        Ok(audited) => Toast::committed(&audited),
        Err(e) => Toast::failed(&e),
      };
      session.deactivate();
      show(toast)?;
    }
    Command::Revert { slot, placement_id, reason } => {
      let mut session = open_session(&client, file_cfg.pacing()).await?;
      let descriptor = find_slot(&client, &slot).await?;

      session.handle(Interaction::Select(descriptor.region())).await?;
      if !session.state().placements().iter().any(|p| p.placement_id == placement_id) {
        return Err(anyhow!("placement {placement_id} is not part of {slot}"));
      }
      let toast = match session.revert(placement_id, reason).await {
        Ok(outcome) => Toast::reverted(&outcome),
        Err(e) => Toast::failed(&e),
      };
      session.deactivate();
      show(toast)?;
    }
    Command::Tour { again } => {
      let operator = client.whoami().await?;
      let mut tour = if again {
        Walkthrough::default()
      } else {
        Walkthrough::resume(client.as_ref(), operator.operator_id).await?
      };
      if tour.is_done() {
        println!("tour already completed; pass --again to see it");
        return Ok(());
      }
      run_tour(&mut tour)?;
      tour.remember(client.as_ref(), operator.operator_id).await?;
    }
  }

  Ok(())
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

async fn open_session(
  client: &Arc<ApiClient>,
  pacing: CommitPacing,
) -> Result<ConductionSession<ApiClient>> {
  let operator = client.whoami().await.context("fetching operator")?;
  let mut session = ConductionSession::new(operator, client.clone()).with_pacing(pacing);
  session.activate()?;
  Ok(session)
}

async fn find_slot(client: &ApiClient, key: &SlotKey) -> Result<SlotDescriptor> {
  client
    .slots()
    .await?
    .into_iter()
    .find(|s| &s.key == key)
    .ok_or_else(|| anyhow!("slot {key} is not declared"))
}

fn describe(p: &Placement) -> String {
  let content = p.content_id.as_deref().unwrap_or("(cleared)");
  let mut line = format!(
    "{} {content} priority={} device={}",
    p.content_type, p.priority, p.device_scope
  );
  if !p.active {
    line.push_str(" [inactive]");
  }
  if let Some(reason) = p.reason() {
    line.push_str(&format!(" reason={reason:?}"));
  }
  line
}

fn show(toast: Toast) -> Result<()> {
  match toast.tone {
    Tone::Success => println!("{}", toast.message),
    Tone::Warning => eprintln!("warning: {}", toast.message),
    Tone::Failure => return Err(anyhow!(toast.message)),
  }
  Ok(())
}

/// Page through the tour on stdin. `b` goes back, `q` dismisses.
fn run_tour(tour: &mut Walkthrough) -> Result<()> {
  let stdin = io::stdin();
  let mut lines = stdin.lock().lines();
  println!("Welcome to Marquee. Press enter to continue, b to go back, q to skip.");

  loop {
    if let Some(step) = tour.current_step() {
      println!("\n{}\n  {}", step.title, step.body);
    }
    print!("> ");
    io::stdout().flush().ok();

    let Some(line) = lines.next().transpose()? else {
      tour.dismiss();
      break;
    };
    match line.trim() {
      "q" => tour.dismiss(),
      "b" => {
        tour.back();
      }
      _ => {
        tour.advance();
      }
    }
    if tour.stage() == Stage::Done {
      break;
    }
  }
  Ok(())
}
