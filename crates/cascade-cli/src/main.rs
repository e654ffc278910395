//! `cascade`: terminal feed reader for a Cascade server.
//!
//! # Usage
//!
//! ```
//! cascade --url http://localhost:8080 --user ada
//! cascade --config ~/.config/cascade/cli.toml --subject physics
//! ```

mod app;
mod client;
mod ui;

use std::{
  fs::File,
  io,
  path::PathBuf,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use anyhow::{Context, Result};
use app::App;
use cascade_feed::{
  FeedConfig, FeedSession,
  session::SessionSummary,
  timetable::{FocusInterrupter, ScheduleEntry},
};
use clap::Parser;
use client::ApiClient;
use crossterm::{
  event::{self, Event},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "cascade", about = "Terminal feed reader for Cascade")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the cascade server (default: http://localhost:8080).
  #[arg(long, env = "CASCADE_URL")]
  url: Option<String>,

  /// Learner id used for engagement, votes and quiz answers.
  #[arg(long, env = "CASCADE_USER")]
  user: Option<String>,

  /// Restrict the feed to one subject.
  #[arg(long)]
  subject: Option<String>,

  /// Where to write logs; the terminal belongs to the UI.
  #[arg(long, value_name = "FILE", default_value = "cascade.log")]
  log_file: PathBuf,
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:      String,
  #[serde(default)]
  user_id:  String,
  #[serde(default)]
  subject:  Option<String>,
  #[serde(default)]
  feed:     FeedConfig,
  /// Class slots checked by the focus interrupter.
  #[serde(default)]
  schedule: Vec<ScheduleEntry>,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let log = File::create(&args.log_file)
    .with_context(|| format!("creating log file {}", args.log_file.display()))?;
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .with_writer(Mutex::new(log))
    .with_ansi(false)
    .init();

  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags override config file, which overrides defaults.
  let base_url = args
    .url
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());
  let user_id = args
    .user
    .or_else(|| (!file_cfg.user_id.is_empty()).then(|| file_cfg.user_id.clone()))
    .unwrap_or_else(|| "anonymous".to_string());
  let subject = args.subject.or(file_cfg.subject);

  let client = ApiClient::new(&base_url)?;

  // Enrolled subjects steer generation; the feed still works without them.
  let profile = match client.learner(&user_id).await {
    Ok(p) => Some(p),
    Err(e) => {
      tracing::warn!(%user_id, "could not load learner profile: {e}");
      None
    }
  };
  let difficulty = subject
    .as_deref()
    .and_then(|s| profile.as_ref()?.subject(s))
    .map(|s| s.difficulty);
  let enrolled = profile.map(|p| p.subjects).unwrap_or_default();

  let session = FeedSession::new(Arc::new(client), user_id, file_cfg.feed)
    .with_subject(subject, difficulty)
    .with_enrolled(enrolled);
  let mut app = App::new(session, FocusInterrupter::new(file_cfg.schedule));

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  // Run the event loop; restore terminal even on error.
  let run_result = run_event_loop(&mut terminal, &mut app).await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  // Leaving the feed ends the dwell on the current card.
  app.session.blur(Instant::now());
  print_summary(&app.session.summary());

  // Give in-flight engagement signals a moment to reach the server.
  tokio::time::sleep(Duration::from_millis(300)).await;

  run_result
}

fn print_summary(summary: &SessionSummary) {
  println!("Session summary");
  if summary.engaged_topics.is_empty() {
    println!("  no topics explored this time");
  } else {
    println!("  topics explored:");
    for topic in &summary.engaged_topics {
      println!("    - {topic}");
    }
  }
  println!("  summary XP: {}", summary.summary_xp);
  println!("  quiz XP:    {}", summary.quiz_xp);
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<ApiClient>,
) -> Result<()> {
  loop {
    app.tick(Instant::now(), chrono::Local::now().naive_local());
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event {
      if !app.handle_key(key, Instant::now()) {
        break;
      }
    }
  }

  Ok(())
}
