mod api;
mod app;
mod config;
mod constants;
mod debounce;
mod error;
mod filter;
mod input;
mod library;
mod player;
mod selection;
mod session;
mod state;
mod theme;
mod tracker;
mod transport;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::Config;
use constants::constants;
use player::MpvTransport;
use session::SessionGuard;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Terminal client for a personal media server", long_about = None)]
struct Args {
  /// Server base URL, e.g. http://nas.local:5000 (default: last used, then localhost)
  #[arg(short, long)]
  server: Option<String>,

  /// Username to pre-fill on the login screen
  #[arg(short, long)]
  username: Option<String>,

  /// Play audio only, never open a video window
  #[arg(long)]
  no_video: bool,

  /// Directory for log files (default: the platform data directory)
  #[arg(long)]
  log_dir: Option<PathBuf>,
}

// --- Logging ---

/// Log to a daily-rolling file; the terminal belongs to the UI.
fn init_logging(dir: Option<PathBuf>) -> Result<WorkerGuard> {
  let dir = match dir {
    Some(dir) => dir,
    None => ProjectDirs::from("", "", "mstream")
      .map(|d| d.data_dir().join("logs"))
      .context("Could not determine a log directory; pass --log-dir")?,
  };
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "mstream.log"));
  let filter = EnvFilter::try_from_env("MSTREAM_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_writer(writer).with_ansi(false).with_target(false).with_env_filter(filter).init();
  Ok(guard)
}

// --- Main ---

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging(args.log_dir.clone())?;

  let mut config = Config::load();
  if let Some(server) = &args.server {
    config.server_url = Some(server.clone());
  }
  if let Some(username) = &args.username {
    config.username = Some(username.clone());
  }
  if args.no_video {
    config.video = Some(false);
  }
  let server = config.server_url.clone().unwrap_or_else(|| constants().default_server_url.clone());
  info!(server = %server, version = env!("CARGO_PKG_VERSION"), "starting");

  let (guard, session_rx) = SessionGuard::new();
  let api = api::ApiClient::new(&server, guard.clone()).context("Failed to set up HTTP client")?;
  config.server_url = Some(api.base_url().to_string());
  let transport = MpvTransport::spawn(config.video.unwrap_or(true)).await?;
  let mut app = App::new(transport, api, guard, session_rx, config);

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app).await;
  ratatui::restore();

  app.shutdown().await;
  if let Err(e) = app.state.transport_mut().shutdown().await {
    warn!(err = %e, "failed to stop mpv cleanly");
  }
  info!("exiting");
  result
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App<MpvTransport>) -> Result<()> {
  loop {
    app.check_pending();
    for event in app.state.transport_mut().poll_events() {
      app.handle_transport_event(event);
    }
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, app))?;

    // Never block the runtime thread: requests, timers and the mpv reader run while we sleep.
    if event::poll(Duration::ZERO)? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(app, key).await;
        }
        _ => {}
      }
    } else {
      tokio::time::sleep(Duration::from_millis(30)).await;
    }

    if app.should_quit {
      break;
    }
  }
  Ok(())
}
