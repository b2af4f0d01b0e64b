mod app;
mod config;
mod constants;
mod credential;
mod detail;
mod display;
mod embed;
mod error;
mod format;
mod graphics;
mod grid;
mod input;
mod listing;
mod player;
mod share;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result};
use clap::Parser;
use directories::ProjectDirs;
use ratatui::{
  DefaultTerminal,
  crossterm::event::{self, Event, KeyEventKind},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::{App, Services};
use config::Config;
use credential::{Credential, CredentialStore, FileStore, KeyValueStore, MemoryStore};
use display::CliDisplayMode;
use embed::{BrowserFrame, MpvRuntime};
use player::Player;
use share::TerminalShare;
use youtube::{VideoSource, YoutubeApi};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Display mode: 'auto', 'direct', or 'ascii' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Region code for the Trending chart (overrides prefs.toml)
  #[arg(short, long)]
  region: Option<String>,

  /// Save this API key, as if entered at the key prompt
  #[arg(long)]
  api_key: Option<String>,

  /// Forget the saved API key before starting
  #[arg(long)]
  reset_key: bool,
}

// --- Logging ---

/// Log to a daily file in the data directory. The terminal belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
  let dirs = ProjectDirs::from("", "", "ytgrid")?;
  let log_dir = dirs.data_dir().join("logs");
  std::fs::create_dir_all(&log_dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, "ytgrid.log"));
  let filter = EnvFilter::try_from_env("YTGRID_LOG").unwrap_or_else(|_| EnvFilter::new("ytgrid=info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let _log_guard = init_logging();
  info!(version = env!("CARGO_PKG_VERSION"), "starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    ratatui::restore();
    default_hook(info);
  }));

  let mut app = build_app(&args)?;
  let mut terminal = ratatui::init();
  let result = run(&mut terminal, &mut app, &args).await;
  ratatui::restore();
  app.player.teardown().await;
  result
}

fn build_app(args: &Args) -> Result<App> {
  let mut config = Config::load();
  if let Some(region) = &args.region {
    config.region_code = Some(region.to_uppercase());
  }

  let store: Box<dyn KeyValueStore> = match FileStore::default_location() {
    Some(store) => Box::new(store),
    None => Box::new(MemoryStore::default()),
  };
  let mut credentials = CredentialStore::new(store);
  if args.reset_key {
    credentials.clear().context("Failed to reset API key")?;
  }

  let http = YoutubeApi::http_client()?;
  let api_client = http.clone();
  let services = Services {
    credentials,
    connect: Box::new(move |credential: &Credential| -> Result<Arc<dyn VideoSource>> {
      Ok(Arc::new(YoutubeApi::new(api_client.clone(), credential.clone())))
    }),
    player: Player::new(Arc::new(MpvRuntime::detect()), Box::new(BrowserFrame::default())),
    share: Box::new(TerminalShare { command: config.share_command.clone() }),
    http: Some(http),
  };
  Ok(App::new(services, config, display::resolve_display_mode(args.display_mode)))
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App, args: &Args) -> Result<()> {
  match &args.api_key {
    Some(key) => app.save_key(key).await,
    None => app.start(),
  }

  loop {
    app.check_pending().await?;
    app.expire_error();

    terminal.draw(|frame| ui::ui(frame, app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => {
          input::handle_key_event(app, key).await?;
        }
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }
  info!("quitting");
  Ok(())
}
