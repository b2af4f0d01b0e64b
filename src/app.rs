use anyhow::Result;
use chrono::Utc;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::constants;
use crate::credential::{Credential, CredentialStore};
use crate::detail::{self, DetailView};
use crate::display::DisplayMode;
use crate::embed;
use crate::error::ClientError;
use crate::graphics::ThumbCache;
use crate::grid::{self, GridView};
use crate::input::TextInput;
use crate::listing::{Category, ListingQuery, Page, fetch_page};
use crate::player::Player;
use crate::share::{self, ShareOutcome, SharePayload, ShareTarget};
use crate::theme::{THEMES, theme_index};
use crate::youtube::VideoSource;

pub const INVALID_KEY_MESSAGE: &str =
  "Please enter a valid YouTube API key (should start with AIza and be about 40 characters)";
pub const RESET_KEY_PROMPT: &str = "Clear API key and reset app?";
const LOADING_VIDEOS: &str = "Loading videos...";
const SEARCHING: &str = "Searching...";
const SEARCH_FAILED: &str = "Search failed. Please try again.";

/// Builds the API client once a key is accepted.
pub type Connect = Box<dyn Fn(&Credential) -> Result<Arc<dyn VideoSource>> + Send>;

/// Everything the coordinator talks to outside its own state.
pub struct Services {
  pub credentials: CredentialStore,
  pub connect: Connect,
  pub player: Player,
  pub share: Box<dyn ShareTarget>,
  /// Thumbnail downloads are skipped without a client.
  pub http: Option<Client>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  /// No usable API key yet.
  Gate,
  Browse,
}

/// Flags read by the render and fetch guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiState {
  pub active_category: Category,
  /// A listing page is in flight. New page requests are dropped until it lands.
  pub is_loading: bool,
  pub search_open: bool,
  /// The detail overlay is showing.
  pub modal_open: bool,
}

impl Default for UiState {
  fn default() -> Self {
    Self { active_category: Category::Trending, is_loading: false, search_open: false, modal_open: false }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
  ResetKey,
}

/// Blocking notice drawn above everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  Alert(String),
  Confirm { message: String, action: ConfirmAction },
}

/// Actions that need a signed-in account, which this client never has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialAction {
  Like,
  Dislike,
  Save,
  Subscribe,
}

impl SocialAction {
  pub fn message(self) -> &'static str {
    match self {
      SocialAction::Like => "👍 Like feature would work with user authentication",
      SocialAction::Dislike => "👎 Dislike feature would work with user authentication",
      SocialAction::Save => "💾 Save to playlist feature",
      SocialAction::Subscribe => "🔔 Subscribe feature requires Google login",
    }
  }
}

/// Grid geometry from the last draw, in cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
  pub columns: usize,
  pub viewport_rows: usize,
}

impl Default for GridLayout {
  fn default() -> Self {
    Self { columns: 1, viewport_rows: 1 }
  }
}

struct PendingPage {
  first_page: bool,
  search: bool,
  rx: oneshot::Receiver<Result<Page, ClientError>>,
}

/// In-flight async task receivers.
#[derive(Default)]
struct AsyncTasks {
  page: Option<PendingPage>,
  detail_rx: Option<oneshot::Receiver<Result<DetailView, ClientError>>>,
  verify_rx: Option<oneshot::Receiver<u64>>,
}

pub struct App {
  pub screen: Screen,
  pub ui: UiState,
  pub key_input: TextInput,
  pub search_input: TextInput,
  pub query: ListingQuery,
  /// Continuation token for the next page; empty when there is none.
  pub cursor: String,
  pub grid: GridView,
  pub selected: usize,
  /// First visible card row.
  pub scroll_row: usize,
  pub layout: GridLayout,
  pub detail: Option<DetailView>,
  pub thumbs: ThumbCache,
  pub notice: Option<Notice>,
  pub player: Player,
  pub theme_index: usize,
  pub display_mode: DisplayMode,
  pub region: String,
  pub status_message: Option<String>,
  pub last_error: Option<String>,
  pub should_quit: bool,
  error_time: Option<Instant>,
  config: Config,
  credentials: CredentialStore,
  connect: Connect,
  source: Option<Arc<dyn VideoSource>>,
  share: Box<dyn ShareTarget>,
  http: Option<Client>,
  tasks: AsyncTasks,
}

impl App {
  pub fn new(services: Services, config: Config, display_mode: DisplayMode) -> Self {
    let region = config.region_code.clone().unwrap_or_else(|| constants().default_region.clone());
    Self {
      screen: Screen::Gate,
      ui: UiState::default(),
      key_input: TextInput::default(),
      search_input: TextInput::default(),
      query: ListingQuery::Category(Category::Trending),
      cursor: String::new(),
      grid: GridView::Loading(LOADING_VIDEOS.to_string()),
      selected: 0,
      scroll_row: 0,
      layout: GridLayout::default(),
      detail: None,
      thumbs: ThumbCache::default(),
      notice: None,
      player: services.player,
      theme_index: theme_index(config.theme_name.as_deref()),
      display_mode,
      region,
      status_message: None,
      last_error: None,
      should_quit: false,
      error_time: None,
      config,
      credentials: services.credentials,
      connect: services.connect,
      source: None,
      share: services.share,
      http: services.http,
      tasks: AsyncTasks::default(),
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    &THEMES[self.theme_index.min(THEMES.len() - 1)]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.save();
  }

  /// Set a status-line error with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.clear_error();
    }
  }

  fn alert(&mut self, message: impl Into<String>) {
    let message = message.into();
    info!(message = %message, "alert");
    self.notice = Some(Notice::Alert(message));
  }

  // --- Bootstrap ---

  /// Enter the gate or, with a saved key, the browsing view.
  pub fn start(&mut self) {
    let Some(credential) = self.credentials.load() else {
      info!("no API key saved, showing gate");
      self.screen = Screen::Gate;
      return;
    };
    match (self.connect)(&credential) {
      Ok(source) => {
        self.source = Some(source);
        self.screen = Screen::Browse;
        self.switch_category(Category::Trending);
      }
      Err(e) => {
        warn!(err = %e, "failed to build API client");
        self.screen = Screen::Gate;
        self.alert(format!("Failed to start: {e:#}"));
      }
    }
  }

  /// Validate and persist a key, then restart. A rejected key is put back
  /// into the gate field for editing.
  pub async fn save_key(&mut self, candidate: &str) {
    let credential = match Credential::parse(candidate) {
      Ok(credential) => credential,
      Err(_) => {
        self.key_input.set(candidate);
        self.alert(INVALID_KEY_MESSAGE);
        return;
      }
    };
    if let Err(e) = self.credentials.save(&credential) {
      self.alert(format!("{e:#}"));
      return;
    }
    self.restart().await;
  }

  pub fn submit_key(&mut self) -> String {
    let key = self.key_input.text.trim().to_string();
    self.key_input.clear();
    key
  }

  pub fn request_key_reset(&mut self) {
    self.notice = Some(Notice::Confirm { message: RESET_KEY_PROMPT.to_string(), action: ConfirmAction::ResetKey });
  }

  /// Forget the key and everything built on it, back to the gate.
  pub async fn reset_key(&mut self) {
    if let Err(e) = self.credentials.clear() {
      self.alert(format!("{e:#}"));
      return;
    }
    self.restart().await;
  }

  /// Drop all session state and run the startup path again.
  pub async fn restart(&mut self) {
    info!("restarting session");
    self.player.teardown().await;
    self.tasks = AsyncTasks::default();
    self.source = None;
    self.ui = UiState::default();
    self.query = ListingQuery::Category(Category::Trending);
    self.cursor.clear();
    self.grid = GridView::Loading(LOADING_VIDEOS.to_string());
    self.selected = 0;
    self.scroll_row = 0;
    self.detail = None;
    self.thumbs.clear();
    self.search_input.clear();
    self.key_input.clear();
    self.status_message = None;
    self.clear_error();
    self.start();
  }

  /// Dismiss the notice, running its action if it was a confirmation.
  pub async fn answer_notice(&mut self, accept: bool) {
    match self.notice.take() {
      Some(Notice::Confirm { action: ConfirmAction::ResetKey, .. }) if accept => self.reset_key().await,
      _ => {}
    }
  }

  // --- Listing ---

  pub fn switch_category(&mut self, category: Category) {
    info!(category = category.label(), "switching category");
    self.ui.active_category = category;
    self.query = ListingQuery::Category(category);
    self.reload(LOADING_VIDEOS);
  }

  /// Home resets to the chart exactly like a tab switch.
  pub fn go_home(&mut self) {
    self.switch_category(Category::Trending);
  }

  /// Re-run the current listing from its first page.
  pub fn retry(&mut self) {
    let message = if matches!(self.query, ListingQuery::Search(_)) { SEARCHING } else { LOADING_VIDEOS };
    self.reload(message);
  }

  fn reload(&mut self, message: &str) {
    self.cursor.clear();
    self.selected = 0;
    self.scroll_row = 0;
    self.grid = GridView::Loading(message.to_string());
    self.trigger_fetch();
  }

  /// Start a page fetch unless one is already in flight.
  pub fn trigger_fetch(&mut self) {
    if self.ui.is_loading {
      debug!("fetch suppressed, request in flight");
      return;
    }
    let Some(source) = self.source.clone() else { return };
    self.ui.is_loading = true;

    let query = self.query.clone();
    let cursor = self.cursor.clone();
    let region = self.region.clone();
    let first_page = cursor.is_empty();
    let search = matches!(query, ListingQuery::Search(_));

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(fetch_page(source.as_ref(), &query, &cursor, &region).await);
    });
    self.tasks.page = Some(PendingPage { first_page, search, rx });
  }

  /// Scroll listener. Rows are card rows; fetches the next page when fewer
  /// than the threshold remain below the viewport.
  pub fn on_scroll(&mut self, scroll_top: usize, viewport: usize, content: usize) {
    if self.ui.is_loading || self.cursor.is_empty() {
      return;
    }
    if scroll_top + viewport + constants().scroll_threshold_rows >= content {
      debug!(scroll_top, viewport, content, "near bottom, loading next page");
      self.trigger_fetch();
    }
  }

  fn apply_page(&mut self, first_page: bool, search: bool, result: Result<Page, ClientError>) {
    self.ui.is_loading = false;
    let now = Utc::now();
    match result {
      Ok(page) => {
        if first_page {
          self.grid = grid::render(&page.items, now);
          self.selected = 0;
          self.scroll_row = 0;
        } else {
          self.grid = grid::append(std::mem::replace(&mut self.grid, GridView::NoResults), &page.items, now);
        }
        // Search results are one-shot.
        self.cursor = if search { String::new() } else { page.next_cursor };
      }
      Err(e) => {
        warn!(err = %e, "listing fetch failed");
        self.cursor.clear();
        let message = if search { SEARCH_FAILED.to_string() } else { format!("Failed to load videos. {e}") };
        self.grid = GridView::Error(message);
      }
    }
  }

  // --- Search overlay ---

  pub fn open_search(&mut self) {
    self.ui.search_open = true;
  }

  /// Closing the overlay clears the query text.
  pub fn close_search(&mut self) {
    self.ui.search_open = false;
    self.search_input.clear();
  }

  pub fn submit_search(&mut self) {
    let text = self.search_input.text.trim().to_string();
    if text.is_empty() || self.source.is_none() {
      return;
    }
    if self.ui.is_loading {
      debug!("search suppressed, request in flight");
      return;
    }
    info!(query = %text, "search triggered");
    self.query = ListingQuery::Search(text);
    self.close_search();
    self.reload(SEARCHING);
  }

  // --- Grid navigation ---

  fn total_rows(&self) -> usize {
    self.grid.cards().len().div_ceil(self.layout.columns.max(1))
  }

  /// Move the selection by whole cards and rows, keeping it visible.
  pub fn move_selection(&mut self, dx: isize, dy: isize) {
    let count = self.grid.cards().len();
    if count == 0 {
      return;
    }
    let columns = self.layout.columns.max(1) as isize;
    let target = self.selected as isize + dx + dy * columns;
    self.selected = target.clamp(0, count as isize - 1) as usize;

    let row = self.selected / columns as usize;
    let viewport = self.layout.viewport_rows.max(1);
    if row < self.scroll_row {
      self.scroll_row = row;
    } else if row >= self.scroll_row + viewport {
      self.scroll_row = row + 1 - viewport;
    }
    self.on_scroll(self.scroll_row, viewport, self.total_rows());
  }

  pub fn selected_card(&self) -> Option<&grid::Card> {
    self.grid.cards().get(self.selected)
  }

  pub fn open_selected(&mut self) {
    if let Some(id) = self.selected_card().map(|c| c.video_id.clone()) {
      self.open_detail(&id);
    }
  }

  // --- Detail overlay ---

  pub fn open_detail(&mut self, video_id: &str) {
    let Some(source) = self.source.clone() else { return };
    self.status_message = Some("Loading…".to_string());
    let id = video_id.to_string();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(detail::open(source.as_ref(), &id, Utc::now()).await);
    });
    self.tasks.detail_rx = Some(rx);
  }

  async fn show_detail(&mut self, view: DetailView) {
    let video_id = view.video_id.clone();
    self.detail = Some(view);
    self.ui.modal_open = true;

    if let Some(generation) = self.player.open(&video_id).await {
      let delay = Duration::from_millis(constants().embed_verify_delay_ms);
      let (tx, rx) = oneshot::channel();
      tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = tx.send(generation);
      });
      self.tasks.verify_rx = Some(rx);
    }
    self.take_player_failure();
  }

  fn take_player_failure(&mut self) {
    if let Some(err) = self.player.failure.take() {
      self.alert(err.to_string());
    }
  }

  pub async fn close_detail(&mut self) {
    if !self.ui.modal_open {
      return;
    }
    self.ui.modal_open = false;
    self.detail = None;
    self.tasks.verify_rx = None;
    self.player.close().await;
  }

  /// Space: play/pause. Only while the overlay is open.
  pub async fn toggle_play(&mut self) {
    if !self.ui.modal_open {
      return;
    }
    if let Err(e) = self.player.toggle_play().await {
      self.set_error(format!("Pause error: {}", e));
    }
  }

  /// M: mute/unmute. Only while the overlay is open.
  pub async fn toggle_mute(&mut self) {
    if !self.ui.modal_open {
      return;
    }
    if let Err(e) = self.player.toggle_mute().await {
      self.set_error(format!("Mute error: {}", e));
    }
  }

  pub fn share(&mut self) {
    let Some(view) = self.detail.as_ref() else { return };
    let payload = SharePayload::new(&view.title, view.share_url());
    match share::share(self.share.as_mut(), &payload) {
      ShareOutcome::Shared => self.status_message = Some("Shared".to_string()),
      ShareOutcome::Copied => self.alert("Video link copied to clipboard!"),
      ShareOutcome::Manual(prompt) => self.alert(prompt),
    }
  }

  pub fn social_action(&mut self, action: SocialAction) {
    if self.ui.modal_open {
      self.alert(action.message());
    }
  }

  pub fn open_watch_page(&mut self) {
    let Some(url) = self.detail.as_ref().map(DetailView::watch_url) else { return };
    if let Err(e) = embed::open_in_browser(&url) {
      self.set_error(format!("Failed to open browser: {:#}", e));
    }
  }

  // --- Polling ---

  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut pending) = self.tasks.page.take() {
      match pending.rx.try_recv() {
        Ok(result) => self.apply_page(pending.first_page, pending.search, result),
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.page = Some(pending);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.apply_page(pending.first_page, pending.search, Err(ClientError::fetch("Listing task failed.")));
        }
      }
    }

    if let Some(mut rx) = self.tasks.detail_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(view) => self.show_detail(view).await,
            Err(e) => self.alert(format!("Failed to load video: {e}")),
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.detail_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.alert("Failed to load video: task failed");
        }
      }
    }

    if let Some(mut rx) = self.tasks.verify_rx.take() {
      match rx.try_recv() {
        Ok(generation) => self.player.verify(generation).await,
        Err(oneshot::error::TryRecvError::Empty) => {
          self.tasks.verify_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {}
      }
    }

    if let Some(client) = self.http.as_ref() {
      self.thumbs.spawn_wanted(client);
    }
    self.thumbs.drain();

    self.player.poll().await;
    self.take_player_failure();
    Ok(())
  }
}
