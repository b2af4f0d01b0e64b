//! Player handle lifecycle.
//!
//! Exactly one handle is live at a time. A controllable native embed is tried
//! first; if it cannot be built, fails its render check, or reports an error,
//! the player falls back to a passive raw frame addressed only by its source
//! URL. A raw frame that fails to load is terminal.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::ClientError;

/// Playback states reported by a native embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
  Unstarted,
  Ended,
  Playing,
  Paused,
  Buffering,
  Cued,
}

impl PlaybackState {
  pub fn label(self) -> &'static str {
    match self {
      PlaybackState::Unstarted => "unstarted",
      PlaybackState::Ended => "ended",
      PlaybackState::Playing => "playing",
      PlaybackState::Paused => "paused",
      PlaybackState::Buffering => "buffering",
      PlaybackState::Cued => "video cued",
    }
  }
}

/// Callbacks delivered by a native embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedEvent {
  Ready,
  StateChange(PlaybackState),
  Error(String),
}

/// Player parameters shared by both variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerVars {
  pub autoplay: bool,
  pub controls: bool,
  pub related_videos: bool,
  pub modest_branding: bool,
  pub plays_inline: bool,
  pub origin: String,
  pub js_api: bool,
}

impl Default for PlayerVars {
  fn default() -> Self {
    Self {
      autoplay: true,
      controls: true,
      related_videos: false,
      modest_branding: true,
      plays_inline: true,
      origin: constants().embed_origin.clone(),
      js_api: true,
    }
  }
}

fn flag(on: bool) -> u8 {
  u8::from(on)
}

impl PlayerVars {
  /// Plain embed URL carrying the same flags as the native player.
  pub fn embed_url(&self, video_id: &str) -> String {
    format!(
      "{}{}?autoplay={}&controls={}&rel={}&showinfo=0&modestbranding={}&playsinline={}&origin={}&enablejsapi={}",
      constants().embed_base_url,
      video_id,
      flag(self.autoplay),
      flag(self.controls),
      flag(self.related_videos),
      flag(self.modest_branding),
      flag(self.plays_inline),
      self.origin,
      flag(self.js_api),
    )
  }
}

/// Referrer policy the raw frame is locked to.
pub const FRAME_REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// A controllable player instance.
#[async_trait]
pub trait NativeEmbed: Send {
  async fn play(&mut self) -> Result<()>;
  async fn pause(&mut self) -> Result<()>;
  async fn state(&mut self) -> Result<PlaybackState>;
  async fn is_muted(&mut self) -> Result<bool>;
  async fn set_muted(&mut self, muted: bool) -> Result<()>;
  /// Best-effort check that the embed actually came up.
  async fn is_rendered(&mut self) -> bool;
  /// Callbacks received since the last call.
  fn drain_events(&mut self) -> Vec<EmbedEvent>;
  async fn destroy(&mut self) -> Result<()>;
}

/// The runtime that builds native embeds. May be absent on this machine.
#[async_trait]
pub trait EmbedRuntime: Send + Sync {
  fn available(&self) -> bool;
  async fn create(&self, video_id: &str, vars: &PlayerVars) -> Result<Box<dyn NativeEmbed>>;
}

/// Where a raw frame's source is loaded.
pub trait FrameHost: Send {
  fn load(&mut self, src: &str, referrer_policy: &str) -> Result<()>;
}

/// A passive frame. The only operation is replacing its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
  pub src: String,
}

impl RawFrame {
  /// The source with autoplay switched off.
  pub fn without_autoplay(&self) -> String {
    self.src.replace("autoplay=1", "autoplay=0")
  }
}

pub enum PlayerHandle {
  NativeEmbed(Box<dyn NativeEmbed>),
  RawFrame(RawFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
  NativeEmbed,
  RawFrame,
}

impl Variant {
  pub fn label(self) -> &'static str {
    match self {
      Variant::NativeEmbed => "mpv",
      Variant::RawFrame => "browser",
    }
  }
}

/// `uninitialized -> creating -> {ready | failed}`; a failed native embed
/// moves straight to creating a raw frame, a failed raw frame stays failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
  Uninitialized,
  Creating(Variant),
  Ready(Variant),
  Failed(Variant),
}

impl HandleState {
  pub fn begin(runtime_available: bool) -> Self {
    if runtime_available { Self::Creating(Variant::NativeEmbed) } else { Self::Creating(Variant::RawFrame) }
  }

  pub fn succeed(self) -> Self {
    match self {
      Self::Creating(v) => Self::Ready(v),
      other => other,
    }
  }

  pub fn fail(self) -> Self {
    match self {
      Self::Creating(Variant::NativeEmbed) | Self::Ready(Variant::NativeEmbed) => Self::Creating(Variant::RawFrame),
      Self::Creating(Variant::RawFrame) | Self::Ready(Variant::RawFrame) => Self::Failed(Variant::RawFrame),
      other => other,
    }
  }

  pub fn is_terminal_failure(self) -> bool {
    matches!(self, Self::Failed(Variant::RawFrame))
  }
}

/// Owns the single live handle.
pub struct Player {
  runtime: Arc<dyn EmbedRuntime>,
  frame_host: Box<dyn FrameHost>,
  vars: PlayerVars,
  handle: Option<PlayerHandle>,
  state: HandleState,
  video_id: Option<String>,
  generation: u64,
  /// The overlay was closed; no fallback may start playback until the next `open`.
  closed: bool,
  pub last_playback: Option<PlaybackState>,
  /// Set when a raw frame failed; taken by the caller to notify the user.
  pub failure: Option<ClientError>,
}

impl Player {
  pub fn new(runtime: Arc<dyn EmbedRuntime>, frame_host: Box<dyn FrameHost>) -> Self {
    Self {
      runtime,
      frame_host,
      vars: PlayerVars::default(),
      handle: None,
      state: HandleState::Uninitialized,
      video_id: None,
      generation: 0,
      closed: false,
      last_playback: None,
      failure: None,
    }
  }

  pub fn state(&self) -> HandleState {
    self.state
  }

  #[cfg(test)]
  pub fn handle(&self) -> Option<&PlayerHandle> {
    self.handle.as_ref()
  }

  #[cfg(test)]
  pub fn video_id(&self) -> Option<&str> {
    self.video_id.as_deref()
  }

  /// Tear down any previous handle and create one for `video_id`.
  ///
  /// Returns the generation to pass to [`Player::verify`] when a native embed
  /// was created and still needs its render check.
  pub async fn open(&mut self, video_id: &str) -> Option<u64> {
    self.teardown().await;
    self.generation += 1;
    self.closed = false;
    self.video_id = Some(video_id.to_string());
    self.state = HandleState::begin(self.runtime.available());
    info!(video_id, state = ?self.state, "creating player");

    if self.state == HandleState::Creating(Variant::NativeEmbed) {
      match self.runtime.create(video_id, &self.vars).await {
        Ok(embed) => {
          self.handle = Some(PlayerHandle::NativeEmbed(embed));
          return Some(self.generation);
        }
        Err(e) => {
          warn!(err = %e, "native player construction failed, using raw frame");
          self.state = self.state.fail();
        }
      }
    }
    self.create_frame();
    None
  }

  fn create_frame(&mut self) {
    let Some(video_id) = self.video_id.clone() else { return };
    let frame = RawFrame { src: self.vars.embed_url(&video_id) };
    match self.frame_host.load(&frame.src, FRAME_REFERRER_POLICY) {
      Ok(()) => self.state = self.state.succeed(),
      Err(e) => {
        warn!(err = %e, "raw frame failed to load");
        self.state = self.state.fail();
        self.failure = Some(ClientError::PlayerConstruction(format!("{e:#}")));
      }
    }
    self.handle = Some(PlayerHandle::RawFrame(frame));
  }

  async fn fall_back(&mut self) {
    if let Some(PlayerHandle::NativeEmbed(mut embed)) = self.handle.take()
      && let Err(e) = embed.destroy().await
    {
      warn!(err = %e, "failed to destroy native player");
    }
    self.state = self.state.fail();
    self.create_frame();
  }

  /// Delayed render check for the native embed created by `open`.
  /// Stale generations and checks landing after `close` are ignored.
  pub async fn verify(&mut self, generation: u64) {
    if self.closed || generation != self.generation || self.state != HandleState::Creating(Variant::NativeEmbed) {
      return;
    }
    let rendered = match self.handle.as_mut() {
      Some(PlayerHandle::NativeEmbed(embed)) => embed.is_rendered().await,
      _ => return,
    };
    if rendered {
      self.state = self.state.succeed();
      debug!("native player verified");
    } else {
      info!("native player not visible, using raw frame");
      self.fall_back().await;
    }
  }

  /// Drain native callbacks. An error triggers the raw frame fallback while
  /// the overlay is open; after `close` it only releases the embed.
  pub async fn poll(&mut self) {
    let events = match self.handle.as_mut() {
      Some(PlayerHandle::NativeEmbed(embed)) => embed.drain_events(),
      _ => return,
    };
    for event in events {
      match event {
        EmbedEvent::Ready if self.closed => debug!("player ready after close, staying paused"),
        EmbedEvent::Ready => {
          debug!("player ready");
          self.last_playback = Some(PlaybackState::Cued);
          if let Some(PlayerHandle::NativeEmbed(embed)) = self.handle.as_mut()
            && let Err(e) = embed.play().await
          {
            warn!(err = %e, "failed to start playback");
          }
        }
        EmbedEvent::StateChange(state) => {
          debug!(state = state.label(), "player state");
          self.last_playback = Some(state);
        }
        EmbedEvent::Error(msg) if self.closed => {
          warn!(err = %msg, "player error after close, releasing it");
          if let Some(PlayerHandle::NativeEmbed(mut embed)) = self.handle.take()
            && let Err(e) = embed.destroy().await
          {
            warn!(err = %e, "failed to destroy native player");
          }
          self.state = HandleState::Failed(Variant::NativeEmbed);
          return;
        }
        EmbedEvent::Error(msg) => {
          warn!(err = %msg, "player error, using raw frame");
          self.fall_back().await;
          return;
        }
      }
    }
  }

  /// Stop playback when the overlay closes. The handle stays allocated until
  /// the next `open` or `teardown`.
  pub async fn close(&mut self) {
    self.closed = true;
    self.generation += 1;
    match self.handle.as_mut() {
      Some(PlayerHandle::NativeEmbed(embed)) => {
        if let Err(e) = embed.pause().await {
          warn!(err = %e, "failed to pause player");
        }
      }
      Some(PlayerHandle::RawFrame(frame)) => {
        frame.src = frame.without_autoplay();
        if let Err(e) = self.frame_host.load(&frame.src, FRAME_REFERRER_POLICY) {
          warn!(err = %e, "failed to rewrite frame source");
        }
      }
      None => {}
    }
  }

  /// Play/pause on a native embed; no-op for a raw frame.
  pub async fn toggle_play(&mut self) -> Result<()> {
    let Some(PlayerHandle::NativeEmbed(embed)) = self.handle.as_mut() else { return Ok(()) };
    if embed.state().await? == PlaybackState::Playing { embed.pause().await } else { embed.play().await }
  }

  /// Mute/unmute on a native embed; no-op for a raw frame.
  pub async fn toggle_mute(&mut self) -> Result<()> {
    let Some(PlayerHandle::NativeEmbed(embed)) = self.handle.as_mut() else { return Ok(()) };
    let muted = embed.is_muted().await?;
    embed.set_muted(!muted).await
  }

  /// Dispose the live handle.
  pub async fn teardown(&mut self) {
    if let Some(PlayerHandle::NativeEmbed(mut embed)) = self.handle.take()
      && let Err(e) = embed.destroy().await
    {
      warn!(err = %e, "failed to destroy native player");
    }
    self.handle = None;
    self.state = HandleState::Uninitialized;
    self.last_playback = None;
    self.failure = None;
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use anyhow::anyhow;
  use std::sync::Mutex;

  /// Shared log of everything the fakes were asked to do.
  pub(crate) type Log = Arc<Mutex<Vec<String>>>;

  pub(crate) struct FakeEmbed {
    pub log: Log,
    pub rendered: bool,
    pub playing: bool,
    pub muted: bool,
    pub events: Vec<EmbedEvent>,
  }

  #[async_trait]
  impl NativeEmbed for FakeEmbed {
    async fn play(&mut self) -> Result<()> {
      self.log.lock().unwrap().push("play".into());
      self.playing = true;
      Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
      self.log.lock().unwrap().push("pause".into());
      self.playing = false;
      Ok(())
    }

    async fn state(&mut self) -> Result<PlaybackState> {
      Ok(if self.playing { PlaybackState::Playing } else { PlaybackState::Paused })
    }

    async fn is_muted(&mut self) -> Result<bool> {
      Ok(self.muted)
    }

    async fn set_muted(&mut self, muted: bool) -> Result<()> {
      self.log.lock().unwrap().push(format!("muted={muted}"));
      self.muted = muted;
      Ok(())
    }

    async fn is_rendered(&mut self) -> bool {
      self.rendered
    }

    fn drain_events(&mut self) -> Vec<EmbedEvent> {
      std::mem::take(&mut self.events)
    }

    async fn destroy(&mut self) -> Result<()> {
      self.log.lock().unwrap().push("destroy".into());
      Ok(())
    }
  }

  pub(crate) struct FakeRuntime {
    pub available: bool,
    pub construct_ok: bool,
    pub rendered: bool,
    pub events: Vec<EmbedEvent>,
    pub log: Log,
  }

  #[async_trait]
  impl EmbedRuntime for FakeRuntime {
    fn available(&self) -> bool {
      self.available
    }

    async fn create(&self, video_id: &str, _vars: &PlayerVars) -> Result<Box<dyn NativeEmbed>> {
      self.log.lock().unwrap().push(format!("create:{video_id}"));
      if !self.construct_ok {
        return Err(anyhow!("runtime exploded"));
      }
      Ok(Box::new(FakeEmbed {
        log: self.log.clone(),
        rendered: self.rendered,
        playing: true,
        muted: false,
        events: self.events.clone(),
      }))
    }
  }

  pub(crate) struct FakeFrameHost {
    pub log: Log,
    pub fail: bool,
  }

  impl FrameHost for FakeFrameHost {
    fn load(&mut self, src: &str, referrer_policy: &str) -> Result<()> {
      self.log.lock().unwrap().push(format!("frame:{src}|{referrer_policy}"));
      if self.fail { Err(anyhow!("no browser")) } else { Ok(()) }
    }
  }

  pub(crate) fn player(available: bool, construct_ok: bool, rendered: bool, frame_fails: bool) -> (Player, Log) {
    let log: Log = Arc::default();
    let runtime = FakeRuntime { available, construct_ok, rendered, events: Vec::new(), log: log.clone() };
    let host = FakeFrameHost { log: log.clone(), fail: frame_fails };
    (Player::new(Arc::new(runtime), Box::new(host)), log)
  }

  fn frame_entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().iter().filter(|l| l.starts_with("frame:")).cloned().collect()
  }

  // --- state machine ---

  #[test]
  fn transitions() {
    let native = Variant::NativeEmbed;
    let frame = Variant::RawFrame;
    assert_eq!(HandleState::begin(true), HandleState::Creating(native));
    assert_eq!(HandleState::begin(false), HandleState::Creating(frame));
    assert_eq!(HandleState::Creating(native).succeed(), HandleState::Ready(native));
    assert_eq!(HandleState::Creating(native).fail(), HandleState::Creating(frame));
    assert_eq!(HandleState::Ready(native).fail(), HandleState::Creating(frame));
    assert_eq!(HandleState::Creating(frame).fail(), HandleState::Failed(frame));
    assert!(HandleState::Failed(frame).is_terminal_failure());
    assert_eq!(HandleState::Failed(frame).fail(), HandleState::Failed(frame));
    assert_eq!(HandleState::Uninitialized.succeed(), HandleState::Uninitialized);
  }

  #[test]
  fn embed_url_flags() {
    let url = PlayerVars::default().embed_url("abc");
    assert_eq!(
      url,
      "https://www.youtube.com/embed/abc?autoplay=1&controls=1&rel=0&showinfo=0&modestbranding=1&playsinline=1\
       &origin=http://localhost&enablejsapi=1"
    );
    let frame = RawFrame { src: url };
    assert!(frame.without_autoplay().contains("autoplay=0"));
    assert!(!frame.without_autoplay().contains("autoplay=1"));
  }

  // --- lifecycle ---

  #[tokio::test]
  async fn native_then_verified() {
    let (mut player, _log) = player(true, true, true, false);
    let generation = player.open("v1").await.expect("verify pending");
    assert_eq!(player.state(), HandleState::Creating(Variant::NativeEmbed));
    player.verify(generation).await;
    assert_eq!(player.state(), HandleState::Ready(Variant::NativeEmbed));
  }

  #[tokio::test]
  async fn invisible_native_falls_back_to_frame() {
    let (mut player, log) = player(true, true, false, false);
    let generation = player.open("v1").await.unwrap();
    player.verify(generation).await;
    assert_eq!(player.state(), HandleState::Ready(Variant::RawFrame));
    assert!(matches!(player.handle(), Some(PlayerHandle::RawFrame(_))));
    assert!(log.lock().unwrap().contains(&"destroy".to_string()));
    let frames = frame_entries(&log);
    assert_eq!(frames.len(), 1);
    assert!(frames[0].ends_with("|strict-origin-when-cross-origin"));
  }

  #[tokio::test]
  async fn construction_error_falls_back_immediately() {
    let (mut player, log) = player(true, false, true, false);
    assert_eq!(player.open("v1").await, None);
    assert_eq!(player.state(), HandleState::Ready(Variant::RawFrame));
    assert_eq!(frame_entries(&log).len(), 1);
  }

  #[tokio::test]
  async fn missing_runtime_goes_straight_to_frame() {
    let (mut player, log) = player(false, true, true, false);
    assert_eq!(player.open("v1").await, None);
    assert_eq!(player.state(), HandleState::Ready(Variant::RawFrame));
    assert!(!log.lock().unwrap().iter().any(|l| l.starts_with("create:")));
  }

  #[tokio::test]
  async fn failed_frame_is_terminal() {
    let (mut player, _log) = player(false, true, true, true);
    player.open("v1").await;
    assert!(player.state().is_terminal_failure());
    assert_eq!(player.failure, Some(ClientError::PlayerConstruction("no browser".into())));
    // the handle is still there so close works
    player.close().await;
  }

  #[tokio::test]
  async fn stale_verify_is_ignored() {
    let (mut player, log) = player(true, true, false, false);
    let first = player.open("v1").await.unwrap();
    let second = player.open("v2").await.unwrap();
    player.verify(first).await;
    assert_eq!(player.state(), HandleState::Creating(Variant::NativeEmbed));
    assert!(frame_entries(&log).is_empty());
    player.verify(second).await;
    assert_eq!(player.state(), HandleState::Ready(Variant::RawFrame));
  }

  #[tokio::test]
  async fn reopening_destroys_previous_handle_first() {
    let (mut player, log) = player(true, true, true, false);
    player.open("v1").await;
    player.open("v2").await;
    let entries = log.lock().unwrap().clone();
    assert_eq!(entries, ["create:v1", "destroy", "create:v2"]);
    assert_eq!(player.video_id(), Some("v2"));
  }

  #[tokio::test]
  async fn native_error_event_falls_back() {
    let log: Log = Arc::default();
    let runtime = FakeRuntime {
      available: true,
      construct_ok: true,
      rendered: true,
      events: vec![EmbedEvent::StateChange(PlaybackState::Buffering), EmbedEvent::Error("150".into())],
      log: log.clone(),
    };
    let mut player = Player::new(Arc::new(runtime), Box::new(FakeFrameHost { log: log.clone(), fail: false }));
    player.open("v1").await;
    player.poll().await;
    assert_eq!(player.last_playback, Some(PlaybackState::Buffering));
    assert_eq!(player.state(), HandleState::Ready(Variant::RawFrame));
  }

  fn player_with_events(events: Vec<EmbedEvent>) -> (Player, Log) {
    let log: Log = Arc::default();
    let runtime = FakeRuntime { available: true, construct_ok: true, rendered: true, events, log: log.clone() };
    (Player::new(Arc::new(runtime), Box::new(FakeFrameHost { log: log.clone(), fail: false })), log)
  }

  #[tokio::test]
  async fn ready_cues_then_plays() {
    let (mut player, log) = player_with_events(vec![EmbedEvent::Ready]);
    player.open("v1").await;
    player.poll().await;
    assert_eq!(player.last_playback, Some(PlaybackState::Cued));
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("play"));
  }

  // --- after close ---

  #[tokio::test]
  async fn verify_after_close_starts_nothing() {
    let (mut player, log) = player(true, true, false, false);
    let generation = player.open("v1").await.unwrap();
    player.close().await;
    player.verify(generation).await;
    assert!(frame_entries(&log).is_empty());
    assert!(matches!(player.handle(), Some(PlayerHandle::NativeEmbed(_))));
  }

  #[tokio::test]
  async fn error_after_close_releases_without_frame() {
    let (mut player, log) = player_with_events(vec![EmbedEvent::Error("150".into())]);
    player.open("v1").await;
    player.close().await;
    player.poll().await;
    assert!(frame_entries(&log).is_empty());
    assert!(player.handle().is_none());
    assert_eq!(player.state(), HandleState::Failed(Variant::NativeEmbed));
    assert_eq!(log.lock().unwrap().clone(), ["create:v1", "pause", "destroy"]);
  }

  #[tokio::test]
  async fn ready_after_close_stays_paused() {
    let (mut player, log) = player_with_events(vec![EmbedEvent::Ready]);
    player.open("v1").await;
    player.close().await;
    player.poll().await;
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("pause"));
  }

  #[tokio::test]
  async fn reopen_after_close_verifies_again() {
    let (mut player, log) = player(true, true, false, false);
    player.open("v1").await;
    player.close().await;
    let generation = player.open("v2").await.unwrap();
    player.verify(generation).await;
    assert_eq!(frame_entries(&log).len(), 1);
    assert_eq!(player.state(), HandleState::Ready(Variant::RawFrame));
  }

  // --- controls ---

  #[tokio::test]
  async fn close_pauses_native() {
    let (mut player, log) = player(true, true, true, false);
    player.open("v1").await;
    player.close().await;
    assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("pause"));
  }

  #[tokio::test]
  async fn close_rewrites_frame_source() {
    let (mut player, log) = player(false, true, true, false);
    player.open("v1").await;
    player.close().await;
    let frames = frame_entries(&log);
    assert_eq!(frames.len(), 2);
    assert!(frames[1].contains("autoplay=0"));
    let Some(PlayerHandle::RawFrame(frame)) = player.handle() else { panic!("expected raw frame") };
    assert!(frame.src.contains("autoplay=0"));
  }

  #[tokio::test]
  async fn toggles_on_native() {
    let (mut player, log) = player(true, true, true, false);
    player.open("v1").await;
    player.toggle_play().await.unwrap();
    player.toggle_play().await.unwrap();
    player.toggle_mute().await.unwrap();
    player.toggle_mute().await.unwrap();
    let entries = log.lock().unwrap().clone();
    assert_eq!(entries[1..], ["pause", "play", "muted=true", "muted=false"]);
  }

  #[tokio::test]
  async fn toggles_are_noops_on_frame() {
    let (mut player, log) = player(false, true, true, false);
    player.open("v1").await;
    player.toggle_play().await.unwrap();
    player.toggle_mute().await.unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
  }
}
