//! Concrete player backends: `mpv` as the controllable embed, the system
//! browser as the raw frame host.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::player::{EmbedEvent, EmbedRuntime, FrameHost, NativeEmbed, PlaybackState, PlayerVars};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Send one command over mpv's JSON IPC socket and wait for its reply.
async fn ipc_request(socket_path: &str, command: Value) -> Result<Value> {
  let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
  let mut stream = UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
  let mut line = json!({ "command": command, "request_id": request_id }).to_string();
  line.push('\n');
  stream.write_all(line.as_bytes()).await.context("Failed to send command to mpv IPC")?;

  let reader = TokioBufReader::new(stream);
  let mut lines = reader.lines();

  // mpv may emit event lines before our response; read up to 20 lines.
  for _ in 0..20 {
    let line = tokio::time::timeout(Duration::from_secs(3), lines.next_line())
      .await
      .context("Timeout waiting for mpv IPC response")?
      .context("Failed to read from mpv IPC socket")?;
    let Some(line) = line else { break };

    if let Ok(val) = serde_json::from_str::<Value>(&line)
      && val.get("request_id").and_then(Value::as_u64) == Some(request_id)
    {
      return match val.get("error").and_then(Value::as_str) {
        Some("success") => Ok(val.get("data").cloned().unwrap_or(Value::Null)),
        Some(err) => Err(anyhow!("mpv IPC error: {}", err)),
        None => Err(anyhow!("mpv IPC reply without status")),
      };
    }
  }
  Err(anyhow!("mpv IPC closed without a reply"))
}

/// Map one mpv IPC event line to a player callback.
fn map_event(line: &str) -> Option<EmbedEvent> {
  let val: Value = serde_json::from_str(line).ok()?;
  match val.get("event")?.as_str()? {
    "start-file" => Some(EmbedEvent::StateChange(PlaybackState::Unstarted)),
    "file-loaded" => Some(EmbedEvent::Ready),
    "playback-restart" | "unpause" => Some(EmbedEvent::StateChange(PlaybackState::Playing)),
    "pause" => Some(EmbedEvent::StateChange(PlaybackState::Paused)),
    "end-file" => match val.get("reason").and_then(Value::as_str) {
      Some("error") => {
        let detail = val.get("file_error").and_then(Value::as_str).unwrap_or("playback failed");
        Some(EmbedEvent::Error(detail.to_string()))
      }
      _ => Some(EmbedEvent::StateChange(PlaybackState::Ended)),
    },
    _ => None,
  }
}

/// Builds mpv-backed embeds. Available when `mpv` is on `PATH`.
pub struct MpvRuntime {
  available: bool,
}

impl MpvRuntime {
  pub fn detect() -> Self {
    let available = std::env::var_os("PATH")
      .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join("mpv").is_file()))
      .unwrap_or(false);
    info!(available, "mpv runtime detection");
    Self { available }
  }
}

#[async_trait]
impl EmbedRuntime for MpvRuntime {
  fn available(&self) -> bool {
    self.available
  }

  async fn create(&self, video_id: &str, vars: &PlayerVars) -> Result<Box<dyn NativeEmbed>> {
    let socket_path = std::env::temp_dir().join(format!("ytgrid-mpv-{}.sock", std::process::id()));
    let socket_path = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let url = format!("{}{}", constants().watch_base_url, video_id);
    let mut cmd = Command::new("mpv");
    cmd.args([
      "--force-window=immediate",
      "--really-quiet",
      &format!("--pause={}", if vars.autoplay { "no" } else { "yes" }),
      &format!("--osc={}", if vars.controls { "yes" } else { "no" }),
      &format!("--input-ipc-server={}", socket_path),
      &url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;
    info!(video_id, "mpv spawned");

    let (tx, rx) = mpsc::channel::<EmbedEvent>(32);
    let monitor = tokio::spawn(monitor_events(socket_path.clone(), tx));

    Ok(Box::new(MpvEmbed { child, socket_path, events_rx: rx, monitor: Some(monitor) }))
  }
}

/// Observe mpv's event stream. The socket appears shortly after spawn, so the
/// connection is retried a few times.
async fn monitor_events(socket_path: String, tx: mpsc::Sender<EmbedEvent>) {
  let mut stream = None;
  for attempt in 0..10 {
    tokio::time::sleep(Duration::from_millis(200)).await;
    match UnixStream::connect(&socket_path).await {
      Ok(s) => {
        stream = Some(s);
        break;
      }
      Err(e) => debug!(attempt, err = %e, "mpv IPC not ready"),
    }
  }
  let Some(stream) = stream else {
    let _ = tx.send(EmbedEvent::Error("mpv IPC socket never appeared".to_string())).await;
    return;
  };

  let mut lines = TokioBufReader::new(stream).lines();
  while let Ok(Some(line)) = lines.next_line().await {
    if let Some(event) = map_event(&line)
      && tx.send(event).await.is_err()
    {
      break;
    }
  }
}

pub struct MpvEmbed {
  child: TokioChild,
  socket_path: String,
  events_rx: mpsc::Receiver<EmbedEvent>,
  monitor: Option<JoinHandle<()>>,
}

impl MpvEmbed {
  async fn set_property(&self, name: &str, value: Value) -> Result<()> {
    ipc_request(&self.socket_path, json!(["set_property", name, value])).await.map(|_| ())
  }

  async fn get_bool(&self, name: &str) -> Result<bool> {
    let value = ipc_request(&self.socket_path, json!(["get_property", name])).await?;
    value.as_bool().ok_or_else(|| anyhow!("mpv property {} is not a bool", name))
  }
}

#[async_trait]
impl NativeEmbed for MpvEmbed {
  async fn play(&mut self) -> Result<()> {
    self.set_property("pause", Value::Bool(false)).await
  }

  async fn pause(&mut self) -> Result<()> {
    self.set_property("pause", Value::Bool(true)).await
  }

  async fn state(&mut self) -> Result<PlaybackState> {
    if self.get_bool("eof-reached").await.unwrap_or(false) {
      return Ok(PlaybackState::Ended);
    }
    if self.get_bool("paused-for-cache").await.unwrap_or(false) {
      return Ok(PlaybackState::Buffering);
    }
    Ok(if self.get_bool("pause").await? { PlaybackState::Paused } else { PlaybackState::Playing })
  }

  async fn is_muted(&mut self) -> Result<bool> {
    self.get_bool("mute").await
  }

  async fn set_muted(&mut self, muted: bool) -> Result<()> {
    self.set_property("mute", Value::Bool(muted)).await
  }

  async fn is_rendered(&mut self) -> bool {
    match self.child.try_wait() {
      Ok(None) => UnixStream::connect(&self.socket_path).await.is_ok(),
      Ok(Some(status)) => {
        debug!(%status, "mpv exited before render check");
        false
      }
      Err(_) => false,
    }
  }

  fn drain_events(&mut self) -> Vec<EmbedEvent> {
    let mut events = Vec::new();
    while let Ok(event) = self.events_rx.try_recv() {
      events.push(event);
    }
    if let Ok(Some(status)) = self.child.try_wait()
      && !status.success()
    {
      events.push(EmbedEvent::Error(format!("mpv exited with {status}")));
    }
    events
  }

  async fn destroy(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor.take() {
      handle.abort();
      let _ = handle.await;
    }
    if self.child.try_wait().ok().flatten().is_none() {
      self.child.kill().await.context("Failed to kill mpv process")?;
    }
    let _ = self.child.wait().await;
    let _ = std::fs::remove_file(&self.socket_path);
    Ok(())
  }
}

/// Raw frame host: hands the embed URL to the system browser.
///
/// A browser tab cannot be paused from here, so only sources that autoplay are
/// launched; a source rewritten with `autoplay=0` is recorded and left alone.
#[derive(Default)]
pub struct BrowserFrame {
  pub current_src: Option<String>,
}

impl FrameHost for BrowserFrame {
  fn load(&mut self, src: &str, referrer_policy: &str) -> Result<()> {
    self.current_src = Some(src.to_string());
    if !src.contains("autoplay=1") {
      debug!(src, "frame source neutralized");
      return Ok(());
    }
    debug!(src, referrer_policy, "opening raw frame in browser");
    open_in_browser(src)
  }
}

/// Open a URL with the platform opener, reaping the child in the background.
pub fn open_in_browser(url: &str) -> Result<()> {
  #[cfg(target_os = "macos")]
  let cmd = "open";
  #[cfg(not(target_os = "macos"))]
  let cmd = "xdg-open";
  let mut child = std::process::Command::new(cmd)
    .arg(url)
    .stdin(Stdio::null())
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .spawn()
    .with_context(|| format!("Failed to launch {cmd}"))?;
  // Reap the child in a background thread to avoid zombie processes.
  std::thread::spawn(move || {
    if let Err(e) = child.wait() {
      warn!(err = %e, "browser launcher did not exit cleanly");
    }
  });
  Ok(())
}
