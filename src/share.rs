//! Share action: native share command, then clipboard, then a manual prompt.

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

pub const SHARE_TEXT: &str = "Check out this video";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePayload {
  pub title: String,
  pub text: String,
  pub url: String,
}

impl SharePayload {
  pub fn new(title: &str, url: String) -> Self {
    Self { title: title.to_string(), text: SHARE_TEXT.to_string(), url }
  }
}

/// How the payload left the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
  Shared,
  Copied,
  /// Nothing worked; the user is shown this prompt.
  Manual(String),
}

pub trait ShareTarget {
  /// Hand the payload to a platform share capability. `Ok(false)` means none is
  /// configured.
  fn native_share(&mut self, payload: &SharePayload) -> Result<bool>;
  fn copy_to_clipboard(&mut self, text: &str) -> Result<()>;
}

pub fn share(target: &mut dyn ShareTarget, payload: &SharePayload) -> ShareOutcome {
  match target.native_share(payload) {
    Ok(true) => {
      info!(url = %payload.url, "shared via native command");
      return ShareOutcome::Shared;
    }
    Ok(false) => debug!("no native share command configured"),
    Err(e) => warn!(err = %e, "native share failed"),
  }
  match target.copy_to_clipboard(&payload.url) {
    Ok(()) => ShareOutcome::Copied,
    Err(e) => {
      warn!(err = %e, "clipboard copy failed");
      ShareOutcome::Manual(format!("Copy this link: {}", payload.url))
    }
  }
}

/// Clipboard programs tried in order. Each reads the text on stdin.
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
  ("wl-copy", &[]),
  ("xclip", &["-selection", "clipboard"]),
  ("xsel", &["--clipboard", "--input"]),
  ("pbcopy", &[]),
];

/// Terminal share target. The native capability is a user-configured command
/// run with `YTGRID_SHARE_TITLE`, `YTGRID_SHARE_TEXT` and `YTGRID_SHARE_URL`
/// set.
///
/// The clipboard is a system clipboard program when one is installed, else an
/// OSC 52 escape written to the controlling terminal. Terminals give no reply
/// to OSC 52, so that path counts as copied once the write succeeds even if
/// the terminal ignores it. The manual prompt is only reached when no program
/// worked and there is no terminal to write to.
pub struct TerminalShare {
  pub command: Option<String>,
}

impl ShareTarget for TerminalShare {
  fn native_share(&mut self, payload: &SharePayload) -> Result<bool> {
    let Some(command) = self.command.as_deref().filter(|c| !c.trim().is_empty()) else { return Ok(false) };
    let status = Command::new("sh")
      .arg("-c")
      .arg(command)
      .env("YTGRID_SHARE_TITLE", &payload.title)
      .env("YTGRID_SHARE_TEXT", &payload.text)
      .env("YTGRID_SHARE_URL", &payload.url)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status()
      .with_context(|| format!("Failed to run share command: {command}"))?;
    if !status.success() {
      bail!("share command exited with {status}");
    }
    Ok(true)
  }

  fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
    for (bin, args) in CLIPBOARD_TOOLS {
      if pipe_to(bin, args, text) {
        debug!(tool = *bin, "copied with clipboard program");
        return Ok(());
      }
    }
    let mut tty = std::fs::OpenOptions::new().write(true).open("/dev/tty").context("No terminal for OSC 52")?;
    let sequence = osc52(text, std::env::var_os("TMUX").is_some());
    tty.write_all(sequence.as_bytes()).context("Failed to write OSC 52 sequence")?;
    tty.flush().context("Failed to flush OSC 52 sequence")?;
    Ok(())
  }
}

/// Feed `text` to a clipboard program. False when it is missing or fails.
fn pipe_to(bin: &str, args: &[&str], text: &str) -> bool {
  let Ok(mut child) =
    Command::new(bin).args(args).stdin(Stdio::piped()).stdout(Stdio::null()).stderr(Stdio::null()).spawn()
  else {
    return false;
  };
  if let Some(mut stdin) = child.stdin.take()
    && stdin.write_all(text.as_bytes()).is_err()
  {
    let _ = child.kill();
  }
  child.wait().is_ok_and(|status| status.success())
}

/// OSC 52 "set clipboard" escape for `text`, wrapped for tmux pass-through.
pub fn osc52(text: &str, tmux: bool) -> String {
  let sequence = format!("\x1b]52;c;{}\x07", BASE64.encode(text));
  if tmux { format!("\x1bPtmux;\x1b{sequence}\x1b\\") } else { sequence }
}
