//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! with no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub api_base_url: String,
  pub default_region: String,

  // Listing
  pub page_size: u32,
  pub search_page_size: u32,
  pub scroll_threshold_rows: usize,

  // Credential
  pub min_credential_len: usize,

  // Player
  pub embed_base_url: String,
  pub watch_base_url: String,
  pub share_base_url: String,
  pub embed_origin: String,
  pub embed_verify_delay_ms: u64,

  // Thumbnails
  pub thumbnail_base_url: String,
  pub fallback_thumbnail_url: String,

  // Network
  pub request_timeout_secs: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
