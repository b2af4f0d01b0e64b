use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// User preferences persisted in `prefs.toml`.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub theme_name: Option<String>,
  pub region_code: Option<String>,
  /// Shell command used as the native share target.
  pub share_command: Option<String>,
}

fn prefs_path() -> Option<PathBuf> {
  ProjectDirs::from("", "", "ytgrid").map(|dirs| dirs.config_dir().join("prefs.toml"))
}

impl Config {
  pub fn load() -> Self {
    prefs_path().map(|path| Self::load_from(&path)).unwrap_or_default()
  }

  pub fn load_from(path: &std::path::Path) -> Self {
    let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
    match toml::from_str(&content) {
      Ok(config) => config,
      Err(e) => {
        warn!(err = %e, path = %path.display(), "ignoring malformed prefs");
        Self::default()
      }
    }
  }

  pub fn save(&self) {
    if let Some(path) = prefs_path() {
      self.save_to(&path);
    }
  }

  pub fn save_to(&self, path: &std::path::Path) {
    if let Some(dir) = path.parent()
      && std::fs::create_dir_all(dir).is_ok()
      && let Ok(content) = toml::to_string(self)
      && let Err(e) = std::fs::write(path, content)
    {
      warn!(err = %e, "failed to save prefs");
    }
  }
}
