//! API key persistence.
//!
//! A single key in a TOML file under the platform config directory. Nothing
//! else in the client runs until a key passes [`Credential::parse`].

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::constants::constants;
use crate::error::ClientError;

const STORE_KEY: &str = "youtube_api_key";

/// An API key that passed the length sanity check.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
  /// Accept a candidate key if it is longer than the minimum length.
  /// This is a structural check only.
  pub fn parse(candidate: &str) -> Result<Self, ClientError> {
    let key = candidate.trim();
    if key.len() > constants().min_credential_len {
      Ok(Self(key.to_string()))
    } else {
      Err(ClientError::CredentialInvalid)
    }
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

// Keep keys out of logs and panic messages.
impl std::fmt::Debug for Credential {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Credential({}…)", self.0.chars().take(4).collect::<String>())
  }
}

/// Persistent string key-value storage.
pub trait KeyValueStore: Send {
  fn get(&self, key: &str) -> Option<String>;
  fn set(&mut self, key: &str, value: &str) -> Result<()>;
  fn remove(&mut self, key: &str) -> Result<()>;
}

#[derive(Serialize, Deserialize, Default, Debug)]
struct StoreFile {
  #[serde(default)]
  values: std::collections::BTreeMap<String, String>,
}

/// `credentials.toml` in the platform config directory.
pub struct FileStore {
  path: PathBuf,
}

impl FileStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  /// The default location, or `None` when no home directory can be resolved.
  pub fn default_location() -> Option<Self> {
    ProjectDirs::from("", "", "ytgrid").map(|dirs| Self::new(dirs.config_dir().join("credentials.toml")))
  }

  fn read(&self) -> StoreFile {
    std::fs::read_to_string(&self.path).ok().and_then(|content| toml::from_str(&content).ok()).unwrap_or_default()
  }

  fn write(&self, file: &StoreFile) -> Result<()> {
    if let Some(dir) = self.path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(file).context("Failed to serialize credential store")?;
    std::fs::write(&self.path, content).with_context(|| format!("Failed to write {}", self.path.display()))
  }
}

impl KeyValueStore for FileStore {
  fn get(&self, key: &str) -> Option<String> {
    self.read().values.get(key).cloned()
  }

  fn set(&mut self, key: &str, value: &str) -> Result<()> {
    let mut file = self.read();
    file.values.insert(key.to_string(), value.to_string());
    self.write(&file)
  }

  fn remove(&mut self, key: &str) -> Result<()> {
    let mut file = self.read();
    if file.values.remove(key).is_some() {
      self.write(&file)?;
    }
    Ok(())
  }
}

/// In-process store, used when no config directory exists and in tests.
#[derive(Default)]
pub struct MemoryStore {
  values: std::collections::HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Option<String> {
    self.values.get(key).cloned()
  }

  fn set(&mut self, key: &str, value: &str) -> Result<()> {
    self.values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&mut self, key: &str) -> Result<()> {
    self.values.remove(key);
    Ok(())
  }
}

pub struct CredentialStore {
  store: Box<dyn KeyValueStore>,
}

impl CredentialStore {
  pub fn new(store: Box<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// The saved key, if one exists and still passes validation.
  pub fn load(&self) -> Option<Credential> {
    let raw = self.store.get(STORE_KEY)?;
    match Credential::parse(&raw) {
      Ok(credential) => Some(credential),
      Err(_) => {
        warn!("stored API key failed validation, ignoring it");
        None
      }
    }
  }

  pub fn save(&mut self, credential: &Credential) -> Result<()> {
    self.store.set(STORE_KEY, credential.as_str()).context("Failed to save API key")?;
    info!("API key saved");
    Ok(())
  }

  pub fn clear(&mut self) -> Result<()> {
    self.store.remove(STORE_KEY).context("Failed to remove API key")?;
    info!("API key cleared");
    Ok(())
  }
}
