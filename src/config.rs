use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq)]
pub struct Config {
  pub server_url: Option<String>,
  pub username: Option<String>,
  pub theme_name: Option<String>,
  /// Open a video window for video entries. Audio-only when false.
  pub video: Option<bool>,
  pub type_filter: Option<String>,
}

impl Config {
  fn path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mstream").map(|dirs| dirs.config_dir().join("prefs.toml"))
  }

  pub fn load() -> Self {
    Self::path().map(|p| Self::load_from(&p)).unwrap_or_default()
  }

  pub fn save(&self) {
    if let Some(path) = Self::path() {
      self.save_to(&path);
    }
  }

  fn load_from(path: &Path) -> Self {
    if let Ok(content) = std::fs::read_to_string(path) {
      match toml::from_str(&content) {
        Ok(config) => return config,
        Err(e) => warn!(path = %path.display(), err = %e, "config: ignoring unreadable preferences"),
      }
    }
    Self::default()
  }

  fn save_to(&self, path: &Path) {
    if let Some(dir) = path.parent()
      && std::fs::create_dir_all(dir).is_ok()
      && let Ok(content) = toml::to_string(self)
      && let Err(e) = std::fs::write(path, content)
    {
      warn!(path = %path.display(), err = %e, "config: failed to save preferences");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("mstream-config-test-{}-{}", std::process::id(), name)).join("prefs.toml")
  }

  #[test]
  fn missing_file_gives_defaults() {
    assert_eq!(Config::load_from(&scratch("missing")), Config::default());
  }

  #[test]
  fn save_then_load_keeps_preferences() {
    let path = scratch("roundtrip");
    let config = Config {
      server_url: Some("http://nas:5000".to_string()),
      username: Some("ana".to_string()),
      theme_name: Some("Dusk".to_string()),
      video: Some(false),
      type_filter: Some("audio".to_string()),
    };
    config.save_to(&path);
    assert_eq!(Config::load_from(&path), config);
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }

  #[test]
  fn malformed_file_gives_defaults() {
    let path = scratch("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "video = \"sometimes\"\n[[").unwrap();
    assert_eq!(Config::load_from(&path), Config::default());
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }

  #[test]
  fn partial_file_fills_the_rest_with_none() {
    let path = scratch("partial");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "username = \"bo\"\n").unwrap();
    let config = Config::load_from(&path);
    assert_eq!(config.username.as_deref(), Some("bo"));
    assert_eq!(config.server_url, None);
    let _ = std::fs::remove_dir_all(path.parent().unwrap());
  }
}
