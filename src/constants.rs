//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` and parsed without
//! runtime file I/O, once, on first access.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub default_server_url: String,

  // Playback position persistence
  pub save_debounce_ms: u64,
  pub min_save_position_secs: f64,

  // Session
  pub liveness_interval_secs: u64,
  pub http_timeout_secs: u64,

  // mpv
  pub mpv_connect_attempts: u32,
  pub mpv_connect_delay_ms: u64,
  pub seek_step_secs: f64,
  pub volume_step: f64,

  // UI
  pub error_dismiss_secs: u64,
}

impl Constants {
  pub fn save_debounce(&self) -> Duration {
    Duration::from_millis(self.save_debounce_ms)
  }

  pub fn liveness_interval(&self) -> Duration {
    Duration::from_secs(self.liveness_interval_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert_eq!(c.save_debounce(), Duration::from_millis(1000));
    assert_eq!(c.min_save_position_secs, 5.0);
    assert_eq!(c.liveness_interval(), Duration::from_secs(300));
  }
}
