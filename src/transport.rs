//! The playback capability the client drives. Decoding and output are its business only.

use crate::error::Result;

/// Notifications a transport reports back to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
  /// The loaded source is ready to accept seeks.
  Ready,
  /// Playback position moved, in seconds.
  TimeUpdate(f64),
  /// Volume changed, normalised to `0.0..=1.0`.
  VolumeChanged(f64),
  Paused(bool),
  /// The source played through to its end.
  Ended,
}

/// Something that can load a media source and control its playback.
///
/// Commands are fire-and-forget; their effects are observed through [`TransportEvent`]s.
pub trait Transport {
  fn load(&mut self, source: &str) -> Result<()>;
  fn play(&mut self) -> Result<()>;
  fn pause(&mut self) -> Result<()>;
  fn stop(&mut self) -> Result<()>;
  /// Absolute seek. Only valid after [`TransportEvent::Ready`].
  fn seek(&mut self, time: f64) -> Result<()>;
  fn set_volume(&mut self, volume: f64) -> Result<()>;

  fn current_time(&self) -> f64;
  fn volume(&self) -> f64;
  fn is_paused(&self) -> bool;

  /// Cookie header to present when fetching sources from the server.
  fn set_cookie(&mut self, _cookie: Option<&str>) -> Result<()> {
    Ok(())
  }

  /// Resume if paused, pause if playing.
  fn toggle(&mut self) -> Result<()> {
    if self.is_paused() { self.play() } else { self.pause() }
  }
}
