//! Which visible entry is loaded in the transport, and the transitions between entries.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::library::LibraryStore;
use crate::tracker::{PlaybackPosition, PlaybackTracker, PositionSink};
use crate::transport::{Transport, TransportEvent};

/// Current selection. The path is the identity; the index is only where that path sat in
/// the visible list the last time it was resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
  #[default]
  Idle,
  Active { index: usize, path: String },
}

impl Selection {
  pub fn index(&self) -> Option<usize> {
    match self {
      Selection::Idle => None,
      Selection::Active { index, .. } => Some(*index),
    }
  }

  pub fn path(&self) -> Option<&str> {
    match self {
      Selection::Idle => None,
      Selection::Active { path, .. } => Some(path),
    }
  }
}

/// Which transport controls are usable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
  pub previous: bool,
  pub next: bool,
  pub play_pause: bool,
}

impl Controls {
  pub fn for_selection(selection: &Selection, visible_len: usize) -> Self {
    match selection.index() {
      Some(index) => Controls { previous: index > 0, next: index + 1 < visible_len, play_pause: true },
      None => Controls { previous: false, next: visible_len > 0, play_pause: false },
    }
  }
}

/// Drives a [`Transport`] from user commands and transport notifications.
pub struct SelectionController<T> {
  transport: T,
  server: String,
  selection: Selection,
  pending_resume: Option<PlaybackPosition>,
}

impl<T: Transport> SelectionController<T> {
  pub fn new(transport: T, server: impl Into<String>) -> Self {
    Self { transport, server: server.into(), selection: Selection::Idle, pending_resume: None }
  }

  pub fn selection(&self) -> &Selection {
    &self.selection
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  pub fn transport_mut(&mut self) -> &mut T {
    &mut self.transport
  }

  pub fn controls(&self, library: &LibraryStore) -> Controls {
    Controls::for_selection(&self.selection, library.visible_len())
  }

  /// Load and start the visible entry at `index`.
  ///
  /// The outgoing track's position is force-saved first. The saved position of the
  /// incoming track is held back until the transport reports it is ready to seek.
  pub fn play<S: PositionSink>(
    &mut self,
    index: usize,
    library: &LibraryStore,
    tracker: &mut PlaybackTracker<S>,
  ) -> Result<()> {
    let Some(entry) = library.visible_entry(index) else {
      let err = Error::InvalidSelection { index, len: library.visible_len() };
      debug!(err = %err, "selection: play rejected");
      return Err(err);
    };

    self.save_outgoing(tracker);
    self.selection = Selection::Active { index, path: entry.path.clone() };
    self.pending_resume = tracker.saved(&entry.path);

    info!(path = %entry.path, index, resume = ?self.pending_resume.map(|p| p.position), "selection: playing");
    self.transport.load(&entry.source_url(&self.server))?;
    self.transport.play()
  }

  /// Play the following entry. From idle this starts the first entry.
  pub fn next<S: PositionSink>(&mut self, library: &LibraryStore, tracker: &mut PlaybackTracker<S>) -> Result<()> {
    let target = match self.selection.index() {
      Some(index) => index + 1,
      None => 0,
    };
    if target >= library.visible_len() {
      debug!("selection: next at end of list");
      return Ok(());
    }
    self.play(target, library, tracker)
  }

  pub fn previous<S: PositionSink>(&mut self, library: &LibraryStore, tracker: &mut PlaybackTracker<S>) -> Result<()> {
    match self.selection.index() {
      Some(index) if index > 0 => self.play(index - 1, library, tracker),
      _ => {
        debug!("selection: previous at start of list");
        Ok(())
      }
    }
  }

  pub fn toggle_play_pause(&mut self) -> Result<()> {
    if self.selection == Selection::Idle {
      return Ok(());
    }
    self.transport.toggle()
  }

  /// Stop playback and go idle, keeping the outgoing position.
  pub fn stop<S: PositionSink>(&mut self, tracker: &mut PlaybackTracker<S>) -> Result<()> {
    if self.selection == Selection::Idle {
      return Ok(());
    }
    self.save_outgoing(tracker);
    self.go_idle()
  }

  /// Go idle without saving anything. Used when the session is gone.
  pub fn reset(&mut self) -> Result<()> {
    if self.selection == Selection::Idle {
      return Ok(());
    }
    self.go_idle()
  }

  /// Re-resolve the selection by path after the visible list was rebuilt.
  ///
  /// If the active path is no longer visible the selection goes idle and the transport
  /// stops. Otherwise only the stored index is updated.
  pub fn reconcile<S: PositionSink>(&mut self, library: &LibraryStore, tracker: &mut PlaybackTracker<S>) -> Result<()> {
    let Selection::Active { index, path } = &mut self.selection else {
      return Ok(());
    };
    match library.visible_position(path) {
      Some(new_index) => {
        if *index != new_index {
          debug!(path = %path, from = *index, to = new_index, "selection: index moved");
          *index = new_index;
        }
        Ok(())
      }
      None => {
        info!(path = %path, "selection: active entry filtered out, stopping");
        self.stop(tracker)
      }
    }
  }

  /// React to a transport notification.
  pub fn on_event<S: PositionSink>(
    &mut self,
    event: &TransportEvent,
    library: &LibraryStore,
    tracker: &mut PlaybackTracker<S>,
  ) -> Result<()> {
    match event {
      TransportEvent::Ready => {
        if let Some(resume) = self.pending_resume.take() {
          if resume.position > 0.0 {
            debug!(position = resume.position, "selection: resuming");
            self.transport.seek(resume.position)?;
          }
          if let Some(volume) = resume.volume {
            self.transport.set_volume(volume)?;
          }
        }
        Ok(())
      }
      TransportEvent::TimeUpdate(time) => {
        if let Some(path) = self.selection.path() {
          tracker.on_time_update(path, *time, Some(self.transport.volume()), false);
        }
        Ok(())
      }
      TransportEvent::Ended => {
        if self.selection == Selection::Idle {
          return Ok(());
        }
        self.next(library, tracker)
      }
      TransportEvent::VolumeChanged(_) | TransportEvent::Paused(_) => Ok(()),
    }
  }

  /// Relative seek on the active entry.
  pub fn seek_by(&mut self, delta: f64) -> Result<()> {
    if self.selection == Selection::Idle || self.pending_resume.is_some() {
      return Ok(());
    }
    let target = (self.transport.current_time() + delta).max(0.0);
    self.transport.seek(target)
  }

  pub fn change_volume(&mut self, delta: f64) -> Result<()> {
    let volume = (self.transport.volume() + delta).clamp(0.0, 1.0);
    self.transport.set_volume(volume)
  }

  fn save_outgoing<S: PositionSink>(&mut self, tracker: &mut PlaybackTracker<S>) {
    let Selection::Active { path, .. } = &self.selection else {
      return;
    };
    // Until the resume seek lands the transport still reports the start of the file.
    let (position, volume) = match self.pending_resume {
      Some(resume) => (resume.position, resume.volume.or(Some(self.transport.volume()))),
      None => (self.transport.current_time(), Some(self.transport.volume())),
    };
    tracker.on_time_update(path, position, volume, true);
  }

  fn go_idle(&mut self) -> Result<()> {
    self.selection = Selection::Idle;
    self.pending_resume = None;
    self.transport.stop()
  }
}
