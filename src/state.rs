use std::collections::HashMap;

use crate::error::Result;
use crate::filter::{FilterState, TypeFilter};
use crate::library::{LibraryStore, MediaEntry};
use crate::selection::{Controls, Selection, SelectionController};
use crate::tracker::{PlaybackPosition, PlaybackTracker, PositionSink};
use crate::transport::{Transport, TransportEvent};

/// All mutable playback state of one logged-in session.
///
/// Every mutation happens synchronously inside one call, so the visible list and the
/// selection are never observed out of step with each other.
pub struct SessionState<T, S> {
  library: LibraryStore,
  tracker: PlaybackTracker<S>,
  selection: SelectionController<T>,
}

impl<T: Transport, S: PositionSink> SessionState<T, S> {
  pub fn new(library: LibraryStore, tracker: PlaybackTracker<S>, selection: SelectionController<T>) -> Self {
    Self { library, tracker, selection }
  }

  pub fn library(&self) -> &LibraryStore {
    &self.library
  }

  pub fn tracker(&self) -> &PlaybackTracker<S> {
    &self.tracker
  }

  pub fn selection(&self) -> &Selection {
    self.selection.selection()
  }

  pub fn transport(&self) -> &T {
    self.selection.transport()
  }

  pub fn transport_mut(&mut self) -> &mut T {
    self.selection.transport_mut()
  }

  pub fn controls(&self) -> Controls {
    self.selection.controls(&self.library)
  }

  /// Install a freshly fetched library and re-resolve the selection against it.
  pub fn replace_library(&mut self, entries: Vec<MediaEntry>) -> Result<()> {
    self.library.replace(entries);
    self.selection.reconcile(&self.library, &mut self.tracker)
  }

  pub fn load_positions(&mut self, positions: HashMap<String, PlaybackPosition>) {
    self.tracker.load(positions);
  }

  pub fn set_filter(&mut self, filter: FilterState) -> Result<()> {
    self.library.set_filter(filter);
    self.selection.reconcile(&self.library, &mut self.tracker)
  }

  pub fn set_type_filter(&mut self, type_filter: TypeFilter) -> Result<()> {
    let filter = FilterState { type_filter, ..self.library.filter().clone() };
    self.set_filter(filter)
  }

  pub fn set_query(&mut self, query: impl Into<String>) -> Result<()> {
    let filter = FilterState { query: query.into(), ..self.library.filter().clone() };
    self.set_filter(filter)
  }

  pub fn play(&mut self, index: usize) -> Result<()> {
    self.selection.play(index, &self.library, &mut self.tracker)
  }

  pub fn next(&mut self) -> Result<()> {
    self.selection.next(&self.library, &mut self.tracker)
  }

  pub fn previous(&mut self) -> Result<()> {
    self.selection.previous(&self.library, &mut self.tracker)
  }

  pub fn toggle_play_pause(&mut self) -> Result<()> {
    self.selection.toggle_play_pause()
  }

  pub fn stop(&mut self) -> Result<()> {
    self.selection.stop(&mut self.tracker)
  }

  pub fn seek_by(&mut self, delta: f64) -> Result<()> {
    self.selection.seek_by(delta)
  }

  pub fn change_volume(&mut self, delta: f64) -> Result<()> {
    self.selection.change_volume(delta)
  }

  pub fn handle_event(&mut self, event: &TransportEvent) -> Result<()> {
    self.selection.on_event(event, &self.library, &mut self.tracker)
  }

  /// Stop playback without saving and drop any save that has not gone out yet.
  /// Used when the session has expired.
  pub fn suspend(&mut self) -> Result<()> {
    self.tracker.discard_pending();
    self.selection.reset()
  }

  /// Forget the whole session, e.g. on logout.
  pub fn clear(&mut self) -> Result<()> {
    self.tracker.clear();
    self.library.clear();
    self.selection.reset()
  }

  /// Save the current position, push out any pending save and stop the transport.
  pub async fn shutdown(&mut self) -> Result<()> {
    let result = self.selection.stop(&mut self.tracker);
    self.tracker.flush().await;
    result
  }
}
