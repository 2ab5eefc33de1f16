//! Per-file playback position tracking with debounced persistence.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::debounce::Debouncer;
use crate::error::{Error, Result};

/// Last known position and volume for one file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackPosition {
  /// Seconds from the start, never negative.
  pub position: f64,
  /// Normalised to `0.0..=1.0`.
  pub volume: Option<f64>,
}

/// Body of `POST /api/playback-state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
  pub path: String,
  pub position: f64,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub volume: Option<f64>,
}

/// Destination of position checkpoints.
///
/// The returned future must own everything it needs so it can outlive the tracker call
/// that created it.
pub trait PositionSink: Send + Sync + 'static {
  fn save(&self, update: PositionUpdate) -> impl Future<Output = Result<()>> + Send + 'static;
}

/// Parse the body of `GET /api/playback-state`.
///
/// Accepts `{path: {position, volume?}}` as well as `{path: position}`. Anything else,
/// including negative or non-finite positions, is treated as absent.
pub fn parse_saved_positions(body: &serde_json::Value) -> HashMap<String, PlaybackPosition> {
  let Some(map) = body.as_object() else {
    return HashMap::new();
  };
  map
    .iter()
    .filter_map(|(path, value)| {
      let (position, volume) = match value {
        serde_json::Value::Number(n) => (n.as_f64()?, None),
        serde_json::Value::Object(obj) => {
          let position = obj.get("position")?.as_f64()?;
          let volume = obj.get("volume").and_then(|v| v.as_f64()).filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0));
          (position, volume)
        }
        _ => return None,
      };
      (position.is_finite() && position >= 0.0).then(|| (path.clone(), PlaybackPosition { position, volume }))
    })
    .collect()
}

/// Maps file paths to their last known position and persists updates through a single
/// debounce timer.
///
/// The in-memory map is updated synchronously on every eligible update, so local reads
/// never depend on whether the network write made it.
pub struct PlaybackTracker<S> {
  positions: HashMap<String, PlaybackPosition>,
  sink: S,
  timer: Debouncer,
  pending: Option<PositionUpdate>,
  min_position: f64,
}

impl<S: PositionSink> PlaybackTracker<S> {
  pub fn new(sink: S, debounce: Duration, min_position: f64) -> Self {
    Self { positions: HashMap::new(), sink, timer: Debouncer::new(debounce), pending: None, min_position }
  }

  pub fn with_defaults(sink: S) -> Self {
    let c = constants();
    Self::new(sink, c.save_debounce(), c.min_save_position_secs)
  }

  /// Replace the in-memory state with what the server returned at startup.
  pub fn load(&mut self, positions: HashMap<String, PlaybackPosition>) {
    debug!(entries = positions.len(), "tracker: loaded saved positions");
    self.positions = positions;
  }

  /// Record a transport time update. Returns `true` if it was eligible and a save is now
  /// scheduled.
  ///
  /// Updates at or below the save threshold are ignored unless `force_save` is set.
  pub fn on_time_update(&mut self, path: &str, current_time: f64, volume: Option<f64>, force_save: bool) -> bool {
    if !current_time.is_finite() || !(force_save || current_time > self.min_position) {
      return false;
    }
    let position = current_time.max(0.0);
    let volume = volume.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0));
    self.positions.insert(path.to_string(), PlaybackPosition { position, volume });

    // A save still waiting for another file goes out now rather than being coalesced away.
    let was_pending = self.timer.cancel();
    if let Some(previous) = self.pending.take()
      && was_pending
      && previous.path != path
    {
      debug!(path = %previous.path, "tracker: flushing pending save for previous file");
      tokio::spawn(persist(self.sink.save(previous)));
    }

    let update = PositionUpdate { path: path.to_string(), position, volume };
    self.pending = Some(update.clone());
    self.timer.schedule(persist(self.sink.save(update)));
    true
  }

  pub fn resume_position(&self, path: &str) -> Option<f64> {
    self.positions.get(path).map(|p| p.position)
  }

  pub fn saved(&self, path: &str) -> Option<PlaybackPosition> {
    self.positions.get(path).copied()
  }

  #[cfg(test)]
  pub fn has_pending_save(&self) -> bool {
    self.timer.is_pending()
  }

  /// Send the pending save immediately instead of waiting for the timer. Returns `true`
  /// if there was one.
  pub async fn flush(&mut self) -> bool {
    let was_pending = self.timer.cancel();
    match self.pending.take() {
      Some(update) if was_pending => {
        persist(self.sink.save(update)).await;
        true
      }
      _ => false,
    }
  }

  /// Drop the pending save without sending it.
  pub fn discard_pending(&mut self) {
    self.timer.cancel();
    self.pending = None;
  }

  /// Forget all state, e.g. on logout.
  pub fn clear(&mut self) {
    self.discard_pending();
    self.positions.clear();
  }
}

/// Await a save and swallow its failure. Losing a checkpoint is not fatal.
async fn persist(save: impl Future<Output = Result<()>>) {
  match save.await {
    Ok(()) => {}
    Err(e) if e.is_auth_expired() => debug!("tracker: save skipped, session expired"),
    Err(e) => warn!(err = %Error::Persistence(Box::new(e)), "tracker: position save failed"),
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  /// Records every save it receives; optionally fails them all.
  #[derive(Clone, Default)]
  pub(crate) struct RecordingSink {
    pub(crate) saves: Arc<Mutex<Vec<PositionUpdate>>>,
    pub(crate) fail: bool,
  }

  impl RecordingSink {
    pub(crate) fn saves(&self) -> Vec<PositionUpdate> {
      self.saves.lock().unwrap().clone()
    }
  }

  impl PositionSink for RecordingSink {
    fn save(&self, update: PositionUpdate) -> impl Future<Output = Result<()>> + Send + 'static {
      let saves = Arc::clone(&self.saves);
      let fail = self.fail;
      async move {
        saves.lock().unwrap().push(update);
        if fail { Err(Error::Transport("connection refused".to_string())) } else { Ok(()) }
      }
    }
  }

  pub(crate) async fn settle() {
    for _ in 0..8 {
      tokio::task::yield_now().await;
    }
  }

  pub(crate) async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
  }

  fn tracker(sink: &RecordingSink) -> PlaybackTracker<RecordingSink> {
    PlaybackTracker::new(sink.clone(), Duration::from_millis(1000), 5.0)
  }

  // --- eligibility ---

  #[tokio::test(start_paused = true)]
  async fn short_plays_are_not_saved() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    assert!(!t.on_time_update("a.mp3", 0.0, Some(1.0), false));
    assert!(!t.on_time_update("a.mp3", 5.0, Some(1.0), false));
    assert!(!t.has_pending_save());
    assert_eq!(t.resume_position("a.mp3"), None);
    advance(2000).await;
    assert!(sink.saves().is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn forced_save_updates_memory_synchronously_at_any_time() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    assert!(t.on_time_update("a.mp3", 1.5, None, true));
    assert_eq!(t.resume_position("a.mp3"), Some(1.5));
    assert!(t.has_pending_save());
    // Nothing is transmitted before the debounce window closes.
    assert!(sink.saves().is_empty());
    advance(1001).await;
    assert_eq!(sink.saves(), vec![PositionUpdate { path: "a.mp3".to_string(), position: 1.5, volume: None }]);
  }

  #[tokio::test(start_paused = true)]
  async fn non_finite_times_are_ignored() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    assert!(!t.on_time_update("a.mp3", f64::NAN, None, true));
    assert!(!t.on_time_update("a.mp3", f64::INFINITY, None, false));
    assert_eq!(t.saved("a.mp3"), None);
  }

  // --- coalescing ---

  #[tokio::test(start_paused = true)]
  async fn burst_coalesces_into_single_save_with_latest_value() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    t.on_time_update("a.mp3", 10.0, Some(0.5), false);
    advance(400).await;
    t.on_time_update("a.mp3", 10.4, Some(0.5), false);
    advance(400).await;
    t.on_time_update("a.mp3", 10.8, Some(0.6), false);
    advance(1001).await;
    let saves = sink.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].position, 10.8);
    assert_eq!(saves[0].volume, Some(0.6));
  }

  #[tokio::test(start_paused = true)]
  async fn updates_further_apart_than_window_each_save() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    t.on_time_update("a.mp3", 10.0, None, false);
    advance(1100).await;
    t.on_time_update("a.mp3", 11.1, None, false);
    advance(1100).await;
    let positions: Vec<f64> = sink.saves().iter().map(|s| s.position).collect();
    assert_eq!(positions, vec![10.0, 11.1]);
  }

  #[tokio::test(start_paused = true)]
  async fn switching_files_flushes_pending_save_of_previous_file() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    t.on_time_update("a.mp3", 42.0, None, true);
    advance(100).await;
    t.on_time_update("b.mp3", 30.0, None, false);
    settle().await;
    assert_eq!(sink.saves().len(), 1);
    assert_eq!(sink.saves()[0].path, "a.mp3");
    advance(1001).await;
    let paths: Vec<String> = sink.saves().into_iter().map(|s| s.path).collect();
    assert_eq!(paths, vec!["a.mp3", "b.mp3"]);
  }

  #[tokio::test(start_paused = true)]
  async fn later_write_supersedes_entry_without_merging() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    t.on_time_update("a.mp3", 12.0, Some(0.3), false);
    t.on_time_update("a.mp3", 13.0, None, false);
    assert_eq!(t.saved("a.mp3"), Some(PlaybackPosition { position: 13.0, volume: None }));
  }

  // --- failures and lifecycle ---

  #[tokio::test(start_paused = true)]
  async fn failed_save_is_swallowed_and_memory_kept() {
    let sink = RecordingSink { fail: true, ..Default::default() };
    let mut t = tracker(&sink);
    t.on_time_update("a.mp3", 20.0, None, false);
    advance(1001).await;
    assert_eq!(sink.saves().len(), 1);
    assert_eq!(t.resume_position("a.mp3"), Some(20.0));
    assert!(!t.has_pending_save());
  }

  #[tokio::test(start_paused = true)]
  async fn flush_sends_pending_immediately_once() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    assert!(!t.flush().await);
    t.on_time_update("a.mp3", 8.0, None, false);
    assert!(t.flush().await);
    assert_eq!(sink.saves().len(), 1);
    advance(2000).await;
    assert_eq!(sink.saves().len(), 1);
    assert!(!t.flush().await);
  }

  #[tokio::test(start_paused = true)]
  async fn discard_and_clear_drop_pending_save() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    t.on_time_update("a.mp3", 8.0, None, false);
    t.discard_pending();
    t.on_time_update("b.mp3", 9.0, None, false);
    t.clear();
    advance(2000).await;
    assert!(sink.saves().is_empty());
    assert_eq!(t.resume_position("b.mp3"), None);
  }

  #[tokio::test(start_paused = true)]
  async fn load_replaces_positions() {
    let sink = RecordingSink::default();
    let mut t = tracker(&sink);
    t.on_time_update("old.mp3", 50.0, None, false);
    t.load(HashMap::from([("a.mp3".to_string(), PlaybackPosition { position: 33.0, volume: Some(0.4) })]));
    assert_eq!(t.resume_position("a.mp3"), Some(33.0));
    assert_eq!(t.resume_position("old.mp3"), None);
  }

  // --- parse_saved_positions ---

  #[test]
  fn parses_object_and_bare_number_forms() {
    let body = serde_json::json!({
      "a.mp3": {"position": 12.5, "volume": 0.8},
      "b.mp4": 40,
      "c.mp3": {"position": 3.0},
    });
    let parsed = parse_saved_positions(&body);
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed["a.mp3"], PlaybackPosition { position: 12.5, volume: Some(0.8) });
    assert_eq!(parsed["b.mp4"], PlaybackPosition { position: 40.0, volume: None });
    assert_eq!(parsed["c.mp3"].volume, None);
  }

  #[test]
  fn drops_malformed_entries() {
    let body = serde_json::json!({
      "ok.mp3": {"position": 1.0},
      "neg.mp3": {"position": -4.0},
      "str.mp3": {"position": "12"},
      "none.mp3": {"volume": 0.5},
      "null.mp3": null,
      "list.mp3": [1, 2],
    });
    let parsed = parse_saved_positions(&body);
    assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["ok.mp3"]);
  }

  #[test]
  fn non_object_body_is_empty() {
    assert!(parse_saved_positions(&serde_json::json!([1, 2, 3])).is_empty());
    assert!(parse_saved_positions(&serde_json::Value::Null).is_empty());
  }

  #[test]
  fn volume_is_clamped() {
    let parsed = parse_saved_positions(&serde_json::json!({"a": {"position": 1.0, "volume": 3.0}}));
    assert_eq!(parsed["a"].volume, Some(1.0));
  }

  #[test]
  fn update_omits_missing_volume() {
    let update = PositionUpdate { path: "a.mp3".to_string(), position: 6.0, volume: None };
    assert_eq!(serde_json::to_value(&update).unwrap(), serde_json::json!({"path": "a.mp3", "position": 6.0}));
  }
}
