//! The authoritative media list and the visible projection derived from it.

use serde::{Deserialize, Deserializer};

use crate::filter::{self, FilterState};

/// Kind of media file, as classified by the server from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
  Video,
  Audio,
}

impl MediaKind {
  pub fn label(self) -> &'static str {
    match self {
      MediaKind::Video => "video",
      MediaKind::Audio => "audio",
    }
  }
}

/// Optional descriptive metadata attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaMetadata {
  #[serde(default)]
  pub poster: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default, deserialize_with = "string_or_number")]
  pub year: Option<String>,
}

/// A single file from the server's media index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaEntry {
  /// Relative path, unique within the library. Used as the identity of the entry.
  pub path: String,
  pub name: String,
  #[serde(rename = "type")]
  pub kind: MediaKind,
  #[serde(default)]
  pub size: Option<u64>,
  /// Modification time in epoch seconds.
  #[serde(default)]
  pub modified: Option<f64>,
  #[serde(default)]
  pub metadata: Option<MediaMetadata>,
}

impl MediaEntry {
  /// Title to show in lists: metadata title when present, file name otherwise.
  pub fn display_title(&self) -> &str {
    self.metadata.as_ref().and_then(|m| m.title.as_deref()).filter(|t| !t.is_empty()).unwrap_or(&self.name)
  }

  /// URL the transport streams this entry from: `<server>/media/<path>` with every path
  /// segment percent-encoded.
  pub fn source_url(&self, server: &str) -> String {
    let encoded: Vec<_> = self.path.split('/').map(urlencoding::encode).collect();
    format!("{}/media/{}", server.trim_end_matches('/'), encoded.join("/"))
  }
}

/// Body of `GET /api/media`.
#[derive(Debug, Deserialize)]
pub struct MediaIndex {
  pub files: Vec<MediaEntry>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(match value {
    Some(serde_json::Value::String(s)) => Some(s),
    Some(serde_json::Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

/// Holds the library and the visible list derived from it through the current filter.
///
/// The visible list is stored as indices into the library so it is always an ordered
/// subsequence of it. It is rebuilt from scratch on every library or filter change.
#[derive(Debug, Default)]
pub struct LibraryStore {
  entries: Vec<MediaEntry>,
  filter: FilterState,
  visible: Vec<usize>,
  loaded: bool,
}

impl LibraryStore {
  pub fn new(filter: FilterState) -> Self {
    Self { filter, ..Self::default() }
  }

  /// Swap in a freshly fetched library and republish the visible list.
  pub fn replace(&mut self, entries: Vec<MediaEntry>) {
    let visible = filter::apply(&entries, &self.filter);
    self.entries = entries;
    self.visible = visible;
    self.loaded = true;
  }

  pub fn set_filter(&mut self, filter: FilterState) {
    self.visible = filter::apply(&self.entries, &filter);
    self.filter = filter;
  }

  /// Drop everything, e.g. on logout.
  pub fn clear(&mut self) {
    self.entries.clear();
    self.visible.clear();
    self.loaded = false;
  }

  pub fn filter(&self) -> &FilterState {
    &self.filter
  }

  pub fn is_loaded(&self) -> bool {
    self.loaded
  }

  pub fn entries(&self) -> &[MediaEntry] {
    &self.entries
  }

  pub fn visible_len(&self) -> usize {
    self.visible.len()
  }

  pub fn visible(&self) -> impl Iterator<Item = &MediaEntry> {
    self.visible.iter().map(|&i| &self.entries[i])
  }

  pub fn visible_entry(&self, index: usize) -> Option<&MediaEntry> {
    self.visible.get(index).map(|&i| &self.entries[i])
  }

  /// Position of `path` in the visible list, if it is currently shown.
  pub fn visible_position(&self, path: &str) -> Option<usize> {
    self.visible.iter().position(|&i| self.entries[i].path == path)
  }
}
