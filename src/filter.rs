use crate::library::{MediaEntry, MediaKind};

/// Restricts the visible list to one kind of media.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TypeFilter {
  #[default]
  All,
  Video,
  Audio,
}

impl TypeFilter {
  pub const ALL: [TypeFilter; 3] = [TypeFilter::All, TypeFilter::Video, TypeFilter::Audio];

  pub fn label(self) -> &'static str {
    match self {
      TypeFilter::All => "all",
      TypeFilter::Video => "video",
      TypeFilter::Audio => "audio",
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "video" => TypeFilter::Video,
      "audio" => TypeFilter::Audio,
      _ => TypeFilter::All,
    }
  }

  /// The filter after this one when cycling with a single key.
  pub fn next(self) -> Self {
    let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
    Self::ALL[(idx + 1) % Self::ALL.len()]
  }

  pub fn admits(self, kind: MediaKind) -> bool {
    match self {
      TypeFilter::All => true,
      TypeFilter::Video => kind == MediaKind::Video,
      TypeFilter::Audio => kind == MediaKind::Audio,
    }
  }
}

/// Type filter plus free-text search, together defining the visible list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
  pub type_filter: TypeFilter,
  /// Case-insensitive substring matched against entry names.
  pub query: String,
}

impl FilterState {
  pub fn is_identity(&self) -> bool {
    self.type_filter == TypeFilter::All && self.query.trim().is_empty()
  }
}

/// Check if an entry's name contains `needle` case-insensitively.
/// `needle` is expected to be lowercased already; an empty needle matches everything.
fn matches_query(entry: &MediaEntry, needle: &str) -> bool {
  needle.is_empty() || entry.name.to_lowercase().contains(needle)
}

/// Project `library` through `filter`, returning the indices of the entries that remain.
///
/// Type restriction is applied first, then the search query. Library order is preserved,
/// and an empty result is a valid answer rather than an error.
pub fn apply(library: &[MediaEntry], filter: &FilterState) -> Vec<usize> {
  if filter.is_identity() {
    return (0..library.len()).collect();
  }
  let needle = if filter.query.trim().is_empty() { String::new() } else { filter.query.to_lowercase() };
  library
    .iter()
    .enumerate()
    .filter(|(_, entry)| filter.type_filter.admits(entry.kind))
    .filter(|(_, entry)| matches_query(entry, &needle))
    .map(|(i, _)| i)
    .collect()
}
