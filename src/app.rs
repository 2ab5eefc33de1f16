use ratatui::widgets::ListState;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::constants::constants;
use crate::error::Result;
use crate::filter::{FilterState, TypeFilter};
use crate::input::TextField;
use crate::library::{LibraryStore, MediaEntry};
use crate::selection::SelectionController;
use crate::session::{LivenessProbe, SessionEvent, SessionGuard};
use crate::state::SessionState;
use crate::theme::{THEMES, Theme, theme_index};
use crate::tracker::{PlaybackPosition, PlaybackTracker};
use crate::transport::{Transport, TransportEvent};

// --- Types ---

/// Library plus, on the first load after login, the saved playback positions.
pub type LibraryLoad = (Vec<MediaEntry>, Option<HashMap<String, PlaybackPosition>>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  Login,
  Browse,
  Search,
  Settings,
  Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
  Username,
  Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordField {
  Current,
  New,
  Confirm,
}

impl PasswordField {
  pub fn next(self) -> Self {
    match self {
      PasswordField::Current => PasswordField::New,
      PasswordField::New => PasswordField::Confirm,
      PasswordField::Confirm => PasswordField::Current,
    }
  }
}

/// In-flight request receivers, polled once per frame.
#[derive(Default)]
pub(crate) struct AsyncTasks {
  pub(crate) login_rx: Option<oneshot::Receiver<Result<()>>>,
  pub(crate) library_rx: Option<oneshot::Receiver<Result<LibraryLoad>>>,
  pub(crate) settings_rx: Option<oneshot::Receiver<Result<()>>>,
  pub(crate) password_rx: Option<oneshot::Receiver<Result<()>>>,
}

pub struct App<T> {
  pub mode: AppMode,
  pub theme_index: usize,
  pub username: TextField,
  pub password: TextField,
  pub login_focus: LoginField,
  pub search: TextField,
  pub media_folder: TextField,
  pub current_password: TextField,
  pub new_password: TextField,
  pub confirm_password: TextField,
  pub password_focus: PasswordField,
  /// Highlighted row of the visible list. Independent of the playing entry.
  pub list_state: ListState,
  pub state: SessionState<T, ApiClient>,
  pub api: ApiClient,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message, lower priority than status/error.
  pub info_message: Option<String>,
  pub should_quit: bool,
  config: Config,
  /// Write preference changes back to disk.
  persist_config: bool,
  guard: SessionGuard,
  session_rx: mpsc::UnboundedReceiver<SessionEvent>,
  liveness: Option<LivenessProbe>,
  pub(crate) tasks: AsyncTasks,
  /// When the last error was set, for auto-dismiss.
  error_time: Option<Instant>,
}

impl<T: Transport> App<T> {
  pub fn new(
    transport: T,
    api: ApiClient,
    guard: SessionGuard,
    session_rx: mpsc::UnboundedReceiver<SessionEvent>,
    config: Config,
  ) -> Self {
    let type_filter = config.type_filter.as_deref().map(TypeFilter::from_config).unwrap_or_default();
    let library = LibraryStore::new(FilterState { type_filter, query: String::new() });
    let tracker = PlaybackTracker::with_defaults(api.clone());
    let selection = SelectionController::new(transport, api.base_url());
    let username = TextField::with_text(config.username.clone().unwrap_or_default());
    let login_focus = if username.is_empty() { LoginField::Username } else { LoginField::Password };

    Self {
      mode: AppMode::Login,
      theme_index: theme_index(config.theme_name.as_deref()),
      username,
      password: TextField::default(),
      login_focus,
      search: TextField::default(),
      media_folder: TextField::default(),
      current_password: TextField::default(),
      new_password: TextField::default(),
      confirm_password: TextField::default(),
      password_focus: PasswordField::Current,
      list_state: ListState::default(),
      state: SessionState::new(library, tracker, selection),
      api,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      config,
      persist_config: true,
      guard,
      session_rx,
      liveness: None,
      tasks: AsyncTasks::default(),
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static Theme {
    // theme_index is only ever produced by theme_index() or the modulo in next_theme().
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&mut self) {
    self.config.theme_name = Some(self.theme().name.to_string());
    self.config.type_filter = Some(self.state.library().filter().type_filter.label().to_string());
    if !self.username.is_empty() {
      self.config.username = Some(self.username.text.clone());
    }
    if self.persist_config {
      self.config.save();
    }
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_dismiss_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  /// Surface a failed user action. Expiry is handled by the session event instead.
  pub fn report(&mut self, action: &str, result: Result<()>) {
    if let Err(e) = result
      && !e.is_auth_expired()
    {
      self.set_error(format!("{}: {}", action, e));
    }
  }

  // --- Session ---

  pub fn submit_login(&mut self) {
    let username = self.username.text.trim().to_string();
    let password = self.password.text.clone();
    if username.is_empty() || password.is_empty() {
      self.set_error("Enter a username and password.".to_string());
      return;
    }
    self.clear_error();
    self.info_message = None;
    self.status_message = Some(format!("Logging in to {}…", self.api.base_url()));

    let api = self.api.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api.login(&username, &password).await);
    });
    self.tasks.login_rx = Some(rx);
  }

  fn on_logged_in(&mut self) {
    info!(user = %self.username.text, "app: session started");
    self.password.clear();
    self.mode = AppMode::Browse;
    self.save_config();

    let cookie = self.api.cookie_header();
    let result = self.state.transport_mut().set_cookie(cookie.as_deref());
    self.report("Player setup failed", result);

    let api = self.api.clone();
    self.liveness = Some(self.guard.spawn_liveness(constants().liveness_interval(), move || {
      let api = api.clone();
      async move { api.probe().await }
    }));
    self.trigger_library_load(true);
  }

  /// The server no longer recognises the session: stop everything and ask for a new login.
  fn expire_session(&mut self) {
    warn!("app: session expired, returning to login");
    self.liveness = None;
    self.tasks = AsyncTasks::default();
    let result = self.state.suspend();
    self.report("Stop failed", result);
    self.password.clear();
    self.clear_password_form();
    self.login_focus = LoginField::Password;
    self.status_message = None;
    self.mode = AppMode::Login;
    self.set_error("Session expired. Please log in again.".to_string());
  }

  /// End the session. The client returns to the login screen whatever the server says.
  pub async fn logout(&mut self) {
    info!("app: logging out");
    self.clear_error();
    self.liveness = None;
    self.tasks = AsyncTasks::default();
    let result = self.state.shutdown().await;
    self.report("Stop failed", result);
    let result = self.state.clear();
    self.report("Stop failed", result);
    let result = self.state.transport_mut().set_cookie(None);
    self.report("Player reset failed", result);

    let api = self.api.clone();
    tokio::spawn(async move {
      if let Err(e) = api.logout().await {
        warn!(err = %e, "app: logout request failed");
      }
    });

    self.list_state.select(None);
    self.password.clear();
    self.clear_password_form();
    self.login_focus = LoginField::Password;
    self.status_message = None;
    self.info_message = Some("Logged out.".to_string());
    self.mode = AppMode::Login;
  }

  /// Save the current position and stop playback before exit.
  pub async fn shutdown(&mut self) {
    self.liveness = None;
    if self.mode == AppMode::Login {
      return;
    }
    if let Err(e) = self.state.shutdown().await {
      warn!(err = %e, "app: failed to stop playback on exit");
    }
  }

  // --- Library ---

  pub fn trigger_library_load(&mut self, with_positions: bool) {
    self.status_message = Some("Loading library…".to_string());
    let api = self.api.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let result = if with_positions {
        let (files, positions) = tokio::join!(api.fetch_library(), api.fetch_positions());
        let positions = match positions {
          Ok(p) => Some(p),
          Err(e) => {
            warn!(err = %e, "app: could not load saved positions, starting without them");
            None
          }
        };
        files.map(|f| (f, positions))
      } else {
        api.fetch_library().await.map(|f| (f, None))
      };
      let _ = tx.send(result);
    });
    self.tasks.library_rx = Some(rx);
  }

  pub fn trigger_settings(&mut self) {
    let folder = self.media_folder.text.trim().to_string();
    if folder.is_empty() {
      self.set_error("Enter a media folder path.".to_string());
      return;
    }
    self.clear_error();
    self.status_message = Some("Saving settings…".to_string());
    let api = self.api.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api.update_settings(&folder).await);
    });
    self.tasks.settings_rx = Some(rx);
  }

  // --- Password ---

  pub fn open_password_form(&mut self) {
    self.clear_error();
    self.clear_password_form();
    self.mode = AppMode::Password;
  }

  pub fn close_password_form(&mut self) {
    self.clear_password_form();
    self.mode = AppMode::Browse;
  }

  fn clear_password_form(&mut self) {
    self.current_password.clear();
    self.new_password.clear();
    self.confirm_password.clear();
    self.password_focus = PasswordField::Current;
  }

  pub fn submit_password_change(&mut self) {
    if self.current_password.is_empty() || self.new_password.is_empty() {
      self.set_error("Enter your current and new password.".to_string());
      return;
    }
    if self.new_password.text != self.confirm_password.text {
      self.confirm_password.clear();
      self.password_focus = PasswordField::Confirm;
      self.set_error("New passwords do not match.".to_string());
      return;
    }
    self.clear_error();
    self.status_message = Some("Changing password…".to_string());
    let api = self.api.clone();
    let current = self.current_password.text.clone();
    let new = self.new_password.text.clone();
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(api.change_password(&current, &new).await);
    });
    self.tasks.password_rx = Some(rx);
  }

  fn apply_library(&mut self, (files, positions): LibraryLoad) {
    if let Some(positions) = positions {
      self.state.load_positions(positions);
    }
    let count = files.len();
    let result = self.state.replace_library(files);
    self.report("Playback stopped", result);
    self.clamp_highlight();
    self.info_message = Some(format!("{} files in library", count));
  }

  pub fn check_pending(&mut self) {
    let mut expired = false;
    while let Ok(SessionEvent::Expired) = self.session_rx.try_recv() {
      expired = true;
    }
    if expired && self.mode != AppMode::Login {
      self.expire_session();
    }

    if let Some(mut rx) = self.tasks.login_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(()) => self.on_logged_in(),
            Err(e) => {
              self.password.clear();
              self.set_error(e.to_string());
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => self.tasks.login_rx = Some(rx),
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Login task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.library_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(load) => self.apply_library(load),
            Err(e) if e.is_auth_expired() => {}
            // Keep whatever was shown before.
            Err(e) => self.set_error(format!("Failed to load library: {}", e)),
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => self.tasks.library_rx = Some(rx),
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Library task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.settings_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(()) => {
              info!(folder = %self.media_folder.text, "app: media folder changed");
              self.info_message = Some("Media folder updated.".to_string());
              self.mode = AppMode::Browse;
              self.trigger_library_load(false);
            }
            Err(e) if e.is_auth_expired() => {}
            Err(e) => self.set_error(format!("Settings not saved: {}", e)),
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => self.tasks.settings_rx = Some(rx),
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Settings task failed.".to_string());
        }
      }
    }

    if let Some(mut rx) = self.tasks.password_rx.take() {
      match rx.try_recv() {
        Ok(result) => {
          self.status_message = None;
          match result {
            Ok(()) => {
              self.info_message = Some("Password changed.".to_string());
              self.close_password_form();
            }
            Err(e) if e.is_auth_expired() => {}
            Err(e) => {
              self.current_password.clear();
              self.password_focus = PasswordField::Current;
              self.set_error(format!("Password not changed: {}", e));
            }
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => self.tasks.password_rx = Some(rx),
        Err(oneshot::error::TryRecvError::Closed) => {
          self.status_message = None;
          self.set_error("Password task failed.".to_string());
        }
      }
    }
  }

  // --- Playback ---

  pub fn handle_transport_event(&mut self, event: TransportEvent) {
    if self.mode == AppMode::Login {
      return;
    }
    let result = self.state.handle_event(&event);
    self.report("Playback error", result);
    if event == TransportEvent::Ended {
      self.follow_selection();
    }
  }

  pub fn play_highlighted(&mut self) {
    let Some(index) = self.list_state.selected() else { return };
    self.clear_error();
    let result = self.state.play(index);
    self.report("Cannot play", result);
  }

  /// Next (`forward`) or previous entry, moving the highlight along.
  pub fn skip(&mut self, forward: bool) {
    let result = if forward { self.state.next() } else { self.state.previous() };
    self.report("Cannot skip", result);
    self.follow_selection();
  }

  fn follow_selection(&mut self) {
    if let Some(index) = self.state.selection().index() {
      self.list_state.select(Some(index));
    }
  }

  // --- Filtering ---

  pub fn cycle_type_filter(&mut self) {
    let next = self.state.library().filter().type_filter.next();
    debug!(filter = next.label(), "app: type filter changed");
    let result = self.state.set_type_filter(next);
    self.report("Playback stopped", result);
    self.clamp_highlight();
    self.save_config();
  }

  /// Push the search box contents into the filter.
  pub fn update_query(&mut self) {
    let result = self.state.set_query(self.search.text.clone());
    self.report("Playback stopped", result);
    self.clamp_highlight();
  }

  // --- Highlight ---

  /// Keep the highlight inside the visible list after it changed.
  pub fn clamp_highlight(&mut self) {
    let len = self.state.library().visible_len();
    if len == 0 {
      self.list_state.select(None);
    } else {
      let sel = self.list_state.selected().unwrap_or(0);
      self.list_state.select(Some(sel.min(len - 1)));
    }
  }

  /// Move the highlight by `delta` rows, wrapping at both ends.
  pub fn move_highlight(&mut self, delta: isize) {
    let count = self.state.library().visible_len();
    if count == 0 {
      return;
    }
    let i = match self.list_state.selected() {
      Some(i) => (i as isize + delta).rem_euclid(count as isize) as usize,
      None => 0,
    };
    self.list_state.select(Some(i));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::library::MediaKind;
  use crate::library::tests::entry;
  use crate::selection::Selection;
  use crate::transport::tests::RecordingTransport;

  fn app() -> App<RecordingTransport> {
    let (guard, rx) = SessionGuard::new();
    let api = ApiClient::new("http://127.0.0.1:9", guard.clone()).unwrap();
    let mut app = App::new(RecordingTransport::default(), api, guard, rx, Config::default());
    app.persist_config = false;
    app
  }

  fn library() -> Vec<MediaEntry> {
    vec![entry("a.mp4", MediaKind::Video), entry("b.mp3", MediaKind::Audio), entry("c.mp3", MediaKind::Audio)]
  }

  /// Put the app in the logged-in state with a library, without touching the network.
  fn browsing() -> App<RecordingTransport> {
    let mut app = app();
    app.mode = AppMode::Browse;
    app.apply_library((library(), None));
    app
  }

  fn complete<R>(value: R) -> oneshot::Receiver<R> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(value);
    rx
  }

  #[test]
  fn starts_at_login_with_remembered_user() {
    let (guard, rx) = SessionGuard::new();
    let api = ApiClient::new("http://127.0.0.1:9", guard.clone()).unwrap();
    let config = Config { username: Some("ana".to_string()), ..Config::default() };
    let app = App::new(RecordingTransport::default(), api, guard, rx, config);
    assert_eq!(app.mode, AppMode::Login);
    assert_eq!(app.username.text, "ana");
    assert_eq!(app.login_focus, LoginField::Password);
  }

  #[test]
  fn login_requires_both_fields() {
    let mut app = app();
    app.username = TextField::with_text("ana");
    app.submit_login();
    assert!(app.last_error.is_some());
    assert!(app.tasks.login_rx.is_none());
  }

  #[test]
  fn library_load_populates_list_and_highlight() {
    let mut app = app();
    app.mode = AppMode::Browse;
    let mut positions = HashMap::new();
    positions.insert("b.mp3".to_string(), PlaybackPosition { position: 42.0, volume: None });
    app.tasks.library_rx = Some(complete(Ok((library(), Some(positions)))));
    app.check_pending();
    assert!(app.tasks.library_rx.is_none());
    assert_eq!(app.state.library().visible_len(), 3);
    assert_eq!(app.list_state.selected(), Some(0));
    assert_eq!(app.state.tracker().resume_position("b.mp3"), Some(42.0));
  }

  #[test]
  fn failed_library_load_keeps_stale_list() {
    let mut app = browsing();
    app.tasks.library_rx =
      Some(complete(Err(Error::Status { status: reqwest::StatusCode::INTERNAL_SERVER_ERROR, message: "x".into() })));
    app.check_pending();
    assert_eq!(app.state.library().visible_len(), 3);
    assert!(app.last_error.as_deref().unwrap().starts_with("Failed to load library"));
  }

  #[test]
  fn failed_login_stays_on_login_and_clears_password() {
    let mut app = app();
    app.password = TextField::with_text("wrong");
    app.tasks.login_rx = Some(complete(Err(Error::Login("invalid username or password".into()))));
    app.check_pending();
    assert_eq!(app.mode, AppMode::Login);
    assert!(app.password.is_empty());
    assert_eq!(app.last_error.as_deref(), Some("login failed: invalid username or password"));
  }

  #[test]
  fn rejected_settings_are_reported_and_mode_kept() {
    let mut app = browsing();
    app.mode = AppMode::Settings;
    app.tasks.settings_rx =
      Some(complete(Err(Error::Status { status: reqwest::StatusCode::FORBIDDEN, message: "Admin only".into() })));
    app.check_pending();
    assert_eq!(app.mode, AppMode::Settings);
    assert!(app.last_error.as_deref().unwrap().contains("Admin only"));
  }

  #[test]
  fn password_change_checks_fields_before_sending() {
    let mut app = browsing();
    app.open_password_form();
    assert_eq!(app.mode, AppMode::Password);
    app.submit_password_change();
    assert!(app.last_error.is_some());

    app.current_password = TextField::with_text("old");
    app.new_password = TextField::with_text("new-one");
    app.confirm_password = TextField::with_text("new-onf");
    app.submit_password_change();
    assert_eq!(app.last_error.as_deref(), Some("New passwords do not match."));
    assert_eq!(app.password_focus, PasswordField::Confirm);
    assert!(app.confirm_password.is_empty());
    assert!(app.tasks.password_rx.is_none());
  }

  #[test]
  fn wrong_current_password_is_reported_and_form_kept() {
    let mut app = browsing();
    app.open_password_form();
    app.current_password = TextField::with_text("guess");
    app.new_password = TextField::with_text("new-one");
    app.password_focus = PasswordField::Confirm;
    app.tasks.password_rx = Some(complete(Err(Error::Status {
      status: reqwest::StatusCode::BAD_REQUEST,
      message: "Incorrect current password".into(),
    })));
    app.check_pending();
    assert_eq!(app.mode, AppMode::Password);
    assert!(app.current_password.is_empty());
    assert_eq!(app.new_password.text, "new-one");
    assert_eq!(app.password_focus, PasswordField::Current);
    assert!(app.last_error.as_deref().unwrap().contains("Incorrect current password"));
  }

  #[test]
  fn accepted_password_change_returns_to_library() {
    let mut app = browsing();
    app.open_password_form();
    app.new_password = TextField::with_text("new-one");
    app.tasks.password_rx = Some(complete(Ok(())));
    app.check_pending();
    assert_eq!(app.mode, AppMode::Browse);
    assert!(app.new_password.is_empty());
    assert_eq!(app.info_message.as_deref(), Some("Password changed."));
  }

  #[tokio::test]
  async fn expiry_event_returns_to_login_and_stops_playback() {
    let mut app = browsing();
    app.play_highlighted();
    app.state.transport_mut().take_commands();
    let _: Result<()> = app.guard.call(async { Err(Error::AuthExpired) }).await;

    app.check_pending();
    assert_eq!(app.mode, AppMode::Login);
    assert_eq!(*app.state.selection(), Selection::Idle);
    assert_eq!(app.state.transport_mut().take_commands(), vec!["stop"]);
    assert!(!app.state.tracker().has_pending_save());
    assert!(app.last_error.as_deref().unwrap().contains("Session expired"));
  }

  #[tokio::test]
  async fn expiry_while_on_login_screen_is_ignored() {
    let mut app = app();
    app.set_error("login failed: bad".to_string());
    let _: Result<()> = app.guard.call(async { Err(Error::AuthExpired) }).await;
    app.check_pending();
    assert_eq!(app.last_error.as_deref(), Some("login failed: bad"));
  }

  #[test]
  fn query_edits_filter_and_clamp_highlight() {
    let mut app = browsing();
    app.list_state.select(Some(2));
    app.search = TextField::with_text("B.MP3");
    app.update_query();
    assert_eq!(app.state.library().visible_len(), 1);
    assert_eq!(app.list_state.selected(), Some(0));

    app.search = TextField::with_text("zzz");
    app.update_query();
    assert_eq!(app.list_state.selected(), None);
    app.play_highlighted();
    assert_eq!(*app.state.selection(), Selection::Idle);
  }

  #[test]
  fn highlight_wraps() {
    let mut app = browsing();
    app.move_highlight(-1);
    assert_eq!(app.list_state.selected(), Some(2));
    app.move_highlight(1);
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn skip_moves_highlight_with_selection() {
    let mut app = browsing();
    app.skip(true);
    assert_eq!(app.state.selection().index(), Some(0));
    app.skip(true);
    assert_eq!(app.state.selection().index(), Some(1));
    assert_eq!(app.list_state.selected(), Some(1));
    app.skip(false);
    assert_eq!(app.list_state.selected(), Some(0));
  }

  #[tokio::test]
  async fn ended_advances_and_follows() {
    let mut app = browsing();
    app.play_highlighted();
    app.handle_transport_event(TransportEvent::Ended);
    assert_eq!(app.state.selection().path(), Some("b.mp3"));
    assert_eq!(app.list_state.selected(), Some(1));
  }

  #[tokio::test]
  async fn type_filter_removing_active_entry_stops_it() {
    let mut app = browsing();
    app.play_highlighted();
    app.state.transport_mut().take_commands();
    app.cycle_type_filter(); // all -> video
    assert_eq!(app.state.selection().path(), Some("a.mp4"));
    app.cycle_type_filter(); // video -> audio
    assert_eq!(*app.state.selection(), Selection::Idle);
    assert_eq!(app.state.library().visible_len(), 2);
  }

  #[test]
  fn errors_from_expired_session_are_not_shown() {
    let mut app = app();
    app.report("Seek failed", Err(Error::AuthExpired));
    assert!(app.last_error.is_none());
    app.report("Seek failed", Err(Error::Transport("gone".into())));
    assert_eq!(app.last_error.as_deref(), Some("Seek failed: player error: gone"));
  }
}
