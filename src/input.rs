use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, AppMode, LoginField, PasswordField};
use crate::constants::constants;
use crate::transport::Transport;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Single-line editable text with a char-indexed cursor.
#[derive(Debug, Default, Clone)]
pub struct TextField {
  pub text: String,
  /// Cursor position as a char index.
  pub cursor: usize,
  /// Horizontal scroll offset in display columns, maintained by the renderer.
  pub scroll: usize,
}

impl TextField {
  pub fn with_text(text: impl Into<String>) -> Self {
    let text = text.into();
    let cursor = text.chars().count();
    Self { text, cursor, scroll: 0 }
  }

  pub fn clear(&mut self) {
    self.text.clear();
    self.cursor = 0;
    self.scroll = 0;
  }

  pub fn is_empty(&self) -> bool {
    self.text.is_empty()
  }

  /// Apply an editing key. Returns `true` if the text changed.
  pub fn edit(&mut self, code: KeyCode) -> bool {
    match code {
      KeyCode::Char(c) => {
        let byte_idx = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_idx, c);
        self.cursor += 1;
        true
      }
      KeyCode::Backspace => {
        if self.cursor == 0 {
          return false;
        }
        self.cursor -= 1;
        let byte_idx = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(byte_idx);
        true
      }
      KeyCode::Delete => {
        if self.cursor >= self.text.chars().count() {
          return false;
        }
        let byte_idx = char_to_byte_index(&self.text, self.cursor);
        self.text.remove(byte_idx);
        true
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        false
      }
      KeyCode::Right => {
        if self.cursor < self.text.chars().count() {
          self.cursor += 1;
        }
        false
      }
      KeyCode::Home => {
        self.cursor = 0;
        false
      }
      KeyCode::End => {
        self.cursor = self.text.chars().count();
        false
      }
      _ => false,
    }
  }
}

// --- Event Handling ---

pub async fn handle_key_event<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => app.should_quit = true,
      KeyCode::Char('t') => app.next_theme(),
      KeyCode::Char('s') if app.mode != AppMode::Login => {
        let result = app.state.stop();
        app.report("Stop failed", result);
      }
      KeyCode::Char('l') if app.mode != AppMode::Login => app.logout().await,
      KeyCode::Char('r') if app.mode != AppMode::Login => app.trigger_library_load(false),
      KeyCode::Char('o') if matches!(app.mode, AppMode::Browse | AppMode::Search) => {
        app.clear_error();
        app.mode = AppMode::Settings;
      }
      KeyCode::Char('p') if matches!(app.mode, AppMode::Browse | AppMode::Search) => app.open_password_form(),
      _ => {}
    }
    return;
  }

  match app.mode {
    AppMode::Login => handle_login_key(app, key),
    AppMode::Browse => handle_browse_key(app, key),
    AppMode::Search => handle_search_key(app, key),
    AppMode::Settings => handle_settings_key(app, key),
    AppMode::Password => handle_password_key(app, key),
  }
}

fn handle_login_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
      app.login_focus = match app.login_focus {
        LoginField::Username => LoginField::Password,
        LoginField::Password => LoginField::Username,
      };
    }
    KeyCode::Enter => match app.login_focus {
      LoginField::Username => app.login_focus = LoginField::Password,
      LoginField::Password => app.submit_login(),
    },
    KeyCode::Esc => app.should_quit = true,
    code => {
      app.clear_error();
      match app.login_focus {
        LoginField::Username => app.username.edit(code),
        LoginField::Password => app.password.edit(code),
      };
    }
  }
}

fn handle_browse_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  let c = constants();
  match key.code {
    KeyCode::Enter => app.play_highlighted(),
    KeyCode::Char(' ') => {
      let result = app.state.toggle_play_pause();
      app.report("Pause failed", result);
    }
    KeyCode::Char('n') => app.skip(true),
    KeyCode::Char('p') => app.skip(false),
    KeyCode::Right => {
      let result = app.state.seek_by(c.seek_step_secs);
      app.report("Seek failed", result);
    }
    KeyCode::Left => {
      let result = app.state.seek_by(-c.seek_step_secs);
      app.report("Seek failed", result);
    }
    KeyCode::Char('+') | KeyCode::Char('=') => {
      let result = app.state.change_volume(c.volume_step);
      app.report("Volume change failed", result);
    }
    KeyCode::Char('-') => {
      let result = app.state.change_volume(-c.volume_step);
      app.report("Volume change failed", result);
    }
    KeyCode::Tab => app.cycle_type_filter(),
    KeyCode::Char('/') => app.mode = AppMode::Search,
    KeyCode::Down | KeyCode::Char('j') => app.move_highlight(1),
    KeyCode::Up | KeyCode::Char('k') => app.move_highlight(-1),
    KeyCode::Esc => {
      if !app.search.is_empty() {
        app.search.clear();
        app.update_query();
      }
    }
    KeyCode::Char('q') => app.should_quit = true,
    _ => {}
  }
}

fn handle_search_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Down => app.move_highlight(1),
    KeyCode::Up => app.move_highlight(-1),
    KeyCode::Enter => app.mode = AppMode::Browse,
    KeyCode::Esc => {
      app.search.clear();
      app.update_query();
      app.mode = AppMode::Browse;
    }
    code => {
      if app.search.edit(code) {
        app.update_query();
      }
    }
  }
}

fn handle_settings_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Enter => app.trigger_settings(),
    KeyCode::Esc => app.mode = AppMode::Browse,
    code => {
      app.clear_error();
      app.media_folder.edit(code);
    }
  }
}

fn handle_password_key<T: Transport>(app: &mut App<T>, key: KeyEvent) {
  match key.code {
    KeyCode::Tab | KeyCode::Down => app.password_focus = app.password_focus.next(),
    KeyCode::BackTab | KeyCode::Up => app.password_focus = app.password_focus.next().next(),
    KeyCode::Enter => match app.password_focus {
      PasswordField::Confirm => app.submit_password_change(),
      field => app.password_focus = field.next(),
    },
    KeyCode::Esc => app.close_password_form(),
    code => {
      app.clear_error();
      match app.password_focus {
        PasswordField::Current => app.current_password.edit(code),
        PasswordField::New => app.new_password.edit(code),
        PasswordField::Confirm => app.confirm_password.edit(code),
      };
    }
  }
}
