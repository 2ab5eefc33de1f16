use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph},
};

use crate::app::{App, AppMode, LoginField, PasswordField};
use crate::input::TextField;
use crate::library::MediaKind;
use crate::selection::Selection;
use crate::theme::Theme;
use crate::transport::Transport;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

/// `m:ss`, or `h:mm:ss` from one hour up.
fn format_time(secs: f64) -> String {
  let total = if secs.is_finite() { secs.max(0.0) as u64 } else { 0 };
  let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
  if h > 0 { format!("{}:{:02}:{:02}", h, m, s) } else { format!("{}:{:02}", m, s) }
}

fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
  if bytes < 1024 {
    return format!("{} B", bytes);
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit < UNITS.len() - 1 {
    value /= 1024.0;
    unit += 1;
  }
  format!("{:.1} {}", value, UNITS[unit])
}

fn rounded_block(theme: &Theme, focused: bool) -> Block<'static> {
  let color = if focused { theme.accent } else { theme.border };
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(color))
}

// --- UI Rendering ---

pub fn ui<T: Transport>(frame: &mut Frame, app: &mut App<T>) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(if matches!(app.mode, AppMode::Login | AppMode::Password) { 0 } else { 3 }),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, app, header_area);
  if app.mode == AppMode::Login {
    render_login(frame, app, main_area);
  } else if app.mode == AppMode::Password {
    render_password_form(frame, app, main_area);
  } else {
    let [list_area, info_area] =
      Layout::horizontal([Constraint::Percentage(68), Constraint::Percentage(32)]).areas(main_area);
    render_library(frame, app, list_area);
    render_now_playing(frame, app, info_area);
    render_input(frame, app, input_area);
  }
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);
}

fn render_header<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
  let theme = app.theme();
  let left = Line::from(Span::styled(" ▶ mstream ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let right_text = format!("{}  v{} ", app.api.base_url(), env!("CARGO_PKG_VERSION"));
  let width = right_text.chars().count() as u16;
  let right = Line::from(Span::styled(right_text, Style::default().fg(theme.muted)));
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width: width.min(area.width), ..area };
  frame.render_widget(right, right_area);
}

/// Draw a single-line input box, scrolling horizontally to keep the cursor visible.
fn render_text_field(
  frame: &mut Frame,
  theme: &Theme,
  field: &mut TextField,
  title: String,
  focused: bool,
  masked: bool,
  area: Rect,
) {
  let block = rounded_block(theme, focused)
    .title(title)
    .title_style(Style::default().fg(if focused { theme.accent } else { theme.muted }))
    .padding(Padding::horizontal(1));

  let shown: String = if masked { "•".repeat(field.text.chars().count()) } else { field.text.clone() };
  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&shown, field.cursor);

  if cursor_col < field.scroll {
    field.scroll = cursor_col;
  } else if cursor_col >= field.scroll + inner_w {
    field.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = shown
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= field.scroll)
    .take_while(|(start, _, _)| *start < field.scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), area);

  if focused {
    let cursor_x = area.x + 2 + (cursor_col - field.scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_login<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  let width = area.width.min(60);
  let column = Rect { x: area.x + (area.width - width) / 2, width, ..area };
  let [_, intro_area, user_area, pass_area, _] = Layout::vertical([
    Constraint::Min(0),
    Constraint::Length(4),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Min(0),
  ])
  .areas(column);

  let intro = vec![
    Line::from(Span::styled("Log in to your media server", Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled(app.api.base_url().to_string(), Style::default().fg(theme.muted))),
  ];
  frame.render_widget(Paragraph::new(intro).alignment(Alignment::Center), intro_area);

  let focus = app.login_focus;
  render_text_field(frame, theme, &mut app.username, " Username ".into(), focus == LoginField::Username, false, user_area);
  render_text_field(frame, theme, &mut app.password, " Password ".into(), focus == LoginField::Password, true, pass_area);
}

fn render_password_form<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  let width = area.width.min(60);
  let column = Rect { x: area.x + (area.width - width) / 2, width, ..area };
  let [_, intro_area, current_area, new_area, confirm_area, _] = Layout::vertical([
    Constraint::Min(0),
    Constraint::Length(2),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Length(3),
    Constraint::Min(0),
  ])
  .areas(column);

  let intro = Line::from(Span::styled(
    format!("Change password for {}", app.username.text),
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
  ));
  frame.render_widget(Paragraph::new(intro).alignment(Alignment::Center), intro_area);

  let focus = app.password_focus;
  let fields = [
    (&mut app.current_password, " Current password ", PasswordField::Current, current_area),
    (&mut app.new_password, " New password ", PasswordField::New, new_area),
    (&mut app.confirm_password, " Repeat new password ", PasswordField::Confirm, confirm_area),
  ];
  for (field, title, which, field_area) in fields {
    render_text_field(frame, theme, field, title.into(), focus == which, true, field_area);
  }
}

fn render_library<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  let library = app.state.library();
  let filter = library.filter();
  let title = format!(" Library · {}/{} · {} ", library.visible_len(), library.entries().len(), filter.type_filter.label());
  let block = rounded_block(theme, app.mode == AppMode::Browse)
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD));

  if library.visible_len() == 0 {
    let message = if !library.is_loaded() {
      "Loading library…"
    } else if library.entries().is_empty() {
      "The media folder is empty."
    } else {
      "Nothing matches the current filter."
    };
    let text = vec![Line::from(""), Line::from(Span::styled(message, Style::default().fg(theme.muted)))];
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).block(block), area);
    return;
  }

  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;
  let playing = app.state.selection().path();
  let selected = app.list_state.selected();

  let items: Vec<ListItem> = library
    .visible()
    .enumerate()
    .map(|(i, entry)| {
      let is_selected = Some(i) == selected;
      let is_playing = playing == Some(entry.path.as_str());
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };

      let marker = if is_playing { "♪ " } else { "  " };
      let kind = match entry.kind {
        MediaKind::Video => "▣ ",
        MediaKind::Audio => "♫ ",
      };
      let resume = app.state.tracker().resume_position(&entry.path).filter(|p| *p > 0.0);
      let mut right = String::new();
      if let Some(pos) = resume {
        right.push_str(&format!("↻ {}", format_time(pos)));
      }
      if let Some(size) = entry.size {
        if !right.is_empty() {
          right.push_str("  ");
        }
        right.push_str(&format_size(size));
      }

      let right_w = right.chars().count();
      let title_max = inner_w.saturating_sub(right_w + 2 + marker.chars().count() + kind.chars().count());
      let title = truncate_str(entry.display_title(), title_max);
      let gap = title_max.saturating_sub(title.chars().count()) + 2;

      let marker_fg = if is_selected { theme.highlight_fg } else { theme.playing };
      let line = Line::from(vec![
        Span::styled(marker, Style::default().fg(marker_fg)),
        Span::styled(kind, Style::default().fg(if is_selected { fg } else { theme.muted })),
        Span::styled(title, Style::default().fg(fg)),
        Span::raw(" ".repeat(gap)),
        Span::styled(right, Style::default().fg(if is_selected { fg } else { theme.muted })),
      ]);
      ListItem::new(line).bg(bg)
    })
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD));

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn render_now_playing<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
  let theme = app.theme();
  let block = rounded_block(theme, false)
    .title(Span::styled(" Now Playing ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .padding(Padding::horizontal(1));

  let Selection::Active { path, .. } = app.state.selection() else {
    let text = vec![Line::from(""), Line::from(Span::styled("Nothing playing", Style::default().fg(theme.muted)))];
    frame.render_widget(Paragraph::new(text).block(block), area);
    return;
  };

  let inner_w = area.width.saturating_sub(4) as usize;
  let library = app.state.library();
  let entry = library.visible_position(path).and_then(|i| library.visible_entry(i));
  let transport = app.state.transport();
  let title = entry.map_or(path.as_str(), |e| e.display_title());

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(truncate_str(title, inner_w), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
  ];
  let mut field = |label: &'static str, value: String| {
    lines.push(Line::from(vec![
      Span::styled(label, Style::default().fg(theme.muted)),
      Span::styled(truncate_str(&value, inner_w.saturating_sub(label.len())), Style::default().fg(theme.fg)),
    ]));
  };
  if let Some(e) = entry {
    field("Type      ", e.kind.label().to_string());
    if let Some(year) = e.metadata.as_ref().and_then(|m| m.year.clone()) {
      field("Year      ", year);
    }
  }
  field("Position  ", format_time(transport.current_time()));
  field("Volume    ", format!("{:.0}%", transport.volume() * 100.0));
  let state = if transport.is_paused() { "paused" } else { "playing" };
  field("State     ", state.to_string());
  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(truncate_str(path, inner_w), Style::default().fg(theme.muted))));

  frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if let Some(info) = &app.info_message {
    (format!(" ℹ {}", info), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input<T: Transport>(frame: &mut Frame, app: &mut App<T>, area: Rect) {
  let theme = app.theme();
  if app.mode == AppMode::Settings {
    render_text_field(frame, theme, &mut app.media_folder, " Media folder ".into(), true, false, area);
  } else {
    let title = format!(" Search · {} ", app.state.library().filter().type_filter.label());
    let focused = app.mode == AppMode::Search;
    render_text_field(frame, theme, &mut app.search, title, focused, false, area);
  }
}

fn render_footer<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
  let theme = app.theme();
  let controls = app.state.controls();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Login => vec![("Tab", "Field"), ("Enter", "Log in"), ("^t", "Theme"), ("Esc", "Quit")],
    AppMode::Browse => {
      let mut k = vec![("Enter", "Play")];
      if controls.play_pause {
        let label = if app.state.transport().is_paused() { "Resume" } else { "Pause" };
        k.push(("Space", label));
        k.push(("←/→", "Seek"));
      }
      if controls.previous {
        k.push(("p", "Prev"));
      }
      if controls.next {
        k.push(("n", "Next"));
      }
      k.extend([("+/-", "Vol"), ("Tab", "Type"), ("/", "Search"), ("^o", "Folder"), ("^p", "Password"), ("^l", "Logout"), ("q", "Quit")]);
      k
    }
    AppMode::Search => vec![("Enter", "Done"), ("↑/↓", "Navigate"), ("Esc", "Clear")],
    AppMode::Settings => vec![("Enter", "Save"), ("Esc", "Cancel")],
    AppMode::Password => vec![("Tab", "Field"), ("Enter", "Next/Save"), ("Esc", "Cancel")],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw(" "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} ", theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncates_with_ellipsis() {
    assert_eq!(truncate_str("short", 10), "short");
    assert_eq!(truncate_str("a longer title", 6), "a lon…");
  }

  #[test]
  fn time_formatting() {
    assert_eq!(format_time(0.0), "0:00");
    assert_eq!(format_time(95.7), "1:35");
    assert_eq!(format_time(3725.0), "1:02:05");
    assert_eq!(format_time(f64::NAN), "0:00");
  }

  #[test]
  fn size_formatting() {
    assert_eq!(format_size(512), "512 B");
    assert_eq!(format_size(1536), "1.5 KB");
    assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("ab", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
    assert_eq!(display_width("日本", 1), 2);
  }
}
