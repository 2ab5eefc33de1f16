use ratatui::style::Color;

/// Colour palette for the whole UI.
#[derive(Debug)]
pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub stripe_bg: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
  /// Marker colour for the entry that is currently playing.
  pub playing: Color,
}

pub const THEMES: [Theme; 3] = [
  Theme {
    name: "Midnight",
    bg: Color::Rgb(22, 24, 33),
    fg: Color::Rgb(205, 210, 225),
    accent: Color::Rgb(130, 170, 255),
    muted: Color::Rgb(110, 116, 140),
    border: Color::Rgb(60, 66, 90),
    highlight_fg: Color::Rgb(22, 24, 33),
    highlight_bg: Color::Rgb(130, 170, 255),
    stripe_bg: Color::Rgb(28, 30, 41),
    status: Color::Rgb(195, 232, 141),
    error: Color::Rgb(255, 117, 127),
    key_fg: Color::Rgb(22, 24, 33),
    key_bg: Color::Rgb(110, 116, 140),
    playing: Color::Rgb(255, 199, 119),
  },
  Theme {
    name: "Dusk",
    bg: Color::Rgb(40, 30, 42),
    fg: Color::Rgb(236, 224, 230),
    accent: Color::Rgb(244, 143, 177),
    muted: Color::Rgb(150, 128, 145),
    border: Color::Rgb(86, 66, 88),
    highlight_fg: Color::Rgb(40, 30, 42),
    highlight_bg: Color::Rgb(244, 143, 177),
    stripe_bg: Color::Rgb(47, 36, 50),
    status: Color::Rgb(178, 223, 219),
    error: Color::Rgb(255, 138, 101),
    key_fg: Color::Rgb(40, 30, 42),
    key_bg: Color::Rgb(150, 128, 145),
    playing: Color::Rgb(255, 213, 79),
  },
  Theme {
    name: "Paper",
    bg: Color::Rgb(250, 248, 242),
    fg: Color::Rgb(50, 50, 56),
    accent: Color::Rgb(38, 110, 170),
    muted: Color::Rgb(140, 140, 148),
    border: Color::Rgb(205, 200, 190),
    highlight_fg: Color::Rgb(250, 248, 242),
    highlight_bg: Color::Rgb(38, 110, 170),
    stripe_bg: Color::Rgb(242, 239, 230),
    status: Color::Rgb(46, 125, 50),
    error: Color::Rgb(198, 40, 40),
    key_fg: Color::Rgb(250, 248, 242),
    key_bg: Color::Rgb(140, 140, 148),
    playing: Color::Rgb(230, 126, 34),
  },
];

/// Index of the theme called `name`, falling back to the first.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name == n)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn theme_lookup_by_name() {
    assert_eq!(theme_index(Some("Dusk")), 1);
    assert_eq!(theme_index(Some("nope")), 0);
    assert_eq!(theme_index(None), 0);
  }
}
