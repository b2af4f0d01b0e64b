use ratatui::style::Color;

pub struct Theme {
  pub name: &'static str,
  pub bg: Color,
  pub fg: Color,
  pub accent: Color,
  pub muted: Color,
  pub border: Color,
  pub highlight_fg: Color,
  pub highlight_bg: Color,
  pub card_bg: Color,
  pub badge_fg: Color,
  pub badge_bg: Color,
  pub link: Color,
  pub status: Color,
  pub error: Color,
  pub key_fg: Color,
  pub key_bg: Color,
}

pub const THEMES: &[Theme] = &[
  Theme {
    name: "Dark",
    bg: Color::Rgb(15, 15, 15),
    fg: Color::Rgb(241, 241, 241),
    accent: Color::Rgb(255, 0, 51),
    muted: Color::Rgb(170, 170, 170),
    border: Color::Rgb(63, 63, 63),
    highlight_fg: Color::Rgb(255, 255, 255),
    highlight_bg: Color::Rgb(39, 39, 39),
    card_bg: Color::Rgb(24, 24, 24),
    badge_fg: Color::Rgb(255, 255, 255),
    badge_bg: Color::Rgb(0, 0, 0),
    link: Color::Rgb(62, 166, 255),
    status: Color::Rgb(241, 196, 15),
    error: Color::Rgb(255, 78, 69),
    key_fg: Color::Rgb(15, 15, 15),
    key_bg: Color::Rgb(170, 170, 170),
  },
  Theme {
    name: "Light",
    bg: Color::Rgb(255, 255, 255),
    fg: Color::Rgb(15, 15, 15),
    accent: Color::Rgb(204, 0, 0),
    muted: Color::Rgb(96, 96, 96),
    border: Color::Rgb(204, 204, 204),
    highlight_fg: Color::Rgb(15, 15, 15),
    highlight_bg: Color::Rgb(229, 229, 229),
    card_bg: Color::Rgb(249, 249, 249),
    badge_fg: Color::Rgb(255, 255, 255),
    badge_bg: Color::Rgb(33, 33, 33),
    link: Color::Rgb(6, 95, 212),
    status: Color::Rgb(176, 112, 0),
    error: Color::Rgb(204, 0, 0),
    key_fg: Color::Rgb(255, 255, 255),
    key_bg: Color::Rgb(96, 96, 96),
  },
  Theme {
    name: "Nord",
    bg: Color::Rgb(46, 52, 64),
    fg: Color::Rgb(236, 239, 244),
    accent: Color::Rgb(136, 192, 208),
    muted: Color::Rgb(129, 161, 193),
    border: Color::Rgb(76, 86, 106),
    highlight_fg: Color::Rgb(46, 52, 64),
    highlight_bg: Color::Rgb(136, 192, 208),
    card_bg: Color::Rgb(59, 66, 82),
    badge_fg: Color::Rgb(236, 239, 244),
    badge_bg: Color::Rgb(46, 52, 64),
    link: Color::Rgb(143, 188, 187),
    status: Color::Rgb(235, 203, 139),
    error: Color::Rgb(191, 97, 106),
    key_fg: Color::Rgb(46, 52, 64),
    key_bg: Color::Rgb(129, 161, 193),
  },
];

/// Index of the theme called `name`, or the first theme.
pub fn theme_index(name: Option<&str>) -> usize {
  name.and_then(|n| THEMES.iter().position(|t| t.name == n)).unwrap_or(0)
}
