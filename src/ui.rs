use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Margin, Rect},
  style::{Modifier, Style},
  text::{Line, Span},
  widgets::{Block, BorderType, Clear, Padding, Paragraph, Wrap},
};

use crate::app::{App, GridLayout, Notice, Screen};
use crate::detail::{ChannelAvatar, DescriptionSpan};
use crate::graphics::ThumbnailWidget;
use crate::grid::{Card, GridView, columns_for_width};
use crate::input::TextInput;
use crate::listing::{Category, ListingQuery};
use crate::player::HandleState;
use crate::theme::Theme;

const MIN_CARD_WIDTH: u16 = 30;
const CARD_HEIGHT: u16 = 11;
const THUMB_ROWS: u16 = 5;
const AVATAR_COLS: u16 = 6;
const AVATAR_ROWS: u16 = 3;

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

fn centered(width: u16, height: u16, area: Rect) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect {
    x: area.x + (area.width - width) / 2,
    y: area.y + (area.height - height) / 2,
    width,
    height,
  }
}

fn panel<'a>(theme: &Theme, title: impl Into<Line<'a>>) -> Block<'a> {
  Block::bordered()
    .title(title)
    .title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.border))
    .style(Style::default().bg(theme.bg))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();
  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, tabs_area, main_area, status_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  match app.screen {
    Screen::Gate => render_gate(frame, app, main_area),
    Screen::Browse => {
      render_tabs(frame, app, tabs_area);
      if app.ui.modal_open {
        render_detail(frame, app, main_area);
      } else {
        render_grid(frame, app, main_area);
      }
      if app.ui.search_open {
        render_search(frame, app, main_area);
      }
    }
  }
  render_status(frame, app, status_area);
  render_footer(frame, app, footer_area);

  let full = frame.area();
  if let Some(notice) = &app.notice {
    render_notice(frame, theme, notice, full);
  }
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let left = Line::from(Span::styled(" ▶ ytgrid ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let searching = match &app.query {
    ListingQuery::Search(q) => Some(q.as_str()),
    ListingQuery::Category(_) => None,
  };
  let mut spans = vec![Span::raw(" ")];
  for (i, category) in Category::ALL.iter().enumerate() {
    let active = searching.is_none() && *category == app.ui.active_category;
    let style = if active {
      Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(theme.muted)
    };
    spans.push(Span::styled(format!(" {} {} ", i + 1, category.label()), style));
    spans.push(Span::raw(" "));
  }
  if let Some(q) = searching {
    spans.push(Span::styled(format!(" 🔍 {} ", q), Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)));
  }
  frame.render_widget(Line::from(spans), area);
}

fn render_gate(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let popup = centered(64, 13, area);
  frame.render_widget(Clear, popup);
  let block = panel(theme, " ytgrid ").padding(Padding::horizontal(1));
  let inner = block.inner(popup);
  frame.render_widget(block, popup);

  let [intro_area, input_area, note_area] =
    Layout::vertical([Constraint::Length(4), Constraint::Length(3), Constraint::Min(1)]).areas(inner);
  let intro = vec![
    Line::from(""),
    Line::from(Span::styled("▶  Enter YouTube API Key to Watch Videos", Style::default().fg(theme.fg))),
    Line::from(Span::styled("Paste API Key (AIzaSy...) and press Enter.", Style::default().fg(theme.muted))),
  ];
  frame.render_widget(Paragraph::new(intro).alignment(Alignment::Center), intro_area);
  render_text_input(frame, theme, &mut app.key_input, " API Key ", input_area, true);
  let note = Paragraph::new(Line::from(Span::styled(
    "For full access, get your own key from Google Cloud Console",
    Style::default().fg(theme.muted),
  )))
  .alignment(Alignment::Center)
  .wrap(Wrap { trim: true });
  frame.render_widget(note, note_area);
}

fn render_text_input(frame: &mut Frame, theme: &Theme, input: &mut TextInput, title: &str, area: Rect, focused: bool) {
  let border_color = if focused { theme.accent } else { theme.border };
  let block = Block::bordered()
    .title(title)
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .style(Style::default().bg(theme.bg))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&input.text, input.cursor);
  if cursor_col < input.scroll {
    input.scroll = cursor_col;
  } else if cursor_col >= input.scroll + inner_w {
    input.scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let scroll = input.scroll;
  let visible: String = input
    .text
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= scroll)
    .take_while(|(start, _, _)| *start < scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  frame.render_widget(Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(block), area);
  if focused {
    let cursor_x = area.x + 2 + (cursor_col - scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_placeholder(frame: &mut Frame, theme: &Theme, area: Rect, lines: Vec<Line>) {
  let paragraph = Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(
    Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border)),
  );
  frame.render_widget(paragraph, area);
}

fn render_grid(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  match &app.grid {
    GridView::Loading(message) => {
      let lines = vec![Line::from(""), Line::from(Span::styled(format!("⏳ {}", message), theme.status))];
      render_placeholder(frame, theme, area, lines);
      return;
    }
    GridView::NoResults => {
      let lines = vec![Line::from(""), Line::from(Span::styled("⚠  No videos found", theme.muted))];
      render_placeholder(frame, theme, area, lines);
      return;
    }
    GridView::Error(message) => {
      let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!("⚠  {}", message), Style::default().fg(theme.error))),
        Line::from(""),
        Line::from(vec![
          Span::styled(" r ", Style::default().fg(theme.key_fg).bg(theme.key_bg)),
          Span::styled(" Retry    ", theme.muted),
          Span::styled(" K ", Style::default().fg(theme.key_fg).bg(theme.key_bg)),
          Span::styled(" Change API Key ", theme.muted),
        ]),
      ];
      render_placeholder(frame, theme, area, lines);
      return;
    }
    GridView::Cards(_) => {}
  }

  let columns = columns_for_width(area.width, MIN_CARD_WIDTH);
  let viewport_rows = (area.height / CARD_HEIGHT).max(1) as usize;
  app.layout = GridLayout { columns, viewport_rows };

  let card_w = area.width / columns as u16;
  let cards: Vec<Card> = app.grid.cards().to_vec();
  let first = app.scroll_row * columns;
  for (offset, card) in cards.iter().skip(first).take(columns * viewport_rows).enumerate() {
    let (row, col) = (offset / columns, offset % columns);
    let cell = Rect {
      x: area.x + col as u16 * card_w,
      y: area.y + row as u16 * CARD_HEIGHT,
      width: card_w,
      height: CARD_HEIGHT.min(area.height.saturating_sub(row as u16 * CARD_HEIGHT)),
    };
    let selected = first + offset == app.selected;
    render_card(frame, app, card, cell, selected);
  }
}

fn render_card(frame: &mut Frame, app: &mut App, card: &Card, area: Rect, selected: bool) {
  let theme = app.theme();
  let border = if selected { theme.accent } else { theme.border };
  let block = Block::bordered()
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border))
    .style(Style::default().bg(theme.card_bg));
  let inner = block.inner(area);
  frame.render_widget(block, area);
  if inner.is_empty() {
    return;
  }

  let [thumb_area, text_area] = Layout::vertical([Constraint::Length(THUMB_ROWS), Constraint::Min(0)]).areas(inner);
  let mode = app.display_mode;
  if let Some(image) = app.thumbs.fitted(&card.video_id, &card.thumbnail_url, thumb_area, mode) {
    frame.render_widget(ThumbnailWidget { image, display_mode: mode }, thumb_area);
  }
  if !card.duration.is_empty() && thumb_area.height > 0 {
    let badge = format!(" {} ", card.duration);
    let w = (badge.chars().count() as u16).min(thumb_area.width);
    let badge_area = Rect { x: thumb_area.right() - w, y: thumb_area.bottom() - 1, width: w, height: 1 };
    frame.render_widget(Span::styled(badge, Style::default().fg(theme.badge_fg).bg(theme.badge_bg)), badge_area);
  }

  let w = text_area.width as usize;
  let title_style = if selected {
    Style::default().fg(theme.highlight_fg).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(theme.fg).add_modifier(Modifier::BOLD)
  };
  let lines = vec![
    Line::from(Span::styled(truncate_str(&card.title, w), title_style)),
    Line::from(vec![
      Span::styled(format!("({}) ", card.avatar), Style::default().fg(theme.accent)),
      Span::styled(truncate_str(&card.channel, w.saturating_sub(4)), theme.muted),
    ]),
    Line::from(Span::styled(truncate_str(&format!("{} views • {}", card.views, card.age), w), theme.muted)),
  ];
  frame.render_widget(Paragraph::new(lines), text_area);
}

fn render_detail(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let Some(view) = app.detail.clone() else { return };
  let variant = match app.player.state() {
    state if state.is_terminal_failure() => "player failed",
    HandleState::Creating(v) | HandleState::Ready(v) | HandleState::Failed(v) => v.label(),
    HandleState::Uninitialized => "no player",
  };
  let title = Line::from(vec![
    Span::styled(" Now Playing ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    Span::styled(format!("[{}] ", variant), Style::default().fg(theme.muted)),
  ]);
  frame.render_widget(Clear, area);
  let block = panel(theme, title).padding(Padding::horizontal(1));
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let [top, description_area] = Layout::vertical([Constraint::Percentage(50), Constraint::Min(3)]).areas(inner);
  let [thumb_area, info_area] = Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(top);

  let mode = app.display_mode;
  if let Some(image) = app.thumbs.fitted(&view.video_id, &view.thumbnail_url, thumb_area, mode) {
    frame.render_widget(ThumbnailWidget { image, display_mode: mode }, thumb_area);
  }

  let info_text = info_area.inner(Margin { horizontal: 1, vertical: 0 });
  let w = info_text.width as usize;
  let [head_area, channel_area, player_area] = Layout::vertical([
    Constraint::Min(2),
    Constraint::Length(AVATAR_ROWS + 1),
    Constraint::Length(2),
  ])
  .areas(info_text);

  let head = vec![
    Line::from(Span::styled(view.title.clone(), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
    Line::from(Span::styled(format!("{} • {}", view.views, view.date), theme.muted)),
    Line::from(Span::styled(view.likes.clone(), theme.muted)),
  ];
  frame.render_widget(Paragraph::new(head).wrap(Wrap { trim: true }), head_area);

  let [avatar_area, channel_text] =
    Layout::horizontal([Constraint::Length(AVATAR_COLS), Constraint::Min(0)]).spacing(1).areas(channel_area);
  let avatar_area = Rect { height: avatar_area.height.min(AVATAR_ROWS), ..avatar_area };
  match &view.avatar {
    ChannelAvatar::Image(url) => match app.thumbs.fitted(url, url, avatar_area, mode) {
      Some(image) => frame.render_widget(ThumbnailWidget { image, display_mode: mode }, avatar_area),
      None => {
        let pending = Paragraph::new("◉").alignment(Alignment::Center).style(Style::default().fg(theme.accent));
        frame.render_widget(pending, avatar_area);
      }
    },
    ChannelAvatar::Initial(c) => {
      let initial = Paragraph::new(vec![Line::from(""), Line::from(c.to_string())])
        .alignment(Alignment::Center)
        .style(Style::default().fg(theme.badge_fg).bg(theme.accent).add_modifier(Modifier::BOLD));
      frame.render_widget(initial, avatar_area);
    }
  }
  let channel = vec![
    Line::from(Span::styled(truncate_str(&view.channel_title, w.saturating_sub(AVATAR_COLS as usize + 1)), theme.fg)),
    Line::from(Span::styled(view.subscribers.clone(), theme.muted)),
  ];
  frame.render_widget(Paragraph::new(channel), channel_text);

  let state = app.player.last_playback.map(|s| s.label()).unwrap_or("loading");
  let player_lines = vec![
    Line::from(vec![Span::styled("Player  ", theme.muted), Span::styled(state, theme.status)]),
    Line::from(Span::styled(
      truncate_str(&view.watch_url(), w),
      Style::default().fg(theme.link).add_modifier(Modifier::UNDERLINED),
    )),
  ];
  frame.render_widget(Paragraph::new(player_lines), player_area);

  let description: Vec<Line> = view
    .description
    .iter()
    .map(|spans| {
      Line::from(
        spans
          .iter()
          .map(|span| match span {
            DescriptionSpan::Text(t) => Span::styled(t.clone(), theme.fg),
            DescriptionSpan::Link(url) => {
              Span::styled(url.clone(), Style::default().fg(theme.link).add_modifier(Modifier::UNDERLINED))
            }
          })
          .collect::<Vec<_>>(),
      )
    })
    .collect();
  let description_block = Block::bordered()
    .title(" Description ")
    .title_style(Style::default().fg(theme.muted))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(theme.border));
  let description = Paragraph::new(description).wrap(Wrap { trim: false }).block(description_block);
  frame.render_widget(description, description_area);
}

fn render_search(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let popup = centered(area.width.saturating_mul(3) / 5, 3, area);
  frame.render_widget(Clear, popup);
  render_text_input(frame, theme, &mut app.search_input, " Search YouTube ", popup, true);
}

fn render_notice(frame: &mut Frame, theme: &Theme, notice: &Notice, area: Rect) {
  let (message, keys) = match notice {
    Notice::Alert(message) => (message.as_str(), vec![("Enter", "OK")]),
    Notice::Confirm { message, .. } => (message.as_str(), vec![("y", "Yes"), ("n", "No")]),
  };
  let width = (message.chars().count() as u16 + 6).clamp(30, area.width.saturating_sub(4).max(30));
  let popup = centered(width, 7, area);
  frame.render_widget(Clear, popup);
  let block = panel(theme, " Notice ").padding(Padding::horizontal(1));

  let key_spans: Vec<Span> = keys
    .iter()
    .flat_map(|(key, action)| {
      vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {}  ", action), theme.muted),
      ]
    })
    .collect();
  let lines = vec![
    Line::from(""),
    Line::from(Span::styled(message.to_string(), theme.fg)),
    Line::from(""),
    Line::from(key_spans),
  ];
  frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(block), popup);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if app.ui.is_loading && !app.grid.cards().is_empty() {
    (" ⏳ Loading more…".to_string(), Style::default().fg(theme.status))
  } else if app.ui.modal_open {
    match app.player.last_playback {
      Some(state) => (format!(" ♪ {}", state.label()), Style::default().fg(theme.status)),
      None => (" Ready".to_string(), Style::default().fg(theme.muted)),
    }
  } else if let Some(card) = app.selected_card() {
    // Full title of the selected card, which the cell may have truncated.
    (format!(" {}", card.tooltip), Style::default().fg(theme.fg))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let keys: Vec<(&str, &str)> = match app.screen {
    Screen::Gate => vec![("Enter", "Start Watching"), ("^t", "Theme"), ("Esc", "Quit")],
    Screen::Browse if app.ui.search_open => vec![("Enter", "Search"), ("Esc", "Close")],
    Screen::Browse if app.ui.modal_open => vec![
      ("Space", "Play/Pause"),
      ("m", "Mute"),
      ("s", "Share"),
      ("l/d", "Like/Dislike"),
      ("a", "Save"),
      ("u", "Subscribe"),
      ("^o", "Browser"),
      ("Esc", "Close"),
    ],
    Screen::Browse => vec![
      ("Enter", "Open"),
      ("hjkl", "Navigate"),
      ("Tab", "Category"),
      ("g", "Home"),
      ("/", "Search"),
      ("^t", "Theme"),
      ("q", "Quit"),
    ],
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
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let theme_label = format!("{} | {} ", app.display_mode.label(), theme.name);
  let right = Line::from(Span::styled(&theme_label, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(theme_label.len() as u16), width: theme_label.len() as u16, ..area };
  frame.render_widget(right, right_area);
}
