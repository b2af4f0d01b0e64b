use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, Notice, Screen, SocialAction};
use crate::grid::GridView;
use crate::listing::Category;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

/// Single-line text field with a char-indexed cursor.
#[derive(Debug, Default, Clone)]
pub struct TextInput {
  pub text: String,
  pub cursor: usize,
  /// Horizontal scroll offset in display columns.
  pub scroll: usize,
}

impl TextInput {
  pub fn set(&mut self, text: &str) {
    self.text = text.to_string();
    self.cursor = text.chars().count();
  }

  pub fn clear(&mut self) {
    self.text.clear();
    self.cursor = 0;
    self.scroll = 0;
  }

  /// Apply an editing key. Returns false for keys that are not edits.
  pub fn edit(&mut self, code: KeyCode) -> bool {
    let len = self.text.chars().count();
    match code {
      KeyCode::Char(c) => {
        let byte_idx = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_idx, c);
        self.cursor += 1;
      }
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let byte_idx = char_to_byte_index(&self.text, self.cursor);
          self.text.remove(byte_idx);
        }
      }
      KeyCode::Delete => {
        if self.cursor < len {
          let byte_idx = char_to_byte_index(&self.text, self.cursor);
          self.text.remove(byte_idx);
        }
      }
      KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
      KeyCode::Right => self.cursor = (self.cursor + 1).min(len),
      KeyCode::Home => self.cursor = 0,
      KeyCode::End => self.cursor = len,
      _ => return false,
    }
    true
  }
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
  if ctrl && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  if ctrl && key.code == KeyCode::Char('t') {
    app.next_theme();
    return Ok(());
  }

  if app.notice.is_some() {
    handle_notice_key(app, key).await;
    return Ok(());
  }

  match app.screen {
    Screen::Gate => handle_gate_key(app, key).await,
    Screen::Browse if app.ui.search_open => handle_search_key(app, key),
    Screen::Browse if app.ui.modal_open => handle_detail_key(app, key).await,
    Screen::Browse => handle_grid_key(app, key),
  }
  Ok(())
}

async fn handle_notice_key(app: &mut App, key: event::KeyEvent) {
  let confirm = matches!(app.notice, Some(Notice::Confirm { .. }));
  match key.code {
    KeyCode::Enter => app.answer_notice(true).await,
    KeyCode::Char('y') if confirm => app.answer_notice(true).await,
    KeyCode::Char('n') | KeyCode::Esc => app.answer_notice(false).await,
    _ => {}
  }
}

async fn handle_gate_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      let candidate = app.submit_key();
      app.save_key(&candidate).await;
    }
    KeyCode::Esc => app.should_quit = true,
    code => {
      app.key_input.edit(code);
    }
  }
}

fn handle_search_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => app.submit_search(),
    KeyCode::Esc => app.close_search(),
    code => {
      app.search_input.edit(code);
    }
  }
}

async fn handle_detail_key(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    if key.code == KeyCode::Char('o') {
      app.open_watch_page();
    }
    return;
  }
  match key.code {
    KeyCode::Char(' ') => app.toggle_play().await,
    KeyCode::Char('m') => app.toggle_mute().await,
    KeyCode::Char('s') => app.share(),
    KeyCode::Char('l') => app.social_action(SocialAction::Like),
    KeyCode::Char('d') => app.social_action(SocialAction::Dislike),
    KeyCode::Char('a') => app.social_action(SocialAction::Save),
    KeyCode::Char('u') => app.social_action(SocialAction::Subscribe),
    KeyCode::Esc | KeyCode::Char('q') => app.close_detail().await,
    _ => {}
  }
}

fn handle_grid_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => app.open_selected(),
    KeyCode::Left | KeyCode::Char('h') => app.move_selection(-1, 0),
    KeyCode::Right | KeyCode::Char('l') => app.move_selection(1, 0),
    KeyCode::Down | KeyCode::Char('j') => app.move_selection(0, 1),
    KeyCode::Up | KeyCode::Char('k') => app.move_selection(0, -1),
    KeyCode::PageDown => app.move_selection(0, app.layout.viewport_rows.max(1) as isize),
    KeyCode::PageUp => app.move_selection(0, -(app.layout.viewport_rows.max(1) as isize)),
    KeyCode::Tab => app.switch_category(app.ui.active_category.next()),
    KeyCode::BackTab => app.switch_category(app.ui.active_category.prev()),
    KeyCode::Char(c @ '1'..='6') => {
      let idx = c as usize - '1' as usize;
      app.switch_category(Category::ALL[idx]);
    }
    KeyCode::Home | KeyCode::Char('g') => app.go_home(),
    KeyCode::Char('/') => app.open_search(),
    KeyCode::Char('r') if matches!(app.grid, GridView::Error(_)) => app.retry(),
    KeyCode::Char('K') => app.request_key_reset(),
    KeyCode::Esc | KeyCode::Char('q') => app.should_quit = true,
    _ => {}
  }
}
