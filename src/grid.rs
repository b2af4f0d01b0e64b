//! Turns normalized items into the card grid the UI draws.

use chrono::{DateTime, Utc};

use crate::format::{format_count, format_duration, format_relative_date};
use crate::listing::ListItem;

/// One selectable card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
  pub video_id: String,
  pub thumbnail_url: String,
  pub duration: String,
  /// Display text; the cell truncates it.
  pub title: String,
  /// Full title, shown in the status line while the card is selected.
  pub tooltip: String,
  pub avatar: char,
  pub channel: String,
  pub views: String,
  pub age: String,
}

/// What the grid area shows.
#[derive(Debug, Clone, PartialEq)]
pub enum GridView {
  /// A fetch is running and nothing has been rendered yet.
  Loading(String),
  /// The last render had no items.
  NoResults,
  Cards(Vec<Card>),
  /// Listing failure, with retry and key-reset actions.
  Error(String),
}

impl GridView {
  pub fn cards(&self) -> &[Card] {
    match self {
      GridView::Cards(cards) => cards,
      _ => &[],
    }
  }
}

/// Uppercased first letter of the channel name, or 'C' when there is none.
pub fn avatar_initial(channel: Option<&str>) -> char {
  channel.and_then(|c| c.chars().next()).and_then(|c| c.to_uppercase().next()).unwrap_or('C')
}

pub fn card(item: &ListItem, now: DateTime<Utc>) -> Card {
  Card {
    video_id: item.id.clone(),
    thumbnail_url: item.thumbnail_url.clone(),
    duration: format_duration(item.duration.as_deref()),
    title: item.title.clone(),
    tooltip: item.title.clone(),
    avatar: avatar_initial(item.channel_title.as_deref()),
    channel: item.channel_title.clone().unwrap_or_default(),
    views: format_count(item.view_count),
    age: format_relative_date(item.published_at, now),
  }
}

/// Render a fresh grid. No items gives the "no results" placeholder.
pub fn render(items: &[ListItem], now: DateTime<Utc>) -> GridView {
  if items.is_empty() {
    return GridView::NoResults;
  }
  GridView::Cards(items.iter().map(|item| card(item, now)).collect())
}

/// Append a later page onto the current grid.
pub fn append(view: GridView, items: &[ListItem], now: DateTime<Utc>) -> GridView {
  match view {
    GridView::Cards(mut cards) => {
      cards.extend(items.iter().map(|item| card(item, now)));
      GridView::Cards(cards)
    }
    _ => render(items, now),
  }
}

/// Cards per row for a grid area of `width` cells.
pub fn columns_for_width(width: u16, min_card_width: u16) -> usize {
  (width / min_card_width.max(1)).max(1) as usize
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn item(id: &str, channel: Option<&str>) -> ListItem {
    ListItem {
      id: id.to_string(),
      title: format!("Title {id}"),
      channel_title: channel.map(str::to_string),
      channel_id: None,
      thumbnail_url: "t.jpg".into(),
      view_count: Some(12_345),
      published_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
      duration: Some("PT1M30S".into()),
    }
  }

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap()
  }

  #[test]
  fn empty_renders_placeholder() {
    assert_eq!(render(&[], now()), GridView::NoResults);
  }

  #[test]
  fn card_fields() {
    let view = render(&[item("a", Some("rustacean station"))], now());
    let card = &view.cards()[0];
    assert_eq!(card.video_id, "a");
    assert_eq!(card.title, "Title a");
    assert_eq!(card.tooltip, "Title a");
    assert_eq!(card.avatar, 'R');
    assert_eq!(card.views, "12.3K");
    assert_eq!(card.age, "Yesterday");
    assert_eq!(card.duration, "01:30");
  }

  #[test]
  fn avatar_fallbacks() {
    assert_eq!(avatar_initial(None), 'C');
    assert_eq!(avatar_initial(Some("")), 'C');
    assert_eq!(avatar_initial(Some("élan")), 'É');
  }

  #[test]
  fn append_extends_cards() {
    let view = render(&[item("a", None)], now());
    let view = append(view, &[item("b", None)], now());
    let ids: Vec<&str> = view.cards().iter().map(|c| c.video_id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
  }

  #[test]
  fn append_onto_placeholder_renders_fresh() {
    assert_eq!(append(GridView::Loading("…".into()), &[], now()), GridView::NoResults);
    assert_eq!(append(GridView::NoResults, &[item("a", None)], now()).cards().len(), 1);
  }

  #[test]
  fn columns() {
    assert_eq!(columns_for_width(100, 30), 3);
    assert_eq!(columns_for_width(10, 30), 1);
    assert_eq!(columns_for_width(90, 0), 90);
  }
}
