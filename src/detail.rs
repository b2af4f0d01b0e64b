//! Single-video detail lookup for the overlay.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::constants::constants;
use crate::error::ClientError;
use crate::format::{format_count, format_relative_date};
use crate::grid::avatar_initial;
use crate::listing::{ListItem, parse_count};
use crate::youtube::{ChannelResource, VideoSource};

pub const SUBSCRIBERS_UNAVAILABLE: &str = "Subscribers not available";
const NO_DESCRIPTION: &str = "No description available";

/// A [`ListItem`] plus the fields only the overlay needs.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetail {
  pub item: ListItem,
  pub like_count: Option<u64>,
  pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionSpan {
  Text(String),
  Link(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelAvatar {
  Image(String),
  Initial(char),
}

/// Everything the overlay shows, already formatted.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
  pub video_id: String,
  pub title: String,
  pub views: String,
  pub date: String,
  pub likes: String,
  pub channel_title: String,
  pub subscribers: String,
  pub avatar: ChannelAvatar,
  pub description: Vec<Vec<DescriptionSpan>>,
  pub thumbnail_url: String,
}

impl DetailView {
  pub fn watch_url(&self) -> String {
    format!("{}{}", constants().watch_base_url, self.video_id)
  }

  pub fn share_url(&self) -> String {
    format!("{}{}", constants().share_base_url, self.video_id)
  }
}

/// Split a description into lines, each a run of text and bare `http(s)://` links.
pub fn render_description(raw: Option<&str>) -> Vec<Vec<DescriptionSpan>> {
  let text = raw.filter(|d| !d.is_empty()).unwrap_or(NO_DESCRIPTION);
  text.split('\n').map(link_spans).collect()
}

fn link_spans(line: &str) -> Vec<DescriptionSpan> {
  let mut spans = Vec::new();
  let mut rest = line;
  while let Some(start) = find_url_start(rest) {
    if start > 0 {
      spans.push(DescriptionSpan::Text(rest[..start].to_string()));
    }
    let tail = &rest[start..];
    let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
    spans.push(DescriptionSpan::Link(tail[..end].to_string()));
    rest = &tail[end..];
  }
  if !rest.is_empty() || spans.is_empty() {
    spans.push(DescriptionSpan::Text(rest.to_string()));
  }
  spans
}

fn find_url_start(s: &str) -> Option<usize> {
  match (s.find("http://"), s.find("https://")) {
    (Some(a), Some(b)) => Some(a.min(b)),
    (a, b) => a.or(b),
  }
}

/// Subscriber label and avatar from a channel lookup. Any failure degrades to
/// the fixed "unavailable" label and the channel initial.
fn channel_fields(
  lookup: Result<Option<ChannelResource>, ClientError>,
  channel_title: &str,
) -> (String, ChannelAvatar) {
  let initial = ChannelAvatar::Initial(avatar_initial(Some(channel_title)));
  match lookup {
    Ok(Some(channel)) => {
      let subscribers = channel
        .statistics
        .as_ref()
        .map(|s| format!("{} subscribers", format_count(parse_count(s.subscriber_count.as_deref()))))
        .unwrap_or_else(|| SUBSCRIBERS_UNAVAILABLE.to_string());
      let avatar = channel
        .snippet
        .as_ref()
        .and_then(|s| s.thumbnails.get("default"))
        .map(|t| ChannelAvatar::Image(t.url.clone()))
        .unwrap_or(initial);
      (subscribers, avatar)
    }
    Ok(None) => (SUBSCRIBERS_UNAVAILABLE.to_string(), initial),
    Err(e) => {
      warn!(err = %e, "channel lookup failed");
      (SUBSCRIBERS_UNAVAILABLE.to_string(), initial)
    }
  }
}

/// Fetch a single video's detail.
pub async fn fetch_detail(source: &dyn VideoSource, video_id: &str) -> Result<VideoDetail, ClientError> {
  let ids = [video_id.to_string()];
  let video = source.videos(&ids).await?.into_iter().next().ok_or(ClientError::NotFound)?;
  let item = ListItem::from_resource(&video).ok_or(ClientError::NotFound)?;
  let like_count = parse_count(video.statistics.as_ref().and_then(|s| s.like_count.as_deref()));
  let description = video.snippet.and_then(|s| s.description);
  Ok(VideoDetail { item, like_count, description })
}

/// Build the overlay contents for `video_id`. Only the video lookup can fail;
/// the channel lookup degrades in place.
pub async fn open(source: &dyn VideoSource, video_id: &str, now: DateTime<Utc>) -> Result<DetailView, ClientError> {
  info!(video_id, "opening detail");
  let detail = fetch_detail(source, video_id).await?;
  let item = &detail.item;
  let channel_title = item.channel_title.clone().unwrap_or_default();

  let lookup = match item.channel_id.as_deref() {
    Some(channel_id) => source.channel(channel_id).await,
    None => Ok(None),
  };
  let (subscribers, avatar) = channel_fields(lookup, &channel_title);

  Ok(DetailView {
    video_id: item.id.clone(),
    title: item.title.clone(),
    views: format!("{} views", format_count(item.view_count)),
    date: format_relative_date(item.published_at, now),
    likes: format!("{} likes", format_count(detail.like_count)),
    channel_title,
    subscribers,
    avatar,
    description: render_description(detail.description.as_deref()),
    thumbnail_url: item.thumbnail_url.clone(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::listing::tests::video;
  use crate::youtube::{ChannelStatistics, RawPage, SearchResource, VideoResource};
  use super::DescriptionSpan::{Link, Text};
  use async_trait::async_trait;
  use chrono::TimeZone;

  struct DetailSource {
    video: Option<VideoResource>,
    channel: Result<Option<ChannelResource>, ClientError>,
  }

  #[async_trait]
  impl VideoSource for DetailSource {
    async fn chart(&self, _: &str, _: &str, _: u32) -> Result<RawPage<VideoResource>, ClientError> {
      unreachable!()
    }

    async fn search(&self, _: &str, _: &str, _: u32) -> Result<RawPage<SearchResource>, ClientError> {
      unreachable!()
    }

    async fn videos(&self, _ids: &[String]) -> Result<Vec<VideoResource>, ClientError> {
      Ok(self.video.iter().cloned().collect())
    }

    async fn channel(&self, _id: &str) -> Result<Option<ChannelResource>, ClientError> {
      self.channel.clone()
    }
  }

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap()
  }

  #[test]
  fn description_links_and_lines() {
    let lines = render_description(Some("Watch: https://example.com/a?b=1 now\nsecond line"));
    assert_eq!(
      lines,
      vec![
        vec![Text("Watch: ".into()), Link("https://example.com/a?b=1".into()), Text(" now".into())],
        vec![Text("second line".into())],
      ]
    );
  }

  #[test]
  fn description_multiple_links_and_blank_lines() {
    let lines = render_description(Some("http://a.io https://b.io\n\nend"));
    assert_eq!(lines[0], vec![Link("http://a.io".into()), Text(" ".into()), Link("https://b.io".into())]);
    assert_eq!(lines[1], vec![Text(String::new())]);
    assert_eq!(lines[2], vec![Text("end".into())]);
  }

  #[test]
  fn description_missing() {
    assert_eq!(render_description(None), vec![vec![Text("No description available".into())]]);
    assert_eq!(render_description(Some("")), vec![vec![Text("No description available".into())]]);
  }

  #[tokio::test]
  async fn open_populates_fields() {
    let channel = ChannelResource {
      snippet: None,
      statistics: Some(ChannelStatistics { subscriber_count: Some("2500000".into()) }),
    };
    let source = DetailSource { video: Some(video("v1", "A Video")), channel: Ok(Some(channel)) };
    let view = open(&source, "v1", now()).await.unwrap();
    assert_eq!(view.title, "A Video");
    assert_eq!(view.views, "1.5K views");
    assert_eq!(view.likes, "20 likes");
    assert_eq!(view.date, "2 days ago");
    assert_eq!(view.channel_title, "channel");
    assert_eq!(view.subscribers, "2.5M subscribers");
    assert_eq!(view.avatar, ChannelAvatar::Initial('C'));
    assert_eq!(view.share_url(), "https://youtu.be/v1");
  }

  #[tokio::test]
  async fn channel_failure_degrades_subscribers_only() {
    let source = DetailSource {
      video: Some(video("v1", "A Video")),
      channel: Err(ClientError::FetchFailed("quota".into())),
    };
    let view = open(&source, "v1", now()).await.unwrap();
    assert_eq!(view.title, "A Video");
    assert_eq!(view.views, "1.5K views");
    assert_eq!(view.date, "2 days ago");
    assert_eq!(view.likes, "20 likes");
    assert_eq!(view.subscribers, "Subscribers not available");
  }

  #[tokio::test]
  async fn missing_video_is_not_found() {
    let source = DetailSource { video: None, channel: Ok(None) };
    assert_eq!(open(&source, "nope", now()).await.unwrap_err(), ClientError::NotFound);
  }
}
