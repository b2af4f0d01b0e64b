//! Paginated listing fetches and normalization into [`ListItem`].
//!
//! The chart endpoint returns enriched videos directly. Category and search
//! queries return id stubs that need a second, batched details lookup. Both
//! shapes are resolved here so nothing downstream sees the difference.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::constants::constants;
use crate::error::ClientError;
use crate::youtube::{SearchResource, VideoResource, VideoSnippet, VideoSource};

/// Category tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
  Trending,
  Music,
  Gaming,
  News,
  Sports,
  Learning,
}

impl Category {
  pub const ALL: [Category; 6] =
    [Category::Trending, Category::Music, Category::Gaming, Category::News, Category::Sports, Category::Learning];

  pub fn label(self) -> &'static str {
    match self {
      Category::Trending => "Trending",
      Category::Music => "Music",
      Category::Gaming => "Gaming",
      Category::News => "News",
      Category::Sports => "Sports",
      Category::Learning => "Learning",
    }
  }

  /// Search terms for query-mode categories; `None` for the chart.
  pub fn search_terms(self) -> Option<&'static str> {
    match self {
      Category::Trending => None,
      Category::Music => Some("music"),
      Category::Gaming => Some("gaming"),
      Category::News => Some("news"),
      Category::Sports => Some("sports"),
      Category::Learning => Some("education"),
    }
  }

  pub fn next(self) -> Self {
    let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
    Self::ALL[(idx + 1) % Self::ALL.len()]
  }

  pub fn prev(self) -> Self {
    let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
    Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
  }
}

/// What a listing fetch is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingQuery {
  Category(Category),
  Search(String),
}

/// Normalized video summary shown in the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
  pub id: String,
  pub title: String,
  pub channel_title: Option<String>,
  pub channel_id: Option<String>,
  pub thumbnail_url: String,
  pub view_count: Option<u64>,
  pub published_at: Option<DateTime<Utc>>,
  pub duration: Option<String>,
}

/// One normalized page. An empty `next_cursor` means no more pages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
  pub items: Vec<ListItem>,
  pub next_cursor: String,
}

/// The two raw response shapes a listing call can produce.
#[derive(Debug)]
pub enum RawListing {
  Chart { videos: Vec<VideoResource>, next_cursor: String },
  Query { stubs: Vec<SearchResource>, next_cursor: String },
}

pub(crate) fn parse_count(raw: Option<&str>) -> Option<u64> {
  raw.and_then(|s| s.trim().parse().ok())
}

pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
  raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|d| d.with_timezone(&Utc))
}

/// Preferred thumbnail: medium, then default, then the static per-video image.
pub(crate) fn pick_thumbnail(id: &str, snippet: &VideoSnippet) -> String {
  ["medium", "default"]
    .iter()
    .find_map(|size| snippet.thumbnails.get(*size))
    .map(|t| t.url.clone())
    .unwrap_or_else(|| format!("{}{}/mqdefault.jpg", constants().thumbnail_base_url, id))
}

impl ListItem {
  /// Build from a details resource. Items without an id or title are dropped.
  pub fn from_resource(video: &VideoResource) -> Option<Self> {
    if video.id.is_empty() {
      return None;
    }
    let snippet = video.snippet.as_ref()?;
    let title = snippet.title.as_deref().filter(|t| !t.is_empty())?.to_string();
    let stats = video.statistics.as_ref();
    Some(Self {
      id: video.id.clone(),
      title,
      channel_title: snippet.channel_title.clone().filter(|c| !c.is_empty()),
      channel_id: snippet.channel_id.clone(),
      thumbnail_url: pick_thumbnail(&video.id, snippet),
      view_count: parse_count(stats.and_then(|s| s.view_count.as_deref())),
      published_at: parse_timestamp(snippet.published_at.as_deref()),
      duration: video.content_details.as_ref().and_then(|c| c.duration.clone()),
    })
  }
}

/// Reorder `details` to follow `order`. Ids with no details entry are skipped.
pub fn join_by_id(order: &[String], details: Vec<VideoResource>) -> Vec<VideoResource> {
  let mut by_id: std::collections::HashMap<String, VideoResource> =
    details.into_iter().map(|v| (v.id.clone(), v)).collect();
  order.iter().filter_map(|id| by_id.remove(id)).collect()
}

/// Run the first request of a listing.
async fn fetch_raw(
  source: &dyn VideoSource,
  query: &ListingQuery,
  cursor: &str,
  region: &str,
) -> Result<RawListing, ClientError> {
  match query {
    ListingQuery::Category(category) => match category.search_terms() {
      None => {
        let page = source.chart(region, cursor, constants().page_size).await?;
        Ok(RawListing::Chart { videos: page.items, next_cursor: page.next_page_token })
      }
      Some(terms) => {
        let page = source.search(terms, cursor, constants().page_size).await?;
        Ok(RawListing::Query { stubs: page.items, next_cursor: page.next_page_token })
      }
    },
    ListingQuery::Search(text) => {
      let page = source.search(text, cursor, constants().search_page_size).await?;
      Ok(RawListing::Query { stubs: page.items, next_cursor: page.next_page_token })
    }
  }
}

/// Resolve either raw shape into a normalized page.
async fn resolve(source: &dyn VideoSource, raw: RawListing) -> Result<Page, ClientError> {
  let (videos, next_cursor) = match raw {
    RawListing::Chart { videos, next_cursor } => (videos, next_cursor),
    RawListing::Query { stubs, next_cursor } => {
      let ids: Vec<String> = stubs.into_iter().filter_map(|s| s.id.video_id).collect();
      if ids.is_empty() {
        return Ok(Page { items: Vec::new(), next_cursor });
      }
      debug!(count = ids.len(), "details lookup");
      let details = source.videos(&ids).await?;
      (join_by_id(&ids, details), next_cursor)
    }
  };
  let items = videos.iter().filter_map(ListItem::from_resource).collect();
  Ok(Page { items, next_cursor })
}

/// Fetch one page of `query` starting at `cursor` (empty for the first page).
pub async fn fetch_page(
  source: &dyn VideoSource,
  query: &ListingQuery,
  cursor: &str,
  region: &str,
) -> Result<Page, ClientError> {
  info!(?query, cursor, "fetching listing page");
  let raw = fetch_raw(source, query, cursor, region).await?;
  let page = resolve(source, raw).await?;
  info!(items = page.items.len(), has_more = !page.next_cursor.is_empty(), "listing page ready");
  Ok(page)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::youtube::{ChannelResource, ContentDetails, RawPage, SearchId, Thumbnail, VideoStatistics};
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::Mutex;

  pub(crate) fn video(id: &str, title: &str) -> VideoResource {
    VideoResource {
      id: id.to_string(),
      snippet: Some(VideoSnippet {
        title: Some(title.to_string()),
        description: Some(format!("about {title}")),
        channel_id: Some(format!("UC{id}")),
        channel_title: Some("channel".to_string()),
        published_at: Some("2024-01-01T00:00:00Z".to_string()),
        thumbnails: HashMap::new(),
      }),
      statistics: Some(VideoStatistics { view_count: Some("1500".into()), like_count: Some("20".into()) }),
      content_details: Some(ContentDetails { duration: Some("PT4M5S".into()) }),
    }
  }

  pub(crate) fn stub(id: &str) -> SearchResource {
    SearchResource { id: SearchId { video_id: Some(id.to_string()) } }
  }

  /// Scripted source recording every call it receives.
  #[derive(Default)]
  pub(crate) struct ScriptedSource {
    pub chart: Mutex<Vec<Result<RawPage<VideoResource>, ClientError>>>,
    pub search: Mutex<Vec<Result<RawPage<SearchResource>, ClientError>>>,
    pub details: Mutex<Vec<VideoResource>>,
    pub calls: Mutex<Vec<String>>,
  }

  #[async_trait]
  impl VideoSource for ScriptedSource {
    async fn chart(&self, region: &str, cursor: &str, limit: u32) -> Result<RawPage<VideoResource>, ClientError> {
      self.calls.lock().unwrap().push(format!("chart:{region}:{cursor}:{limit}"));
      self.chart.lock().unwrap().remove(0)
    }

    async fn search(&self, query: &str, cursor: &str, limit: u32) -> Result<RawPage<SearchResource>, ClientError> {
      self.calls.lock().unwrap().push(format!("search:{query}:{cursor}:{limit}"));
      self.search.lock().unwrap().remove(0)
    }

    async fn videos(&self, ids: &[String]) -> Result<Vec<VideoResource>, ClientError> {
      self.calls.lock().unwrap().push(format!("videos:{}", ids.join(",")));
      Ok(self.details.lock().unwrap().iter().filter(|v| ids.contains(&v.id)).cloned().collect())
    }

    async fn channel(&self, _id: &str) -> Result<Option<ChannelResource>, ClientError> {
      Ok(None)
    }
  }

  #[test]
  fn join_preserves_first_response_order() {
    let order = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let details = vec![video("c", "C"), video("a", "A"), video("b", "B")];
    let joined: Vec<String> = join_by_id(&order, details).into_iter().map(|v| v.id).collect();
    assert_eq!(joined, ["a", "b", "c"]);
  }

  #[test]
  fn join_skips_ids_without_details() {
    let order = vec!["a".to_string(), "gone".to_string(), "c".to_string()];
    let joined: Vec<String> =
      join_by_id(&order, vec![video("c", "C"), video("a", "A")]).into_iter().map(|v| v.id).collect();
    assert_eq!(joined, ["a", "c"]);
  }

  #[test]
  fn list_item_requires_id_and_title() {
    assert!(ListItem::from_resource(&video("", "T")).is_none());
    assert!(ListItem::from_resource(&video("x", "")).is_none());
    let mut no_snippet = video("x", "T");
    no_snippet.snippet = None;
    assert!(ListItem::from_resource(&no_snippet).is_none());
  }

  #[test]
  fn list_item_fields() {
    let item = ListItem::from_resource(&video("abc", "Title")).unwrap();
    assert_eq!(item.view_count, Some(1500));
    assert_eq!(item.duration.as_deref(), Some("PT4M5S"));
    assert_eq!(item.published_at.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    assert_eq!(item.thumbnail_url, "https://img.youtube.com/vi/abc/mqdefault.jpg");
  }

  #[test]
  fn thumbnail_preference() {
    let mut v = video("abc", "Title");
    let snippet = v.snippet.as_mut().unwrap();
    snippet.thumbnails.insert("default".into(), Thumbnail { url: "d.jpg".into() });
    assert_eq!(ListItem::from_resource(&v).unwrap().thumbnail_url, "d.jpg");
    v.snippet.as_mut().unwrap().thumbnails.insert("medium".into(), Thumbnail { url: "m.jpg".into() });
    assert_eq!(ListItem::from_resource(&v).unwrap().thumbnail_url, "m.jpg");
  }

  #[test]
  fn category_cycle() {
    assert_eq!(Category::Trending.next(), Category::Music);
    assert_eq!(Category::Learning.next(), Category::Trending);
    assert_eq!(Category::Trending.prev(), Category::Learning);
    assert_eq!(Category::Learning.search_terms(), Some("education"));
  }

  #[tokio::test]
  async fn chart_mode_single_call() {
    let source = ScriptedSource::default();
    source
      .chart
      .lock()
      .unwrap()
      .push(Ok(RawPage { items: vec![video("a", "A"), video("b", "B")], next_page_token: "next".into() }));

    let page = fetch_page(&source, &ListingQuery::Category(Category::Trending), "", "US").await.unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.next_cursor, "next");
    assert_eq!(*source.calls.lock().unwrap(), ["chart:US::12"]);
  }

  #[tokio::test]
  async fn query_mode_joins_details_in_stub_order() {
    let source = ScriptedSource::default();
    source
      .search
      .lock()
      .unwrap()
      .push(Ok(RawPage { items: vec![stub("a"), stub("b"), stub("c")], next_page_token: "tok2".into() }));
    *source.details.lock().unwrap() = vec![video("b", "B"), video("c", "C"), video("a", "A")];

    let page = fetch_page(&source, &ListingQuery::Category(Category::Music), "tok1", "US").await.unwrap();
    let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(page.next_cursor, "tok2");
    assert_eq!(*source.calls.lock().unwrap(), ["search:music:tok1:12", "videos:a,b,c"]);
  }

  #[tokio::test]
  async fn free_text_search_uses_larger_page() {
    let source = ScriptedSource::default();
    source.search.lock().unwrap().push(Ok(RawPage { items: vec![stub("z")], next_page_token: String::new() }));
    *source.details.lock().unwrap() = vec![video("z", "Z")];

    let page = fetch_page(&source, &ListingQuery::Search("rust lang".into()), "", "US").await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(source.calls.lock().unwrap()[0], "search:rust lang::20");
  }

  #[tokio::test]
  async fn empty_search_skips_details_lookup() {
    let source = ScriptedSource::default();
    source.search.lock().unwrap().push(Ok(RawPage::default()));

    let page = fetch_page(&source, &ListingQuery::Search("nothing".into()), "", "US").await.unwrap();
    assert!(page.items.is_empty());
    assert_eq!(source.calls.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn api_error_surfaces_as_fetch_failure() {
    let source = ScriptedSource::default();
    source.chart.lock().unwrap().push(Err(ClientError::FetchFailed("API key not valid".into())));

    let err = fetch_page(&source, &ListingQuery::Category(Category::Trending), "", "US").await.unwrap_err();
    assert_eq!(err, ClientError::FetchFailed("API key not valid".into()));
  }
}
