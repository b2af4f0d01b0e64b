use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::credential::Credential;
use crate::error::ClientError;

// --- Raw API shapes ---

/// `items[]` entry of `videos.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResource {
  pub id: String,
  pub snippet: Option<VideoSnippet>,
  pub statistics: Option<VideoStatistics>,
  pub content_details: Option<ContentDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
  pub title: Option<String>,
  pub description: Option<String>,
  pub channel_id: Option<String>,
  pub channel_title: Option<String>,
  pub published_at: Option<String>,
  #[serde(default)]
  pub thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Thumbnail {
  pub url: String,
}

/// Counts arrive as decimal strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
  pub view_count: Option<String>,
  pub like_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentDetails {
  pub duration: Option<String>,
}

/// `items[]` entry of `search.list`: an id and a thin snippet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResource {
  pub id: SearchId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchId {
  pub video_id: Option<String>,
}

/// `items[]` entry of `channels.list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelResource {
  pub snippet: Option<ChannelSnippet>,
  pub statistics: Option<ChannelStatistics>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelSnippet {
  #[serde(default)]
  pub thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
  pub subscriber_count: Option<String>,
}

/// Common list envelope. A missing `items` means zero results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
  items: Option<Vec<T>>,
  next_page_token: Option<String>,
  error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  message: Option<String>,
}

/// One page of a list call, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawPage<T> {
  pub items: Vec<T>,
  pub next_page_token: String,
}

/// Parse a list response body, turning an `error` payload into a fetch failure.
fn parse_list<T: DeserializeOwned>(status: reqwest::StatusCode, body: &str) -> Result<RawPage<T>, ClientError> {
  let parsed: ListResponse<T> = match serde_json::from_str(body) {
    Ok(parsed) => parsed,
    Err(e) if status.is_success() => return Err(ClientError::fetch(format!("Malformed API response: {e}"))),
    Err(_) => return Err(ClientError::fetch(format!("HTTP {status}"))),
  };
  if let Some(err) = parsed.error {
    let message = err.message.unwrap_or_else(|| format!("HTTP {status}"));
    return Err(ClientError::FetchFailed(message));
  }
  if !status.is_success() {
    return Err(ClientError::fetch(format!("HTTP {status}")));
  }
  Ok(RawPage { items: parsed.items.unwrap_or_default(), next_page_token: parsed.next_page_token.unwrap_or_default() })
}

// --- Source seam ---

/// The remote listing/search/details/channel API.
#[async_trait]
pub trait VideoSource: Send + Sync {
  /// Curated chart listing, fully enriched.
  async fn chart(&self, region: &str, cursor: &str, limit: u32) -> Result<RawPage<VideoResource>, ClientError>;
  /// Free-text video search; stubs only.
  async fn search(&self, query: &str, cursor: &str, limit: u32) -> Result<RawPage<SearchResource>, ClientError>;
  /// Batched details lookup by id.
  async fn videos(&self, ids: &[String]) -> Result<Vec<VideoResource>, ClientError>;
  /// Channel snippet and statistics.
  async fn channel(&self, id: &str) -> Result<Option<ChannelResource>, ClientError>;
}

const VIDEO_PARTS: &str = "snippet,statistics,contentDetails";

/// YouTube Data API v3 over HTTP.
pub struct YoutubeApi {
  client: Client,
  base_url: String,
  credential: Credential,
}

impl YoutubeApi {
  pub fn new(client: Client, credential: Credential) -> Self {
    Self::with_base_url(client, credential, constants().api_base_url.clone())
  }

  pub fn with_base_url(client: Client, credential: Credential, base_url: String) -> Self {
    Self { client, base_url: base_url.trim_end_matches('/').to_string(), credential }
  }

  pub fn http_client() -> anyhow::Result<Client> {
    use anyhow::Context;
    Client::builder()
      .timeout(Duration::from_secs(constants().request_timeout_secs))
      .build()
      .context("Failed to build HTTP client")
  }

  async fn get_list<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    params: &[(&str, &str)],
  ) -> Result<RawPage<T>, ClientError> {
    let url = format!("{}/{}", self.base_url, endpoint);
    debug!(endpoint, ?params, "api request");
    let response = self
      .client
      .get(&url)
      .query(params)
      .query(&[("key", self.credential.as_str())])
      .send()
      .await
      .map_err(|e| ClientError::fetch(format!("Network error: {e}")))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| ClientError::fetch(format!("Network error: {e}")))?;
    let page = parse_list(status, &body);
    if let Err(ref e) = page {
      warn!(endpoint, %status, err = %e, "api request failed");
    }
    page
  }
}

#[async_trait]
impl VideoSource for YoutubeApi {
  async fn chart(&self, region: &str, cursor: &str, limit: u32) -> Result<RawPage<VideoResource>, ClientError> {
    let limit = limit.to_string();
    let mut params =
      vec![("part", VIDEO_PARTS), ("chart", "mostPopular"), ("regionCode", region), ("maxResults", limit.as_str())];
    if !cursor.is_empty() {
      params.push(("pageToken", cursor));
    }
    self.get_list("videos", &params).await
  }

  async fn search(&self, query: &str, cursor: &str, limit: u32) -> Result<RawPage<SearchResource>, ClientError> {
    let limit = limit.to_string();
    let mut params = vec![("part", "snippet"), ("type", "video"), ("q", query), ("maxResults", limit.as_str())];
    if !cursor.is_empty() {
      params.push(("pageToken", cursor));
    }
    self.get_list("search", &params).await
  }

  async fn videos(&self, ids: &[String]) -> Result<Vec<VideoResource>, ClientError> {
    let joined = ids.join(",");
    let page = self.get_list("videos", &[("part", VIDEO_PARTS), ("id", joined.as_str())]).await?;
    Ok(page.items)
  }

  async fn channel(&self, id: &str) -> Result<Option<ChannelResource>, ClientError> {
    let page = self.get_list("channels", &[("part", "statistics,snippet"), ("id", id)]).await?;
    Ok(page.items.into_iter().next())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::StatusCode;

  #[test]
  fn parse_chart_page() {
    let body = r#"{
      "nextPageToken": "CAwQAA",
      "items": [{
        "id": "abc",
        "snippet": {"title": "T", "channelTitle": "Chan", "publishedAt": "2024-01-01T00:00:00Z",
                    "thumbnails": {"medium": {"url": "https://i/m.jpg"}}},
        "statistics": {"viewCount": "1234", "likeCount": "5"},
        "contentDetails": {"duration": "PT3M2S"}
      }]
    }"#;
    let page: RawPage<VideoResource> = parse_list(StatusCode::OK, body).unwrap();
    assert_eq!(page.next_page_token, "CAwQAA");
    assert_eq!(page.items.len(), 1);
    let item = &page.items[0];
    assert_eq!(item.id, "abc");
    assert_eq!(item.statistics.as_ref().unwrap().view_count.as_deref(), Some("1234"));
    assert_eq!(item.content_details.as_ref().unwrap().duration.as_deref(), Some("PT3M2S"));
    assert_eq!(item.snippet.as_ref().unwrap().thumbnails["medium"].url, "https://i/m.jpg");
  }

  #[test]
  fn missing_items_is_empty_not_error() {
    let page: RawPage<SearchResource> = parse_list(StatusCode::OK, r#"{"kind": "youtube#searchListResponse"}"#).unwrap();
    assert!(page.items.is_empty());
    assert!(page.next_page_token.is_empty());
  }

  #[test]
  fn error_payload_is_fetch_failure() {
    let body = r#"{"error": {"code": 403, "message": "The request cannot be completed because you have exceeded your quota."}}"#;
    let err = parse_list::<VideoResource>(StatusCode::FORBIDDEN, body).unwrap_err();
    assert_eq!(
      err,
      ClientError::FetchFailed("The request cannot be completed because you have exceeded your quota.".into())
    );
  }

  #[test]
  fn error_payload_on_success_status_is_still_failure() {
    let err = parse_list::<VideoResource>(StatusCode::OK, r#"{"error": {"message": "bad key"}}"#).unwrap_err();
    assert_eq!(err, ClientError::FetchFailed("bad key".into()));
  }

  #[test]
  fn non_json_failure_reports_status() {
    let err = parse_list::<VideoResource>(StatusCode::BAD_GATEWAY, "<html>").unwrap_err();
    assert!(matches!(err, ClientError::FetchFailed(ref m) if m.contains("502")));
  }

  #[test]
  fn search_stub_without_video_id() {
    let body = r#"{"items": [{"id": {"kind": "youtube#channel", "channelId": "UC1"}}, {"id": {"videoId": "v1"}}]}"#;
    let page: RawPage<SearchResource> = parse_list(StatusCode::OK, body).unwrap();
    assert_eq!(page.items[0].id.video_id, None);
    assert_eq!(page.items[1].id.video_id.as_deref(), Some("v1"));
  }
}
