use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One page of `videos.list` (chart=mostPopular).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<RawCatalogEntry>,
    /// Cursor for the next page, absent on the last page
    pub next_page_token: Option<String>,
}

/// A video as returned by the catalog. Every group and field may be missing.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCatalogEntry {
    pub id: String,
    pub snippet: Option<Snippet>,
    pub content_details: Option<ContentDetails>,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: Option<String>,
    pub published_at: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Thumbnail variants keyed by size name (`default`, `medium`, `standard`, ...)
    pub thumbnails: Option<Map<String, Value>>,
    pub category_id: Option<String>,
    pub default_audio_language: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    /// ISO-8601 duration, e.g. `PT4M13S`
    pub duration: Option<String>,
    /// `"true"` or `"false"`
    pub caption: Option<String>,
}

/// Counters are sent as decimal strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

impl RawCatalogEntry {
    pub fn snippet_field<T>(&self, get: impl FnOnce(&Snippet) -> Option<T>) -> Option<T> {
        self.snippet.as_ref().and_then(get)
    }

    pub fn content_field<T>(&self, get: impl FnOnce(&ContentDetails) -> Option<T>) -> Option<T> {
        self.content_details.as_ref().and_then(get)
    }

    pub fn statistics_field<T>(&self, get: impl FnOnce(&Statistics) -> Option<T>) -> Option<T> {
        self.statistics.as_ref().and_then(get)
    }
}

/// Response of `videoCategories.list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoCategoryListResponse {
    #[serde(default)]
    pub items: Vec<VideoCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoCategory {
    pub id: String,
    pub snippet: Option<VideoCategorySnippet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoCategorySnippet {
    pub title: Option<String>,
}
