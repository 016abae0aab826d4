use super::model::{VideoCategoryListResponse, VideoListResponse};
use crate::error::{PipelineError, Result};
use crate::utils::parse_base_url;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

const VIDEO_PARTS: &str = "snippet,contentDetails,statistics";

/// Thin client over the YouTube Data API v3 endpoints the pipeline reads.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self> {
        let base_url = parse_base_url(base_url, "YouTube API")?;
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::Config(format!("failed to build http client: {e}")))?;

        Ok(YouTubeClient {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// `videos.list?chart=mostPopular` for one region, one page.
    pub async fn list_most_popular(
        &self,
        region_code: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse> {
        let page_size = page_size.to_string();
        let mut query = vec![
            ("part", VIDEO_PARTS),
            ("chart", "mostPopular"),
            ("regionCode", region_code),
            ("maxResults", page_size.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        self.get_json("youtube/v3/videos", &query).await
    }

    /// `videoCategories.list` for one region.
    pub async fn list_video_categories(&self, region_code: &str) -> Result<VideoCategoryListResponse> {
        self.get_json(
            "youtube/v3/videoCategories",
            &[("part", "snippet"), ("regionCode", region_code)],
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| PipelineError::Config(format!("invalid API path {path}: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().copied())
            .append_pair("key", &self.api_key);

        debug!(path = %path, query = ?query, "Calling catalog API");

        // reqwest errors carry the url, which carries the key
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::Upstream(format!("request to {path} failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(path = %path, status = %status, body = %body, "Catalog API returned an error");
            return Err(PipelineError::Upstream(format!("{path} returned {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::Upstream(format!("failed to decode {path} response: {}", e.without_url())))
    }
}
