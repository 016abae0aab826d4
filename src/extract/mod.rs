//! Pulls the most-popular chart page by page and flattens each entry.

pub mod model;

use crate::error::{PipelineError, Result};
use crate::youtube::{model::VideoListResponse, YouTubeClient};
use chrono::{DateTime, Utc};
use model::IntermediateRecord;
use tracing::{debug, info, warn};

/// Largest page the catalog serves.
pub const PAGE_SIZE: u32 = 50;

/// Source of most-popular listing pages.
#[allow(async_fn_in_trait)]
pub trait CatalogSource {
    async fn list_most_popular(
        &self,
        region_code: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse>;
}

impl CatalogSource for YouTubeClient {
    async fn list_most_popular(
        &self,
        region_code: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<VideoListResponse> {
        YouTubeClient::list_most_popular(self, region_code, page_size, page_token).await
    }
}

pub fn format_capture_time(capture_time: DateTime<Utc>) -> String {
    capture_time.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Another page is requested only while fewer than `max_results` records are
/// held and the catalog handed back a cursor.
fn should_continue(accumulated: usize, max_results: usize, cursor: Option<&str>) -> bool {
    accumulated < max_results && cursor.is_some()
}

/// Accumulates records until `max_results` is reached or the pages run out.
///
/// Whole pages are kept, so the result can exceed `max_results` by up to
/// `PAGE_SIZE - 1` records.
pub async fn fetch<S: CatalogSource>(
    source: &S,
    region_code: &str,
    max_results: usize,
    capture_time: DateTime<Utc>,
) -> Result<Vec<IntermediateRecord>> {
    if max_results == 0 {
        return Err(PipelineError::InvalidInput(
            "max_results must be greater than zero".to_string(),
        ));
    }

    let trending_at = format_capture_time(capture_time);
    let mut records: Vec<IntermediateRecord> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source
            .list_most_popular(region_code, PAGE_SIZE, cursor.as_deref())
            .await?;
        pages += 1;

        let received = page.items.len();
        records.extend(
            page.items
                .iter()
                .map(|entry| IntermediateRecord::from_entry(entry, &trending_at)),
        );
        debug!(page = pages, received, total = records.len(), next = ?page.next_page_token, "Fetched page");

        let next = page.next_page_token;
        if next.is_some() && received == 0 {
            warn!(page = pages, "Catalog returned an empty page with a cursor, stopping");
            break;
        }
        if next.is_some() && next == cursor {
            warn!(page = pages, "Catalog repeated the previous cursor, stopping");
            break;
        }

        cursor = next;
        if !should_continue(records.len(), max_results, cursor.as_deref()) {
            break;
        }
    }

    info!(region = %region_code, pages, count = records.len(), trending_at = %trending_at, "Extraction finished");
    Ok(records)
}
