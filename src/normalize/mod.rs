//! Turns intermediate records into typed rows.

pub mod model;
mod utils;

use crate::error::{PipelineError, Result};
use crate::extract::model::IntermediateRecord;
use crate::youtube::YouTubeClient;
use model::{CategoryLookup, NormalizedRow};
use tracing::{debug, info};

/// Normalizes every record in order. The first malformed field aborts the whole batch.
pub fn normalize(records: &[IntermediateRecord], categories: &CategoryLookup) -> Result<Vec<NormalizedRow>> {
    let rows = records
        .iter()
        .map(|record| normalize_record(record, categories))
        .collect::<Result<Vec<_>>>()?;

    info!(count = rows.len(), categories = categories.len(), "Normalization finished");
    Ok(rows)
}

pub fn normalize_record(record: &IntermediateRecord, categories: &CategoryLookup) -> Result<NormalizedRow> {
    let malformed = |field: &'static str, value: &str| PipelineError::MalformedField {
        video_id: record.video_id.clone(),
        field,
        value: value.to_string(),
    };

    let duration_sec = match record.duration.as_deref() {
        Some(raw) => Some(utils::parse_duration_secs(raw).ok_or_else(|| malformed("duration", raw))?),
        None => None,
    };

    let published_at = match record.published_at.as_deref() {
        Some(raw) => Some(utils::parse_timestamp(raw).ok_or_else(|| malformed("publishedAt", raw))?),
        None => None,
    };

    let count = |field: &'static str, raw: Option<&str>| -> Result<Option<i64>> {
        match raw {
            Some(raw) => utils::parse_count(raw).map(Some).ok_or_else(|| malformed(field, raw)),
            None => Ok(None),
        }
    };

    let category = record
        .category_id
        .as_deref()
        .and_then(|id| categories.get(id))
        .map(str::to_string);
    if category.is_none() && record.category_id.is_some() {
        debug!(video_id = %record.video_id, category_id = ?record.category_id, "Unknown category");
    }

    Ok(NormalizedRow {
        video_id: record.video_id.clone(),
        trending_at: record.trending_at.clone(),
        title: record.title.clone(),
        published_at,
        channel_id: record.channel_id.clone(),
        channel_title: record.channel_title.clone(),
        description: record.description.clone(),
        tags: record.tags.as_deref().map(utils::join_tags),
        default_audio_language: record.default_audio_language.clone(),
        caption: utils::parse_caption(record.caption.as_deref()),
        view_count: count("viewCount", record.view_count.as_deref())?,
        like_count: count("likeCount", record.like_count.as_deref())?,
        comment_count: count("commentCount", record.comment_count.as_deref())?,
        duration_sec,
        category,
        thumbnail_url: record
            .thumbnails
            .as_ref()
            .and_then(utils::standard_thumbnail_url),
    })
}

/// Fetches the category names for a region from the catalog.
pub async fn categories_from_api(client: &YouTubeClient, region_code: &str) -> Result<CategoryLookup> {
    let response = client.list_video_categories(region_code).await?;
    let lookup = CategoryLookup::from_response(response);
    info!(region = %region_code, count = lookup.len(), "Loaded categories from catalog");
    Ok(lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn music() -> CategoryLookup {
        CategoryLookup::new(HashMap::from([("10".to_string(), "Music".to_string())]))
    }

    fn record() -> IntermediateRecord {
        IntermediateRecord {
            video_id: "abc".to_string(),
            trending_at: "2023-05-07T10:00:00Z".to_string(),
            title: Some("Title".to_string()),
            published_at: Some("2023-05-06T00:00:00Z".to_string()),
            channel_id: Some("UC1".to_string()),
            channel_title: Some("Channel".to_string()),
            description: Some("desc".to_string()),
            tags: Some(vec!["a".to_string(), "b".to_string()]),
            thumbnails: json!({"standard": {"url": "http://x"}}).as_object().cloned(),
            category_id: Some("10".to_string()),
            default_audio_language: Some("id".to_string()),
            duration: Some("PT4M13S".to_string()),
            caption: Some("true".to_string()),
            view_count: Some("100".to_string()),
            like_count: Some("7".to_string()),
            comment_count: Some("3".to_string()),
        }
    }

    #[test]
    fn full_record() {
        let row = normalize_record(&record(), &music()).unwrap();

        assert_eq!(row.video_id, "abc");
        assert_eq!(row.trending_at, "2023-05-07T10:00:00Z");
        assert_eq!(row.title.as_deref(), Some("Title"));
        assert_eq!(row.duration_sec, Some(253));
        assert_eq!(row.tags.as_deref(), Some("a, b"));
        assert_eq!(row.category.as_deref(), Some("Music"));
        assert_eq!(row.thumbnail_url.as_deref(), Some("http://x"));
        assert_eq!(row.view_count, Some(100));
        assert_eq!(row.like_count, Some(7));
        assert_eq!(row.comment_count, Some(3));
        assert_eq!(row.caption, Some(true));
        assert_eq!(row.default_audio_language.as_deref(), Some("id"));
    }

    #[test]
    fn absent_fields_stay_null() {
        let bare = IntermediateRecord {
            video_id: "abc".to_string(),
            trending_at: "t".to_string(),
            ..Default::default()
        };

        let row = normalize_record(&bare, &music()).unwrap();

        assert_eq!(row.duration_sec, None);
        assert_eq!(row.tags, None);
        assert_eq!(row.category, None);
        assert_eq!(row.thumbnail_url, None);
        assert_eq!(row.view_count, None);
        assert_eq!(row.caption, None);
    }

    #[test]
    fn lookup_miss_is_null() {
        let mut r = record();
        r.category_id = Some("999".to_string());
        assert_eq!(normalize_record(&r, &music()).unwrap().category, None);
    }

    #[test]
    fn unknown_caption_is_null() {
        let mut r = record();
        r.caption = Some("maybe".to_string());
        assert_eq!(normalize_record(&r, &music()).unwrap().caption, None);
    }

    #[test]
    fn empty_tags_are_not_null() {
        let mut r = record();
        r.tags = Some(vec![]);
        assert_eq!(normalize_record(&r, &music()).unwrap().tags.as_deref(), Some(""));
    }

    #[test]
    fn missing_standard_thumbnail_is_null() {
        let mut r = record();
        r.thumbnails = json!({"default": {"url": "http://d"}}).as_object().cloned();
        assert_eq!(normalize_record(&r, &music()).unwrap().thumbnail_url, None);
    }

    #[test]
    fn malformed_duration_is_rejected() {
        let mut r = record();
        r.duration = Some("four minutes".to_string());

        match normalize_record(&r, &music()).unwrap_err() {
            PipelineError::MalformedField { video_id, field, value } => {
                assert_eq!(video_id, "abc");
                assert_eq!(field, "duration");
                assert_eq!(value, "four minutes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_count_is_rejected() {
        let mut r = record();
        r.like_count = Some("1.2K".to_string());

        let err = normalize_record(&r, &music()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedField { field: "likeCount", .. }));
    }

    #[test]
    fn malformed_publish_time_is_rejected() {
        let mut r = record();
        r.published_at = Some("last tuesday".to_string());

        let err = normalize_record(&r, &music()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MalformedField { field: "publishedAt", ref value, .. } if value == "last tuesday"
        ));
    }

    #[test]
    fn one_bad_record_aborts_the_batch() {
        let mut bad = record();
        bad.view_count = Some("n/a".to_string());

        let err = normalize(&[record(), bad, record()], &music()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedField { field: "viewCount", .. }));
    }

    #[test]
    fn batch_preserves_order() {
        let mut second = record();
        second.video_id = "def".to_string();

        let rows = normalize(&[record(), second], &music()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].video_id, "abc");
        assert_eq!(rows[1].video_id, "def");
    }
}
