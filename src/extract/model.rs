use crate::youtube::model::RawCatalogEntry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Flat projection of one catalog entry, as written to the raw artifact.
///
/// Every field is serialized, with `null` standing in for anything the
/// catalog did not send.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediateRecord {
    pub video_id: String,
    /// Capture time shared by every record of one extraction
    pub trending_at: String,
    pub title: Option<String>,
    pub published_at: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub thumbnails: Option<Map<String, Value>>,
    pub category_id: Option<String>,
    pub default_audio_language: Option<String>,
    pub duration: Option<String>,
    pub caption: Option<String>,
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

impl IntermediateRecord {
    pub fn from_entry(entry: &RawCatalogEntry, trending_at: &str) -> Self {
        IntermediateRecord {
            video_id: entry.id.clone(),
            trending_at: trending_at.to_string(),
            title: entry.snippet_field(|s| s.title.clone()),
            published_at: entry.snippet_field(|s| s.published_at.clone()),
            channel_id: entry.snippet_field(|s| s.channel_id.clone()),
            channel_title: entry.snippet_field(|s| s.channel_title.clone()),
            description: entry.snippet_field(|s| s.description.clone()),
            tags: entry.snippet_field(|s| s.tags.clone()),
            thumbnails: entry.snippet_field(|s| s.thumbnails.clone()),
            category_id: entry.snippet_field(|s| s.category_id.clone()),
            default_audio_language: entry.snippet_field(|s| s.default_audio_language.clone()),
            duration: entry.content_field(|c| c.duration.clone()),
            caption: entry.content_field(|c| c.caption.clone()),
            view_count: entry.statistics_field(|s| s.view_count.clone()),
            like_count: entry.statistics_field(|s| s.like_count.clone()),
            comment_count: entry.statistics_field(|s| s.comment_count.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const KEYS: [&str; 16] = [
        "videoId",
        "trendingAt",
        "title",
        "publishedAt",
        "channelId",
        "channelTitle",
        "description",
        "tags",
        "thumbnails",
        "categoryId",
        "defaultAudioLanguage",
        "duration",
        "caption",
        "viewCount",
        "likeCount",
        "commentCount",
    ];

    #[test]
    fn bare_entry_keeps_every_key() {
        let entry: RawCatalogEntry = serde_json::from_value(json!({"id": "abc"})).unwrap();
        let record = IntermediateRecord::from_entry(&entry, "2023-05-07T10:00:00Z");

        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), KEYS.len());
        for key in KEYS {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(object["videoId"], "abc");
        assert_eq!(object["trendingAt"], "2023-05-07T10:00:00Z");
        assert_eq!(object["duration"], Value::Null);
    }

    #[test]
    fn projects_all_three_groups() {
        let entry: RawCatalogEntry = serde_json::from_value(json!({
            "id": "abc",
            "snippet": {
                "title": "t",
                "publishedAt": "2023-05-01T00:00:00Z",
                "channelId": "c",
                "channelTitle": "ct",
                "description": "d",
                "tags": ["x", "y"],
                "thumbnails": {"standard": {"url": "http://x", "width": 640}},
                "categoryId": "10",
                "defaultAudioLanguage": "id",
                "liveBroadcastContent": "none"
            },
            "contentDetails": {"duration": "PT1M", "caption": "false", "dimension": "2d"},
            "statistics": {"viewCount": "5", "likeCount": "4", "commentCount": "3", "favoriteCount": "0"}
        }))
        .unwrap();

        let record = IntermediateRecord::from_entry(&entry, "now");
        assert_eq!(record.tags, Some(vec!["x".to_string(), "y".to_string()]));
        assert_eq!(record.category_id.as_deref(), Some("10"));
        assert_eq!(record.duration.as_deref(), Some("PT1M"));
        assert_eq!(record.caption.as_deref(), Some("false"));
        assert_eq!(record.comment_count.as_deref(), Some("3"));
        assert!(record.thumbnails.unwrap().contains_key("standard"));
    }

    #[test]
    fn partially_missing_groups_yield_nulls() {
        let entry: RawCatalogEntry = serde_json::from_value(json!({
            "id": "abc",
            "snippet": {"title": "t"},
            "statistics": {"viewCount": "5"}
        }))
        .unwrap();

        let record = IntermediateRecord::from_entry(&entry, "now");
        assert_eq!(record.title.as_deref(), Some("t"));
        assert_eq!(record.tags, None);
        assert_eq!(record.duration, None);
        assert_eq!(record.like_count, None);
    }
}
