use crate::error::{PipelineError, Result};
use crate::youtube::model::VideoCategoryListResponse;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

/// Final row shape, one per extracted record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRow {
    pub video_id: String,
    pub trending_at: String,
    pub title: Option<String>,
    pub published_at: Option<String>,
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,
    pub description: Option<String>,
    /// Tags joined with `", "`
    pub tags: Option<String>,
    pub default_audio_language: Option<String>,
    pub caption: Option<bool>,
    pub view_count: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub duration_sec: Option<i64>,
    pub category: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Category id to display name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryLookup {
    names: HashMap<String, String>,
}

impl CategoryLookup {
    pub fn new(names: HashMap<String, String>) -> Self {
        CategoryLookup { names }
    }

    /// Reads a flat `{"10": "Music", ...}` JSON object.
    pub fn from_file(path: &Path) -> Result<Self> {
        let body = fs::read(path).map_err(|e| {
            PipelineError::Config(format!("failed to read categories {}: {e}", path.display()))
        })?;
        let names: HashMap<String, String> = serde_json::from_slice(&body).map_err(|e| {
            PipelineError::Config(format!("failed to parse categories {}: {e}", path.display()))
        })?;
        Ok(CategoryLookup { names })
    }

    /// Builds the lookup from a `videoCategories.list` response. Entries without a title are skipped.
    pub fn from_response(response: VideoCategoryListResponse) -> Self {
        let names = response
            .items
            .into_iter()
            .filter_map(|category| {
                let title = category.snippet?.title?;
                Some((category.id, title))
            })
            .collect();
        CategoryLookup { names }
    }

    pub fn get(&self, category_id: &str) -> Option<&str> {
        self.names.get(category_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
