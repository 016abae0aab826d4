use crate::error::{PipelineError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};
use tracing::debug;
use url::Url;

lazy_static! {
    static ref TABLE_NAME_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

pub const DEFAULT_YOUTUBE_API_BASE_URL: &str = "https://www.googleapis.com";
pub const DEFAULT_BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_SQLITE_DATABASE_URL: &str = "sqlite://trending.db";

/// Runtime configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub youtube_api_key: Option<String>,
    pub youtube_api_base_url: String,
    pub categories_path: PathBuf,
    pub artifact_dir: Option<PathBuf>,
    pub sqlite_database_url: String,
    pub bigquery: BigQueryConfig,
}

#[derive(Debug, Clone)]
pub struct BigQueryConfig {
    pub project: Option<String>,
    pub dataset: String,
    pub location: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub access_token: Option<String>,
    pub base_url: String,
    pub poll_interval: Duration,
}

impl Default for BigQueryConfig {
    fn default() -> Self {
        BigQueryConfig {
            project: None,
            dataset: "youtube".to_string(),
            location: None,
            credentials_path: None,
            access_token: None,
            base_url: DEFAULT_BIGQUERY_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let poll_interval = match optional_var("BIGQUERY_POLL_INTERVAL_MS") {
            Some(ms) => {
                let ms = ms.parse::<u64>().map_err(|_| {
                    PipelineError::Config(format!("BIGQUERY_POLL_INTERVAL_MS is not a number: {ms}"))
                })?;
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(1000),
        };

        Ok(Config {
            youtube_api_key: optional_var("YOUTUBE_API_KEY"),
            youtube_api_base_url: optional_var("YOUTUBE_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_YOUTUBE_API_BASE_URL.to_string()),
            categories_path: optional_var("CATEGORIES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("categories.json")),
            artifact_dir: optional_var("ARTIFACT_DIR").map(PathBuf::from),
            sqlite_database_url: optional_var("SQLITE_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_SQLITE_DATABASE_URL.to_string()),
            bigquery: BigQueryConfig {
                project: optional_var("BIGQUERY_PROJECT"),
                dataset: optional_var("BIGQUERY_DATASET").unwrap_or_else(|| "youtube".to_string()),
                location: optional_var("BIGQUERY_LOCATION"),
                credentials_path: optional_var("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
                access_token: optional_var("BIGQUERY_ACCESS_TOKEN"),
                base_url: optional_var("BIGQUERY_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BIGQUERY_BASE_URL.to_string()),
                poll_interval,
            },
        })
    }

    pub fn youtube_api_key(&self) -> Result<&str> {
        self.youtube_api_key
            .as_deref()
            .ok_or_else(|| PipelineError::Config("YOUTUBE_API_KEY must be set".to_string()))
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

pub fn validate_table_name(table_name: &str) -> Result<()> {
    if TABLE_NAME_RE.is_match(table_name) {
        Ok(())
    } else {
        Err(PipelineError::InvalidInput(format!(
            "table name must be a plain identifier, got {table_name:?}"
        )))
    }
}

/// Parses an API base url so that relative paths join beneath it, prefix included.
pub fn parse_base_url(raw: &str, what: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| PipelineError::Config(format!("invalid {what} base url {raw:?}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

/// Writes a stage artifact as a JSON array.
pub fn write_artifact<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    let body = serde_json::to_vec(items)
        .map_err(|e| PipelineError::Artifact(format!("failed to serialize {}: {e}", path.display())))?;
    fs::write(path, body)
        .map_err(|e| PipelineError::Artifact(format!("failed to write {}: {e}", path.display())))?;
    debug!(path = %path.display(), count = items.len(), "Wrote artifact");
    Ok(())
}

/// Reads a whole stage artifact written by [`write_artifact`].
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let body = fs::read(path)
        .map_err(|e| PipelineError::Artifact(format!("failed to read {}: {e}", path.display())))?;
    let items: Vec<T> = serde_json::from_slice(&body)
        .map_err(|e| PipelineError::Artifact(format!("failed to parse {}: {e}", path.display())))?;
    debug!(path = %path.display(), count = items.len(), "Read artifact");
    Ok(items)
}
