//! Append-only writers for normalized rows.

mod bigquery;
mod sqlite;

pub use bigquery::{BigQueryLoader, TokenSource};
pub use sqlite::SqliteLoader;

use crate::error::Result;
use crate::normalize::model::NormalizedRow;
use crate::utils::Config;

/// Appends rows to a named table, creating it when missing.
///
/// Implementations never read, update or delete existing rows, and an empty
/// batch is a no-op returning zero.
#[allow(async_fn_in_trait)]
pub trait Loader {
    async fn load(&self, rows: &[NormalizedRow], table_name: &str) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// Local SQLite database
    Sqlite,
    /// Google BigQuery dataset
    Bigquery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Integer,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub required: bool,
}

const fn column(name: &'static str, kind: ColumnType, required: bool) -> Column {
    Column { name, kind, required }
}

/// Table schema, in [`NormalizedRow`] field order.
pub const ROW_COLUMNS: [Column; 16] = [
    column("videoId", ColumnType::Text, true),
    column("trendingAt", ColumnType::Timestamp, true),
    column("title", ColumnType::Text, false),
    column("publishedAt", ColumnType::Timestamp, false),
    column("channelId", ColumnType::Text, false),
    column("channelTitle", ColumnType::Text, false),
    column("description", ColumnType::Text, false),
    column("tags", ColumnType::Text, false),
    column("defaultAudioLanguage", ColumnType::Text, false),
    column("caption", ColumnType::Boolean, false),
    column("viewCount", ColumnType::Integer, false),
    column("likeCount", ColumnType::Integer, false),
    column("commentCount", ColumnType::Integer, false),
    column("durationSec", ColumnType::Integer, false),
    column("category", ColumnType::Text, false),
    column("thumbnailUrl", ColumnType::Text, false),
];

pub async fn sqlite_loader(config: &Config) -> Result<SqliteLoader> {
    SqliteLoader::connect(&config.sqlite_database_url).await
}

pub async fn bigquery_loader(config: &Config) -> Result<BigQueryLoader> {
    BigQueryLoader::from_config(&config.bigquery).await
}
