//! Trending videos pipeline
//!
//! Pulls the most-popular chart of a region from the YouTube Data API,
//! flattens and types every video, and appends the rows to a SQLite or
//! BigQuery table.
//!
//! ```no_run
//! use trending::{load, pipeline, utils::Config, youtube};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = youtube::youtube_client(&config)?;
//!     let loader = load::sqlite_loader(&config).await?;
//!     let params = pipeline::RunParams {
//!         region_code: "ID".to_string(),
//!         max_results: 200,
//!         table_name: "trending_videos".to_string(),
//!     };
//!     let categories = pipeline::CategorySource::File(config.categories_path.clone());
//!     let dir = tempfile::tempdir()?;
//!     pipeline::run(&client, &loader, &categories, &params, dir.path()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod extract;
pub mod load;
pub mod normalize;
pub mod pipeline;
pub mod schedule;
pub mod utils;
pub mod youtube;
