//! Runs the three stages in order, handing JSON artifacts from one to the next.

use crate::error::{Result, RunError, Stage};
use crate::extract::{self, model::IntermediateRecord, CatalogSource};
use crate::load::Loader;
use crate::normalize::{self, model::CategoryLookup, model::NormalizedRow};
use crate::utils::{read_artifact, write_artifact};
use crate::youtube::YouTubeClient;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RAW_ARTIFACT: &str = "raw_videos.json";
pub const PROCESSED_ARTIFACT: &str = "processed_videos.json";

/// Parameters of one scheduled run.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub region_code: String,
    pub max_results: usize,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub trending_at: String,
    pub extracted: usize,
    pub normalized: usize,
    pub loaded: u64,
}

/// Where the category names come from.
pub enum CategorySource {
    File(PathBuf),
    Catalog(YouTubeClient),
    Fixed(CategoryLookup),
}

impl CategorySource {
    pub async fn resolve(&self, region_code: &str) -> Result<CategoryLookup> {
        match self {
            CategorySource::File(path) => {
                let lookup = CategoryLookup::from_file(path)?;
                info!(path = %path.display(), count = lookup.len(), "Loaded categories from file");
                Ok(lookup)
            }
            CategorySource::Catalog(client) => normalize::categories_from_api(client, region_code).await,
            CategorySource::Fixed(lookup) => Ok(lookup.clone()),
        }
    }
}

pub async fn extract_stage<S: CatalogSource>(
    source: &S,
    region_code: &str,
    max_results: usize,
    capture_time: DateTime<Utc>,
    output: &Path,
) -> Result<usize> {
    let records = extract::fetch(source, region_code, max_results, capture_time).await?;
    write_artifact(output, &records)?;
    Ok(records.len())
}

pub fn normalize_stage(input: &Path, output: &Path, categories: &CategoryLookup) -> Result<usize> {
    let records: Vec<IntermediateRecord> = read_artifact(input)?;
    let rows = normalize::normalize(&records, categories)?;
    write_artifact(output, &rows)?;
    Ok(rows.len())
}

pub async fn load_stage<L: Loader>(loader: &L, input: &Path, table_name: &str) -> Result<u64> {
    let rows: Vec<NormalizedRow> = read_artifact(input)?;
    loader.load(&rows, table_name).await
}

/// One full run: extract, normalize, load. Artifacts land in `run_dir`.
pub async fn run<S: CatalogSource, L: Loader>(
    source: &S,
    loader: &L,
    categories: &CategorySource,
    params: &RunParams,
    run_dir: &Path,
) -> std::result::Result<RunSummary, RunError> {
    let capture_time = Utc::now();
    let raw_path = run_dir.join(RAW_ARTIFACT);
    let processed_path = run_dir.join(PROCESSED_ARTIFACT);

    info!(region = %params.region_code, max_results = params.max_results, table = %params.table_name, "Starting run");

    let extracted = extract_stage(source, &params.region_code, params.max_results, capture_time, &raw_path)
        .await
        .map_err(|e| RunError::new(Stage::Extract, e))?;

    let lookup = categories
        .resolve(&params.region_code)
        .await
        .map_err(|e| RunError::new(Stage::Normalize, e))?;
    let normalized = normalize_stage(&raw_path, &processed_path, &lookup)
        .map_err(|e| RunError::new(Stage::Normalize, e))?;

    let loaded = load_stage(loader, &processed_path, &params.table_name)
        .await
        .map_err(|e| RunError::new(Stage::Load, e))?;

    let summary = RunSummary {
        trending_at: extract::format_capture_time(capture_time),
        extracted,
        normalized,
        loaded,
    };
    info!(?summary, "Run finished");
    Ok(summary)
}
