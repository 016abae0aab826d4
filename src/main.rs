use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use std::{path::PathBuf, time::Duration};
use tempfile::TempDir;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use trending::{
    error::{PipelineError, RunError, Stage},
    load::{self, Backend, Loader},
    pipeline::{self, CategorySource, RunParams, RunSummary},
    schedule::{self, RetryPolicy},
    utils::Config,
    youtube::{self, YouTubeClient},
};

#[derive(Parser, Debug)]
#[command(name = "trending")]
#[command(author, version, about = "Trending YouTube videos pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract, normalize and load in one go
    Run(RunArgs),

    /// Fetch trending videos into a raw JSON artifact
    Extract {
        #[arg(short, long, default_value = "ID")]
        region: String,

        #[arg(short, long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
        max_results: u64,

        #[arg(short, long, default_value = "raw_videos.json")]
        output: PathBuf,
    },

    /// Normalize a raw artifact into a processed artifact
    Normalize {
        #[arg(short, long, default_value = "raw_videos.json")]
        input: PathBuf,

        #[arg(short, long, default_value = "processed_videos.json")]
        output: PathBuf,

        #[command(flatten)]
        categories: CategoryArgs,
    },

    /// Append a processed artifact to a table
    Load {
        #[arg(short, long, default_value = "processed_videos.json")]
        input: PathBuf,

        #[arg(short, long, default_value = "trending_videos")]
        table: String,

        #[arg(short, long, value_enum, default_value = "sqlite")]
        backend: Backend,
    },

    /// Run on a cron schedule, retrying failed runs
    Schedule {
        #[command(flatten)]
        run: RunArgs,

        /// Cron pattern for the run cadence
        #[arg(long, default_value = "0 10 * * *")]
        cron: String,

        #[arg(long, default_value_t = 3)]
        retries: u32,

        #[arg(long, default_value_t = 300)]
        retry_delay_secs: u64,
    },
}

#[derive(Args, Debug, Clone)]
struct CategoryArgs {
    /// Fetch category names from the catalog instead of CATEGORIES_PATH
    #[arg(long)]
    categories_from_api: bool,

    /// Region used when fetching categories from the catalog
    #[arg(long, default_value = "ID")]
    category_region: String,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// ISO 3166-1 alpha-2 region code
    #[arg(short, long, default_value = "ID")]
    region: String,

    #[arg(short, long, default_value_t = 200, value_parser = clap::value_parser!(u64).range(1..))]
    max_results: u64,

    #[arg(short, long, default_value = "trending_videos")]
    table: String,

    #[arg(short, long, value_enum, default_value = "sqlite")]
    backend: Backend,

    /// Fetch category names from the catalog instead of CATEGORIES_PATH
    #[arg(long)]
    categories_from_api: bool,
}

impl RunArgs {
    fn params(&self) -> RunParams {
        RunParams {
            region_code: self.region.clone(),
            max_results: self.max_results as usize,
            table_name: self.table.clone(),
        }
    }
}

fn category_source(config: &Config, client: &YouTubeClient, from_api: bool) -> CategorySource {
    if from_api {
        CategorySource::Catalog(client.clone())
    } else {
        CategorySource::File(config.categories_path.clone())
    }
}

/// Artifacts go to ARTIFACT_DIR when set, otherwise to a directory removed after the run.
fn run_dir(config: &Config) -> trending::error::Result<(PathBuf, Option<TempDir>)> {
    match &config.artifact_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| PipelineError::Artifact(format!("failed to create {}: {e}", dir.display())))?;
            Ok((dir.clone(), None))
        }
        None => {
            let temp = tempfile::tempdir()
                .map_err(|e| PipelineError::Artifact(format!("failed to create artifact directory: {e}")))?;
            Ok((temp.path().to_path_buf(), Some(temp)))
        }
    }
}

async fn run_once<L: Loader>(
    config: &Config,
    client: &YouTubeClient,
    loader: &L,
    args: &RunArgs,
) -> std::result::Result<RunSummary, RunError> {
    let categories = category_source(config, client, args.categories_from_api);
    let (dir, _guard) = run_dir(config).map_err(|e| RunError::new(Stage::Extract, e))?;
    pipeline::run(client, loader, &categories, &args.params(), &dir).await
}

async fn run_scheduled<L: Loader>(
    config: &Config,
    client: &YouTubeClient,
    loader: &L,
    args: &RunArgs,
    cron: &str,
    policy: &RetryPolicy,
) -> Result<()> {
    schedule::run_on_schedule(cron, policy, move |_| run_once(config, client, loader, args)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok(); // This line loads the environment variables from the ".env" file.
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::from_env()?;

    match cli.command {
        Command::Run(args) => {
            let client = youtube::youtube_client(&config)?;
            let summary = match args.backend {
                Backend::Sqlite => {
                    let loader = load::sqlite_loader(&config).await?;
                    let result = run_once(&config, &client, &loader, &args).await;
                    loader.close().await;
                    result?
                }
                Backend::Bigquery => {
                    let loader = load::bigquery_loader(&config).await?;
                    run_once(&config, &client, &loader, &args).await?
                }
            };
            info!(loaded = summary.loaded, table = %args.table, "Done");
        }
        Command::Extract {
            region,
            max_results,
            output,
        } => {
            let client = youtube::youtube_client(&config)?;
            let count =
                pipeline::extract_stage(&client, &region, max_results as usize, Utc::now(), &output).await?;
            info!(count, output = %output.display(), "Extracted videos");
        }
        Command::Normalize {
            input,
            output,
            categories,
        } => {
            let source = if categories.categories_from_api {
                CategorySource::Catalog(youtube::youtube_client(&config)?)
            } else {
                CategorySource::File(config.categories_path.clone())
            };
            let lookup = source.resolve(&categories.category_region).await?;
            let count = pipeline::normalize_stage(&input, &output, &lookup)?;
            info!(count, output = %output.display(), "Normalized videos");
        }
        Command::Load {
            input,
            table,
            backend,
        } => {
            let loaded = match backend {
                Backend::Sqlite => {
                    let loader = load::sqlite_loader(&config).await?;
                    let result = pipeline::load_stage(&loader, &input, &table).await;
                    loader.close().await;
                    result?
                }
                Backend::Bigquery => {
                    let loader = load::bigquery_loader(&config).await?;
                    pipeline::load_stage(&loader, &input, &table).await?
                }
            };
            info!(loaded, table = %table, "Loaded videos");
        }
        Command::Schedule {
            run,
            cron,
            retries,
            retry_delay_secs,
        } => {
            // reject a bad pattern before waiting for the first tick
            schedule::next_execution(&cron, &Utc::now())?;
            let policy = RetryPolicy {
                retries,
                delay: Duration::from_secs(retry_delay_secs),
            };
            let client = youtube::youtube_client(&config)?;
            match run.backend {
                Backend::Sqlite => {
                    let loader = load::sqlite_loader(&config).await?;
                    run_scheduled(&config, &client, &loader, &run, &cron, &policy).await?;
                }
                Backend::Bigquery => {
                    let loader = load::bigquery_loader(&config).await?;
                    run_scheduled(&config, &client, &loader, &run, &cron, &policy).await?;
                }
            }
        }
    }

    Ok(())
}
