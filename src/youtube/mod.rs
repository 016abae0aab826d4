mod client;
pub mod model;

pub use client::YouTubeClient;

use crate::{error::Result, utils::Config};

pub fn youtube_client(config: &Config) -> Result<YouTubeClient> {
    YouTubeClient::new(&config.youtube_api_base_url, config.youtube_api_key()?)
}
