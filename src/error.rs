//! Error types shared by every pipeline stage.

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The catalog API call failed (transport, auth, non-success status or undecodable body).
    #[error("upstream call failed: {0}")]
    Upstream(String),

    /// A present field could not be converted to its target type.
    #[error("malformed field `{field}` on video {video_id}: {value:?}")]
    MalformedField {
        video_id: String,
        field: &'static str,
        value: String,
    },

    /// The destination rejected the write, or the remote load job failed.
    #[error("destination write failed: {0}")]
    DestinationWrite(String),

    /// The destination table exists with columns incompatible with the row schema.
    #[error("schema drift on table `{table}`: {detail}")]
    SchemaDrift { table: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("artifact error: {0}")]
    Artifact(String),
}

impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        PipelineError::DestinationWrite(err.to_string())
    }
}

/// Pipeline stage, used to report where a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Normalize,
    Load,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Normalize => write!(f, "normalize"),
            Stage::Load => write!(f, "load"),
        }
    }
}

/// A failed run: the stage that failed and the underlying cause.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

impl RunError {
    pub fn new(stage: Stage, source: PipelineError) -> Self {
        Self { stage, source }
    }
}
