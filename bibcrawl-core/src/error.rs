use crate::checkpoint::CheckpointError;
use bibcrawl_source::SourceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Seed not found: {0}")]
    SeedNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
