use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    StatusError { status: u16, url: String },

    #[error("Malformed response body from {url}: {source}")]
    DecodeError {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;
