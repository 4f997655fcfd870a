pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod pacer;
pub mod record;
pub mod source;

pub use client::OpenAlexClient;
pub use config::{FetchConfig, PagingMode};
pub use error::SourceError;
pub use id::{EntityKind, NodeId};
pub use record::{Author, Authorship, Identified, Institution, Work};
pub use source::GraphSource;
