pub mod backfill;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod expand;
pub mod report;
pub mod sink;
pub mod state;
pub mod variant;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointStore};
pub use config::{Config, ConfigError, TraversalSettings};
pub use data::Database;
pub use engine::{RunSummary, Termination, Traversal, TraversalOptions};
pub use error::CrawlError;
pub use sink::{RecordSink, RunStatus};
pub use state::{Counters, TraversalState};
pub use variant::{FailurePolicy, LimitCounter, Variant};
