use crate::error::Result;
use crate::expand::RecordRows;
use crate::state::Counters;
use crate::variant::Variant;
use bibcrawl_source::{Institution, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Interrupted => "interrupted",
            RunStatus::Failed => "failed",
        }
    }
}

/// One row of the progress report, appended at every checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub counters: Counters,
}

/// Durable output of a traversal.
///
/// Writes must be idempotent: after a resume the engine may hand over rows that were
/// already written before the interruption.
pub trait RecordSink {
    /// Register a new run and return its id.
    fn begin_run(&mut self, variant: Variant, seed: &NodeId, resumed: bool) -> Result<String>;

    /// Write the rows of a batch. Implementations should make this atomic.
    fn write_records(&mut self, records: &[RecordRows]) -> Result<()>;

    fn write_institutions(&mut self, institutions: &[Institution]) -> Result<()>;

    fn append_progress(&mut self, report: &ProgressReport) -> Result<()>;

    fn finish_run(&mut self, run_id: &str, status: RunStatus) -> Result<()>;
}
