use crate::error::Result;
use crate::sink::RecordSink;
use bibcrawl_source::{GraphSource, NodeId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub requested: usize,
    pub resolved: usize,
    /// IDs in chunks whose fetch failed
    pub failed: usize,
}

/// Resolve institution metadata for every collected ID, `chunk_size` IDs at a time.
///
/// A failed chunk is logged and skipped; storage errors abort.
pub async fn backfill_institutions<S, W>(
    source: &S,
    sink: &mut W,
    ids: &[NodeId],
    chunk_size: usize,
) -> Result<BackfillSummary>
where
    S: GraphSource,
    W: RecordSink,
{
    let mut summary = BackfillSummary {
        requested: ids.len(),
        ..BackfillSummary::default()
    };
    if ids.is_empty() {
        return Ok(summary);
    }

    info!("Backfilling {} institutions", ids.len());
    for chunk in ids.chunks(chunk_size.max(1)) {
        match source.institutions_by_ids(chunk).await {
            Ok(institutions) => {
                sink.write_institutions(&institutions)?;
                summary.resolved += institutions.len();
            }
            Err(e) => {
                warn!("Institution backfill failed for {} IDs: {}", chunk.len(), e);
                summary.failed += chunk.len();
            }
        }
    }

    info!(
        "Institution backfill done: {}/{} resolved, {} failed",
        summary.resolved, summary.requested, summary.failed
    );
    Ok(summary)
}
