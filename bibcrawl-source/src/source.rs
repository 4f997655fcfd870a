use crate::error::Result;
use crate::id::NodeId;
use crate::record::{Author, Institution, Work};

/// Read-only view of the external graph.
///
/// The traversal engine only talks to this trait, so tests can drive it with an
/// in-memory graph and production drives it with [`crate::OpenAlexClient`].
/// Implementations may issue several paginated calls per method, but never more than
/// one at a time.
#[allow(async_fn_in_trait)]
pub trait GraphSource {
    /// ID-filtered mode: retrieve the given works directly.
    async fn works_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Work>>;

    /// Relation-filtered mode: every work authored by any of the given authors,
    /// across all result pages.
    async fn works_by_authors(&self, authors: &[NodeId]) -> Result<Vec<Work>>;

    async fn authors_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Author>>;

    async fn institutions_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Institution>>;
}
