use crate::expand::RecordRows;
use crate::variant::{FailurePolicy, LimitCounter, VisitPolicy};
use bibcrawl_source::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

/// Running totals. Monotonic within a run and restored verbatim from a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    /// Distinct works expanded
    pub works: u64,
    /// Authorship rows written
    pub authors: u64,
    pub citations: u64,
    pub related_works: u64,
    pub concepts: u64,
    pub topics: u64,
    pub keywords: u64,
    /// Frontier nodes fetched successfully
    pub nodes: u64,
    /// Nodes collected by discovery
    pub collected: u64,
    pub institutions: u64,
    /// Node IDs given up on after failed fetches
    pub dropped: u64,
}

impl Counters {
    /// Account for one newly seen record.
    pub fn record(&mut self, rows: &RecordRows) {
        self.works += 1;
        self.authors += rows.authorships.len() as u64;
        self.citations += rows.citations.len() as u64;
        self.related_works += rows.related_works.len() as u64;
        self.concepts += rows.concepts.len() as u64;
        self.topics += rows.topics.len() as u64;
        self.keywords += rows.keywords.len() as u64;
    }

    pub fn get(&self, counter: LimitCounter) -> u64 {
        match counter {
            LimitCounter::Works => self.works,
            LimitCounter::Nodes => self.nodes,
            LimitCounter::Collected => self.collected,
        }
    }

    /// Count that drives checkpoint cadence. Collected-limited runs checkpoint on
    /// processed nodes, since collection can finish long before draining does.
    pub fn progress(&self, limit_on: LimitCounter) -> u64 {
        match limit_on {
            LimitCounter::Works => self.works,
            LimitCounter::Nodes | LimitCounter::Collected => self.nodes,
        }
    }
}

/// A frontier node handed to the fetcher, with the number of failed fetches so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pending {
    pub id: NodeId,
    #[serde(default)]
    pub attempts: u32,
}

/// Everything needed to resume a traversal exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalState {
    pub frontier: VecDeque<NodeId>,
    /// Fetched nodes (visit-on-fetch) or collected nodes (visit-on-discovery).
    pub visited: BTreeSet<NodeId>,
    /// Nodes whose works were fetched, for visit-on-discovery traversals.
    pub processed: BTreeSet<NodeId>,
    /// Works already expanded and written.
    pub records: BTreeSet<NodeId>,
    /// Institution IDs awaiting backfill.
    pub institutions: BTreeSet<NodeId>,
    /// Failed nodes waiting for another attempt; drained after the frontier.
    pub retry: VecDeque<Pending>,
    pub dropped: Vec<NodeId>,
    pub counters: Counters,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// No work left in either the frontier or the retry queue.
    pub fn is_drained(&self) -> bool {
        self.frontier.is_empty() && self.retry.is_empty()
    }

    fn claimed(&self, id: &NodeId, policy: VisitPolicy) -> bool {
        match policy {
            VisitPolicy::OnFetch => self.visited.contains(id),
            VisitPolicy::OnDiscovery => self.processed.contains(id),
        }
    }

    fn claim(&mut self, id: NodeId, policy: VisitPolicy) {
        match policy {
            VisitPolicy::OnFetch => self.visited.insert(id),
            VisitPolicy::OnDiscovery => self.processed.insert(id),
        };
    }

    /// Pop up to `cap` unclaimed IDs off the frontier, claiming each one before it is
    /// fetched. Falls back to the retry queue only when the frontier yields nothing.
    ///
    /// An empty result with a non-empty frontier cannot happen; an empty result means
    /// the frontier held only already-claimed IDs or `cap` was zero.
    pub fn pop_batch(&mut self, cap: usize, policy: VisitPolicy) -> Vec<Pending> {
        let mut batch = Vec::new();
        while batch.len() < cap {
            let Some(id) = self.frontier.pop_front() else {
                break;
            };
            if self.claimed(&id, policy) {
                continue;
            }
            self.claim(id.clone(), policy);
            batch.push(Pending { id, attempts: 0 });
        }

        if batch.is_empty() {
            while batch.len() < cap {
                let Some(pending) = self.retry.pop_front() else {
                    break;
                };
                batch.push(pending);
            }
        }

        batch
    }

    /// Offer a neighbor to the frontier. Returns whether it was enqueued.
    ///
    /// Visit-on-discovery traversals collect the node on the spot, and stop collecting
    /// once `collect_limit` nodes are held.
    pub fn discover(&mut self, id: NodeId, policy: VisitPolicy, collect_limit: Option<u64>) -> bool {
        if self.visited.contains(&id) {
            return false;
        }

        if policy == VisitPolicy::OnDiscovery {
            if let Some(limit) = collect_limit
                && self.counters.collected >= limit
            {
                return false;
            }
            self.visited.insert(id.clone());
            self.counters.collected += 1;
        }

        self.frontier.push_back(id);
        true
    }

    /// Record an institution for backfill. Returns whether it was new.
    pub fn add_institution(&mut self, id: NodeId) -> bool {
        let added = self.institutions.insert(id);
        if added {
            self.counters.institutions += 1;
        }
        added
    }

    /// Apply the failure policy to a batch whose fetch failed.
    pub fn fail_batch(&mut self, batch: Vec<Pending>, policy: FailurePolicy) {
        for mut pending in batch {
            pending.attempts += 1;
            match policy {
                FailurePolicy::Requeue { max_attempts } if pending.attempts < max_attempts => {
                    self.retry.push_back(pending);
                }
                _ => {
                    self.counters.dropped += 1;
                    self.dropped.push(pending.id);
                }
            }
        }
    }
}
