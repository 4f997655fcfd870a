use crate::backfill::{BackfillSummary, backfill_institutions};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::TraversalSettings;
use crate::error::{CrawlError, Result};
use crate::expand::{Expander, Expansion, RecordRows};
use crate::sink::{ProgressReport, RecordSink, RunStatus};
use crate::state::{Counters, TraversalState};
use crate::variant::{FailurePolicy, FetchMode, LimitCounter, Variant, VisitPolicy};
use bibcrawl_source::{EntityKind, GraphSource, Identified, NodeId, Work};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Options for configuring a traversal
#[derive(Debug, Clone)]
pub struct TraversalOptions {
    pub variant: Variant,
    pub seed: NodeId,
    pub limit: u64,
    /// Overrides the variant's default limit counter
    pub limit_on: Option<LimitCounter>,
    pub batch_size: usize,
    pub checkpoint_every: u64,
    pub batch_delay: Duration,
    pub failure_policy: FailurePolicy,
    pub show_progress: bool,
}

impl TraversalOptions {
    pub fn new(variant: Variant, seed: NodeId, limit: u64) -> Self {
        Self::from_settings(variant, seed, limit, &TraversalSettings::default())
    }

    pub fn from_settings(
        variant: Variant,
        seed: NodeId,
        limit: u64,
        settings: &TraversalSettings,
    ) -> Self {
        Self {
            variant,
            seed,
            limit,
            limit_on: None,
            batch_size: settings.batch_size,
            checkpoint_every: settings.checkpoint_every,
            batch_delay: settings.batch_delay(),
            failure_policy: settings.failure_policy,
            show_progress: false,
        }
    }

    pub fn limit_counter(&self) -> LimitCounter {
        self.limit_on
            .unwrap_or_else(|| self.variant.default_limit_counter())
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(CrawlError::InvalidLimit(
                "limit must be greater than 0".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CrawlError::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.checkpoint_every == 0 {
            return Err(CrawlError::InvalidConfig(
                "checkpoint cadence must be greater than 0".to_string(),
            ));
        }
        if self.limit_counter() == LimitCounter::Collected
            && self.variant.visit_policy() != VisitPolicy::OnDiscovery
        {
            return Err(CrawlError::InvalidLimit(format!(
                "the {} traversal does not collect nodes; limit on works or nodes instead",
                self.variant
            )));
        }
        if let FailurePolicy::Requeue { max_attempts: 0 } = self.failure_policy {
            return Err(CrawlError::InvalidConfig(
                "max_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Callback invoked after every batch with the current counters
pub type ProgressCallback = Arc<dyn Fn(&Counters) + Send + Sync>;

/// Why the traversal stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    FrontierExhausted,
    LimitReached,
    Interrupted,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Termination::FrontierExhausted => "frontier exhausted",
            Termination::LimitReached => "limit reached",
            Termination::Interrupted => "interrupted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub variant: Variant,
    pub seed: NodeId,
    pub counters: Counters,
    pub reason: Termination,
    pub resumed: bool,
    pub checkpoints_written: u64,
    pub elapsed_secs: f64,
    pub frontier_remaining: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backfill: Option<BackfillSummary>,
}

enum Phase {
    Initializing,
    Draining,
    Checkpointing,
    Terminated(Termination),
}

/// The resumable frontier traversal shared by every variant.
pub struct Traversal<S: GraphSource, W: RecordSink> {
    source: S,
    sink: W,
    store: CheckpointStore,
    options: TraversalOptions,
    expander: Box<dyn Expander>,
    progress_callback: Option<ProgressCallback>,
    shutdown: Arc<AtomicBool>,
}

/// Per-run bookkeeping that is not part of the checkpoint.
struct RunContext {
    run_id: String,
    started: Instant,
    checkpoints_written: u64,
    progress_bar: Option<ProgressBar>,
}

impl<S: GraphSource, W: RecordSink> Traversal<S, W> {
    pub fn new(source: S, sink: W, store: CheckpointStore, options: TraversalOptions) -> Self {
        let expander = options.variant.expander();
        Self {
            source,
            sink,
            store,
            options,
            expander,
            progress_callback: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Share a flag that stops the traversal at the next batch boundary when set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn with_expander(mut self, expander: Box<dyn Expander>) -> Self {
        self.expander = expander;
        self
    }

    pub fn options(&self) -> &TraversalOptions {
        &self.options
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Mark the run failed before handing back the error that stopped it.
    fn fail_run(&mut self, run_id: &str, err: CrawlError) -> CrawlError {
        if let Err(e) = self.sink.finish_run(run_id, RunStatus::Failed) {
            warn!("Could not mark run {} as failed: {}", run_id, e);
        }
        err
    }

    /// Cap on works expanded in total when the limit counts works.
    fn works_cap(&self) -> Option<u64> {
        (self.options.limit_counter() == LimitCounter::Works).then_some(self.options.limit)
    }

    fn limit_reached(&self, state: &TraversalState) -> bool {
        state.counters.get(self.options.limit_counter()) >= self.options.limit
    }

    /// Enqueue gate for visit-on-discovery traversals.
    fn collect_limit(&self) -> Option<u64> {
        (self.options.limit_counter() == LimitCounter::Collected).then_some(self.options.limit)
    }

    fn progress(&self, state: &TraversalState) -> u64 {
        state.counters.progress(self.options.limit_counter())
    }

    /// Batch size, trimmed so a batch cannot overshoot a limit it directly counts.
    fn batch_cap(&self, state: &TraversalState) -> usize {
        let remaining = self
            .options
            .limit
            .saturating_sub(state.counters.get(self.options.limit_counter()));
        let counts_nodes = match self.options.limit_counter() {
            LimitCounter::Nodes => true,
            LimitCounter::Works => self.options.variant.nodes_are_records(),
            LimitCounter::Collected => false,
        };
        if counts_nodes {
            self.options
                .batch_size
                .min(usize::try_from(remaining).unwrap_or(usize::MAX))
        } else {
            self.options.batch_size
        }
    }

    /// Run until the frontier is exhausted, the limit is reached or shutdown is requested.
    pub async fn run(&mut self) -> Result<RunSummary> {
        self.options.validate()?;

        let variant = self.options.variant;
        let seed = self.options.seed.clone();
        let cadence = self.options.checkpoint_every;

        let mut state = TraversalState::new();
        let mut resumed = false;
        let mut ctx = RunContext {
            run_id: String::new(),
            started: Instant::now(),
            checkpoints_written: 0,
            progress_bar: None,
        };

        let mut phase = Phase::Initializing;
        let reason = loop {
            phase = match phase {
                Phase::Initializing => {
                    let checkpoint = self.store.load()?;
                    if let Some(checkpoint) = &checkpoint {
                        checkpoint.ensure_matches(variant, &seed)?;
                    }
                    resumed = checkpoint.is_some();
                    ctx.run_id = self.sink.begin_run(variant, &seed, resumed)?;

                    match checkpoint {
                        Some(checkpoint) => {
                            state = checkpoint.state;
                            info!(
                                "Resuming {} traversal from {} ({} queued, {} works)",
                                variant,
                                self.store.path().display(),
                                state.frontier.len(),
                                state.counters.works
                            );
                        }
                        None => {
                            info!("Starting {} traversal from seed {}", variant, seed);
                            if let Err(e) = self.seed_state(&mut state).await {
                                return Err(self.fail_run(&ctx.run_id, e));
                            }
                        }
                    }

                    ctx.progress_bar = self.make_progress_bar(&state);
                    Phase::Draining
                }
                Phase::Draining => {
                    if self.shutdown.load(Ordering::SeqCst) {
                        Phase::Terminated(Termination::Interrupted)
                    } else if self.options.limit_counter() != LimitCounter::Collected
                        && self.limit_reached(&state)
                    {
                        Phase::Terminated(Termination::LimitReached)
                    } else if state.is_drained() {
                        if self.limit_reached(&state) {
                            Phase::Terminated(Termination::LimitReached)
                        } else {
                            Phase::Terminated(Termination::FrontierExhausted)
                        }
                    } else {
                        let before = self.progress(&state) / cadence;
                        if let Err(e) = self.step(&mut state).await {
                            return Err(self.fail_run(&ctx.run_id, e));
                        }
                        self.report_progress(&state, &ctx);

                        if self.progress(&state) / cadence > before {
                            Phase::Checkpointing
                        } else {
                            Phase::Draining
                        }
                    }
                }
                Phase::Checkpointing => {
                    if let Err(e) = self.checkpoint(&state, &mut ctx) {
                        return Err(self.fail_run(&ctx.run_id, e));
                    }
                    Phase::Draining
                }
                Phase::Terminated(reason) => break reason,
            };
        };

        if let Err(e) = self.checkpoint(&state, &mut ctx) {
            return Err(self.fail_run(&ctx.run_id, e));
        }
        if let Some(pb) = &ctx.progress_bar {
            pb.finish_with_message(format!("{} ({} works)", reason.as_str(), state.counters.works));
        }

        let backfill = if variant.collects_institutions() && reason != Termination::Interrupted {
            let ids: Vec<NodeId> = state.institutions.iter().cloned().collect();
            let result =
                backfill_institutions(&self.source, &mut self.sink, &ids, self.options.batch_size)
                    .await;
            match result {
                Ok(summary) => Some(summary),
                Err(e) => return Err(self.fail_run(&ctx.run_id, e)),
            }
        } else {
            None
        };

        let status = match reason {
            Termination::Interrupted => RunStatus::Interrupted,
            _ => RunStatus::Completed,
        };
        self.sink.finish_run(&ctx.run_id, status)?;

        info!(
            "Traversal finished ({}): {} works, {} nodes, {} collected, {} dropped",
            reason.as_str(),
            state.counters.works,
            state.counters.nodes,
            state.counters.collected,
            state.counters.dropped
        );

        Ok(RunSummary {
            run_id: ctx.run_id,
            variant,
            seed,
            counters: state.counters.clone(),
            reason,
            resumed,
            checkpoints_written: ctx.checkpoints_written,
            elapsed_secs: ctx.started.elapsed().as_secs_f64(),
            frontier_remaining: state.frontier.len() + state.retry.len(),
            backfill,
        })
    }

    /// Build the initial state from one fetch of the seed.
    async fn seed_state(&mut self, state: &mut TraversalState) -> Result<()> {
        let seed = self.options.seed.clone();
        let policy = self.options.variant.visit_policy();
        let gate = self.collect_limit();

        match (self.options.variant.fetch_mode(), seed.kind()) {
            (FetchMode::WorksByIds, EntityKind::Work) => {
                let work = self.fetch_seed_work(&seed).await?;
                state.visited.insert(seed.clone());
                state.counters.nodes += 1;
                let rows = self.absorb(state, vec![work]);
                self.sink.write_records(&rows)?;
            }
            (FetchMode::WorksByAuthors, EntityKind::Author) => {
                let authors = self.source.authors_by_ids(std::slice::from_ref(&seed)).await?;
                if !authors.iter().any(|a| a.node_id().as_ref() == Some(&seed)) {
                    return Err(CrawlError::SeedNotFound(seed.to_string()));
                }
                state.discover(seed, policy, gate);
            }
            (FetchMode::WorksByAuthors, EntityKind::Work) => {
                let work = self.fetch_seed_work(&seed).await?;
                let authors = bibcrawl_source::id::normalize_all(
                    work.authorships
                        .iter()
                        .filter_map(|a| a.author.id.as_deref()),
                );
                if authors.is_empty() {
                    warn!("Seed work {} lists no authors", seed);
                }
                for author in authors {
                    state.discover(author, policy, gate);
                }
            }
            (FetchMode::WorksByIds, _) => {
                return Err(CrawlError::InvalidConfig(format!(
                    "the {} traversal needs a work seed (W...), got {}",
                    self.options.variant, seed
                )));
            }
            (FetchMode::WorksByAuthors, _) => {
                return Err(CrawlError::InvalidConfig(format!(
                    "the {} traversal needs an author (A...) or work (W...) seed, got {}",
                    self.options.variant, seed
                )));
            }
        }

        debug!("Seeded frontier with {} nodes", state.frontier.len());
        Ok(())
    }

    async fn fetch_seed_work(&self, seed: &NodeId) -> Result<Work> {
        let works = self.source.works_by_ids(std::slice::from_ref(seed)).await?;
        works
            .into_iter()
            .find(|w| w.node_id().as_ref() == Some(seed))
            .ok_or_else(|| CrawlError::SeedNotFound(seed.to_string()))
    }

    /// Expand every record not seen before, feeding neighbors back into the state.
    fn absorb(&self, state: &mut TraversalState, works: Vec<Work>) -> Vec<RecordRows> {
        let policy = self.options.variant.visit_policy();
        let gate = self.collect_limit();
        let works_cap = self.works_cap();

        let mut rows = Vec::new();
        let total = works.len();
        for (index, work) in works.into_iter().enumerate() {
            if let Some(cap) = works_cap
                && state.counters.works >= cap
            {
                debug!("Works limit reached, leaving {} fetched works unexpanded", total - index);
                break;
            }
            let Some(id) = work.node_id() else {
                warn!("Skipping work with unusable id {:?}", work.id);
                continue;
            };
            if !state.records.insert(id.clone()) {
                continue;
            }

            let Expansion {
                rows: record,
                neighbors,
                institutions,
            } = self.expander.expand(&id, &work);

            state.counters.record(&record);
            for neighbor in neighbors {
                state.discover(neighbor, policy, gate);
            }
            for institution in institutions {
                state.add_institution(institution);
            }
            rows.push(record);
        }
        rows
    }

    /// Process one batch: pop, fetch, expand, write, pause.
    async fn step(&mut self, state: &mut TraversalState) -> Result<()> {
        let cap = self.batch_cap(state);
        let batch = state.pop_batch(cap, self.options.variant.visit_policy());
        if batch.is_empty() {
            return Ok(());
        }

        let ids: Vec<NodeId> = batch.iter().map(|p| p.id.clone()).collect();
        debug!("Fetching batch of {} nodes", ids.len());

        let fetched = match self.options.variant.fetch_mode() {
            FetchMode::WorksByIds => self.source.works_by_ids(&ids).await,
            FetchMode::WorksByAuthors => self.source.works_by_authors(&ids).await,
        };

        match fetched {
            Ok(works) => {
                state.counters.nodes += batch.len() as u64;
                let rows = self.absorb(state, works);
                self.sink.write_records(&rows)?;
            }
            Err(e) => {
                warn!("Failed to fetch batch of {} nodes: {}", ids.len(), e);
                state.fail_batch(batch, self.options.failure_policy);
            }
        }

        if !self.options.batch_delay.is_zero() {
            tokio::time::sleep(self.options.batch_delay).await;
        }
        Ok(())
    }

    fn checkpoint(&mut self, state: &TraversalState, ctx: &mut RunContext) -> Result<()> {
        let checkpoint = Checkpoint::new(
            self.options.variant,
            self.options.seed.clone(),
            state.clone(),
        );
        self.store.save(&checkpoint)?;
        self.sink.append_progress(&ProgressReport {
            run_id: ctx.run_id.clone(),
            timestamp: checkpoint.saved_at,
            elapsed_secs: ctx.started.elapsed().as_secs_f64(),
            counters: state.counters.clone(),
        })?;
        ctx.checkpoints_written += 1;
        debug!(
            "Checkpoint {} written at {} works",
            ctx.checkpoints_written, state.counters.works
        );
        Ok(())
    }

    fn make_progress_bar(&self, state: &TraversalState) -> Option<ProgressBar> {
        if !self.options.show_progress {
            return None;
        }
        let pb = ProgressBar::new(self.options.limit);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_position(state.counters.get(self.options.limit_counter()));
        pb.set_message(self.options.limit_counter().as_str());
        Some(pb)
    }

    fn report_progress(&self, state: &TraversalState, ctx: &RunContext) {
        if let Some(pb) = &ctx.progress_bar {
            pb.set_position(state.counters.get(self.options.limit_counter()));
            pb.set_message(format!(
                "{} | {} works, {} queued",
                self.options.limit_counter().as_str(),
                state.counters.works,
                state.frontier.len()
            ));
        }
        if let Some(callback) = &self.progress_callback {
            callback(&state.counters);
        }
    }
}
