use crate::commands::DEFAULT_SEED;
use anyhow::{Context, Result, bail};
use bibcrawl_core::data::{Database, RunRow};
use bibcrawl_core::report::{
    ReportFormat, gather_coauthor_report, generate_json_report, generate_text_report, save_report,
};
use bibcrawl_core::{
    Checkpoint, CheckpointStore, Config, FailurePolicy, LimitCounter, RunSummary, Termination,
    Traversal, TraversalOptions, Variant,
};
use bibcrawl_source::{EntityKind, NodeId, OpenAlexClient};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub const DATABASE_FILE: &str = "bibcrawl.db";
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

pub fn print_banner() {
    println!(
        "{}",
        r#"
   _     _ _                         _
  | |__ (_) |__   ___ _ __ __ ___      _| |
  | '_ \| | '_ \ / __| '__/ _` \ \ /\ / / |
  | |_) | | |_) | (__| | | (_| |\ V  V /| |
  |_.__/|_|_.__/ \___|_|  \__,_| \_/\_/ |_|
"#
        .bright_blue()
        .bold()
    );
    println!(
        "  {} {}\n",
        "OpenAlex graph crawler".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}

/// Install the fmt subscriber. `RUST_LOG` wins over the flags.
pub fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Arguments of `bibcrawl crawl`, before they are merged with the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlArgs {
    pub variant: Variant,
    pub seed: NodeId,
    pub limit: u64,
    pub limit_on: Option<LimitCounter>,
    pub checkpoint_every: Option<u64>,
    pub batch_size: Option<usize>,
    pub output_dir: Option<String>,
    pub config: Option<String>,
    pub mailto: Option<String>,
    pub requeue_failed: Option<u32>,
    pub show_progress: bool,
}

impl CrawlArgs {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let method = args
            .get_one::<String>("METHOD")
            .map(String::as_str)
            .unwrap_or_default();
        let variant = Variant::from_str(method)
            .with_context(|| format!("Unknown crawl method '{}'", method))?;

        let raw_seed = args
            .get_one::<String>("seed")
            .map(String::as_str)
            .unwrap_or(DEFAULT_SEED);
        let seed = NodeId::parse(raw_seed)
            .filter(|id| matches!(id.kind(), EntityKind::Work | EntityKind::Author))
            .with_context(|| {
                format!("'{}' is not an OpenAlex work (W...) or author (A...) ID", raw_seed)
            })?;

        let limit_on = args
            .get_one::<String>("limit-on")
            .map(|s| {
                LimitCounter::from_str(s).with_context(|| format!("Unknown limit counter '{}'", s))
            })
            .transpose()?;

        Ok(Self {
            variant,
            seed,
            limit: args.get_one::<u64>("limit").copied().unwrap_or(100_000),
            limit_on,
            checkpoint_every: args.get_one::<u64>("checkpoint-every").copied(),
            batch_size: args.get_one::<usize>("batch-size").copied(),
            output_dir: args.get_one::<String>("output-dir").cloned(),
            config: args.get_one::<String>("config").cloned(),
            mailto: args.get_one::<String>("mailto").cloned(),
            requeue_failed: args.get_one::<u32>("requeue-failed").copied(),
            show_progress: !args.get_flag("no-progress"),
        })
    }
}

/// Load the config file (if any) and apply command-line overrides on top.
pub fn build_config(args: &CrawlArgs) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(&expand_path(Path::new(path)))?,
        None => Config::default(),
    };

    if let Some(mailto) = &args.mailto {
        config.fetch.mailto = Some(mailto.clone());
    }
    if let Some(batch_size) = args.batch_size {
        config.traversal.batch_size = batch_size;
    }
    if let Some(every) = args.checkpoint_every {
        config.traversal.checkpoint_every = every;
    }
    if let Some(max_attempts) = args.requeue_failed {
        config.traversal.failure_policy = FailurePolicy::Requeue { max_attempts };
    }

    config.validate()?;
    Ok(config)
}

pub fn build_options(args: &CrawlArgs, config: &Config) -> TraversalOptions {
    let mut options = TraversalOptions::from_settings(
        args.variant,
        args.seed.clone(),
        args.limit,
        &config.traversal,
    );
    options.limit_on = args.limit_on;
    options.show_progress = args.show_progress;
    options
}

/// `--output-dir` if given, otherwise `<seed>_<method suffix>` in the working directory.
pub fn resolve_output_dir(explicit: Option<&str>, seed: &NodeId, variant: Variant) -> PathBuf {
    match explicit {
        Some(dir) => expand_path(Path::new(dir)),
        None => PathBuf::from(format!("{}_{}", seed.as_str(), variant.directory_suffix())),
    }
}

/// Accept either a crawl output directory or a database file.
pub fn resolve_database_path(path: &Path) -> PathBuf {
    let path = expand_path(path);
    if path.is_dir() {
        path.join(DATABASE_FILE)
    } else {
        path
    }
}

fn spawn_interrupt_listener(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, stopping after the current batch (press Ctrl-C again to abort)");
        flag.store(true, Ordering::SeqCst);

        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} Aborted without a final checkpoint", "✗".red().bold());
            std::process::exit(130);
        }
    });
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let args = CrawlArgs::from_matches(sub_matches)?;
    let config = build_config(&args)?;
    let mut options = build_options(&args, &config);
    if quiet {
        options.show_progress = false;
    }
    options.validate()?;

    let output_dir = resolve_output_dir(args.output_dir.as_deref(), &args.seed, args.variant);
    std::fs::create_dir_all(&output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;

    let db_path = output_dir.join(DATABASE_FILE);
    let db = Database::new(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let store = CheckpointStore::new(output_dir.join(CHECKPOINT_FILE));

    if !quiet {
        print_crawl_header(&options, &output_dir, store.exists());
    }

    let client = OpenAlexClient::new(config.fetch.clone())?;
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_interrupt_listener(shutdown.clone());

    let mut traversal = Traversal::new(client, db, store, options).with_shutdown(shutdown);
    let summary = traversal.run().await?;

    print_summary(&summary, &db_path);
    Ok(())
}

fn print_crawl_header(options: &TraversalOptions, output_dir: &Path, resuming: bool) {
    println!(
        "{} {} crawl from {}",
        "→".blue().bold(),
        options.variant.as_str().bright_white().bold(),
        options.seed.as_str().cyan()
    );
    println!(
        "  Limit: {} {}",
        options.limit.to_string().cyan(),
        options.limit_counter().as_str()
    );
    println!(
        "  Batch size: {}, checkpoint every {}",
        options.batch_size.to_string().cyan(),
        options.checkpoint_every.to_string().cyan()
    );
    println!(
        "  Output: {}",
        output_dir.display().to_string().bright_white()
    );
    if resuming {
        println!("  {} Resuming from existing checkpoint", "↻".yellow().bold());
    }
    println!();
}

/// Label/value pairs shown after a crawl.
pub fn summary_lines(summary: &RunSummary) -> Vec<(&'static str, String)> {
    let c = &summary.counters;
    let mut lines = vec![
        ("Method", summary.variant.as_str().to_string()),
        ("Seed", summary.seed.as_str().to_string()),
        ("Stopped", summary.reason.as_str().to_string()),
        ("Works", c.works.to_string()),
        ("Authorships", c.authors.to_string()),
        ("Citations", c.citations.to_string()),
        ("Related works", c.related_works.to_string()),
        ("Concepts", c.concepts.to_string()),
        ("Topics", c.topics.to_string()),
        ("Keywords", c.keywords.to_string()),
        ("Nodes fetched", c.nodes.to_string()),
    ];
    if summary.variant.default_limit_counter() == LimitCounter::Collected {
        lines.push(("Collected", c.collected.to_string()));
    }
    if summary.variant.collects_institutions() {
        lines.push(("Institutions", c.institutions.to_string()));
    }
    lines.push(("Dropped", c.dropped.to_string()));
    lines.push(("Frontier left", summary.frontier_remaining.to_string()));
    lines.push(("Checkpoints", summary.checkpoints_written.to_string()));
    lines.push(("Elapsed", format!("{:.1}s", summary.elapsed_secs)));
    if let Some(backfill) = &summary.backfill {
        lines.push((
            "Backfill",
            format!(
                "{}/{} resolved, {} failed",
                backfill.resolved, backfill.requested, backfill.failed
            ),
        ));
    }
    lines
}

pub fn print_summary(summary: &RunSummary, db_path: &Path) {
    println!();
    print_divider();
    match summary.reason {
        Termination::Interrupted => println!("{}", "  CRAWL INTERRUPTED".yellow().bold()),
        _ => println!("{}", "  CRAWL COMPLETE".green().bold()),
    }
    print_divider();
    println!();

    for (label, value) in summary_lines(summary) {
        println!("  {:<14} {}", label, value.cyan());
    }

    println!();
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    if summary.reason == Termination::Interrupted {
        println!(
            "{} Run the same command again to resume from the checkpoint",
            "ℹ".blue()
        );
    }
    println!();
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

pub fn generate_status_report(checkpoint: Option<&Checkpoint>, runs: &[RunRow]) -> String {
    let mut report = String::new();

    match checkpoint {
        Some(cp) => {
            let state = &cp.state;
            let c = &state.counters;
            report.push_str("CHECKPOINT\n");
            report.push_str(&format!("  Method:        {}\n", cp.variant));
            report.push_str(&format!("  Seed:          {}\n", cp.seed.as_str()));
            report.push_str(&format!(
                "  Saved at:      {}\n",
                cp.saved_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            report.push_str(&format!("  Frontier:      {}\n", state.frontier.len()));
            report.push_str(&format!("  Visited:       {}\n", state.visited.len()));
            if !state.processed.is_empty() {
                report.push_str(&format!("  Processed:     {}\n", state.processed.len()));
            }
            report.push_str(&format!("  Retry queue:   {}\n", state.retry.len()));
            report.push_str(&format!("  Dropped:       {}\n", state.dropped.len()));
            report.push_str("\nCOUNTERS\n");
            report.push_str(&format!("  Works:         {}\n", c.works));
            report.push_str(&format!("  Authorships:   {}\n", c.authors));
            report.push_str(&format!("  Citations:     {}\n", c.citations));
            report.push_str(&format!("  Related works: {}\n", c.related_works));
            report.push_str(&format!("  Concepts:      {}\n", c.concepts));
            report.push_str(&format!("  Topics:        {}\n", c.topics));
            report.push_str(&format!("  Keywords:      {}\n", c.keywords));
            report.push_str(&format!("  Nodes:         {}\n", c.nodes));
            report.push_str(&format!("  Collected:     {}\n", c.collected));
            report.push_str(&format!("  Institutions:  {}\n", c.institutions));
        }
        None => report.push_str("No checkpoint found\n"),
    }

    if !runs.is_empty() {
        report.push_str(&format!("\nRUNS ({})\n", runs.len()));
        for run in runs {
            let short_id: String = run.id.chars().take(8).collect();
            report.push_str(&format!(
                "  {}  {:<11} {} {} started {}{}\n",
                short_id,
                run.status,
                run.variant,
                run.seed,
                format_timestamp(run.started_at),
                if run.resumed { " (resumed)" } else { "" }
            ));
        }
    }

    report
}

pub fn handle_status(sub_matches: &ArgMatches) -> Result<()> {
    let dir = sub_matches
        .get_one::<PathBuf>("DIR")
        .map(|p| expand_path(p))
        .context("An output directory is required")?;

    let checkpoint = CheckpointStore::new(dir.join(CHECKPOINT_FILE)).load()?;
    let db_path = dir.join(DATABASE_FILE);
    let runs = if Database::exists(&db_path) {
        Database::new(&db_path)?.get_runs()?
    } else {
        Vec::new()
    };

    if checkpoint.is_none() && runs.is_empty() {
        bail!("No crawl found in {}", dir.display());
    }

    print!("{}", generate_status_report(checkpoint.as_ref(), &runs));
    Ok(())
}

pub fn handle_coauthors(sub_matches: &ArgMatches) -> Result<()> {
    let path = sub_matches
        .get_one::<PathBuf>("PATH")
        .map(|p| resolve_database_path(p))
        .context("A crawl directory or database path is required")?;
    if !Database::exists(&path) {
        bail!("No database at {}", path.display());
    }

    let format_name = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text");
    let format = ReportFormat::from_str(format_name)
        .with_context(|| format!("Unsupported report format '{}'", format_name))?;
    let top = sub_matches.get_one::<usize>("top").copied();

    let db = Database::new(&path)?;
    let data = gather_coauthor_report(&db, top)?;
    let content = match format {
        ReportFormat::Text => generate_text_report(&data),
        ReportFormat::Json => generate_json_report(&data)?,
    };

    match sub_matches.get_one::<PathBuf>("output") {
        Some(output) => {
            save_report(&content, output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                output.display().to_string().bright_white()
            );
        }
        None => print!("{}", content),
    }
    Ok(())
}
