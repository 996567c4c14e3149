//! Gold Miner CLI
//!
//! The `goldminer` command discovers newly created AI programming tools on
//! GitHub, appraises them with Gemini and pushes the good ones to Feishu.
//!
//! ## Commands
//!
//! - `mine`: run one mining cycle, or one every `--interval` minutes
//! - `search`: keyword search over stored discoveries
//! - `pending`: list stored discoveries that were never pushed

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use goldminer_adapters::{AdapterError, FeishuNotifier, GeminiAppraiser, GithubClient};
use goldminer_core::{
    CancelCause, CycleReport, MiningConfig, MiningError, MiningService, Notifier, Repo,
    RepoStore, RunContext, TrendingWindow,
};
use goldminer_state::SurrealRepoStore;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "goldminer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover new AI programming tools on GitHub", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and JSON command output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, filter, appraise, store and push new repositories
    Mine(MineArgs),

    /// Search stored discoveries by keyword
    Search {
        /// Matched case-insensitively against name, description and review
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List stored discoveries that have not been pushed yet
    Pending,
}

#[derive(Args, Debug)]
struct MineArgs {
    /// Minutes between cycles; 0 runs a single cycle
    #[arg(long, env = "GOLDMINER_INTERVAL", default_value_t = 0)]
    interval: u64,

    /// Concurrent LLM appraisals
    #[arg(long, env = "GOLDMINER_CONCURRENCY", default_value_t = 3)]
    concurrency: usize,

    /// Upper bound on one cycle, in seconds
    #[arg(long, default_value_t = 300)]
    cycle_timeout: u64,

    /// Per-repository appraisal timeout, in seconds
    #[arg(long, default_value_t = 30)]
    appraisal_timeout: u64,

    /// Pause after each pushed repository, in seconds
    #[arg(long, default_value_t = 3)]
    notify_delay: u64,

    /// Trending language qualifier ("all" for any language)
    #[arg(long, default_value = "all")]
    language: String,

    /// Trending creation window: daily, weekly or monthly
    #[arg(long, default_value = "weekly")]
    window: TrendingWindow,

    /// Topics to search (repeatable); defaults to ai-coding, ide-extension, dev-tools
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Drop candidates created more than this many days ago
    #[arg(long, default_value_t = 10)]
    max_age_days: u32,

    /// Minimum appraisal score to store and push
    #[arg(long, default_value_t = 50)]
    min_score: u8,

    /// Skip the README-only commit check
    #[arg(long)]
    no_activity_filter: bool,
}

impl MineArgs {
    fn mining_config(&self) -> MiningConfig {
        let defaults = MiningConfig::default();
        MiningConfig {
            language: self.language.clone(),
            window: self.window,
            topics: if self.topics.is_empty() {
                defaults.topics
            } else {
                self.topics.clone()
            },
            max_age_days: self.max_age_days,
            min_score: self.min_score,
            workers: self.concurrency,
            item_timeout: Duration::from_secs(self.appraisal_timeout),
            notify_delay: Duration::from_secs(self.notify_delay),
        }
    }

    /// Zero means a single cycle.
    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval.saturating_mul(60))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    goldminer_core::telemetry::init_tracing(cli.json, level);

    let store = SurrealRepoStore::from_env()
        .await
        .context("Failed to connect to Gold Miner database")?;
    let store: Arc<dyn RepoStore> = Arc::new(store);

    match cli.command {
        Commands::Mine(args) => cmd_mine(store, &args, cli.json).await,
        Commands::Search { query, limit } => cmd_search(store.as_ref(), &query, limit, cli.json).await,
        Commands::Pending => cmd_pending(store.as_ref(), cli.json).await,
    }
}

/// Run mining cycles until done or interrupted
async fn cmd_mine(store: Arc<dyn RepoStore>, args: &MineArgs, json: bool) -> Result<()> {
    let github = Arc::new(GithubClient::from_env().context("Failed to create GitHub client")?);
    let appraiser =
        GeminiAppraiser::from_env().context("GEMINI_API_KEY is required for mining")?;

    let mut service = MiningService::new(
        github.clone(),
        Arc::new(appraiser),
        store,
        args.mining_config(),
    );
    if !args.no_activity_filter {
        service = service.with_commit_inspector(github);
    }
    if let Some(notifier) = notifier_from_env()? {
        service = service.with_notifier(notifier);
    }

    let root = RunContext::background();
    let on_signal = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping after the current step");
            on_signal.cancel();
        }
    });

    let cycle_timeout = Duration::from_secs(args.cycle_timeout);
    let interval = args.interval();
    if !interval.is_zero() {
        info!(interval_min = args.interval, "scheduled mode, press Ctrl+C to stop");
    }

    loop {
        let ctx = root.with_timeout(cycle_timeout);
        match service.run_cycle(&ctx).await {
            Ok(report) => print_report(&report, json)?,
            Err(MiningError::Cancelled {
                cause: CancelCause::Cancelled,
                ..
            }) => {
                info!("mining stopped");
                return Ok(());
            }
            Err(e) if interval.is_zero() => return Err(e).context("Mining cycle did not finish"),
            Err(e) => warn!(error = %e, "mining cycle did not finish"),
        }

        if interval.is_zero() || root.sleep(interval).await.is_err() {
            return Ok(());
        }
    }
}

/// Feishu is optional: without a webhook, discoveries are stored only.
fn notifier_from_env() -> Result<Option<Arc<dyn Notifier>>> {
    match FeishuNotifier::from_env() {
        Ok(notifier) => Ok(Some(Arc::new(notifier))),
        Err(AdapterError::NotConfigured(var)) => {
            warn!(var, "no webhook configured, discoveries will be stored only");
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to create Feishu notifier"),
    }
}

async fn cmd_search(store: &dyn RepoStore, query: &str, limit: usize, json: bool) -> Result<()> {
    let query = query.trim();
    if query.is_empty() {
        anyhow::bail!("Search query must not be empty");
    }

    let hits = store
        .search(query, limit)
        .await
        .context("Failed to search stored repositories")?;
    print_repos(&hits, json, &format!("No stored repository matches '{}'", query))
}

async fn cmd_pending(store: &dyn RepoStore, json: bool) -> Result<()> {
    let pending = store
        .unnotified()
        .await
        .context("Failed to list pending repositories")?;
    print_repos(&pending, json, "Every stored repository has been pushed")
}

fn print_repos(repos: &[Repo], json: bool, empty: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(repos)?);
        return Ok(());
    }
    if repos.is_empty() {
        println!("{}", empty);
        return Ok(());
    }
    for repo in repos {
        println!("{}", render_repo(repo));
    }
    Ok(())
}

fn render_repo(repo: &Repo) -> String {
    let mut out = format!(
        "{} [{}/100] ★{}  {}\n    created {}",
        repo.name,
        repo.score,
        repo.stars,
        repo.url,
        repo.created_at.format("%Y-%m-%d")
    );
    if !repo.language.is_empty() {
        out.push_str(&format!(" · {}", repo.language));
    }
    if !repo.review.is_empty() {
        out.push_str(&format!("\n    {}", repo.review));
    }
    out.push('\n');
    out
}

fn print_report(report: &CycleReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    println!(
        "fetched {} · fresh {} · active {} · appraised {} · qualified {} · pushed {}{}",
        report.fetched,
        report.after_age_filter,
        report.after_activity_filter,
        report.analyzed,
        report.qualified,
        report.notified,
        if report.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}
