use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use puzzle_miner::chain::{ChainClient, DEFAULT_NETWORK_ID, DEFAULT_NODE_URL};
use puzzle_miner::identity::IdentitySet;
use puzzle_miner::mining::{DEFAULT_BATCH_SIZE, NonceSpace, SearchGauge, Solver, SolverConfig};
use puzzle_miner::oracle::PriceOracle;
use puzzle_miner::progress::{ProgressDisplay, format_number};
use puzzle_miner::retry::RetryPolicy;
use puzzle_miner::scheduler::{RoundScheduler, SchedulerPolicy};
use puzzle_miner::submitter::{CommandSubmitter, DEFAULT_SUBMITTER_COMMAND};

/// Puzzle Miner - solve on-chain proof-of-work rounds and submit bids
#[derive(Parser, Debug)]
#[command(name = "puzzle-miner")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ledger JSON-RPC endpoint
    #[arg(long, default_value = DEFAULT_NODE_URL)]
    node_url: String,

    /// Network id, sent as the JSON-RPC request id
    #[arg(long, default_value_t = DEFAULT_NETWORK_ID)]
    network_id: u64,

    /// Command that signs and broadcasts a solution; the request is appended as arguments
    #[arg(long, default_value = DEFAULT_SUBMITTER_COMMAND)]
    submitter: String,

    /// Number of CPU threads hashing each batch (0 = all cores)
    #[arg(short, long, default_value_t = 1)]
    threads: usize,

    /// Candidates between two staleness checks
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,

    /// Smallest nonce candidate
    #[arg(long, default_value_t = NonceSpace::DEFAULT.min())]
    nonce_min: u64,

    /// Largest nonce candidate
    #[arg(long, default_value_t = NonceSpace::DEFAULT.max())]
    nonce_max: u64,

    /// Seconds to wait before polling for the next round
    #[arg(long, default_value_t = 2)]
    poll_interval: u64,

    /// Extra seconds to wait when the round has not advanced yet
    #[arg(long, default_value_t = 10)]
    idle_backoff: u64,

    /// Consecutive failed puzzle fetches before logging an error
    #[arg(long, default_value_t = 5)]
    escalate_after: u32,

    /// Disable the hashrate spinner
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let nonce_space = NonceSpace::new(args.nonce_min, args.nonce_max)
        .context("--nonce-min must not exceed --nonce-max")?;
    let identities = IdentitySet::builtin().context("Invalid identity lists")?;
    let chain = ChainClient::new(&args.node_url, args.network_id)
        .context("Failed to build ledger client")?;
    let oracle = PriceOracle::new().context("Failed to build price-feed client")?;
    let submitter = CommandSubmitter::from_command_line(&args.submitter)
        .context("Submitter command is empty")?;

    let config = SolverConfig::new(args.threads)
        .with_batch_size(args.batch_size)
        .with_nonce_space(nonce_space);
    let threads = config.threads;
    let solver = Solver::new(config).context("Failed to build solver thread pool")?;

    println!("⛏️  Puzzle Miner");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🌐 Node:       {} (network {})", chain.url(), args.network_id);
    println!("📤 Submitter:  {}", args.submitter);
    println!("👥 Identities: {}", identities.len());
    println!(
        "🔢 Nonces:     {}..={}",
        nonce_space.min(),
        nonce_space.max()
    );
    println!("🧵 Threads:    {}", threads);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let cancel = solver.cancel_flag();
    let total_attempts = solver.attempts_counter();
    let gauge = solver.search_gauge();

    let cancel_clone = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\n⛔ Cancelled by user");
        cancel_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    let done = Arc::new(AtomicBool::new(false));
    let progress_handle = (!args.no_progress)
        .then(|| spawn_progress(done.clone(), total_attempts.clone(), gauge));

    let policy = SchedulerPolicy {
        poll_interval: Duration::from_secs(args.poll_interval),
        idle_backoff: Duration::from_secs(args.idle_backoff),
        fetch_retry: RetryPolicy::default(),
        escalate_after: args.escalate_after,
    };
    let mut scheduler =
        RoundScheduler::new(chain, oracle, submitter, solver, identities, policy);
    let summary = scheduler.run().await;

    done.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.join();
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Solutions:      {}", summary.solutions);
    println!("📤 Submissions:    {}", summary.submissions);
    println!("❌ Failed:         {}", summary.failed_submissions);
    println!("🔄 Stale restarts: {}", summary.stale_restarts);
    println!("🏁 Rounds:         {}", summary.rounds_completed);
    println!(
        "🔢 Attempts:       {}",
        format_number(total_attempts.load(Ordering::Relaxed))
    );

    Ok(())
}

fn spawn_progress(
    done: Arc<AtomicBool>,
    total_attempts: Arc<AtomicU64>,
    gauge: Arc<SearchGauge>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let progress = ProgressDisplay::new();
        while !done.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(100));
            progress.update(
                total_attempts.load(Ordering::Relaxed),
                gauge.attempts(),
                gauge.expected(),
            );
        }
        progress.finish(total_attempts.load(Ordering::Relaxed));
    })
}
