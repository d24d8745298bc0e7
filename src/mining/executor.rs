//! Hash search over nonce candidates.
//!
//! Candidates are hashed in batches on a rayon pool, each batch handed off
//! through `spawn_blocking` so the async runtime's workers stay free. Between
//! batches the control task awaits the staleness probe, so a search never
//! outlives the challenge it was started for by more than one batch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use rand::Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::mining::config::{NonceSpace, SolverConfig};
use crate::mining::hash::puzzle_hash;
use crate::target::DifficultyTarget;

/// Produces the nonce tried at position `index` of batch `batch`
pub trait CandidateSource: Send + Sync + 'static {
    fn candidate(&self, batch: u64, index: u64) -> u64;
}

impl<F> CandidateSource for F
where
    F: Fn(u64, u64) -> u64 + Send + Sync + 'static,
{
    fn candidate(&self, batch: u64, index: u64) -> u64 {
        self(batch, index)
    }
}

/// Uniform draws from a [`NonceSpace`]
#[derive(Debug, Clone, Copy)]
pub struct RandomCandidates {
    space: NonceSpace,
}

impl RandomCandidates {
    pub fn new(space: NonceSpace) -> Self {
        Self { space }
    }
}

impl CandidateSource for RandomCandidates {
    fn candidate(&self, _batch: u64, _index: u64) -> u64 {
        rand::thread_rng().gen_range(self.space.range())
    }
}

/// Checkpoint consulted between batches
#[async_trait]
pub trait StalenessProbe: Send {
    /// True when the live puzzle no longer carries `challenge`
    async fn is_stale(&mut self, challenge: &B256) -> bool;
}

/// What to search for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchJob {
    pub challenge: B256,
    pub address: Address,
    pub target: DifficultyTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub hash: B256,
    /// Candidates tried by this search, including the winner
    pub attempts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Solution),
    /// The challenge changed while searching
    Stale,
    Cancelled,
}

enum BatchHit {
    Found { index: u64, nonce: u64, hash: [u8; 32] },
    Cancelled,
}

/// Progress of the search in flight, read by the hashrate display
#[derive(Debug, Default)]
pub struct SearchGauge {
    attempts: AtomicU64,
    expected: AtomicU64,
}

impl SearchGauge {
    fn start(&self, target: &DifficultyTarget) {
        self.attempts.store(0, Ordering::Relaxed);
        self.expected
            .store(target.estimated_attempts(), Ordering::Relaxed);
    }

    fn advance(&self, tried: u64) {
        self.attempts.fetch_add(tried, Ordering::Relaxed);
    }

    /// Candidates tried since the current search started
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Average candidates per solution at the current difficulty, 0 before any search
    pub fn expected(&self) -> u64 {
        self.expected.load(Ordering::Relaxed)
    }
}

/// The part of the solver that runs on the blocking pool
struct BatchRunner<C> {
    candidates: C,
    pool: ThreadPool,
    cancel: Arc<AtomicBool>,
}

impl<C: CandidateSource> BatchRunner<C> {
    fn run(&self, job: &SearchJob, batch: u64, batch_size: u64) -> Option<BatchHit> {
        let cancel = &self.cancel;
        let candidates = &self.candidates;

        self.pool.install(|| {
            (0..batch_size).into_par_iter().find_map_any(|index| {
                if cancel.load(Ordering::Relaxed) {
                    return Some(BatchHit::Cancelled);
                }
                let nonce = candidates.candidate(batch, index);
                let hash = puzzle_hash(&job.challenge, &job.address, nonce);
                job.target
                    .matches(&hash)
                    .then_some(BatchHit::Found { index, nonce, hash })
            })
        })
    }
}

pub struct Solver<C = RandomCandidates> {
    config: SolverConfig,
    runner: Arc<BatchRunner<C>>,
    total_attempts: Arc<AtomicU64>,
    gauge: Arc<SearchGauge>,
    cancel: Arc<AtomicBool>,
}

impl Solver<RandomCandidates> {
    pub fn new(config: SolverConfig) -> Result<Self, ThreadPoolBuildError> {
        let candidates = RandomCandidates::new(config.nonce_space);
        Self::with_candidates(config, candidates)
    }
}

impl<C: CandidateSource> Solver<C> {
    pub fn with_candidates(
        config: SolverConfig,
        candidates: C,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads.max(1))
            .thread_name(|i| format!("solver-{i}"))
            .build()?;
        let cancel = Arc::new(AtomicBool::new(false));

        Ok(Self {
            config,
            runner: Arc::new(BatchRunner {
                candidates,
                pool,
                cancel: cancel.clone(),
            }),
            total_attempts: Arc::new(AtomicU64::new(0)),
            gauge: Arc::new(SearchGauge::default()),
            cancel,
        })
    }

    /// Shared flag; once set every search returns [`SearchOutcome::Cancelled`]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Candidates hashed across all searches, advanced once per batch
    pub fn attempts_counter(&self) -> Arc<AtomicU64> {
        self.total_attempts.clone()
    }

    pub fn search_gauge(&self) -> Arc<SearchGauge> {
        self.gauge.clone()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    fn record_attempts(&self, tried: u64) {
        self.total_attempts.fetch_add(tried, Ordering::Relaxed);
        self.gauge.advance(tried);
    }

    /// Search until a winning nonce is found, the probe reports the
    /// challenge stale, or the cancel flag is raised.
    pub async fn search<P: StalenessProbe + ?Sized>(
        &self,
        job: &SearchJob,
        probe: &mut P,
    ) -> SearchOutcome {
        let batch_size = self.config.batch_size.max(1);
        debug!(
            target: "miner::solver",
            challenge = %job.challenge,
            address = %job.address,
            difficulty = %job.target.difficulty(),
            threads = self.config.threads,
            "Search started"
        );
        self.gauge.start(&job.target);

        let mut attempts = 0u64;
        let mut batch = 0u64;
        loop {
            if self.is_cancelled() {
                return SearchOutcome::Cancelled;
            }

            match self.run_batch(*job, batch, batch_size).await {
                Some(BatchHit::Found { index, nonce, hash }) => {
                    let tried = index + 1;
                    self.record_attempts(tried);
                    let solution = Solution {
                        nonce,
                        hash: B256::from(hash),
                        attempts: attempts + tried,
                    };
                    info!(
                        target: "miner::solver",
                        nonce,
                        hash = %solution.hash,
                        attempts = solution.attempts,
                        "Solution found"
                    );
                    return SearchOutcome::Found(solution);
                }
                Some(BatchHit::Cancelled) => return SearchOutcome::Cancelled,
                None => {
                    attempts += batch_size;
                    self.record_attempts(batch_size);
                }
            }

            if probe.is_stale(&job.challenge).await {
                info!(
                    target: "miner::solver",
                    challenge = %job.challenge,
                    attempts,
                    "Challenge changed, abandoning search"
                );
                return SearchOutcome::Stale;
            }
            batch += 1;
        }
    }

    async fn run_batch(&self, job: SearchJob, batch: u64, batch_size: u64) -> Option<BatchHit> {
        let runner = Arc::clone(&self.runner);
        match tokio::task::spawn_blocking(move || runner.run(&job, batch, batch_size)).await {
            Ok(hit) => hit,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => {
                warn!(target: "miner::solver", error = %err, "Batch did not run");
                Some(BatchHit::Cancelled)
            }
        }
    }
}
