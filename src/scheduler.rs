//! Round scheduler: drives every identity through mine, bid and submit,
//! then waits for the next round.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use alloy_primitives::U256;
use tracing::{debug, error, info, warn};

use crate::chain::LedgerRpc;
use crate::identity::IdentitySet;
use crate::mining::{CandidateSource, RandomCandidates, SearchJob, SearchOutcome, Solution, Solver};
use crate::oracle::QuoteSource;
use crate::puzzle::{PuzzleReader, PuzzleState};
use crate::retry::{FailureStreak, RetryPolicy, bounded_exponential_backoff};
use crate::submitter::{SubmissionRequest, Submitter};

/// Quote discount per identity index
pub const BID_STEP: u64 = 10;

/// `max(0, quote - index * BID_STEP) * granularity`
pub fn bid_value(quote: u64, index: usize, granularity: U256) -> U256 {
    let discount = BID_STEP.saturating_mul(index as u64);
    U256::from(quote.saturating_sub(discount)).saturating_mul(granularity)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundState {
    /// Needs a puzzle before mining can start
    Idle,
    Mining { identity: usize },
    Submitting { identity: usize, solution: Solution },
    AwaitingNextRound,
    Stopped,
}

/// Timing knobs of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerPolicy {
    /// Pause before each poll while awaiting the next round
    pub poll_interval: Duration,
    /// Extra pause after a poll that found the same round
    pub idle_backoff: Duration,
    /// Attempts per puzzle fetch
    pub fetch_retry: RetryPolicy,
    /// Consecutive failed fetches before logging at error level (0 = never)
    pub escalate_after: u32,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            idle_backoff: Duration::from_secs(10),
            fetch_retry: RetryPolicy::default(),
            escalate_after: 5,
        }
    }
}

impl SchedulerPolicy {
    /// No pauses anywhere
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            idle_backoff: Duration::ZERO,
            fetch_retry: RetryPolicy::immediate(4),
            escalate_after: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub solutions: u64,
    pub submissions: u64,
    pub failed_submissions: u64,
    pub stale_restarts: u64,
    pub rounds_completed: u64,
}

pub struct RoundScheduler<R, Q, S, C = RandomCandidates> {
    reader: PuzzleReader<R>,
    oracle: Q,
    submitter: S,
    solver: Solver<C>,
    identities: IdentitySet,
    policy: SchedulerPolicy,
    state: RoundState,
    puzzle: Option<PuzzleState>,
    fetch_failures: FailureStreak,
    summary: RunSummary,
}

impl<R, Q, S, C> RoundScheduler<R, Q, S, C>
where
    R: LedgerRpc,
    Q: QuoteSource,
    S: Submitter,
    C: CandidateSource,
{
    pub fn new(
        rpc: R,
        oracle: Q,
        submitter: S,
        solver: Solver<C>,
        identities: IdentitySet,
        policy: SchedulerPolicy,
    ) -> Self {
        Self {
            reader: PuzzleReader::new(rpc, policy.fetch_retry),
            oracle,
            submitter,
            solver,
            identities,
            policy,
            state: RoundState::Idle,
            puzzle: None,
            fetch_failures: FailureStreak::new(policy.escalate_after),
            summary: RunSummary::default(),
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn puzzle(&self) -> Option<&PuzzleState> {
        self.puzzle.as_ref()
    }

    pub fn reader(&self) -> &PuzzleReader<R> {
        &self.reader
    }

    pub fn oracle(&self) -> &Q {
        &self.oracle
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    pub fn solver(&self) -> &Solver<C> {
        &self.solver
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Consecutive puzzle fetches that came back empty
    pub fn fetch_failures(&self) -> u32 {
        self.fetch_failures.count()
    }

    fn is_cancelled(&self) -> bool {
        self.solver.cancel_flag().load(Ordering::Relaxed)
    }

    /// Loop until cancelled
    pub async fn run(&mut self) -> RunSummary {
        while self.state != RoundState::Stopped {
            self.step().await;
        }
        info!(target: "miner::scheduler", summary = ?self.summary, "Scheduler stopped");
        self.summary.clone()
    }

    /// Perform one state transition and return the new state
    pub async fn step(&mut self) -> &RoundState {
        if self.is_cancelled() {
            self.state = RoundState::Stopped;
            return &self.state;
        }

        let next = match std::mem::replace(&mut self.state, RoundState::Idle) {
            RoundState::Idle => self.start_round().await,
            RoundState::Mining { identity } => self.mine(identity).await,
            RoundState::Submitting { identity, solution } => {
                self.submit(identity, solution).await;
                if identity + 1 < self.identities.len() {
                    RoundState::Mining {
                        identity: identity + 1,
                    }
                } else {
                    info!(
                        target: "miner::scheduler",
                        identities = self.identities.len(),
                        "All identities submitted, awaiting next round"
                    );
                    RoundState::AwaitingNextRound
                }
            }
            RoundState::AwaitingNextRound => self.await_next_round().await,
            RoundState::Stopped => RoundState::Stopped,
        };

        self.state = next;
        &self.state
    }

    async fn start_round(&mut self) -> RoundState {
        if self.puzzle.is_none() {
            match self.fetch_puzzle().await {
                Some(puzzle) => self.puzzle = Some(puzzle),
                None => {
                    let streak = self.fetch_failures.count();
                    let delay = bounded_exponential_backoff(
                        self.policy.poll_interval,
                        streak.saturating_sub(1),
                        self.policy.idle_backoff,
                    );
                    self.pause(delay).await;
                    return RoundState::Idle;
                }
            }
        }

        if let Some(puzzle) = &self.puzzle {
            info!(
                target: "miner::scheduler",
                round = puzzle.round_id,
                challenge = %puzzle.challenge,
                difficulty = %puzzle.difficulty.difficulty(),
                "Starting round"
            );
        }
        RoundState::Mining { identity: 0 }
    }

    async fn mine(&mut self, index: usize) -> RoundState {
        let (Some(puzzle), Some(identity)) = (&self.puzzle, self.identities.get(index)) else {
            return RoundState::Idle;
        };
        let job = SearchJob {
            challenge: puzzle.challenge,
            address: identity.address,
            target: puzzle.difficulty,
        };
        info!(
            target: "miner::scheduler",
            identity = index,
            address = %identity.address,
            round = puzzle.round_id,
            "Mining"
        );

        match self.solver.search(&job, &mut self.reader).await {
            SearchOutcome::Found(solution) => {
                self.summary.solutions += 1;
                RoundState::Submitting {
                    identity: index,
                    solution,
                }
            }
            SearchOutcome::Stale => {
                self.summary.stale_restarts += 1;
                self.puzzle = None;
                warn!(
                    target: "miner::scheduler",
                    identity = index,
                    "Puzzle changed mid-search, restarting at the first identity"
                );
                RoundState::Idle
            }
            SearchOutcome::Cancelled => RoundState::Stopped,
        }
    }

    async fn submit(&mut self, index: usize, solution: Solution) {
        let (Some(puzzle), Some(identity)) = (&self.puzzle, self.identities.get(index)) else {
            return;
        };
        let Some(contract_address) = self.reader.contract_address() else {
            warn!(target: "miner::scheduler", "No contract address, dropping solution");
            return;
        };

        let quote = self.oracle.fetch_quote(&puzzle.price_feed).await;
        let bid = bid_value(quote.value(), index, puzzle.granularity);
        if quote.is_degraded() {
            warn!(
                target: "miner::scheduler",
                identity = index,
                "Bidding with a zero quote"
            );
        }

        let request = SubmissionRequest {
            nonce: solution.nonce,
            round_id: puzzle.round_id,
            bid_value: bid,
            contract_address,
            identity: identity.clone(),
        };
        info!(
            target: "miner::scheduler",
            identity = index,
            nonce = request.nonce,
            round = request.round_id,
            bid = %request.bid_value,
            "Submitting"
        );

        match self.submitter.submit(&request).await {
            Ok(()) => self.summary.submissions += 1,
            Err(err) => {
                self.summary.failed_submissions += 1;
                warn!(
                    target: "miner::scheduler",
                    identity = index,
                    error = %err,
                    "Submission failed"
                );
            }
        }
    }

    async fn await_next_round(&mut self) -> RoundState {
        self.pause(self.policy.poll_interval).await;

        let Some(fresh) = self.fetch_puzzle().await else {
            return RoundState::AwaitingNextRound;
        };

        let advanced = match &self.puzzle {
            Some(mined) => fresh.starts_new_round_after(mined),
            None => true,
        };
        if advanced {
            info!(
                target: "miner::scheduler",
                round = fresh.round_id,
                "Round advanced"
            );
            self.summary.rounds_completed += 1;
            self.puzzle = Some(fresh);
            return RoundState::Idle;
        }

        debug!(target: "miner::scheduler", round = fresh.round_id, "Round unchanged");
        self.pause(self.policy.idle_backoff).await;
        RoundState::AwaitingNextRound
    }

    async fn fetch_puzzle(&mut self) -> Option<PuzzleState> {
        match self.reader.fetch_with_retry().await {
            Some(puzzle) => {
                let streak = self.fetch_failures.reset();
                if streak > 0 {
                    info!(
                        target: "miner::scheduler",
                        failures = streak,
                        "Puzzle fetch recovered"
                    );
                }
                Some(puzzle)
            }
            None => {
                if self.fetch_failures.record_failure() {
                    error!(
                        target: "miner::scheduler",
                        failures = self.fetch_failures.count(),
                        "Puzzle state unavailable"
                    );
                } else {
                    warn!(
                        target: "miner::scheduler",
                        failures = self.fetch_failures.count(),
                        "No puzzle state, will retry"
                    );
                }
                None
            }
        }
    }

    /// Sleep, waking early when cancelled
    async fn pause(&self, duration: Duration) {
        pause_unless_cancelled(duration, &self.solver.cancel_flag()).await;
    }
}

async fn pause_unless_cancelled(duration: Duration, cancel: &Arc<AtomicBool>) {
    const TICK: Duration = Duration::from_millis(100);
    let mut remaining = duration;
    while !remaining.is_zero() && !cancel.load(Ordering::Relaxed) {
        let nap = remaining.min(TICK);
        tokio::time::sleep(nap).await;
        remaining -= nap;
    }
}
