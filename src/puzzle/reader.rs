use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::chain::LedgerRpc;
use crate::error::FetchError;
use crate::mining::StalenessProbe;
use crate::puzzle::decode::{PuzzleState, decode_puzzle};
use crate::puzzle::discovery::ContractLocator;
use crate::retry::RetryPolicy;

/// 4-byte selector of the contract's puzzle getter
pub const PUZZLE_GETTER_SELECTOR: [u8; 4] = [0xa2, 0x2e, 0x40, 0x7a];

/// Reads the live puzzle, tracking contract redeployments on the way.
///
/// Owns the only mutable ledger-derived state of the miner: the cached
/// contract address and the last scanned block height.
pub struct PuzzleReader<R> {
    rpc: R,
    locator: ContractLocator,
    retry: RetryPolicy,
}

impl<R: LedgerRpc> PuzzleReader<R> {
    pub fn new(rpc: R, retry: RetryPolicy) -> Self {
        Self {
            rpc,
            locator: ContractLocator::new(),
            retry,
        }
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    pub fn contract_address(&self) -> Option<Address> {
        self.locator.address()
    }

    /// Height of the last discovery scan
    pub fn last_seen_height(&self) -> u64 {
        self.locator.high_water_mark()
    }

    /// One attempt: rescan for deployments, then call the getter and decode.
    pub async fn fetch(&mut self) -> Result<PuzzleState, FetchError> {
        if let Err(err) = self.locator.find_contract_address(&self.rpc).await {
            warn!(
                target: "miner::puzzle",
                error = %err,
                "Contract discovery interrupted, keeping cached address"
            );
        }

        let address = self.locator.address().ok_or(FetchError::NoContract)?;
        let raw = self
            .rpc
            .call_contract(address, &PUZZLE_GETTER_SELECTOR)
            .await?;
        let puzzle = decode_puzzle(&raw)?;

        debug!(
            target: "miner::puzzle",
            contract = %address,
            challenge = %puzzle.challenge,
            round = puzzle.round_id,
            difficulty = %puzzle.difficulty.difficulty(),
            granularity = %puzzle.granularity,
            price_feed = %puzzle.price_feed,
            "Puzzle state"
        );
        Ok(puzzle)
    }

    /// Up to `max_attempts` fetches; `None` once they are exhausted.
    pub async fn fetch_with_retry(&mut self) -> Option<PuzzleState> {
        let policy = self.retry;
        for attempt in 1..=policy.max_attempts {
            match self.fetch().await {
                Ok(puzzle) => return Some(puzzle),
                Err(err) => {
                    warn!(
                        target: "miner::puzzle",
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "Puzzle fetch failed"
                    );
                    if attempt < policy.max_attempts {
                        tokio::time::sleep(policy.delay_after(attempt)).await;
                    }
                }
            }
        }
        None
    }
}

#[async_trait]
impl<R: LedgerRpc> StalenessProbe for PuzzleReader<R> {
    /// Re-read the puzzle only when a new block has arrived since the last scan.
    async fn is_stale(&mut self, challenge: &B256) -> bool {
        let height = match self.rpc.block_height().await {
            Ok(height) => height,
            Err(err) => {
                warn!(target: "miner::puzzle", error = %err, "Staleness check skipped");
                return false;
            }
        };
        if height == self.locator.high_water_mark() {
            return false;
        }

        match self.fetch().await {
            Ok(puzzle) => puzzle.challenge != *challenge,
            Err(err) => {
                warn!(target: "miner::puzzle", error = %err, "Staleness check skipped");
                false
            }
        }
    }
}
