//! Locating the puzzle contract.
//!
//! A deployment is the first transaction of a block whose receipt created a
//! contract and whose seventh log carries the deployment marker topic. The
//! newest such deployment is the live contract.

use alloy_primitives::{Address, B256, b256};
use tracing::{debug, info, warn};

use crate::chain::{LedgerRpc, ReceiptRecord};
use crate::error::ChainUnavailable;

pub const DEPLOYMENT_MARKER: B256 =
    b256!("c2d1449eb0b6547aa426e09d9942a77fa4fc8cd3296305b3163e22452e0bcb8d");

const MARKER_LOG_INDEX: usize = 6;

impl ReceiptRecord {
    /// Address of the puzzle contract this receipt deployed, if it is one
    pub fn deployed_puzzle_contract(&self) -> Option<Address> {
        let address = self.contract_address?;
        let log = self.logs.get(MARKER_LOG_INDEX)?;
        (log.topics.first() == Some(&DEPLOYMENT_MARKER)).then_some(address)
    }
}

/// Cached contract address plus the height up to which blocks were scanned.
#[derive(Debug, Clone, Default)]
pub struct ContractLocator {
    address: Option<Address>,
    high_water_mark: u64,
}

impl ContractLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }

    /// Scan from the tip down to (but excluding) the high-water mark.
    ///
    /// Returns the newly found deployment, or `None` when no new deployment
    /// exists, in which case the cached address is kept. Either way the
    /// high-water mark moves to the tip. A block that cannot be read is logged
    /// and skipped; only a failed tip query aborts the scan, leaving the mark
    /// untouched.
    pub async fn find_contract_address<R: LedgerRpc + ?Sized>(
        &mut self,
        rpc: &R,
    ) -> Result<Option<Address>, ChainUnavailable> {
        let tip = rpc.block_height().await?;

        let mut height = tip;
        while height > self.high_water_mark {
            match deployment_in_block(rpc, height).await {
                Ok(Some(address)) => {
                    info!(
                        target: "miner::puzzle",
                        %address,
                        block = height,
                        "Found puzzle contract deployment"
                    );
                    self.address = Some(address);
                    self.high_water_mark = tip;
                    return Ok(Some(address));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        target: "miner::puzzle",
                        block = height,
                        error = %err,
                        "Skipping unreadable block"
                    );
                }
            }
            height -= 1;
        }

        if tip > self.high_water_mark {
            debug!(
                target: "miner::puzzle",
                from = tip,
                to = self.high_water_mark,
                "No new deployment"
            );
        }
        self.high_water_mark = tip;
        Ok(None)
    }
}

async fn deployment_in_block<R: LedgerRpc + ?Sized>(
    rpc: &R,
    height: u64,
) -> Result<Option<Address>, ChainUnavailable> {
    let Some(tx) = rpc.transaction_at(height, 0).await? else {
        return Ok(None);
    };
    let Some(receipt) = rpc.receipt(tx.hash).await? else {
        return Ok(None);
    };
    Ok(receipt.deployed_puzzle_contract())
}
