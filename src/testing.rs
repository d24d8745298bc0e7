//! In-memory doubles for the remote collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;

use crate::chain::{LedgerRpc, LogRecord, ReceiptRecord, TransactionRecord};
use crate::error::{ChainUnavailable, SubmitError};
use crate::oracle::{Quote, QuoteSource};
use crate::puzzle::DEPLOYMENT_MARKER;
use crate::submitter::{SubmissionRequest, Submitter};

/// Receipt of a puzzle deployment: a created contract with the marker on the seventh log
pub(crate) fn deployment_receipt(contract: Address) -> ReceiptRecord {
    let mut logs: Vec<LogRecord> = (0..6u8)
        .map(|i| LogRecord {
            address: Some(contract),
            topics: vec![B256::repeat_byte(i + 1)],
        })
        .collect();
    logs.push(LogRecord {
        address: Some(contract),
        topics: vec![DEPLOYMENT_MARKER],
    });
    ReceiptRecord {
        contract_address: Some(contract),
        logs,
    }
}

fn tx_hash_for(height: u64) -> B256 {
    B256::left_padding_from(&height.to_be_bytes())
}

struct Rotation {
    after_height_queries: usize,
    height: u64,
    puzzle_raw: String,
}

#[derive(Default)]
struct LedgerState {
    height: u64,
    receipts: HashMap<u64, ReceiptRecord>,
    puzzle_raw: Option<String>,
    fail_next: usize,
    broken_blocks: HashSet<u64>,
    height_queries: usize,
    transaction_lookups: usize,
    getter_calls: usize,
    last_call_target: Option<Address>,
    last_call_data: Option<Vec<u8>>,
    rotation: Option<Rotation>,
}

impl LedgerState {
    fn injected_failure(&mut self) -> Result<(), ChainUnavailable> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ChainUnavailable::Malformed("injected failure".to_string()));
        }
        Ok(())
    }
}

/// Scriptable ledger. Every block holds one transaction whose hash encodes the height.
pub(crate) struct FakeLedger {
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub(crate) fn new(height: u64) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                height,
                ..LedgerState::default()
            }),
        }
    }

    pub(crate) fn insert_receipt(&self, height: u64, receipt: ReceiptRecord) {
        self.state.lock().unwrap().receipts.insert(height, receipt);
    }

    pub(crate) fn set_puzzle(&self, raw: String) {
        self.state.lock().unwrap().puzzle_raw = Some(raw);
    }

    pub(crate) fn set_height(&self, height: u64) {
        self.state.lock().unwrap().height = height;
    }

    /// Fail this many upcoming calls of any kind
    pub(crate) fn fail_next_calls(&self, count: usize) {
        self.state.lock().unwrap().fail_next = count;
    }

    /// Every transaction lookup in this block errors
    pub(crate) fn break_block(&self, height: u64) {
        self.state.lock().unwrap().broken_blocks.insert(height);
    }

    /// Move to `height` and publish `raw` once the tip has been queried
    /// `after_height_queries` more times.
    pub(crate) fn schedule_rotation(
        &self,
        after_height_queries: usize,
        height: u64,
        raw: String,
    ) {
        let mut state = self.state.lock().unwrap();
        let after = state.height_queries + after_height_queries;
        state.rotation = Some(Rotation {
            after_height_queries: after,
            height,
            puzzle_raw: raw,
        });
    }

    pub(crate) fn height_queries(&self) -> usize {
        self.state.lock().unwrap().height_queries
    }

    pub(crate) fn transaction_lookups(&self) -> usize {
        self.state.lock().unwrap().transaction_lookups
    }

    pub(crate) fn getter_calls(&self) -> usize {
        self.state.lock().unwrap().getter_calls
    }

    pub(crate) fn last_call_target(&self) -> Option<Address> {
        self.state.lock().unwrap().last_call_target
    }

    pub(crate) fn last_call_data(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().last_call_data.clone()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn block_height(&self) -> Result<u64, ChainUnavailable> {
        let mut state = self.state.lock().unwrap();
        state.height_queries += 1;
        if state
            .rotation
            .as_ref()
            .is_some_and(|r| state.height_queries >= r.after_height_queries)
        {
            if let Some(rotation) = state.rotation.take() {
                state.height = rotation.height;
                state.puzzle_raw = Some(rotation.puzzle_raw);
            }
        }
        state.injected_failure()?;
        Ok(state.height)
    }

    async fn transaction_at(
        &self,
        height: u64,
        index: u64,
    ) -> Result<Option<TransactionRecord>, ChainUnavailable> {
        let mut state = self.state.lock().unwrap();
        state.transaction_lookups += 1;
        state.injected_failure()?;
        if state.broken_blocks.contains(&height) {
            return Err(ChainUnavailable::Malformed(format!("block {height} unreadable")));
        }
        if index != 0 || height > state.height {
            return Ok(None);
        }
        Ok(Some(TransactionRecord {
            hash: tx_hash_for(height),
            from: None,
            to: None,
        }))
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptRecord>, ChainUnavailable> {
        let mut state = self.state.lock().unwrap();
        state.injected_failure()?;
        let height = state
            .receipts
            .keys()
            .copied()
            .find(|height| tx_hash_for(*height) == tx_hash);
        Ok(height.and_then(|height| state.receipts.get(&height).cloned()))
    }

    async fn call_contract(&self, to: Address, data: &[u8]) -> Result<String, ChainUnavailable> {
        let mut state = self.state.lock().unwrap();
        state.getter_calls += 1;
        state.last_call_target = Some(to);
        state.last_call_data = Some(data.to_vec());
        state.injected_failure()?;
        Ok(state.puzzle_raw.clone().unwrap_or_else(|| "0x".to_string()))
    }
}

/// Fixed quote regardless of the descriptor
pub(crate) struct StaticQuotes {
    quote: Quote,
    descriptors: Mutex<Vec<String>>,
}

impl StaticQuotes {
    pub(crate) fn new(quote: Quote) -> Self {
        Self {
            quote,
            descriptors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn descriptors(&self) -> Vec<String> {
        self.descriptors.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for StaticQuotes {
    async fn fetch_quote(&self, descriptor: &str) -> Quote {
        self.descriptors
            .lock()
            .unwrap()
            .push(descriptor.to_string());
        self.quote
    }
}

/// Records every request; optionally reports failure
#[derive(Default)]
pub(crate) struct RecordingSubmitter {
    requests: Mutex<Vec<SubmissionRequest>>,
    fail: bool,
}

impl RecordingSubmitter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Submitter for RecordingSubmitter {
    async fn submit(&self, request: &SubmissionRequest) -> Result<(), SubmitError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(SubmitError::TimedOut(std::time::Duration::ZERO));
        }
        Ok(())
    }
}
