//! Puzzle blob decoding.
//!
//! The getter returns an ABI-encoded tuple. The head is a run of 32-byte
//! slots; the price-feed descriptor is a dynamic string, so its head slot
//! holds an offset to a length word followed by the padded bytes.

use alloy_primitives::{B256, U256};

use crate::error::MalformedPuzzle;
use crate::target::DifficultyTarget;

pub const SLOT: usize = 32;

const CHALLENGE_SLOT: usize = 0;
const ROUND_ID_SLOT: usize = 1;
const DIFFICULTY_SLOT: usize = 2;
const DESCRIPTOR_OFFSET_SLOT: usize = 3;
const GRANULARITY_SLOT: usize = 4;

/// Head slots plus the descriptor's length word
pub const MIN_PUZZLE_LEN: usize = (GRANULARITY_SLOT + 1) * SLOT + SLOT;

/// Puzzle parameters published by the contract for the current round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleState {
    pub challenge: B256,
    pub round_id: u64,
    pub difficulty: DifficultyTarget,
    /// Price-feed descriptor, e.g. `json(https://host/ticker).price`
    pub price_feed: String,
    pub granularity: U256,
}

impl PuzzleState {
    /// True when `self` belongs to a later round than `previous`
    pub fn starts_new_round_after(&self, previous: &PuzzleState) -> bool {
        self.round_id != 0
            && (self.round_id != previous.round_id || self.challenge != previous.challenge)
    }
}

/// Fixed-offset reader over 32-byte ABI words
struct SlotReader<'a> {
    buf: &'a [u8],
}

impl<'a> SlotReader<'a> {
    fn new(buf: &'a [u8]) -> Result<Self, MalformedPuzzle> {
        if buf.len() < MIN_PUZZLE_LEN {
            return Err(MalformedPuzzle::Truncated {
                len: buf.len(),
                min: MIN_PUZZLE_LEN,
            });
        }
        Ok(Self { buf })
    }

    fn word(&self, slot: usize) -> [u8; SLOT] {
        let start = slot * SLOT;
        let mut word = [0u8; SLOT];
        word.copy_from_slice(&self.buf[start..start + SLOT]);
        word
    }

    fn uint(&self, slot: usize) -> U256 {
        U256::from_be_bytes(self.word(slot))
    }

    fn u64(&self, slot: usize, field: &'static str) -> Result<u64, MalformedPuzzle> {
        narrow(self.uint(slot)).ok_or(MalformedPuzzle::Overflow { field })
    }

    /// Follow the offset in `slot` to a length-prefixed byte string
    fn dynamic_bytes(&self, slot: usize) -> Result<&'a [u8], MalformedPuzzle> {
        let len = self.buf.len();
        let out_of_bounds = |offset: usize, length: usize| MalformedPuzzle::DescriptorOutOfBounds {
            offset,
            length,
            len,
        };

        let offset = narrow(self.uint(slot))
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(out_of_bounds(usize::MAX, 0))?;
        let data_start = offset
            .checked_add(SLOT)
            .filter(|end| *end <= len)
            .ok_or(out_of_bounds(offset, 0))?;

        let mut length_word = [0u8; SLOT];
        length_word.copy_from_slice(&self.buf[offset..data_start]);
        let length = narrow(U256::from_be_bytes(length_word))
            .and_then(|length| usize::try_from(length).ok())
            .ok_or(out_of_bounds(offset, usize::MAX))?;

        let data_end = data_start
            .checked_add(length)
            .filter(|end| *end <= len)
            .ok_or(out_of_bounds(offset, length))?;

        Ok(&self.buf[data_start..data_end])
    }
}

fn narrow(value: U256) -> Option<u64> {
    (value.bit_len() <= 64).then(|| value.as_limbs()[0])
}

/// Decode the raw `0x`-prefixed hex returned by the puzzle getter.
pub fn decode_puzzle(raw_hex: &str) -> Result<PuzzleState, MalformedPuzzle> {
    let trimmed = raw_hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits)?;
    decode_puzzle_bytes(&bytes)
}

pub fn decode_puzzle_bytes(bytes: &[u8]) -> Result<PuzzleState, MalformedPuzzle> {
    let reader = SlotReader::new(bytes)?;

    let challenge = B256::from(reader.word(CHALLENGE_SLOT));
    let round_id = reader.u64(ROUND_ID_SLOT, "round id")?;
    let difficulty =
        DifficultyTarget::new(reader.uint(DIFFICULTY_SLOT)).ok_or(MalformedPuzzle::ZeroDifficulty)?;
    let granularity = reader.uint(GRANULARITY_SLOT);

    let descriptor = reader.dynamic_bytes(DESCRIPTOR_OFFSET_SLOT)?;
    let descriptor =
        std::str::from_utf8(descriptor).map_err(|_| MalformedPuzzle::InvalidDescriptor)?;
    let price_feed = descriptor
        .trim_end_matches('\0')
        .trim()
        .trim_matches('\'')
        .to_string();

    Ok(PuzzleState {
        challenge,
        round_id,
        difficulty,
        price_feed,
        granularity,
    })
}
