//! Puzzle state: decoding the contract's getter and tracking the contract.

pub mod decode;
pub mod discovery;
pub mod reader;

pub use decode::{PuzzleState, decode_puzzle, decode_puzzle_bytes};
pub use discovery::{ContractLocator, DEPLOYMENT_MARKER};
pub use reader::{PUZZLE_GETTER_SELECTOR, PuzzleReader};

#[cfg(test)]
pub(crate) use decode::fixtures;
