// Puzzle mining client library
pub mod chain;
pub mod error;
pub mod identity;
pub mod mining;
pub mod oracle;
pub mod progress;
pub mod puzzle;
pub mod retry;
pub mod scheduler;
pub mod submitter;
pub mod target;

#[cfg(test)]
mod testing;

// Re-export for convenience
pub use chain::{ChainClient, LedgerRpc};
pub use identity::{Identity, IdentitySet};
pub use mining::{SearchOutcome, Solver, SolverConfig};
pub use oracle::{PriceOracle, Quote, QuoteSource};
pub use puzzle::{PuzzleReader, PuzzleState};
pub use scheduler::{RoundScheduler, RoundState, RunSummary, SchedulerPolicy};
pub use submitter::{CommandSubmitter, SubmissionRequest, Submitter};
pub use target::DifficultyTarget;
