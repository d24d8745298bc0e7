//! Proof-of-work search: configuration, the hash chain, and the solver.

pub mod config;
pub mod executor;
pub mod hash;

pub use config::{DEFAULT_BATCH_SIZE, NonceSpace, SolverConfig};
pub use executor::{
    CandidateSource, RandomCandidates, SearchGauge, SearchJob, SearchOutcome, Solution, Solver,
    StalenessProbe,
};
pub use hash::{keccak256, preimage, puzzle_hash};
