//! Error types for the miner's remote collaborators and decoders.

use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// The ledger node could not answer a request.
#[derive(Debug, Error)]
pub enum ChainUnavailable {
    /// The request never completed (connect, timeout, body read).
    #[error("ledger request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The node answered with a non-success HTTP status.
    #[error("ledger returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The node answered with a JSON-RPC error object.
    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The response did not have the expected shape.
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// The puzzle blob returned by the contract could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPuzzle {
    #[error("puzzle payload is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("puzzle payload is {len} bytes, need at least {min}")]
    Truncated { len: usize, min: usize },

    #[error(
        "price-feed descriptor at offset {offset} ({length} bytes) runs past the {len}-byte payload"
    )]
    DescriptorOutOfBounds {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("puzzle difficulty is zero")]
    ZeroDifficulty,

    #[error("{field} does not fit in 64 bits")]
    Overflow { field: &'static str },

    #[error("price-feed descriptor is not valid UTF-8")]
    InvalidDescriptor,
}

/// A single attempt to read the current puzzle failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Chain(#[from] ChainUnavailable),

    #[error(transparent)]
    Malformed(#[from] MalformedPuzzle),

    #[error("no puzzle contract deployment has been found yet")]
    NoContract,
}

/// The price feed could not produce a quote.
#[derive(Debug, Error)]
pub enum PriceFeedUnavailable {
    #[error("price-feed descriptor {0:?} does not name an endpoint")]
    InvalidDescriptor(String),

    #[error("price-feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("price feed returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("price-feed body is not JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field {0:?} is not present in the price-feed body")]
    MissingField(String),

    #[error("price-feed value {0:?} is not a non-negative number")]
    NotANumber(String),
}

/// The external submitter did not report success.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("failed to launch submitter {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("submitter did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("submitter exited with {0}")]
    Failed(ExitStatus),
}

/// The fixed identity lists are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("{addresses} public addresses but {credentials} credentials")]
    LengthMismatch { addresses: usize, credentials: usize },

    #[error("expected {expected} identities, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("identity {index}: {value:?} is not a valid address")]
    InvalidAddress { index: usize, value: String },

    #[error("identity {index}: credential is empty")]
    EmptyCredential { index: usize },
}
