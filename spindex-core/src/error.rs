use bitcoin::BlockHash;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    // Tweak derivation
    #[error("transaction {0} has no non-coinbase inputs")]
    NoInputs(bitcoin::Txid),

    // Block ingestion
    #[error("no header inventory entry for height {0}, header index is incomplete")]
    MissingHeaderInv(u32),
    #[error("block {hash} reported height {got}, expected {expected}")]
    HeightMismatch {
        hash: BlockHash,
        expected: u32,
        got: u32,
    },
    #[error("node returned {got} headers for {requested} requested heights")]
    HeaderCount { requested: usize, got: usize },
    #[error("height {0} is not part of the current fetch batch")]
    UnexpectedHeight(u32),
    #[error("fetch stage ended before height {0} was delivered")]
    FetchIncomplete(u32),
    #[error("operation cancelled")]
    Cancelled,

    // Storage
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("corrupt {record} record: {reason}")]
    Corrupt {
        record: &'static str,
        reason: String,
    },

    // Wrapped external errors
    #[error(transparent)]
    BlockFilter(#[from] bitcoin::bip158::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    // Backend pass-through for downstream crates
    #[error("{context}: {source}")]
    Backend {
        context: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wrap a backend error with the operation it came from.
    pub fn backend<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Backend {
            context: context.into(),
            source: source.into(),
        }
    }

    pub(crate) fn corrupt(record: &'static str, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            record,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
