use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP POST failed: {0}")]
    HttpPost(String),
    #[error("failed to read response body: {0}")]
    ResponseBody(String),
    #[error("node work queue stayed full after {0} attempts")]
    WorkQueueFull(usize),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    // JSON-RPC level
    #[error("{method} failed with code {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("{0} returned no result")]
    EmptyResult(String),
    #[error("batch response is missing id {0}")]
    MissingBatchItem(u64),
    #[error("unexpected node data: {0}")]
    InvalidResponse(String),

    // Authentication
    #[error("failed to read cookie file {path}: {source}")]
    CookieRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cookie file {0} is not in user:password form")]
    MalformedCookie(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for spindex_core::Error {
    fn from(e: Error) -> Self {
        let context = match &e {
            Error::Rpc { method, .. } => format!("bitcoind {method}"),
            _ => "bitcoind".to_string(),
        };
        spindex_core::Error::backend(context, e)
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::InvalidResponse(format!("bad hex: {e}"))
    }
}
