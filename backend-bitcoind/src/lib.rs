//! bitcoind JSON-RPC backend for the spindex tweak oracle.

mod auth;
mod backend;
pub mod client;
pub mod error;

pub use auth::{parse_cookie, Auth};
pub use backend::BitcoindBackend;
pub use client::{HttpClient, RpcClient};
pub use error::{Error, Result};

#[cfg(feature = "reqwest-client")]
pub use client::ReqwestClient;
