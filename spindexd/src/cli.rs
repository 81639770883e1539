use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use backend_bitcoind::Auth;
use clap::Parser;
use spindex_core::OracleConfig;

/// Silent payments tweak oracle fed by a bitcoind node.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON file with `OracleConfig` fields. Flags below take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of the index database
    #[arg(long, default_value = "./spindex-data")]
    pub db_path: PathBuf,

    #[arg(long, default_value = "http://127.0.0.1:8332")]
    pub rpc_url: String,

    #[arg(long, requires = "rpc_password", conflicts_with = "rpc_cookie")]
    pub rpc_user: Option<String>,

    #[arg(long, requires = "rpc_user")]
    pub rpc_password: Option<String>,

    /// Path to bitcoind's `.cookie` file
    #[arg(long)]
    pub rpc_cookie: Option<PathBuf>,

    /// Per-request RPC timeout in seconds
    #[arg(long, default_value_t = 120)]
    pub rpc_timeout: u64,

    /// First height to index
    #[arg(long)]
    pub start_height: Option<u32>,

    #[arg(long)]
    pub sync_window: Option<u32>,

    #[arg(long)]
    pub max_parallel_requests: Option<usize>,

    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Tip polling interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,

    /// Recompute the highest value of every stored tweak before syncing
    #[arg(long)]
    pub reindex_dust: bool,

    /// Exit after catching up instead of following the tip
    #[arg(long)]
    pub once: bool,
}

impl Args {
    /// The file config (or defaults) with flag overrides applied.
    pub fn oracle_config(&self) -> anyhow::Result<OracleConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => OracleConfig::default(),
        };

        if let Some(height) = self.start_height {
            config.sync_start_height = height;
        }
        if let Some(window) = self.sync_window {
            config.sync_window = window;
        }
        if let Some(n) = self.max_parallel_requests {
            config.max_parallel_requests = n;
        }
        if let Some(n) = self.parallelism {
            config.parallelism = n;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval = Duration::from_secs(secs);
        }

        if config.sync_window == 0 {
            bail!("sync_window must be at least 1");
        }
        if config.poll_interval.is_zero() {
            bail!("poll_interval must be at least one second");
        }
        Ok(config)
    }

    pub fn auth(&self) -> Auth {
        match (&self.rpc_user, &self.rpc_password, &self.rpc_cookie) {
            (Some(user), Some(password), _) => Auth::UserPass {
                user: user.clone(),
                password: password.clone(),
            },
            (_, _, Some(cookie)) => Auth::CookieFile(cookie.clone()),
            _ => Auth::None,
        }
    }
}
