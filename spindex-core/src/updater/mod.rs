//! Applying fetched blocks to the store.
//!
//! [`BlockProcessor`] is the seam between the fetch pipeline and persistence.
//! [`StateUpdater`] is the implementation used in production: it derives the
//! block's tweaks, records new taproot outputs, consumes spent ones and keeps
//! each tweak's highest remaining value in step with its unspent outputs.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::structs::Block;

mod cut_through;
mod state;

pub use cut_through::{highest_value_update, spend_outputs, HighestValueUpdate, SpendEffect};
pub use state::{BlockSummary, StateUpdater};

#[async_trait]
pub trait BlockProcessor: Send + Sync {
    /// Apply one block. Blocks arrive in strictly ascending height order.
    async fn process_block(&self, block: Block, cancel: &CancellationToken) -> Result<()>;
}
