//! Getting blocks from the node into the updater.
//!
//! [`ChainSync`] walks history in fixed windows: it records headers for the
//! unprocessed heights of a window, then runs them through a
//! [`BlockPipeline`], which fetches bodies concurrently and applies them
//! strictly in height order. [`TipPoller`] takes over once bulk sync is done.

mod orchestrator;
mod pipeline;
mod poller;
mod reorder;

pub use orchestrator::ChainSync;
pub use pipeline::BlockPipeline;
pub use poller::TipPoller;
pub use reorder::ReorderBuffer;
