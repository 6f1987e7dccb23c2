//! Where blocks come from. The processor only needs `next_block`; transports
//! plug in behind [`BlockSource`].

mod json_lines;
mod queue;

pub use json_lines::JsonLinesBlockSource;
pub use queue::{QueueBlockSource, spawn_forwarder};

use crate::domain::types::Block;
use crate::error::Result;

#[async_trait::async_trait]
pub trait BlockSource: Send {
    /// `Ok(None)` marks the end of the stream.
    async fn next_block(&mut self) -> Result<Option<Block>>;
}

#[async_trait::async_trait]
impl<B: BlockSource + ?Sized> BlockSource for Box<B> {
    async fn next_block(&mut self) -> Result<Option<Block>> {
        (**self).next_block().await
    }
}
