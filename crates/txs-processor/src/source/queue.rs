use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::domain::types::Block;
use crate::error::Result;
use crate::runtime::bounded_queue::{BoundedReceiver, BoundedSender, QueueDepth, bounded};
use crate::source::BlockSource;

/// Consumer end of the in-process block buffer.
pub struct QueueBlockSource {
    rx: BoundedReceiver<Block>,
}

impl QueueBlockSource {
    pub fn new(capacity: usize) -> Result<(BoundedSender<Block>, Self)> {
        let (tx, rx) = bounded(capacity)?;
        Ok((tx, Self { rx }))
    }

    pub fn depth(&self) -> QueueDepth {
        self.rx.depth()
    }
}

#[async_trait::async_trait]
impl BlockSource for QueueBlockSource {
    async fn next_block(&mut self) -> Result<Option<Block>> {
        Ok(self.rx.recv().await)
    }
}

/// Drains `upstream` into the queue on a background task so a slow commit
/// never stalls the transport. The task ends with the upstream stream, or
/// early when the queue consumer goes away.
pub fn spawn_forwarder<B>(mut upstream: B, tx: BoundedSender<Block>) -> JoinHandle<Result<u64>>
where
    B: BlockSource + 'static,
{
    tokio::spawn(async move {
        let mut forwarded = 0u64;
        loop {
            let block = match upstream.next_block().await {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(err) => {
                    error!(%err, forwarded, "block source failed");
                    return Err(err);
                }
            };
            if tx.send(block).await.is_err() {
                debug!(forwarded, "block queue closed, stopping forwarder");
                break;
            }
            forwarded += 1;
        }
        Ok(forwarded)
    })
}
