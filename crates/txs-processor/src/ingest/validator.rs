use std::collections::HashMap;

use crate::domain::types::Block;
use crate::error::{Error, Result};
use crate::store::traits::StatsStore;

/// Per-chain block ordering guard. The persisted marker is read once per
/// chain; afterwards the in-memory height only moves on a successful commit.
#[derive(Debug, Default)]
pub struct BlockValidator {
    last_heights: HashMap<String, u64>,
}

impl BlockValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn validate<S: StatsStore + ?Sized>(&mut self, store: &S, block: &Block) -> Result<()> {
        let last = self.last_processed(store, &block.chain_id).await?;
        let expected = last + 1;
        if block.height != expected {
            return Err(Error::Order {
                chain_id: block.chain_id.clone(),
                expected,
                got: block.height,
            });
        }
        Ok(())
    }

    async fn last_processed<S: StatsStore + ?Sized>(&mut self, store: &S, chain_id: &str) -> Result<u64> {
        if let Some(height) = self.last_heights.get(chain_id) {
            return Ok(*height);
        }
        let height = store.last_processed_height(chain_id).await?;
        self.last_heights.insert(chain_id.to_string(), height);
        Ok(height)
    }

    pub fn last_height(&self, chain_id: &str) -> Option<u64> {
        self.last_heights.get(chain_id).copied()
    }

    pub fn mark_committed(&mut self, chain_id: &str, height: u64) {
        self.last_heights.insert(chain_id.to_string(), height);
    }
}
