pub mod memory;
pub mod mutations;
pub mod traits;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStatsStore;
pub use traits::{StatsStore, TopologyLookup};
