pub mod cache;
pub mod resolver;

pub use cache::{ChannelLink, ChannelState, ScopedId, TopologyCache, TopologyDelta};
pub use resolver::TopologyResolver;
