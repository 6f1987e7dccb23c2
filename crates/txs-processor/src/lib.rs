pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod runtime;
pub mod source;
pub mod stats;
pub mod store;
pub mod topology;

pub use api::BlockProcessor;
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{Processor, RunSummary};
pub use store::InMemoryStatsStore;
