#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid block order for {chain_id}: expected height {expected}, got {got}")]
    Order {
        chain_id: String,
        expected: u64,
        got: u64,
    },
    #[error("connection error: {0}")]
    Connection(String),
    #[error("commit error: {0}")]
    Commit(String),
    #[error("block marker conflict for {chain_id}: expected prior height {expected}")]
    CasConflict { chain_id: String, expected: u64 },
    #[error("config invalid: {0}")]
    ConfigInvalid(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("block source error: {0}")]
    Source(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Transient failures the runner may retry from the start of the block.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Backend(_))
    }
}

pub type Result<T> = core::result::Result<T, Error>;
