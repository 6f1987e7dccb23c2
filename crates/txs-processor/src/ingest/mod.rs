pub mod commit;
pub mod dispatcher;
pub mod engine;
pub mod validator;

pub use commit::{CommitCoordinator, CommitOutcome, build_mutations};
pub use dispatcher::MessageDispatcher;
pub use engine::{Processor, RunSummary};
pub use validator::BlockValidator;
