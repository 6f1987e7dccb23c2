pub mod amount;
pub mod keys;
pub mod message;
pub mod types;
