pub mod completion;
pub mod error;
pub mod provider;
pub mod redis;
pub mod types;
