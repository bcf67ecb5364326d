pub mod completion;
pub mod config;
pub mod error;
pub mod identity;
pub mod prompt;
pub mod server;
pub mod storage;
pub mod studysets;
