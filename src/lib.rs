pub mod xrpl;
pub mod dump;
pub mod snapshot;
pub mod storage;
pub mod config;
pub mod error;
pub mod utils;

pub use error::{Result, SnapshotError};
pub use config::Config;
