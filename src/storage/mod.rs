pub mod db;
pub mod models;

pub use db::{Collection, Database};
pub use models::{AggregatedAccount, ClassifiedAccount, DataClass, EscrowDetails, LedgerMeta, MinifiedRecord};
