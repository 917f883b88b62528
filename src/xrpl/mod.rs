pub mod codec;
pub mod connection;
pub mod drops;
pub mod objects;
pub mod reliable;

pub use connection::{HttpConnection, LedgerConnection, RpcError};
pub use objects::{LedgerEntryType, RawLedgerObject};
pub use reliable::ReliableConnection;
