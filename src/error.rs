use thiserror::Error;
use crate::xrpl::{codec::CodecError, connection::RpcError};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("XRPL RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Unexpected response from XRPL node: {0}")]
    Protocol(String),

    #[error("Failed to decode ledger object: {0}")]
    Decode(#[from] CodecError),

    #[error("A prior step must be completed before this task can be executed (run `{step}` first)")]
    Precondition { step: &'static str },

    #[error("This data set already exists in the database \"{database}\".\nSpecify -f to discard this data or use -d to specify an alternate database.")]
    DuplicateData { database: String },

    #[error("Unable to read ledger metadata (run `dump` first)")]
    MetadataMissing,

    #[error("Inconsistent ledger data: {0}")]
    DataIntegrity(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SnapshotError>;
