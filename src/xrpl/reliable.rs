use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::warn;
use crate::xrpl::connection::{LedgerConnection, RpcError};

/// Default pause before retrying a failed request or reconnecting
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(3);

/// Wraps a node session so that flaky links look reliable to callers.
///
/// Only `request` changes behavior: recoverable failures (broken transport,
/// `tooBusy`, socket not open) are retried forever, reconnecting first when the
/// session dropped. Every other operation is forwarded to the inner session
/// untouched.
pub struct ReliableConnection<C> {
    inner: C,
    backoff: Duration,
}

impl<C: LedgerConnection> ReliableConnection<C> {
    pub fn with_backoff(inner: C, backoff: Duration) -> Self {
        Self { inner, backoff }
    }

    async fn reconnect(&self) {
        warn!("Reconnecting...");

        loop {
            match self.inner.connect().await {
                Ok(()) => return,
                Err(e) => {
                    warn!("Failed to reconnect ({}), retrying...", e);
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}

#[async_trait]
impl<C: LedgerConnection> LedgerConnection for ReliableConnection<C> {
    async fn request(&self, payload: Value, timeout: Option<Duration>) -> Result<Value, RpcError> {
        loop {
            match self.inner.request(payload.clone(), timeout).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_recoverable() => {
                    warn!("Failed to fetch data from XRPL node ({}). Retrying...", e);

                    tokio::time::sleep(self.backoff).await;

                    if !self.inner.is_connected() {
                        self.reconnect().await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect(&self) -> Result<(), RpcError> {
        self.inner.connect().await
    }

    async fn disconnect(&self) -> Result<(), RpcError> {
        self.inner.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}
