use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised by a single XRPL node session
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("socket not open")]
    NotOpen,

    #[error("server is too busy (tooBusy)")]
    ServerBusy,

    #[error("{code}: {message}")]
    Response { code: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Whether the request may succeed if retried on the same (or a re-established) session
    pub fn is_recoverable(&self) -> bool {
        match self {
            RpcError::Connection(_) | RpcError::NotOpen | RpcError::ServerBusy => true,
            RpcError::Response { .. } | RpcError::Malformed(_) => false,
        }
    }
}

/// Operations available on a ledger node session.
///
/// Payloads use the rippled command format: a JSON object with a `command`
/// field plus the command parameters. The returned value is the `result`
/// object of the response.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerConnection: Send + Sync {
    async fn request(&self, payload: Value, timeout: Option<Duration>) -> Result<Value, RpcError>;

    async fn connect(&self) -> Result<(), RpcError>;

    async fn disconnect(&self) -> Result<(), RpcError>;

    fn is_connected(&self) -> bool;
}

/// Add a scheme to bare `host:port` node addresses
pub fn server_url(server: &str) -> String {
    let server = server.trim();
    if server.contains("//") {
        server.to_string()
    } else {
        format!("https://{}", server)
    }
}

/// JSON-RPC session against a rippled HTTP endpoint
pub struct HttpConnection {
    url: String,
    client: Client,
    connected: AtomicBool,
    next_id: AtomicU64,
}

impl HttpConnection {
    pub fn new(server: &str, default_timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(default_timeout)
            .build()
            .map_err(|e| RpcError::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: server_url(server),
            client,
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, error: reqwest::Error) -> RpcError {
        self.connected.store(false, Ordering::SeqCst);
        RpcError::Connection(error.to_string())
    }

    async fn post(&self, payload: Value, timeout: Option<Duration>) -> Result<Value, RpcError> {
        let mut params = match payload {
            Value::Object(map) => map,
            other => {
                return Err(RpcError::Malformed(format!("request payload must be an object, got {}", other)))
            }
        };

        let method = params
            .remove("command")
            .and_then(|command| command.as_str().map(str::to_owned))
            .ok_or_else(|| RpcError::Malformed("request payload has no command".to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let body = json!({
            "method": method,
            "params": [Value::Object(params)],
            "id": id,
        });

        debug!("-> {} #{}", method, id);

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(RpcError::ServerBusy);
        }
        if status.is_server_error() {
            return Err(RpcError::Connection(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(RpcError::Response {
                code: status.as_u16().to_string(),
                message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                RpcError::Malformed(e.to_string())
            } else {
                self.transport_error(e)
            }
        })?;

        let result = body
            .get("result")
            .cloned()
            .ok_or_else(|| RpcError::Malformed("response has no result".to_string()))?;

        check_result(result)
    }
}

/// Turn a rippled `status: error` result into the matching error
fn check_result(result: Value) -> Result<Value, RpcError> {
    if result.get("status").and_then(Value::as_str) != Some("error") {
        return Ok(result);
    }

    let code = result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();

    if code == "tooBusy" {
        return Err(RpcError::ServerBusy);
    }

    let message = result
        .get("error_message")
        .and_then(Value::as_str)
        .unwrap_or(&code)
        .to_string();

    Err(RpcError::Response { code, message })
}

#[async_trait]
impl LedgerConnection for HttpConnection {
    async fn request(&self, payload: Value, timeout: Option<Duration>) -> Result<Value, RpcError> {
        if !self.is_connected() {
            return Err(RpcError::NotOpen);
        }
        self.post(payload, timeout).await
    }

    async fn connect(&self) -> Result<(), RpcError> {
        self.post(json!({ "command": "ping" }), None).await?;
        self.connected.store(true, Ordering::SeqCst);
        debug!("Connected to {}", self.url);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RpcError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
