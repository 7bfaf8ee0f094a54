//! Minimal JSON-RPC 2.0 client over HTTP, shared by the chain reader and the relay client.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::{ChainError, RelayError};

/// Failure of a single JSON-RPC request, before it is mapped to a component error.
#[derive(Debug, Clone)]
pub enum RpcFailure {
    Transport(String),
    Rpc { code: i64, message: String },
    Malformed(String),
}

impl From<RpcFailure> for ChainError {
    fn from(f: RpcFailure) -> Self {
        match f {
            RpcFailure::Transport(m) => Self::Transport(m),
            RpcFailure::Rpc { code, message } => Self::Rpc { code, message },
            RpcFailure::Malformed(m) => Self::MalformedResponse(m),
        }
    }
}

impl From<RpcFailure> for RelayError {
    fn from(f: RpcFailure) -> Self {
        match f {
            RpcFailure::Transport(m) => Self::Transport(m),
            RpcFailure::Rpc { code, message } => Self::Rejected { code, message },
            RpcFailure::Malformed(m) => Self::MalformedResponse(m),
        }
    }
}

#[derive(Serialize)]
struct Request<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

#[derive(Clone, Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one request. A `null` result deserializes fine into `Option<_>` targets.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, RpcFailure>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let body = Request {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        debug!(method, url = %self.url, "rpc_request");

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        let parsed: Response = serde_json::from_str(&text).map_err(|e| {
            RpcFailure::Malformed(format!("{method}: http {status}: {e}: {}", truncate(&text)))
        })?;

        if let Some(err) = parsed.error {
            return Err(RpcFailure::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        serde_json::from_value(parsed.result)
            .map_err(|e| RpcFailure::Malformed(format!("{method}: {e}")))
    }
}

fn truncate(s: &str) -> &str {
    const MAX: usize = 512;
    match s.char_indices().nth(MAX) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
