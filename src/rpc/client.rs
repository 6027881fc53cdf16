//! Single-endpoint JSON-RPC client.
//!
//! [`RpcClient`] issues one HTTP POST per call, measures wall-clock latency
//! around request + decode, and degrades every failure mode to "no data"
//! instead of returning an error. The latency control for slow endpoints is
//! the retry governor, not a per-call timeout, so the client deliberately
//! relies on the transport's defaults.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// A single JSON-RPC 2.0 request.
#[derive(Clone, Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    /// Correlation id; batch responses are matched back by this, never by
    /// position.
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    /// Builds a request with no params.
    pub fn new(id: u64, method: &'static str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params: None,
        }
    }

    /// Builds a request with the given params value.
    pub fn with_params(id: u64, method: &'static str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params: Some(params),
        }
    }
}

/// A payload sent to one endpoint: either a single request or an ordered
/// batch.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum RpcPayload {
    Single(RpcRequest),
    Batch(Vec<RpcRequest>),
}

/// Error object embedded in a JSON-RPC response.
#[derive(Clone, Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// One decoded JSON-RPC response object.
#[derive(Clone, Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

/// A decoded reply from one endpoint, mirroring the payload shape.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RpcReply {
    Batch(Vec<RpcResponse>),
    Single(RpcResponse),
}

impl RpcReply {
    /// Extracts the `result` of the batch sub-response with the given id.
    ///
    /// Returns `None` when the id is absent, when the sub-response carries
    /// an `error`, or when the reply is not a batch. Responses may arrive in
    /// any order; position is never used.
    pub fn result_by_id(&self, id: u64) -> Option<&Value> {
        match self {
            RpcReply::Batch(items) => items
                .iter()
                .find(|r| r.id == Some(id) && r.error.is_none())
                .and_then(|r| r.result.as_ref()),
            RpcReply::Single(_) => None,
        }
    }

    /// Extracts the `result` of a single (non-batch) reply, `None` when the
    /// response carries an `error`.
    pub fn single_result(&self) -> Option<&Value> {
        match self {
            RpcReply::Single(r) if r.error.is_none() => r.result.as_ref(),
            _ => None,
        }
    }

    /// The error object of a single reply, if any.
    pub fn single_error(&self) -> Option<&RpcErrorObject> {
        match self {
            RpcReply::Single(r) => r.error.as_ref(),
            _ => None,
        }
    }

    /// True when no sub-response carries an error object.
    pub fn is_error_free(&self) -> bool {
        match self {
            RpcReply::Batch(items) => items.iter().all(|r| r.error.is_none()),
            RpcReply::Single(r) => r.error.is_none(),
        }
    }
}

/// Result of one call against one endpoint: the decoded reply (or `None` on
/// any failure) and the observed latency in seconds (or `None` on failure).
#[derive(Clone, Debug, Default)]
pub struct EndpointResult {
    pub reply: Option<RpcReply>,
    pub latency_secs: Option<f64>,
}

/// JSON-RPC client shared by all RPC tasks.
///
/// Cheap to clone; all clones share one underlying connection pool.
#[derive(Clone, Debug)]
pub struct RpcClient {
    http: reqwest::Client,
}

impl Default for RpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Issues `payload` against `url` and measures the round trip.
    ///
    /// Transport errors, non-2xx statuses and JSON decode failures are
    /// logged and collapse to an empty [`EndpointResult`]; this never
    /// returns an error to the caller.
    pub async fn call(&self, url: &str, payload: &RpcPayload, task: &str) -> EndpointResult {
        let start = Instant::now();

        let response = match self.http.post(url).json(payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!(task, url, "RPC request failed: {e}");
                return EndpointResult::default();
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(task, url, %status, "RPC endpoint returned non-success status");
            return EndpointResult::default();
        }

        match response.json::<RpcReply>().await {
            Ok(reply) => EndpointResult {
                reply: Some(reply),
                latency_secs: Some(start.elapsed().as_secs_f64()),
            },
            Err(e) => {
                error!(task, url, "failed to decode RPC response: {e}");
                EndpointResult::default()
            }
        }
    }
}
