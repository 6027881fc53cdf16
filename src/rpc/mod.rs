//! JSON-RPC plumbing shared by all RPC-backed collection tasks.
//!
//! Layered bottom-up:
//!
//! - [`client`]: one call against one endpoint, latency measured, failures
//!   degraded to "no data",
//! - [`dual`]: the same payload issued concurrently against the validator
//!   and network endpoints,
//! - [`retry`]: bounded re-issue of a dual request while either side is
//!   slower than the slow-call threshold.

pub mod client;
pub mod dual;
pub mod retry;

pub use client::{EndpointResult, RpcClient, RpcErrorObject, RpcPayload, RpcReply, RpcRequest, RpcResponse};
pub use dual::{DualClient, DualOutcome, DualRpc};
pub use retry::{SLOW_CALL_THRESHOLD_SECS, request_with_retry};
