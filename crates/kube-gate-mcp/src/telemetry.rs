// crates/kube-gate-mcp/src/telemetry.rs
// ============================================================================
// Module: Gateway Telemetry
// Description: Request counters and latency hooks for the kube-gate server.
// Purpose: Let deployments export per-operation metrics without a fixed backend.
// Dependencies: kube-gate-config
// ============================================================================

//! ## Overview
//! Every JSON-RPC message the gateway answers produces one
//! [`McpMetricEvent`], recorded once as a counter and once with its latency.
//! For `tools/call` the event names the catalog operation, its effect, and how
//! many adapter attempts the dispatcher made, so retried reads and slow
//! mutations can be told apart. The server uses [`NoopMetrics`] unless an
//! exporter is supplied.
//!
//! Security posture: events carry operation names and failure kinds only,
//! never tool arguments, manifests, or cluster payloads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use kube_gate_config::ServerTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Latency bucket upper bounds in milliseconds.
///
/// The top buckets line up with the default read (30 s) and mutation (120 s)
/// dispatch deadlines, so calls that ran into a deadline land in them.
pub const MCP_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000, 120_000];

/// Returns the bucket bound a latency falls into, or `None` past the last one.
#[must_use]
pub fn latency_bucket_ms(latency: Duration) -> Option<u64> {
    let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    MCP_LATENCY_BUCKETS_MS.iter().copied().find(|bound| millis <= *bound)
}

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Method label for a JSON-RPC message.
///
/// # Invariants
/// - Labels are stable; dashboards key on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum McpMethod {
    /// Session handshake.
    #[serde(rename = "initialize")]
    Initialize,
    /// Liveness check.
    #[serde(rename = "ping")]
    Ping,
    /// Catalog listing.
    #[serde(rename = "tools/list")]
    ToolsList,
    /// Catalog operation dispatch.
    #[serde(rename = "tools/call")]
    ToolsCall,
    /// `notifications/*`, including cancellation.
    #[serde(rename = "notification")]
    Notification,
    /// Message that failed JSON-RPC decoding.
    #[serde(rename = "invalid")]
    Invalid,
    /// Method the gateway does not serve.
    #[serde(rename = "other")]
    Other,
}

impl McpMethod {
    /// Classifies a JSON-RPC method name.
    #[must_use]
    pub fn from_method(method: &str) -> Self {
        match method {
            "initialize" => Self::Initialize,
            "ping" => Self::Ping,
            "tools/list" => Self::ToolsList,
            "tools/call" => Self::ToolsCall,
            name if name.starts_with("notifications/") => Self::Notification,
            _ => Self::Other,
        }
    }

    /// Returns the label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Ping => "ping",
            Self::ToolsList => "tools/list",
            Self::ToolsCall => "tools/call",
            Self::Notification => "notification",
            Self::Invalid => "invalid",
            Self::Other => "other",
        }
    }
}

/// Outcome label for a JSON-RPC message.
///
/// # Invariants
/// - A `tools/call` answered with an error envelope is `Error` even though
///   the JSON-RPC exchange itself succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum McpOutcome {
    /// Result returned and, for tool calls, the envelope was a success.
    Ok,
    /// Protocol error or failed tool call.
    Error,
}

impl McpOutcome {
    /// Returns the label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

/// One answered message.
#[derive(Debug, Clone)]
pub struct McpMetricEvent {
    /// Transport the message arrived on.
    pub transport: ServerTransport,
    /// Method label.
    pub method: McpMethod,
    /// Catalog operation named by a `tools/call`.
    pub operation: Option<String>,
    /// `read` or `mutate` when the operation resolved in the catalog.
    pub effect: Option<&'static str>,
    /// Adapter attempts made by the dispatcher; 2 means a read was retried.
    pub attempts: Option<u32>,
    /// Outcome label.
    pub outcome: McpOutcome,
    /// JSON-RPC error code for protocol faults.
    pub error_code: Option<i64>,
    /// Failure kind of the envelope, or the protocol error label.
    pub error_kind: Option<&'static str>,
    /// Inbound body size in bytes.
    pub request_bytes: usize,
    /// Outbound body size in bytes.
    pub response_bytes: usize,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Exporter for gateway metrics.
pub trait McpMetrics: Send + Sync {
    /// Counts one answered message.
    fn record_request(&self, event: McpMetricEvent);

    /// Records how long the message took to answer.
    fn record_latency(&self, event: McpMetricEvent, latency: Duration);
}

/// Exporter that drops every event.
pub struct NoopMetrics;

impl McpMetrics for NoopMetrics {
    fn record_request(&self, _event: McpMetricEvent) {}

    fn record_latency(&self, _event: McpMetricEvent, _latency: Duration) {}
}

// ============================================================================
// SECTION: Tests
// ============================================================================
