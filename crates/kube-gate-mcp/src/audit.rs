// crates/kube-gate-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit Logging
// Description: Structured audit events for MCP request handling.
// Purpose: Emit one JSON line per request without hard logging deps.
// Dependencies: kube-gate-config, serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines the audit event payload and the sinks that write it.
//! Every `tools/call` produces a `tool_call` event; every other answered
//! message produces an `rpc` event. Stdout carries protocol frames, so the
//! default sink writes to stderr.
//!
//! Security posture: events carry operation names, failure kinds, and sizes.
//! Arguments and cluster payloads are never logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use kube_gate_config::ServerTransport;
use serde::Serialize;

use crate::telemetry::McpMethod;
use crate::telemetry::McpOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Event label for `tools/call` requests.
pub const TOOL_CALL_EVENT: &str = "tool_call";
/// Event label for every other JSON-RPC message.
pub const RPC_EVENT: &str = "rpc";

/// MCP audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct McpAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Transport used for the request.
    pub transport: ServerTransport,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Operation name (tools/call).
    pub operation: Option<String>,
    /// Operation effect label (tools/call against a known operation).
    pub effect: Option<&'static str>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Gateway failure kind or protocol error label.
    pub error_kind: Option<&'static str>,
    /// Adapter attempts, including the retry (tools/call).
    pub attempts: Option<u32>,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

/// Inputs required to construct an audit event.
pub struct McpAuditEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Transport type used for the request.
    pub transport: ServerTransport,
    /// Peer IP address if known.
    pub peer_ip: Option<String>,
    /// JSON-RPC method classification.
    pub method: McpMethod,
    /// Operation name (tools/call).
    pub operation: Option<String>,
    /// Operation effect label.
    pub effect: Option<&'static str>,
    /// Request outcome.
    pub outcome: McpOutcome,
    /// JSON-RPC error code when present.
    pub error_code: Option<i64>,
    /// Gateway failure kind or protocol error label.
    pub error_kind: Option<&'static str>,
    /// Adapter attempts.
    pub attempts: Option<u32>,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
    /// Request body size in bytes.
    pub request_bytes: usize,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl McpAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    ///
    /// The event label is `tool_call` for [`McpMethod::ToolsCall`] and `rpc`
    /// otherwise.
    #[must_use]
    pub fn new(params: McpAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        let event = if params.method == McpMethod::ToolsCall { TOOL_CALL_EVENT } else { RPC_EVENT };
        Self {
            event,
            timestamp_ms,
            request_id: params.request_id,
            transport: params.transport,
            peer_ip: params.peer_ip,
            method: params.method,
            operation: params.operation,
            effect: params.effect,
            outcome: params.outcome,
            error_code: params.error_code,
            error_kind: params.error_kind,
            attempts: params.attempts,
            latency_ms: params.latency_ms,
            request_bytes: params.request_bytes,
            response_bytes: params.response_bytes,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for MCP request logging.
pub trait McpAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &McpAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct McpStderrAuditSink;

impl McpAuditSink for McpStderrAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct McpFileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl McpFileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl McpAuditSink for McpFileAuditSink {
    fn record(&self, event: &McpAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct McpNoopAuditSink;

impl McpAuditSink for McpNoopAuditSink {
    fn record(&self, _event: &McpAuditEvent) {}
}
