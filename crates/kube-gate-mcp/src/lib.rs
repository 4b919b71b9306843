// crates/kube-gate-mcp/src/lib.rs
// ============================================================================
// Module: Kube Gate MCP
// Description: MCP server for the Kube Gate dispatch core.
// Purpose: Expose catalog operations as MCP tools over stdio and HTTP.
// Dependencies: kube-gate-core, kube-gate-config, axum, tokio
// ============================================================================

//! ## Overview
//! Kube Gate MCP speaks JSON-RPC 2.0 to agent orchestrators and turns
//! `tools/call` requests into dispatches through [`ToolRouter`]. Every call,
//! successful or not, is recorded through the metrics and audit sinks.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod context;
pub mod server;
pub mod telemetry;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::McpAuditEvent;
pub use audit::McpAuditEventParams;
pub use audit::McpAuditSink;
pub use audit::McpFileAuditSink;
pub use audit::McpNoopAuditSink;
pub use audit::McpStderrAuditSink;
pub use context::RequestContext;
pub use server::MCP_PROTOCOL_VERSION;
pub use server::McpServer;
pub use server::McpServerError;
pub use server::SUPPORTED_PROTOCOL_VERSIONS;
pub use telemetry::MCP_LATENCY_BUCKETS_MS;
pub use telemetry::McpMethod;
pub use telemetry::McpMetricEvent;
pub use telemetry::McpMetrics;
pub use telemetry::McpOutcome;
pub use telemetry::NoopMetrics;
pub use telemetry::latency_bucket_ms;
pub use tools::ToolCallResult;
pub use tools::ToolContent;
pub use tools::ToolError;
pub use tools::ToolRouter;
