// crates/kube-gate-mcp/src/context.rs
// ============================================================================
// Module: Request Context
// Description: Per-request transport metadata.
// Purpose: Carry caller metadata from the transport into audit records.
// Dependencies: kube-gate-config
// ============================================================================

//! ## Overview
//! A [`RequestContext`] is built by the transport for every inbound message
//! and travels with it through routing into the audit sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use kube_gate_config::ServerTransport;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Transport metadata for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Transport used by the caller.
    pub transport: ServerTransport,
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// JSON-RPC request identifier, rendered as JSON.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Builds a stdio request context.
    #[must_use]
    pub const fn stdio() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            peer_ip: None,
            request_id: None,
        }
    }

    /// Builds an HTTP request context.
    #[must_use]
    pub const fn http(peer_ip: Option<IpAddr>) -> Self {
        Self {
            transport: ServerTransport::Http,
            peer_ip,
            request_id: None,
        }
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
