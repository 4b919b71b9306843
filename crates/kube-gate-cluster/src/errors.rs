// crates/kube-gate-cluster/src/errors.rs
// ============================================================================
// Module: Cluster Error Classification
// Description: Maps kube client errors onto classified cluster failures.
// Purpose: Give the dispatcher a stable retry and failure taxonomy.
// Dependencies: kube, kube-gate-core
// ============================================================================

//! ## Overview
//! API responses are classified by HTTP status. Connection-level failures are
//! transient. Everything else (serialization, discovery, local config) is
//! reported as `Other` and never retried.
//!
//! Security posture: only the API server's message or the client error text
//! is surfaced; request headers and bodies are never included.

// ============================================================================
// SECTION: Imports
// ============================================================================

use kube_gate_core::ClusterError;
use kube_gate_core::ClusterErrorKind;

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies an HTTP status code returned by the API server.
#[must_use]
pub const fn kind_for_status(code: u16) -> ClusterErrorKind {
    match code {
        404 => ClusterErrorKind::NotFound,
        401 | 403 => ClusterErrorKind::Forbidden,
        409 => ClusterErrorKind::Conflict,
        429 | 500 | 502 | 503 | 504 => ClusterErrorKind::Transient,
        _ => ClusterErrorKind::Other,
    }
}

/// Converts a kube client error into a classified [`ClusterError`].
#[must_use]
pub fn classify(error: &kube::Error) -> ClusterError {
    match error {
        kube::Error::Api(response) => {
            let message = if response.message.is_empty() {
                format!("api server returned status {}", response.code)
            } else {
                response.message.clone()
            };
            let reason = if response.reason.is_empty() {
                response.status.clone()
            } else {
                response.reason.clone()
            };
            ClusterError::new(kind_for_status(response.code), message)
                .with_status(response.code, reason)
        }
        kube::Error::HyperError(err) => {
            ClusterError::transient(format!("cluster connection failed: {err}"))
        }
        kube::Error::Service(err) => {
            ClusterError::transient(format!("cluster connection failed: {err}"))
        }
        other => ClusterError::new(ClusterErrorKind::Other, other.to_string()),
    }
}
