// crates/kube-gate-cluster/src/lib.rs
// ============================================================================
// Module: Kube Gate Cluster Library
// Description: Cluster credential resolution and the kube-backed adapter.
// Purpose: Connect the dispatch core to a real Kubernetes API server.
// Dependencies: crate::{adapter, convert, errors, handle}
// ============================================================================

//! ## Overview
//! [`ClusterHandle`] resolves credentials once and owns the pooled client.
//! [`KubeAdapter`] implements the core `ClusterAdapter` trait on top of it,
//! converting API objects into core summaries and classifying failures.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adapter;
pub mod convert;
pub mod errors;
pub mod handle;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adapter::KubeAdapter;
pub use errors::classify;
pub use handle::ClusterHandle;
pub use handle::CredentialSource;
pub use handle::HandleError;
