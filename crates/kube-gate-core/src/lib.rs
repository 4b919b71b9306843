// crates/kube-gate-core/src/lib.rs
// ============================================================================
// Module: Kube Gate Core Library
// Description: Public API surface for the Kube Gate dispatch core.
// Purpose: Expose the catalog, validator, adapter interface, and dispatcher.
// Dependencies: crate::{adapter, catalog, dispatcher, model, resources, schema, validator}
// ============================================================================

//! ## Overview
//! Kube Gate core turns tool-invocation requests into bounded, validated
//! cluster calls. The catalog is the only source of reachable operations, the
//! validator rejects malformed arguments before anything is planned, and the
//! dispatcher runs planned calls against a [`ClusterAdapter`] under deadline,
//! retry, and cancellation rules. It is transport-agnostic and knows nothing
//! about the concrete cluster client.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adapter;
pub mod catalog;
pub mod dispatcher;
pub mod model;
pub mod resources;
pub mod schema;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adapter::AdapterCall;
pub use adapter::CallKind;
pub use adapter::CallOutput;
pub use adapter::ClusterAdapter;
pub use adapter::ClusterError;
pub use adapter::ClusterErrorKind;
pub use adapter::EventQuery;
pub use adapter::LogOptions;
pub use catalog::BUILTIN_OPERATIONS;
pub use catalog::Catalog;
pub use catalog::CatalogError;
pub use catalog::CatalogFilter;
pub use catalog::Effect;
pub use catalog::Operation;
pub use catalog::builtin_names;
pub use dispatcher::DispatchPolicy;
pub use dispatcher::DispatchReport;
pub use dispatcher::DispatchState;
pub use dispatcher::Dispatcher;
pub use model::Failure;
pub use model::FailureKind;
pub use model::Request;
pub use model::Response;
pub use schema::ToolAnnotations;
pub use schema::ToolDefinition;
pub use validator::DEFAULT_PROTECTED_NAMESPACES;
pub use validator::ValidatedArgs;
pub use validator::ValidationPolicy;
pub use validator::validate;
