// crates/kube-gate-config/src/lib.rs
// ============================================================================
// Module: Kube Gate Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for kube-gate.toml semantics.
// Dependencies: kube-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `kube-gate-config` defines the configuration model for Kube Gate. It
//! provides strict, fail-closed validation and converts validated settings
//! into the dispatch, validation, and catalog policies used by the core.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
