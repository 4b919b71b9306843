// crates/kube-gate-config/src/config/tests.rs
// ============================================================================
// Module: Config Resolution Unit Tests
// Description: Unit tests for config path resolution order.
// Purpose: Confirm explicit, environment, and fallback paths resolve in order.
// Dependencies: kube-gate-config
// ============================================================================

//! ## Overview
//! Resolution is tested through the pure helper so the process environment
//! never needs to be mutated.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use super::*;

#[test]
fn explicit_path_wins_over_environment() {
    let resolved = resolve_path(
        Some(Path::new("cli.toml")),
        Some("env.toml".to_string()),
        Some(Path::new(DEFAULT_CONFIG_NAME)),
    )
    .unwrap();
    assert_eq!(resolved, Some(PathBuf::from("cli.toml")));
}

#[test]
fn environment_wins_over_fallback() {
    let resolved =
        resolve_path(None, Some("env.toml".to_string()), Some(Path::new(DEFAULT_CONFIG_NAME)))
            .unwrap();
    assert_eq!(resolved, Some(PathBuf::from("env.toml")));
}

#[test]
fn blank_environment_is_ignored() {
    let resolved = resolve_path(None, Some("  ".to_string()), None).unwrap();
    assert_eq!(resolved, None);
}

#[test]
fn fallback_used_when_present() {
    let resolved = resolve_path(None, None, Some(Path::new(DEFAULT_CONFIG_NAME))).unwrap();
    assert_eq!(resolved, Some(PathBuf::from(DEFAULT_CONFIG_NAME)));
}

#[test]
fn no_source_means_defaults() {
    assert_eq!(resolve_path(None, None, None).unwrap(), None);
}

#[test]
fn oversized_environment_path_is_rejected() {
    let long = "a".repeat(MAX_TOTAL_PATH_LENGTH + 1);
    let err = resolve_path(None, Some(long), None).unwrap_err();
    assert!(err.to_string().contains("max length"));
}

#[test]
fn long_path_components_are_rejected() {
    let component = "c".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
    let err = validate_path(&PathBuf::from("/tmp").join(component)).unwrap_err();
    assert!(err.to_string().contains("component too long"));
}
