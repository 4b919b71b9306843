//! Limits validation tests for kube-gate-config.
// crates/kube-gate-config/tests/limits_validation.rs
// =============================================================================
// Module: Limits Validation Tests
// Description: Tests for numeric and size limit enforcement.
// Purpose: Ensure every bound is inclusive at the edge and enforced past it.
// =============================================================================

use kube_gate_config::MAX_BODY_BYTES_LIMIT;
use kube_gate_config::MAX_INFLIGHT_LIMIT;
use kube_gate_config::MAX_PROTECTED_NAMESPACES;
use kube_gate_config::MAX_RETRY_BACKOFF_MS;
use kube_gate_config::MAX_TIMEOUT_MS;
use kube_gate_config::MIN_TIMEOUT_MS;

mod common;

use common::TestResult;
use common::assert_invalid;

// ============================================================================
// SECTION: Server Limits
// ============================================================================

#[test]
fn max_body_bytes_zero_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    assert_invalid(config.validate(), "max_body_bytes must be greater than zero")
}

#[test]
fn max_body_bytes_at_limit_accepted() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = MAX_BODY_BYTES_LIMIT;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn max_body_bytes_above_limit_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = MAX_BODY_BYTES_LIMIT + 1;
    assert_invalid(config.validate(), "max_body_bytes must not exceed")
}

#[test]
fn max_inflight_bounds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.limits.max_inflight = 0;
    assert_invalid(config.validate(), "max_inflight must be greater than zero")?;
    config.server.limits.max_inflight = MAX_INFLIGHT_LIMIT;
    config.validate().map_err(|err| err.to_string())?;
    config.server.limits.max_inflight = MAX_INFLIGHT_LIMIT + 1;
    assert_invalid(config.validate(), "max_inflight must not exceed")
}

// ============================================================================
// SECTION: Dispatch Limits
// ============================================================================

#[test]
fn read_timeout_bounds_are_inclusive() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.dispatch.read_timeout_ms = MIN_TIMEOUT_MS;
    config.validate().map_err(|err| err.to_string())?;
    config.dispatch.read_timeout_ms = MIN_TIMEOUT_MS - 1;
    assert_invalid(config.validate(), "dispatch.read_timeout_ms must be between")
}

#[test]
fn write_timeout_bounds_are_inclusive() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.dispatch.write_timeout_ms = MAX_TIMEOUT_MS;
    config.validate().map_err(|err| err.to_string())?;
    config.dispatch.write_timeout_ms = MAX_TIMEOUT_MS + 1;
    assert_invalid(config.validate(), "dispatch.write_timeout_ms must be between")
}

#[test]
fn read_timeout_cannot_exceed_write_timeout() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.dispatch.read_timeout_ms = 5_000;
    config.dispatch.write_timeout_ms = 5_000;
    config.validate().map_err(|err| err.to_string())?;
    config.dispatch.read_timeout_ms = 5_001;
    assert_invalid(config.validate(), "must not exceed dispatch.write_timeout_ms")
}

#[test]
fn retry_backoff_is_bounded() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.dispatch.retry_backoff_ms = MAX_RETRY_BACKOFF_MS;
    config.validate().map_err(|err| err.to_string())?;
    config.dispatch.retry_backoff_ms = MAX_RETRY_BACKOFF_MS + 1;
    assert_invalid(config.validate(), "dispatch.retry_backoff_ms must not exceed")
}

// ============================================================================
// SECTION: Safety Limits
// ============================================================================

#[test]
fn protected_namespace_count_is_bounded() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.safety.protected_namespaces =
        (0 .. MAX_PROTECTED_NAMESPACES).map(|i| format!("ns-{i}")).collect();
    config.validate().map_err(|err| err.to_string())?;
    config.safety.protected_namespaces.push("one-more".to_string());
    assert_invalid(config.validate(), "exceeds")
}
