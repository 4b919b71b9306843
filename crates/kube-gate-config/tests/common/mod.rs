// crates/kube-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for kube-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use kube_gate_config::ConfigError;
use kube_gate_config::KubeGateConfig;
use kube_gate_config::ServerTransport;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `KubeGateConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<KubeGateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<KubeGateConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a minimal config using the HTTP transport on the given bind.
pub fn http_config(bind: &str) -> Result<KubeGateConfig, toml::de::Error> {
    let mut config = minimal_config()?;
    config.server.transport = ServerTransport::Http;
    config.server.bind = Some(bind.to_string());
    Ok(config)
}

/// Asserts that a validation result is an error containing a substring.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
