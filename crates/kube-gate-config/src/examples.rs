// crates/kube-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Kube Gate configuration. The output is static and
//! validates against the current config model.

/// Returns a canonical example `kube-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
transport = "stdio"
max_body_bytes = 1048576

[server.limits]
max_inflight = 64

[server.audit]
enabled = true
# path = "kube-gate-audit.jsonl"

[cluster]
# kubeconfig = "~/.kube/config"
# context = "staging"

[dispatch]
read_timeout_ms = 30000
write_timeout_ms = 120000
transient_retry = true
retry_backoff_ms = 250

[safety]
protected_namespaces = ["default", "kube-system", "kube-public", "kube-node-lease"]

[catalog]
read_only = false
disabled = []
"#,
    )
}
