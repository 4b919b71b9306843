// crates/kube-gate-cluster/src/handle/tests.rs
// ============================================================================
// Module: Cluster Handle Tests
// Description: Unit tests for kubeconfig resolution.
// Purpose: Confirm explicit kubeconfig files and contexts are honored.
// Dependencies: kube, tempfile, tokio
// ============================================================================

//! ## Overview
//! Writes throwaway kubeconfig files and connects without contacting a
//! server; client construction never performs I/O against the cluster.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::fs;

use super::*;

const KUBECONFIG: &str = "\
apiVersion: v1
kind: Config
clusters:
- name: lab
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
- name: staging
  cluster:
    server: https://10.20.0.1:6443
    insecure-skip-tls-verify: true
users:
- name: bot
  user:
    token: not-a-real-token
contexts:
- name: lab
  context:
    cluster: lab
    user: bot
- name: staging
  context:
    cluster: staging
    user: bot
current-context: lab
";

fn write_kubeconfig(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("config");
    fs::write(&path, KUBECONFIG).unwrap();
    path.display().to_string()
}

#[tokio::test]
async fn explicit_kubeconfig_uses_current_context() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClusterConfig {
        kubeconfig: Some(write_kubeconfig(&dir)),
        context: None,
    };
    let handle = ClusterHandle::connect(&config).await.unwrap();
    assert!(matches!(handle.source(), CredentialSource::Kubeconfig(_)));
    assert!(handle.server().starts_with("https://127.0.0.1:6443"));
    assert!(handle.context().is_none());
}

#[tokio::test]
async fn explicit_context_selects_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClusterConfig {
        kubeconfig: Some(write_kubeconfig(&dir)),
        context: Some("staging".to_string()),
    };
    let handle = ClusterHandle::connect(&config).await.unwrap();
    assert!(handle.server().starts_with("https://10.20.0.1:6443"));
    assert_eq!(handle.context(), Some("staging"));
}

#[tokio::test]
async fn unknown_context_is_a_credentials_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClusterConfig {
        kubeconfig: Some(write_kubeconfig(&dir)),
        context: Some("prod".to_string()),
    };
    let err = ClusterHandle::connect(&config).await.unwrap_err();
    assert!(matches!(err, HandleError::Credentials(_)));
}

#[tokio::test]
async fn missing_kubeconfig_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClusterConfig {
        kubeconfig: Some(dir.path().join("absent").display().to_string()),
        context: None,
    };
    let err = ClusterHandle::connect(&config).await.unwrap_err();
    assert!(matches!(err, HandleError::Kubeconfig(_)));
    assert!(err.to_string().contains("absent"));
}

#[test]
fn credential_source_display() {
    assert_eq!(CredentialSource::Inferred.to_string(), "inferred");
    assert_eq!(
        CredentialSource::Kubeconfig(PathBuf::from("/etc/kube/config")).to_string(),
        "kubeconfig /etc/kube/config"
    );
}
