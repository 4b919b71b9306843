// crates/kube-gate-core/src/validator/tests.rs
// ============================================================================
// Module: Argument Validator Unit Tests
// Description: Unit tests for argument typing, defaults, and constraints.
// Purpose: Confirm malformed input is rejected with the offending field.
// Dependencies: kube-gate-core, proptest
// ============================================================================

//! ## Overview
//! Covers the rule order (unknown names, required names, types, defaults,
//! constraints), RFC 1123 name rules, and manifest parsing.
//!
//! Security posture: arguments are untrusted; every rejection must name the
//! field so the caller can correct it without a cluster round trip.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use super::*;
use crate::catalog::Catalog;
use crate::model::FailureKind;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn operation(name: &str) -> &'static Operation {
    Catalog::builtin().expect("builtin catalog").get(name).expect("operation registered")
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn check(name: &str, value: Value) -> Result<ValidatedArgs, Failure> {
    validate(operation(name), &args(value), &ValidationPolicy::default())
}

fn rejected_field(name: &str, value: Value) -> String {
    let failure = check(name, value).expect_err("arguments should be rejected");
    assert_eq!(failure.kind, FailureKind::InvalidArgument);
    failure.field.expect("failure names a field")
}

// ============================================================================
// SECTION: Rule Order
// ============================================================================

#[test]
fn unknown_argument_is_rejected() {
    assert_eq!(rejected_field("list_namespaces", json!({ "verbose": true })), "verbose");
}

#[test]
fn unknown_argument_is_reported_before_missing_required() {
    assert_eq!(rejected_field("scale_deployment", json!({ "replica": 3 })), "replica");
}

#[test]
fn missing_required_argument_is_rejected() {
    assert_eq!(rejected_field("scale_deployment", json!({ "name": "web" })), "replicas");
}

#[test]
fn null_counts_as_absent() {
    assert_eq!(rejected_field("describe_pod", json!({ "name": null })), "name");
    let validated = check("list_pods", json!({ "namespace": null })).unwrap();
    assert_eq!(validated.opt_str("namespace"), Some("default"));
    assert!(!validated.was_supplied("namespace"));
}

#[test]
fn negative_replicas_are_rejected() {
    let failure = check(
        "scale_deployment",
        json!({ "name": "web", "namespace": "default", "replicas": -1 }),
    )
    .unwrap_err();
    assert_eq!(failure.kind, FailureKind::InvalidArgument);
    assert_eq!(failure.field.as_deref(), Some("replicas"));
}

#[test]
fn integers_are_not_coerced() {
    let base = json!({ "name": "web" });
    for bad in [json!("3"), json!(3.5), json!(true), json!([3])] {
        let mut value = base.clone();
        value["replicas"] = bad;
        assert_eq!(rejected_field("scale_deployment", value), "replicas");
    }
}

#[test]
fn booleans_are_not_coerced() {
    assert_eq!(rejected_field("list_pods", json!({ "all_namespaces": "true" })), "all_namespaces");
    assert_eq!(rejected_field("list_pods", json!({ "all_namespaces": 1 })), "all_namespaces");
}

#[test]
fn defaults_fill_absent_arguments() {
    let validated = check("get_pod_logs", json!({ "name": "web-0" })).unwrap();
    assert_eq!(validated.opt_str("namespace"), Some("default"));
    assert_eq!(validated.opt_int("tail_lines"), Some(100));
    assert!(!validated.flag("previous"));
    assert!(validated.opt_str("container").is_none());
    assert!(validated.was_supplied("name"));
    assert!(!validated.was_supplied("tail_lines"));
}

#[test]
fn integer_bounds_are_inclusive() {
    assert!(check("get_pod_logs", json!({ "name": "a", "tail_lines": 1 })).is_ok());
    assert!(check("get_pod_logs", json!({ "name": "a", "tail_lines": 10_000 })).is_ok());
    assert_eq!(
        rejected_field("get_pod_logs", json!({ "name": "a", "tail_lines": 0 })),
        "tail_lines"
    );
    assert_eq!(
        rejected_field("get_pod_logs", json!({ "name": "a", "tail_lines": 10_001 })),
        "tail_lines"
    );
}

#[test]
fn enum_values_are_exact() {
    assert!(check("get_yaml", json!({ "kind": "ConfigMap", "name": "settings" })).is_ok());
    assert_eq!(rejected_field("get_yaml", json!({ "kind": "configmap", "name": "x" })), "kind");
    assert_eq!(rejected_field("get_yaml", json!({ "kind": "Ingress", "name": "x" })), "kind");
}

// ============================================================================
// SECTION: Names and Selectors
// ============================================================================

#[test]
fn namespace_must_be_a_dns_label() {
    for bad in ["Default", "-ns", "ns-", "ns.sub", "", "a_b"] {
        assert_eq!(rejected_field("list_deployments", json!({ "namespace": bad })), "namespace");
    }
    let long = "a".repeat(64);
    assert_eq!(rejected_field("list_deployments", json!({ "namespace": long })), "namespace");
    assert!(check("list_deployments", json!({ "namespace": "a".repeat(63) })).is_ok());
}

#[test]
fn resource_names_accept_subdomains() {
    assert!(check("describe_node", json!({ "name": "ip-10-0-0-1.ec2.internal" })).is_ok());
    assert_eq!(rejected_field("describe_node", json!({ "name": "node..one" })), "name");
}

#[test]
fn label_selector_charset_is_enforced() {
    assert!(check("list_pods", json!({ "label_selector": "app=web,tier!=cache" })).is_ok());
    assert!(check("list_pods", json!({ "label_selector": "env in (prod,stage)" })).is_ok());
    assert_eq!(
        rejected_field("list_pods", json!({ "label_selector": "app=web;rm -rf" })),
        "label_selector"
    );
    assert_eq!(rejected_field("list_pods", json!({ "label_selector": "  " })), "label_selector");
}

#[test]
fn label_maps_are_checked() {
    let ok = json!({ "name": "team-a", "labels": { "team": "a", "example.com/owner": "ops" } });
    let validated = check("create_namespace", ok).unwrap();
    assert_eq!(validated.labels("labels").len(), 2);

    let bad_key = json!({ "name": "team-a", "labels": { "bad key": "x" } });
    assert_eq!(rejected_field("create_namespace", bad_key), "labels");
    let bad_value = json!({ "name": "team-a", "labels": { "team": 7 } });
    assert_eq!(rejected_field("create_namespace", bad_value), "labels");
    let not_object = json!({ "name": "team-a", "labels": ["team=a"] });
    assert_eq!(rejected_field("create_namespace", not_object), "labels");
}

#[test]
fn label_key_and_value_rules() {
    assert!(is_label_key("app"));
    assert!(is_label_key("app.kubernetes.io/name"));
    assert!(!is_label_key("/name"));
    assert!(!is_label_key("Example.com/name"));
    assert!(is_label_value(""));
    assert!(is_label_value("v1.2_beta-3"));
    assert!(!is_label_value("-leading"));
}

// ============================================================================
// SECTION: Constraints
// ============================================================================

#[test]
fn protected_namespace_cannot_be_deleted() {
    for name in DEFAULT_PROTECTED_NAMESPACES {
        assert_eq!(rejected_field("delete_namespace", json!({ "name": name })), "name");
    }
    assert!(check("delete_namespace", json!({ "name": "prod" })).is_ok());
}

#[test]
fn protected_namespaces_follow_policy() {
    let policy = ValidationPolicy::with_protected(["prod"]);
    let operation = operation("delete_namespace");
    assert!(validate(operation, &args(json!({ "name": "prod" })), &policy).is_err());
    assert!(validate(operation, &args(json!({ "name": "default" })), &policy).is_ok());
}

#[test]
fn namespace_conflicts_with_all_namespaces() {
    let failure =
        check("list_pods", json!({ "namespace": "web", "all_namespaces": true })).unwrap_err();
    assert_eq!(failure.field.as_deref(), Some("namespace"));
    assert!(check("list_pods", json!({ "namespace": "web", "all_namespaces": false })).is_ok());
    assert!(check("list_pods", json!({ "all_namespaces": true })).is_ok());
}

// ============================================================================
// SECTION: Manifests
// ============================================================================

const TWO_DOCUMENTS: &str = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
data:
  mode: fast
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: shop
spec:
  replicas: 2
---
";

#[test]
fn manifest_documents_are_parsed_in_order() {
    let documents = parse_manifest(TWO_DOCUMENTS).unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["kind"], "ConfigMap");
    assert_eq!(documents[1]["metadata"]["namespace"], "shop");
    assert_eq!(documents[1]["spec"]["replicas"], 2);
}

#[test]
fn manifest_argument_is_normalized_to_documents() {
    let validated = check("apply_yaml", json!({ "manifest": TWO_DOCUMENTS })).unwrap();
    assert_eq!(validated.documents("manifest").unwrap().len(), 2);
}

#[test]
fn manifest_errors_name_the_document() {
    let missing_kind = "apiVersion: v1\nmetadata:\n  name: a\n";
    assert!(parse_manifest(missing_kind).unwrap_err().contains("missing kind"));

    let bad_name = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a/b\n";
    assert!(parse_manifest(bad_name).unwrap_err().contains("metadata.name"));
    let no_name = "apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n";
    assert!(parse_manifest(no_name).unwrap_err().contains("metadata.name"));

    let scalar = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\njust text\n";
    assert!(parse_manifest(scalar).unwrap_err().starts_with("document 1"));

    assert!(parse_manifest("---\n---\n").unwrap_err().contains("no documents"));
    assert!(parse_manifest("kind: [unterminated").unwrap_err().contains("invalid yaml"));
}

#[test]
fn manifest_names_follow_api_path_rules_not_dns_rules() {
    let cluster_role = "apiVersion: rbac.authorization.k8s.io/v1\nkind: ClusterRole\n\
                        metadata:\n  name: system:aggregated-metrics-reader\nrules: []\n";
    let documents = parse_manifest(cluster_role).unwrap();
    assert_eq!(documents[0]["metadata"]["name"], "system:aggregated-metrics-reader");

    let long_name = "n".repeat(254);
    for name in ["..", "a%2Fb", long_name.as_str()] {
        let text = format!("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: \"{name}\"\n");
        assert!(parse_manifest(&text).is_err(), "accepted {name}");
    }

    let bad_namespace =
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: Shop\n";
    assert!(parse_manifest(bad_namespace).unwrap_err().contains("metadata.namespace"));
}

#[test]
fn manifest_document_count_is_bounded() {
    let document = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\n";
    let text = document.repeat(MAX_MANIFEST_DOCUMENTS + 1);
    assert!(parse_manifest(&text).unwrap_err().contains("documents"));
    assert!(parse_manifest(&document.repeat(MAX_MANIFEST_DOCUMENTS)).is_ok());
}

#[test]
fn manifest_must_be_a_string() {
    assert_eq!(rejected_field("apply_yaml", json!({ "manifest": { "kind": "Pod" } })), "manifest");
}

// ============================================================================
// SECTION: Properties
// ============================================================================

proptest! {
    #[test]
    fn generated_dns_labels_are_accepted(label in "[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?") {
        prop_assert!(is_dns_label(&label));
    }

    #[test]
    fn labels_with_uppercase_are_rejected(prefix in "[a-z]{0,10}", suffix in "[a-z]{0,10}") {
        let label = format!("{prefix}X{suffix}");
        prop_assert!(!is_dns_label(&label));
    }

    #[test]
    fn arbitrary_strings_never_panic(text in ".{0,300}") {
        let _ = is_dns_subdomain(&text);
        let _ = is_label_key(&text);
        let _ = parse_manifest(&text);
    }
}
