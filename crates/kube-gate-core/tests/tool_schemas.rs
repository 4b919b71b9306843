// crates/kube-gate-core/tests/tool_schemas.rs
// ============================================================================
// Module: Tool Schema Tests
// Description: Advertised tool input schemas agree with the validator.
// Purpose: Keep the JSON Schema contract and enforced contract aligned.
// Dependencies: kube-gate-core, jsonschema, serde_json
// ============================================================================

//! ## Overview
//! Compiles every tool input schema as draft 2020-12 and checks that sample
//! arguments are accepted or rejected by the schema and by the validator
//! alike.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::collections::BTreeSet;

use jsonschema::Draft;
use jsonschema::Validator;
use kube_gate_core::BUILTIN_OPERATIONS;
use kube_gate_core::Catalog;
use kube_gate_core::Operation;
use kube_gate_core::ValidationPolicy;
use kube_gate_core::validate;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const MANIFEST: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n";

fn compile(schema: &Value) -> Validator {
    jsonschema::options().with_draft(Draft::Draft202012).build(schema).expect("schema compiles")
}

fn minimal_arguments(operation: &str) -> Value {
    match operation {
        "get_pod_logs" | "describe_pod" => json!({ "name": "web-0" }),
        "scale_deployment" => json!({ "name": "web", "replicas": 3 }),
        "restart_deployment" | "describe_service" => json!({ "name": "web" }),
        "apply_yaml" => json!({ "manifest": MANIFEST }),
        "get_yaml" => json!({ "kind": "Secret", "name": "db" }),
        "create_namespace" => json!({ "name": "team-a", "labels": { "team": "a" } }),
        "delete_namespace" => json!({ "name": "scratch" }),
        "describe_node" => json!({ "name": "worker-1" }),
        _ => json!({}),
    }
}

fn accepted_by_validator(operation: &Operation, arguments: &Value) -> bool {
    let map = arguments.as_object().expect("object arguments");
    validate(operation, map, &ValidationPolicy::default()).is_ok()
}

fn assert_agree(operation: &Operation, schema: &Validator, arguments: &Value, expected: bool) {
    assert_eq!(
        schema.is_valid(arguments),
        expected,
        "{} schema disagrees for {arguments}",
        operation.name
    );
    assert_eq!(
        accepted_by_validator(operation, arguments),
        expected,
        "{} validator disagrees for {arguments}",
        operation.name
    );
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn every_tool_schema_is_a_valid_draft_2020_12_schema() {
    let catalog = Catalog::builtin().unwrap();
    for definition in catalog.tool_definitions() {
        assert!(
            jsonschema::meta::is_valid(&definition.input_schema),
            "{} schema fails the meta-schema",
            definition.name
        );
        assert_eq!(definition.input_schema["type"], "object");
        assert_eq!(definition.input_schema["additionalProperties"], false);
    }
}

#[test]
fn schema_required_list_matches_declared_arguments() {
    for operation in BUILTIN_OPERATIONS {
        let schema = kube_gate_core::schema::input_schema(operation);
        let required: BTreeSet<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value.as_str().unwrap())
            .collect();
        let declared: BTreeSet<&str> =
            operation.arguments.iter().filter(|spec| spec.required).map(|spec| spec.name).collect();
        assert_eq!(required, declared, "{}", operation.name);
    }
}

#[test]
fn minimal_arguments_pass_schema_and_validator() {
    for operation in BUILTIN_OPERATIONS {
        let schema = compile(&kube_gate_core::schema::input_schema(operation));
        assert_agree(operation, &schema, &minimal_arguments(operation.name), true);
    }
}

#[test]
fn unknown_properties_fail_schema_and_validator() {
    for operation in BUILTIN_OPERATIONS {
        let schema = compile(&kube_gate_core::schema::input_schema(operation));
        let mut arguments = minimal_arguments(operation.name);
        arguments["unexpected"] = json!(true);
        assert_agree(operation, &schema, &arguments, false);
    }
}

#[test]
fn missing_required_arguments_fail_schema_and_validator() {
    for operation in BUILTIN_OPERATIONS {
        if operation.arguments.iter().all(|spec| !spec.required) {
            continue;
        }
        let schema = compile(&kube_gate_core::schema::input_schema(operation));
        assert_agree(operation, &schema, &json!({}), false);
    }
}

#[test]
fn type_and_range_violations_fail_schema_and_validator() {
    let catalog = Catalog::builtin().unwrap();
    let cases = [
        ("scale_deployment", json!({ "name": "web", "replicas": -1 })),
        ("scale_deployment", json!({ "name": "web", "replicas": 1001 })),
        ("scale_deployment", json!({ "name": "web", "replicas": "3" })),
        ("get_pod_logs", json!({ "name": "web-0", "tail_lines": 0 })),
        ("list_pods", json!({ "namespace": "Prod" })),
        ("list_pods", json!({ "all_namespaces": "yes" })),
        ("get_yaml", json!({ "kind": "Ingress", "name": "web" })),
        ("describe_node", json!({ "name": "-worker" })),
        ("create_namespace", json!({ "name": "team-a", "labels": { "team": 1 } })),
    ];
    for (name, arguments) in cases {
        let operation = catalog.get(name).unwrap();
        let schema = compile(&kube_gate_core::schema::input_schema(operation));
        assert_agree(operation, &schema, &arguments, false);
    }
}
