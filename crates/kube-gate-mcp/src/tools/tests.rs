// crates/kube-gate-mcp/src/tools/tests.rs
// ============================================================================
// Module: MCP Tool Router Tests
// Description: Unit tests for tool listing, routing, and result shaping.
// Purpose: Pin the tool result envelope seen by orchestrators.
// Dependencies: kube-gate-core (test-support)
// ============================================================================

//! ## Overview
//! Routes calls through a scripted in-memory cluster and checks the MCP
//! result shape for successes and gateway failures.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use kube_gate_core::CallKind;
use kube_gate_core::ClusterError;
use kube_gate_core::Effect;
use kube_gate_core::FailureKind;
use kube_gate_core::testing::ScriptedAdapter;
use serde_json::json;

use super::*;

fn router(adapter: &Arc<ScriptedAdapter>, config: &str) -> ToolRouter {
    let config = KubeGateConfig::from_toml_str(config).expect("config");
    ToolRouter::from_config(&config, Arc::clone(adapter) as Arc<dyn ClusterAdapter>)
        .expect("router")
}

fn cluster() -> Arc<ScriptedAdapter> {
    Arc::new(ScriptedAdapter::new().with_namespaces(&["default", "kube-system"]))
}

#[test]
fn list_tools_follows_catalog_restrictions() {
    let adapter = cluster();
    let full = router(&adapter, "");
    assert_eq!(full.tool_count(), kube_gate_core::builtin_names().len());

    let read_only =
        router(&adapter, "[catalog]\nread_only = true\ndisabled = [\"get_pod_logs\"]\n");
    let names: Vec<String> = read_only.list_tools().into_iter().map(|tool| tool.name).collect();
    assert!(names.contains(&"list_pods".to_string()));
    assert!(!names.contains(&"scale_deployment".to_string()));
    assert!(!names.contains(&"get_pod_logs".to_string()));
    assert!(read_only.list_tools().iter().all(|tool| tool.annotations.read_only_hint));
}

#[tokio::test]
async fn call_tool_returns_dispatch_report() {
    let adapter = cluster();
    let cancel = CancellationToken::new();
    let report = router(&adapter, "").call_tool("list_namespaces", json!({}), &cancel).await;
    assert_eq!(report.response, Response::success(json!(["default", "kube-system"])));
    assert_eq!(report.effect, Some(Effect::Read));
    assert_eq!(report.attempts, 1);
}

#[tokio::test]
async fn non_object_arguments_are_rejected_before_dispatch() {
    let adapter = cluster();
    let router = router(&adapter, "");
    let report = router.call_tool("list_pods", json!(["default"]), &CancellationToken::new()).await;
    let failure = report.response.error().unwrap();
    assert_eq!(failure.kind, FailureKind::InvalidArgument);
    assert_eq!(failure.field.as_deref(), Some("arguments"));
    assert_eq!(report.effect, Some(Effect::Read));
    assert_eq!(report.trace.last(), Some(&DispatchState::Completed));
    assert_eq!(adapter.call_count(), 0);

    let unknown = router.call_tool("exec_pod", json!("sh"), &CancellationToken::new()).await;
    assert_eq!(unknown.failure_kind(), Some(FailureKind::UnknownOperation));
    assert_eq!(unknown.effect, None);
}

#[tokio::test]
async fn disabled_operation_is_unknown() {
    let adapter = cluster();
    let router = router(&adapter, "[catalog]\ndisabled = [\"delete_namespace\"]\n");
    let report = router
        .call_tool("delete_namespace", json!({ "name": "team-a" }), &CancellationToken::new())
        .await;
    assert_eq!(report.failure_kind(), Some(FailureKind::UnknownOperation));
    assert_eq!(adapter.calls_of(CallKind::DeleteNamespace), 0);
}

#[test]
fn tool_result_wraps_success_envelope() {
    let response = Response::success(json!(["default"]));
    let result = ToolCallResult::from_response(&response).unwrap();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["isError"], false);
    assert_eq!(value["structuredContent"]["status"], "success");
    assert_eq!(value["structuredContent"]["payload"], json!(["default"]));
    assert_eq!(value["content"][0]["type"], "text");
    let text: Value = serde_json::from_str(value["content"][0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(text, value["structuredContent"]);
}

#[tokio::test]
async fn tool_result_marks_gateway_failures() {
    let adapter = cluster();
    adapter.fail_next(
        CallKind::DeleteNamespace,
        ClusterError::forbidden("namespaces \"prod\" is forbidden"),
    );
    let report = router(&adapter, "")
        .call_tool("delete_namespace", json!({ "name": "prod" }), &CancellationToken::new())
        .await;
    let result = ToolCallResult::from_response(&report.response).unwrap();
    assert!(result.is_error);
    assert_eq!(result.structured_content["status"], "error");
    assert_eq!(result.structured_content["error"]["kind"], "Forbidden");
}
