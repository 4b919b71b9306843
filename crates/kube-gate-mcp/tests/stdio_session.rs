// crates/kube-gate-mcp/tests/stdio_session.rs
// ============================================================================
// Module: Stdio Session Tests
// Description: End-to-end MCP sessions over the stdio transport.
// Purpose: Verify the handshake, tool discovery, and tool calls as an agent
//          orchestrator sees them.
// Dependencies: kube-gate-core (test-support), kube-gate-mcp
// ============================================================================

//! ## Overview
//! Runs complete sessions against a scripted cluster through the public
//! [`kube_gate_mcp::McpServer`] API.
//!
//! Security posture: arguments arrive from an untrusted model; protected
//! namespaces and read-only catalogs must hold at the protocol boundary.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use common::McpClient;
use kube_gate_core::CallKind;
use kube_gate_core::ClusterError;
use kube_gate_mcp::MCP_PROTOCOL_VERSION;
use serde_json::json;

#[tokio::test]
async fn agent_session_reads_and_mutates_cluster() {
    let adapter = common::sample_cluster();
    let mut client = McpClient::start(common::server(&adapter, ""));

    let init = client
        .request("initialize", json!({ "protocolVersion": MCP_PROTOCOL_VERSION }))
        .await;
    assert_eq!(init["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
    client.send(&json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })).await;

    let listed = client.request("tools/list", json!({})).await;
    let tools = listed["result"]["tools"].as_array().expect("tools");
    let scale = tools.iter().find(|tool| tool["name"] == "scale_deployment").expect("scale");
    assert_eq!(scale["annotations"]["readOnlyHint"], false);

    let logs = client
        .call_tool("get_pod_logs", json!({ "name": "web-7d4b9c-x2x5q", "namespace": "shop" }))
        .await;
    assert_eq!(logs["status"], "success");
    assert!(logs["payload"]["logs"].as_str().unwrap().contains("listening on :8080"));

    let scaled = client
        .call_tool("scale_deployment", json!({ "name": "web", "namespace": "shop", "replicas": 5 }))
        .await;
    assert_eq!(scaled["status"], "success");
    assert_eq!(scaled["payload"]["replicas"], 5);
    assert_eq!(adapter.state().deployments[0].replicas, 5);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn protected_namespace_is_refused_before_any_cluster_call() {
    let adapter = common::sample_cluster();
    let mut client = McpClient::start(common::server(&adapter, ""));

    let refused = client.call_tool("delete_namespace", json!({ "name": "kube-system" })).await;
    assert_eq!(refused["status"], "error");
    assert_eq!(refused["error"]["kind"], "InvalidArgument");
    assert_eq!(refused["error"]["field"], "name");
    assert_eq!(adapter.calls_of(CallKind::DeleteNamespace), 0);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn read_only_catalog_hides_mutations() {
    let adapter = common::sample_cluster();
    let mut client = McpClient::start(common::server(&adapter, "[catalog]\nread_only = true\n"));

    let listed = client.request("tools/list", json!({})).await;
    let tools = listed["result"]["tools"].as_array().expect("tools");
    assert!(tools.iter().all(|tool| tool["annotations"]["readOnlyHint"] == true));

    let refused = client
        .call_tool("scale_deployment", json!({ "name": "web", "namespace": "shop", "replicas": 0 }))
        .await;
    assert_eq!(refused["error"]["kind"], "UnknownOperation");
    assert_eq!(adapter.state().deployments[0].replicas, 2);

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn stray_text_is_answered_and_the_session_continues() {
    let adapter = common::sample_cluster();
    let mut client = McpClient::start(common::server(&adapter, ""));

    client.send_bytes(b"not json at all\n").await;
    let rejected = client.recv().await;
    assert_eq!(rejected["error"]["code"], -32700);
    assert_eq!(rejected["id"], serde_json::Value::Null);

    let pong = client.request("ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));

    client.shutdown().await.unwrap();
}

#[tokio::test]
async fn cluster_failures_surface_as_tool_errors() {
    let adapter = common::sample_cluster();
    adapter.fail_next(CallKind::ListNodes, ClusterError::forbidden("nodes is forbidden"));
    let mut client = McpClient::start(common::server(&adapter, ""));

    let denied = client.call_tool("list_nodes", json!({})).await;
    assert_eq!(denied["error"]["kind"], "Forbidden");

    let nodes = client.call_tool("list_nodes", json!({})).await;
    assert_eq!(nodes["status"], "success");

    client.shutdown().await.unwrap();
}
