// crates/kube-gate-mcp/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared fixtures for MCP integration tests.
// Purpose: Drive a server over in-memory stdio against a scripted cluster.
// Dependencies: kube-gate-core (test-support), kube-gate-config, kube-gate-mcp
// ============================================================================

//! ## Overview
//! Provides a sample scripted cluster and an [`McpClient`] that speaks
//! newline-delimited JSON-RPC to a server running on a background task.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use kube_gate_config::KubeGateConfig;
use kube_gate_core::ClusterAdapter;
use kube_gate_core::testing::ScriptedAdapter;
use kube_gate_core::testing::fixtures;
use kube_gate_mcp::McpNoopAuditSink;
use kube_gate_mcp::McpServer;
use kube_gate_mcp::McpServerError;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::DuplexStream;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::task::JoinHandle;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Returns a small cluster with one application namespace.
pub fn sample_cluster() -> Arc<ScriptedAdapter> {
    Arc::new(
        ScriptedAdapter::new()
            .with_namespaces(&["default", "kube-system", "shop"])
            .with_pod(fixtures::pod("shop", "web-7d4b9c-x2x5q", Some("node-a")))
            .with_deployment(fixtures::deployment("shop", "web", 2))
            .with_node(fixtures::node("node-a", &["worker"], true))
            .with_logs("shop", "web-7d4b9c-x2x5q", "booting\nlistening on :8080\n"),
    )
}

/// Builds a server over `adapter` from TOML configuration text.
pub fn server(adapter: &Arc<ScriptedAdapter>, config: &str) -> McpServer {
    let config = KubeGateConfig::from_toml_str(config).expect("config");
    McpServer::from_config(config, Arc::clone(adapter) as Arc<dyn ClusterAdapter>)
        .expect("server")
        .with_audit(Arc::new(McpNoopAuditSink))
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Line-framed JSON-RPC client for a server running over a duplex pipe.
pub struct McpClient {
    /// Server output.
    reader: BufReader<ReadHalf<DuplexStream>>,
    /// Server input.
    writer: WriteHalf<DuplexStream>,
    /// Server task.
    server: JoinHandle<Result<(), McpServerError>>,
    /// Next request id.
    next_id: u64,
}

impl McpClient {
    /// Starts `server` on a background task.
    pub fn start(server: McpServer) -> Self {
        let (client, transport) = tokio::io::duplex(256 * 1024);
        let (server_read, server_write) = tokio::io::split(transport);
        let (client_read, client_write) = tokio::io::split(client);
        let server = tokio::spawn(server.serve_streams(server_read, server_write));
        Self {
            reader: BufReader::new(client_read),
            writer: client_write,
            server,
            next_id: 1,
        }
    }

    /// Sends one raw JSON message.
    pub async fn send(&mut self, message: &Value) {
        let mut line = serde_json::to_vec(message).unwrap();
        line.push(b'\n');
        self.send_bytes(&line).await;
    }

    /// Writes bytes to the server's stdin unchanged.
    pub async fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.unwrap();
    }

    /// Reads the next response line.
    pub async fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(line.trim_end()).expect("response json")
    }

    /// Sends a request and waits for its response.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    /// Calls a tool and returns the `structuredContent` envelope.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        let response =
            self.request("tools/call", json!({ "name": name, "arguments": arguments })).await;
        let result = &response["result"];
        let is_error = result["isError"].as_bool().expect("isError");
        assert_eq!(is_error, result["structuredContent"]["status"] == "error");
        result["structuredContent"].clone()
    }

    /// Closes stdin and waits for the server to exit.
    pub async fn shutdown(mut self) -> Result<(), McpServerError> {
        self.writer.shutdown().await.unwrap();
        self.server.await.unwrap()
    }
}
