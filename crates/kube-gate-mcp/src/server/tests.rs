// crates/kube-gate-mcp/src/server/tests.rs
// ============================================================================
// Module: MCP Server Unit Tests
// Description: Unit tests for JSON-RPC handling, framing, and transports.
// Purpose: Validate protocol faults, limits, telemetry, and stdio lifecycle.
// Dependencies: kube-gate-core (test-support), tokio
// ============================================================================

//! ## Overview
//! Exercises the server internals directly: message decoding, the HTTP
//! handler, stdio framing, and full stdio sessions over in-memory pipes
//! backed by a scripted cluster.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

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
    reason = "Test-only framing assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::Ipv4Addr;

use kube_gate_core::CallKind;
use kube_gate_core::ClusterError;
use kube_gate_core::testing::ScriptedAdapter;
use tokio::io::DuplexStream;
use tokio::io::ReadHalf;
use tokio::io::WriteHalf;
use tokio::task::JoinHandle;

use super::*;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

#[derive(Default)]
struct TestMetrics {
    events: Mutex<Vec<McpMetricEvent>>,
    latencies: Mutex<Vec<(McpMetricEvent, Duration)>>,
}

impl McpMetrics for TestMetrics {
    fn record_request(&self, event: McpMetricEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn record_latency(&self, event: McpMetricEvent, latency: Duration) {
        self.latencies.lock().unwrap().push((event, latency));
    }
}

#[derive(Default)]
struct TestAudit {
    events: Mutex<Vec<McpAuditEvent>>,
}

impl McpAuditSink for TestAudit {
    fn record(&self, event: &McpAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn cluster() -> Arc<ScriptedAdapter> {
    Arc::new(ScriptedAdapter::new().with_namespaces(&["default", "team-a"]))
}

fn state_with(
    adapter: &Arc<ScriptedAdapter>,
    config: &str,
    metrics: Arc<dyn McpMetrics>,
    audit: Arc<dyn McpAuditSink>,
) -> ServerState {
    let config = KubeGateConfig::from_toml_str(config).expect("config");
    let router = ToolRouter::from_config(&config, Arc::clone(adapter) as Arc<dyn ClusterAdapter>)
        .expect("router");
    build_server_state(router, &config.server, metrics, audit)
}

fn state(adapter: &Arc<ScriptedAdapter>) -> ServerState {
    state_with(adapter, "", Arc::new(NoopMetrics), Arc::new(McpNoopAuditSink))
}

fn call(id: u64, name: &str, arguments: &Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    }))
    .unwrap()
}

fn initialize(id: u64, protocol_version: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": { "protocolVersion": protocol_version },
    }))
    .unwrap()
}

fn cancel_notification(request_id: u64) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": request_id },
    }))
    .unwrap()
}

async fn post(state: &ServerState, body: &[u8]) -> (StatusCode, Value) {
    let (status, payload) =
        parse_request(state, RequestContext::stdio(), body).await.expect("response");
    (status, serde_json::from_slice(&payload).expect("json response"))
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

#[tokio::test]
async fn malformed_json_is_parse_error() {
    let adapter = cluster();
    let (status, response) = post(&state(&adapter), b"{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn non_request_objects_are_invalid_requests() {
    let adapter = cluster();
    let state = state(&adapter);

    let (_, missing_method) = post(&state, br#"{"jsonrpc":"2.0","id":3}"#).await;
    assert_eq!(missing_method["error"]["code"], -32600);
    assert_eq!(missing_method["id"], 3);

    let (_, bad_version) = post(&state, br#"{"jsonrpc":"1.0","id":4,"method":"ping"}"#).await;
    assert_eq!(bad_version["error"]["code"], -32600);
    assert_eq!(bad_version["error"]["message"], "invalid request: invalid json-rpc version");

    let (_, bad_id) = post(&state, br#"{"jsonrpc":"2.0","id":{"x":1},"method":"ping"}"#).await;
    assert_eq!(bad_id["error"]["code"], -32600);
    assert_eq!(bad_id["id"], Value::Null);
}

#[tokio::test]
async fn oversized_body_is_rejected_with_request_too_large() {
    let adapter = cluster();
    let state = state_with(
        &adapter,
        "[server]\nmax_body_bytes = 16\n",
        Arc::new(NoopMetrics),
        Arc::new(McpNoopAuditSink),
    );
    let (status, response) = post(&state, br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response["error"]["code"], -32070);
}

#[tokio::test]
async fn notifications_are_never_answered() {
    let adapter = cluster();
    let state = state(&adapter);
    let body = br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
    assert!(parse_request(&state, RequestContext::stdio(), body).await.is_none());
    let null_id = br#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#;
    assert!(parse_request(&state, RequestContext::stdio(), null_id).await.is_none());
}

// ============================================================================
// SECTION: Methods
// ============================================================================

#[tokio::test]
async fn initialize_echoes_supported_protocol_version() {
    let adapter = cluster();
    let state = state(&adapter);
    let (status, response) = post(&state, &initialize(1, "2025-03-26")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(response["result"]["serverInfo"]["name"], "kube-gate");
    assert_eq!(response["result"]["capabilities"]["tools"]["listChanged"], false);

    let (_, response) = post(&state, &initialize(2, "1999-01-01")).await;
    assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
}

#[tokio::test]
async fn ping_and_unknown_methods() {
    let adapter = cluster();
    let state = state(&adapter);
    let (_, pong) = post(&state, br#"{"jsonrpc":"2.0","id":"a","method":"ping"}"#).await;
    assert_eq!(pong, json!({ "jsonrpc": "2.0", "id": "a", "result": {} }));

    let (status, missing) =
        post(&state, br#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(missing["error"]["code"], -32601);
}

#[tokio::test]
async fn tools_list_reports_catalog() {
    let adapter = cluster();
    let state = state_with(
        &adapter,
        "[catalog]\nread_only = true\n",
        Arc::new(NoopMetrics),
        Arc::new(McpNoopAuditSink),
    );
    let (_, response) = post(&state, br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).await;
    let tools = response["result"]["tools"].as_array().expect("tools");
    assert_eq!(tools.len(), state.router.tool_count());
    assert!(tools.iter().all(|tool| tool["annotations"]["readOnlyHint"] == true));
    assert!(tools.iter().any(|tool| tool["name"] == "list_namespaces"));
    assert!(tools[0]["inputSchema"].is_object());
}

#[tokio::test]
async fn tools_call_without_name_is_invalid_params() {
    let adapter = cluster();
    let state = state(&adapter);
    let body = br#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"arguments":{}}}"#;
    let (_, response) = post(&state, body).await;
    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(adapter.call_count(), 0);
}

#[tokio::test]
async fn gateway_failures_are_tool_results_not_rpc_errors() {
    let adapter = cluster();
    let state = state(&adapter);
    let (status, response) = post(&state, &call(9, "exec_pod", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
    assert_eq!(response["result"]["structuredContent"]["error"]["kind"], "UnknownOperation");
}

// ============================================================================
// SECTION: Limits and Telemetry
// ============================================================================

#[tokio::test]
async fn exhausted_inflight_limit_returns_busy() {
    let adapter = cluster();
    let state = state_with(
        &adapter,
        "[server.limits]\nmax_inflight = 1\n",
        Arc::new(NoopMetrics),
        Arc::new(McpNoopAuditSink),
    );
    let _permit = state.inflight.try_acquire().expect("permit");
    let (status, response) = post(&state, &call(1, "list_namespaces", &json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response["error"]["code"], -32072);
    assert_eq!(adapter.call_count(), 0);
}

#[tokio::test]
async fn tool_calls_record_metrics_and_audit() {
    let adapter = cluster();
    adapter.fail_next(CallKind::ListNamespaces, ClusterError::forbidden("namespaces is forbidden"));
    let metrics = Arc::new(TestMetrics::default());
    let audit = Arc::new(TestAudit::default());
    let state = state_with(&adapter, "", metrics.clone(), audit.clone());

    let context = RequestContext::http(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    parse_request(&state, context, &call(5, "list_namespaces", &json!({})))
        .await
        .expect("response");

    let events = metrics.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].method, McpMethod::ToolsCall);
    assert_eq!(events[0].operation.as_deref(), Some("list_namespaces"));
    assert_eq!(events[0].effect, Some("read"));
    assert_eq!(events[0].attempts, Some(1));
    assert_eq!(events[0].outcome, McpOutcome::Error);
    assert_eq!(events[0].error_code, None);
    assert_eq!(events[0].error_kind, Some("Forbidden"));
    assert_eq!(metrics.latencies.lock().unwrap().len(), 1);

    let records = audit.events.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event, "tool_call");
    assert_eq!(records[0].request_id.as_deref(), Some("5"));
    assert_eq!(records[0].peer_ip.as_deref(), Some("127.0.0.1"));
    assert_eq!(records[0].effect, Some("read"));
    assert_eq!(records[0].attempts, Some(1));
}

#[tokio::test]
async fn protocol_errors_record_error_outcome() {
    let adapter = cluster();
    let metrics = Arc::new(TestMetrics::default());
    let state = state_with(&adapter, "", metrics.clone(), Arc::new(McpNoopAuditSink));
    post(&state, b"[]").await;
    let events = metrics.events.lock().unwrap();
    assert_eq!(events[0].method, McpMethod::Invalid);
    assert_eq!(events[0].outcome, McpOutcome::Error);
    assert_eq!(events[0].error_code, Some(-32600));
    assert_eq!(events[0].error_kind, Some("invalid_request"));
}

// ============================================================================
// SECTION: HTTP Handler
// ============================================================================

#[tokio::test]
async fn http_handler_returns_json_and_accepts_notifications() {
    let adapter = cluster();
    let state = Arc::new(state(&adapter));
    let peer = ConnectInfo(SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000)));

    let response = handle_http(
        State(Arc::clone(&state)),
        peer,
        Bytes::from_static(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["result"], json!({}));

    let response = handle_http(
        State(state),
        peer,
        Bytes::from_static(br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

// ============================================================================
// SECTION: Framing
// ============================================================================

#[tokio::test]
async fn read_frame_accepts_both_framings() {
    let input =
        b"\n{\"a\":1}\r\nContent-Length: 7\r\nContent-Type: application/json\r\n\r\n{\"b\":2}";
    let mut reader = BufReader::new(&input[..]);

    let line = read_frame(&mut reader, 1024).await.unwrap().expect("line frame");
    assert_eq!(line.framing, Framing::Line);
    assert_eq!(line.body, b"{\"a\":1}");

    let framed = read_frame(&mut reader, 1024).await.unwrap().expect("framed");
    assert_eq!(framed.framing, Framing::ContentLength);
    assert_eq!(framed.body, b"{\"b\":2}");

    assert!(read_frame(&mut reader, 1024).await.unwrap().is_none());
}

#[tokio::test]
async fn read_frame_header_names_are_case_insensitive() {
    let mut reader = BufReader::new(&b"content-length: 2\r\n\r\n{}"[..]);
    let frame = read_frame(&mut reader, 64).await.unwrap().expect("frame");
    assert_eq!(frame.body, b"{}");
}

#[tokio::test]
async fn read_frame_rejects_malformed_headers() {
    let cases: [(&[u8], &str); 5] = [
        (b"Content-Length: 2\r\nContent-Length: 2\r\n\r\n{}", "duplicate content length"),
        (b"Content-Length: two\r\n\r\n{}", "invalid content length"),
        (b"Content-Type: application/json\r\n\r\n{}", "missing content length"),
        (b"Content-Length: 2\r\n", "stdio closed mid-frame"),
        (b"Content-Length: 2\r\ngarbage\r\n\r\n{}", "invalid frame header"),
    ];
    for (input, expected) in cases {
        let mut reader = BufReader::new(input);
        let err = read_frame(&mut reader, 64).await.expect_err("malformed frame");
        assert_eq!(err.to_string(), format!("transport error: {expected}"));
    }
}

#[tokio::test]
async fn read_frame_passes_stray_text_to_the_decoder() {
    let input = b"not json at all\r\nContent-Type text\n{\"a\":1}\n";
    let mut reader = BufReader::new(&input[..]);
    for expected in [&b"not json at all"[..], b"Content-Type text", b"{\"a\":1}"] {
        let frame = read_frame(&mut reader, 64).await.unwrap().expect("line frame");
        assert_eq!(frame.framing, Framing::Line);
        assert_eq!(frame.body, expected);
    }
    assert!(read_frame(&mut reader, 64).await.unwrap().is_none());

    let long_text = format!("{}\n", "z".repeat(MAX_HEADER_BYTES + 10));
    let mut reader = BufReader::new(long_text.as_bytes());
    let err = read_frame(&mut reader, 64).await.expect_err("oversized line");
    assert_eq!(err.to_string(), "transport error: payload too large");
}

#[tokio::test]
async fn read_frame_enforces_size_limits() {
    let long_line = format!("{{\"pad\":\"{}\"}}\n", "x".repeat(64));
    let mut reader = BufReader::new(long_line.as_bytes());
    let err = read_frame(&mut reader, 32).await.expect_err("oversized line");
    assert_eq!(err.to_string(), "transport error: payload too large");

    let mut reader = BufReader::new(&b"Content-Length: 4096\r\n\r\n"[..]);
    let err = read_frame(&mut reader, 1024).await.expect_err("oversized body");
    assert_eq!(err.to_string(), "transport error: payload too large");

    let header = format!("X-Pad: {}\r\n\r\n", "y".repeat(MAX_HEADER_BYTES + 10));
    let mut reader = BufReader::new(header.as_bytes());
    let err = read_frame(&mut reader, 1 << 20).await.expect_err("oversized header");
    assert_eq!(err.to_string(), "transport error: frame header too large");
}

#[tokio::test]
async fn write_frame_mirrors_framing() {
    let mut out = Vec::new();
    write_frame(&mut out, Framing::ContentLength, b"{}").await.unwrap();
    write_frame(&mut out, Framing::Line, b"[]").await.unwrap();
    assert_eq!(out, b"Content-Length: 2\r\n\r\n{}[]\n");
}

// ============================================================================
// SECTION: Stdio Sessions
// ============================================================================

struct Session {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    server: JoinHandle<Result<(), McpServerError>>,
}

impl Session {
    fn start(state: ServerState) -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);
        let server =
            tokio::spawn(serve_stdio(Arc::new(state), BufReader::new(server_read), server_write));
        Self {
            reader: BufReader::new(client_read),
            writer: client_write,
            server,
        }
    }

    async fn send_line(&mut self, body: &[u8]) {
        self.writer.write_all(body).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn send_framed(&mut self, body: &[u8]) {
        let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(body);
        self.writer.write_all(&frame).await.unwrap();
    }

    async fn recv_line(&mut self) -> Value {
        let mut line = String::new();
        self.reader.read_line(&mut line).await.unwrap();
        serde_json::from_str(line.trim_end()).expect("line response")
    }

    async fn recv_framed(&mut self) -> Value {
        let mut header = String::new();
        self.reader.read_line(&mut header).await.unwrap();
        let length: usize = header
            .trim_end()
            .strip_prefix("Content-Length: ")
            .expect("content length header")
            .parse()
            .unwrap();
        let mut blank = String::new();
        self.reader.read_line(&mut blank).await.unwrap();
        assert_eq!(blank, "\r\n");
        let mut body = vec![0u8; length];
        self.reader.read_exact(&mut body).await.unwrap();
        serde_json::from_slice(&body).expect("framed response")
    }

    async fn close(mut self) -> Result<(), McpServerError> {
        self.writer.shutdown().await.unwrap();
        self.server.await.unwrap()
    }
}

#[tokio::test]
async fn stdio_answers_in_the_framing_of_the_request() {
    let adapter = cluster();
    let mut session = Session::start(state(&adapter));

    session.send_framed(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).await;
    let framed = session.recv_framed().await;
    assert_eq!(framed["id"], 1);

    session.send_line(&call(2, "list_namespaces", &json!({}))).await;
    let line = session.recv_line().await;
    assert_eq!(line["id"], 2);
    assert_eq!(line["result"]["structuredContent"]["payload"], json!(["default", "team-a"]));

    session.close().await.unwrap();
}

#[tokio::test]
async fn stdio_rejects_duplicate_inflight_ids() {
    let adapter = cluster();
    adapter.hang_next(CallKind::ListNamespaces);
    let mut session = Session::start(state(&adapter));

    session.send_line(&call(4, "list_namespaces", &json!({}))).await;
    session.send_line(&call(4, "list_namespaces", &json!({}))).await;
    let duplicate = session.recv_line().await;
    assert_eq!(duplicate["id"], 4);
    assert_eq!(duplicate["error"]["code"], -32600);

    session.send_line(&cancel_notification(4)).await;
    let cancelled = session.recv_line().await;
    assert_eq!(cancelled["id"], 4);
    assert_eq!(cancelled["result"]["isError"], true);
    assert_eq!(cancelled["result"]["structuredContent"]["error"]["kind"], "Cancelled");

    session.close().await.unwrap();
}

#[tokio::test]
async fn stdio_serves_requests_concurrently() {
    let adapter = cluster();
    adapter.hang_next(CallKind::ListNamespaces);
    let mut session = Session::start(state(&adapter));

    session.send_line(&call(1, "list_namespaces", &json!({}))).await;
    session.send_line(br#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#).await;
    let first = session.recv_line().await;
    assert_eq!(first["id"], 2);

    session.send_line(&cancel_notification(1)).await;
    let second = session.recv_line().await;
    assert_eq!(second["id"], 1);
    session.close().await.unwrap();
    assert_eq!(adapter.in_flight(), 0);
}

#[tokio::test]
async fn stdio_eof_cancels_and_flushes_outstanding_calls() {
    let adapter = cluster();
    adapter.hang_next(CallKind::ListNamespaces);
    let mut session = Session::start(state(&adapter));

    session.send_line(&call(11, "list_namespaces", &json!({}))).await;
    session.writer.shutdown().await.unwrap();

    let response = session.recv_line().await;
    assert_eq!(response["id"], 11);
    assert_eq!(response["result"]["structuredContent"]["error"]["kind"], "Cancelled");
    session.server.await.unwrap().unwrap();
    assert_eq!(adapter.in_flight(), 0);
}

#[tokio::test]
async fn stdio_oversized_frame_terminates_transport() {
    let adapter = cluster();
    let state = state_with(
        &adapter,
        "[server]\nmax_body_bytes = 64\n",
        Arc::new(NoopMetrics),
        Arc::new(McpNoopAuditSink),
    );
    let mut session = Session::start(state);
    session.send_framed(&[b' '; 128]).await;
    let err = session.server.await.unwrap().expect_err("oversized frame");
    assert!(matches!(err, McpServerError::Transport(_)));
}
