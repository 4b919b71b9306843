// crates/kube-gate-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: MCP server implementations for stdio and HTTP transports.
// Purpose: Expose the gateway catalog as MCP tools over JSON-RPC 2.0.
// Dependencies: kube-gate-core, kube-gate-config, axum, tokio
// ============================================================================

//! ## Overview
//! The MCP server exposes catalog operations using JSON-RPC 2.0 and always
//! routes calls through [`crate::tools::ToolRouter`]. Stdio accepts both
//! newline-delimited JSON and `Content-Length` framed messages, answers each
//! request in the framing it arrived in, and services requests concurrently
//! up to `server.limits.max_inflight`. A single writer task owns stdout.
//!
//! Security posture: inputs are untrusted. Oversized stdio frames terminate
//! the transport; oversized HTTP bodies are rejected with `-32070`.
//!
//! ## Invariants
//! - Gateway failures are tool results with `isError: true`; JSON-RPC errors
//!   are reserved for protocol faults.
//! - Notifications never produce a response.
//! - When stdin closes, outstanding calls are cancelled and their responses
//!   are flushed before [`McpServer::serve`] returns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::post;
use kube_gate_config::KubeGateConfig;
use kube_gate_config::ServerConfig;
use kube_gate_config::ServerTransport;
use kube_gate_core::ClusterAdapter;
use kube_gate_core::Effect;
use kube_gate_core::FailureKind;
use kube_gate_core::ToolDefinition;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::audit::McpAuditEvent;
use crate::audit::McpAuditEventParams;
use crate::audit::McpAuditSink;
use crate::audit::McpFileAuditSink;
use crate::audit::McpNoopAuditSink;
use crate::audit::McpStderrAuditSink;
use crate::context::RequestContext;
use crate::telemetry::McpMethod;
use crate::telemetry::McpMetricEvent;
use crate::telemetry::McpMetrics;
use crate::telemetry::McpOutcome;
use crate::telemetry::NoopMetrics;
use crate::tools::ToolCallResult;
use crate::tools::ToolRouter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// JSON-RPC protocol version.
const JSONRPC_VERSION: &str = "2.0";
/// Latest MCP protocol revision this server speaks.
pub const MCP_PROTOCOL_VERSION: &str = "2025-06-18";
/// MCP protocol revisions accepted from clients during `initialize`.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];
/// Server name advertised during `initialize`.
const SERVER_NAME: &str = "kube-gate";
/// Maximum bytes in a single frame header line.
const MAX_HEADER_BYTES: usize = 1024;
/// Maximum header lines in one frame.
const MAX_HEADER_LINES: usize = 8;
/// Outbound frames buffered ahead of the stdio writer.
const WRITER_QUEUE_DEPTH: usize = 64;
/// Response written when a response envelope cannot be serialized.
const FALLBACK_ERROR: &[u8] =
    br#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"serialization failed"}}"#;

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: KubeGateConfig,
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Metrics sink.
    metrics: Arc<dyn McpMetrics>,
    /// Audit sink.
    audit: Arc<dyn McpAuditSink>,
}

impl McpServer {
    /// Builds a new MCP server from configuration and a cluster adapter.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the configuration is invalid, the
    /// catalog cannot be built, or the audit log cannot be opened.
    pub fn from_config(
        mut config: KubeGateConfig,
        adapter: Arc<dyn ClusterAdapter>,
    ) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let router = ToolRouter::from_config(&config, adapter)
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let audit = build_audit_sink(&config.server)?;
        Ok(Self {
            config,
            router,
            metrics: Arc::new(NoopMetrics),
            audit,
        })
    }

    /// Replaces the metrics sink.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn McpMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replaces the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn McpAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the configured transport.
    #[must_use]
    pub const fn transport(&self) -> ServerTransport {
        self.config.server.transport
    }

    /// Returns the tool router.
    #[must_use]
    pub const fn router(&self) -> &ToolRouter {
        &self.router
    }

    /// Serves requests using the configured transport.
    ///
    /// Stdio returns `Ok` when stdin closes.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        match self.config.server.transport {
            ServerTransport::Stdio => {
                self.serve_streams(tokio::io::stdin(), tokio::io::stdout()).await
            }
            ServerTransport::Http => serve_http(self).await,
        }
    }

    /// Serves the stdio protocol over arbitrary byte streams.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError::Transport`] when a frame is malformed or
    /// oversized, or when the writer fails.
    pub async fn serve_streams<R, W>(self, reader: R, writer: W) -> Result<(), McpServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let state = Arc::new(build_server_state(
            self.router,
            &self.config.server,
            self.metrics,
            self.audit,
        ));
        serve_stdio(state, BufReader::new(reader), writer).await
    }
}

/// Builds the audit sink from server configuration.
fn build_audit_sink(server: &ServerConfig) -> Result<Arc<dyn McpAuditSink>, McpServerError> {
    if !server.audit.enabled {
        return Ok(Arc::new(McpNoopAuditSink));
    }
    match server.audit.path.as_deref() {
        Some(path) => {
            let sink = McpFileAuditSink::new(Path::new(path))
                .map_err(|err| McpServerError::Init(format!("audit log {path}: {err}")))?;
            Ok(Arc::new(sink))
        }
        None => Ok(Arc::new(McpStderrAuditSink)),
    }
}

// ============================================================================
// SECTION: Server State
// ============================================================================

/// Shared server state for all transports.
struct ServerState {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Maximum allowed request body or frame size.
    max_body_bytes: usize,
    /// Permits for concurrently handled requests.
    inflight: Arc<Semaphore>,
    /// Metrics sink.
    metrics: Arc<dyn McpMetrics>,
    /// Audit sink.
    audit: Arc<dyn McpAuditSink>,
}

/// Builds the shared server state.
fn build_server_state(
    router: ToolRouter,
    server: &ServerConfig,
    metrics: Arc<dyn McpMetrics>,
    audit: Arc<dyn McpAuditSink>,
) -> ServerState {
    ServerState {
        router,
        max_body_bytes: server.max_body_bytes,
        inflight: Arc::new(Semaphore::new(server.limits.max_inflight)),
        metrics,
        audit,
    }
}

/// Cancellation handles for in-flight stdio requests, keyed by JSON id.
#[derive(Default)]
struct PendingCalls {
    /// Tokens by rendered request id.
    calls: Mutex<HashMap<String, CancellationToken>>,
}

impl PendingCalls {
    /// Locks the map, recovering from a poisoned lock.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a request; returns false when the id is already in flight.
    fn register(&self, key: &str, token: CancellationToken) -> bool {
        let mut calls = self.lock();
        if calls.contains_key(key) {
            return false;
        }
        calls.insert(key.to_string(), token);
        true
    }

    /// Cancels a request; returns false when the id is not in flight.
    fn cancel(&self, key: &str) -> bool {
        self.lock().get(key).map(CancellationToken::cancel).is_some()
    }

    /// Forgets a finished request.
    fn complete(&self, key: &str) {
        self.lock().remove(key);
    }
}

// ============================================================================
// SECTION: Stdio Transport
// ============================================================================

/// Frame encodings accepted on stdio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// One JSON document per line.
    Line,
    /// MCP `Content-Length` header block followed by the body.
    ContentLength,
}

/// One inbound stdio message.
#[derive(Debug)]
struct Frame {
    /// Encoding the message arrived in.
    framing: Framing,
    /// Message body.
    body: Vec<u8>,
}

/// One outbound stdio message.
struct Outbound {
    /// Encoding to mirror.
    framing: Framing,
    /// Serialized response.
    payload: Vec<u8>,
}

/// Serves JSON-RPC requests over a reader/writer pair.
async fn serve_stdio<R, W>(
    state: Arc<ServerState>,
    mut reader: R,
    writer: W,
) -> Result<(), McpServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Outbound>(WRITER_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_loop(writer, rx));
    let shutdown = CancellationToken::new();
    let pending = Arc::new(PendingCalls::default());
    let mut tasks = JoinSet::new();
    let outcome = loop {
        if tx.is_closed() {
            break Ok(());
        }
        let frame = match read_frame(&mut reader, state.max_body_bytes).await {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        };
        while tasks.try_join_next().is_some() {}
        let started = Instant::now();
        let request_bytes = frame.body.len();
        let framing = frame.framing;
        let request = match decode(&frame.body, state.max_body_bytes) {
            Inbound::Request(request) => request,
            Inbound::Notification(request) => {
                let context = RequestContext::stdio();
                let pending = Some(pending.as_ref());
                handle_notification(&state, &context, &request, pending, request_bytes, started);
                continue;
            }
            Inbound::Rejected(handled) => {
                let (_, payload) =
                    finish(&state, &RequestContext::stdio(), request_bytes, started, handled);
                enqueue(&tx, framing, payload).await;
                continue;
            }
        };
        let id = request.id.clone().unwrap_or(Value::Null);
        let key = id.to_string();
        let context = RequestContext::stdio().with_request_id(key.clone());
        let Ok(permit) = Arc::clone(&state.inflight).try_acquire_owned() else {
            let method = McpMethod::from_method(&request.method);
            let handled = Handled::protocol_error(id, method, ProtocolError::Busy);
            let (_, payload) = finish(&state, &context, request_bytes, started, handled);
            enqueue(&tx, framing, payload).await;
            continue;
        };
        let cancel = shutdown.child_token();
        if !pending.register(&key, cancel.clone()) {
            let handled = Handled::protocol_error(
                id,
                McpMethod::from_method(&request.method),
                ProtocolError::InvalidRequest("duplicate in-flight request id"),
            );
            let (_, payload) = finish(&state, &context, request_bytes, started, handled);
            enqueue(&tx, framing, payload).await;
            continue;
        }
        let state = Arc::clone(&state);
        let pending = Arc::clone(&pending);
        let tx = tx.clone();
        tasks.spawn(async move {
            let handled = handle_request(&state, request, &cancel).await;
            pending.complete(&key);
            drop(permit);
            let (_, payload) = finish(&state, &context, request_bytes, started, handled);
            enqueue(&tx, framing, payload).await;
        });
    };
    shutdown.cancel();
    while tasks.join_next().await.is_some() {}
    drop(tx);
    let written = writer_task
        .await
        .map_err(|_| McpServerError::Transport("stdio writer task failed".to_string()))?;
    outcome?;
    written
}

/// Queues one response for the writer task.
async fn enqueue(tx: &mpsc::Sender<Outbound>, framing: Framing, payload: Vec<u8>) {
    let _ = tx
        .send(Outbound {
            framing,
            payload,
        })
        .await;
}

/// Writes outbound frames until every sender is dropped.
async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<Outbound>,
) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        write_frame(&mut writer, outbound.framing, &outbound.payload).await?;
    }
    Ok(())
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Serves JSON-RPC requests over HTTP.
async fn serve_http(server: McpServer) -> Result<(), McpServerError> {
    let bind = server
        .config
        .server
        .bind_address()
        .ok_or_else(|| McpServerError::Config("bind address required".to_string()))?;
    let addr: SocketAddr =
        bind.parse().map_err(|_| McpServerError::Config("invalid bind address".to_string()))?;
    let max_body_bytes = server.config.server.max_body_bytes;
    let state = Arc::new(build_server_state(
        server.router,
        &server.config.server,
        server.metrics,
        server.audit,
    ));
    let app = Router::new()
        .route("/rpc", post(handle_http))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|_| McpServerError::Transport("http server failed".to_string()))
}

/// Handles HTTP JSON-RPC requests.
///
/// The call is dropped with the connection when the client disconnects.
async fn handle_http(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    bytes: Bytes,
) -> axum::response::Response {
    let context = RequestContext::http(Some(peer.ip()));
    match parse_request(&state, context, &bytes).await {
        Some((status, payload)) => {
            (status, [(CONTENT_TYPE, "application/json")], payload).into_response()
        }
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Parses and handles one HTTP JSON-RPC payload.
///
/// Returns `None` for notifications.
async fn parse_request(
    state: &ServerState,
    context: RequestContext,
    bytes: &[u8],
) -> Option<(StatusCode, Vec<u8>)> {
    let started = Instant::now();
    let request = match decode(bytes, state.max_body_bytes) {
        Inbound::Request(request) => request,
        Inbound::Notification(request) => {
            handle_notification(state, &context, &request, None, bytes.len(), started);
            return None;
        }
        Inbound::Rejected(handled) => {
            return Some(finish(state, &context, bytes.len(), started, handled));
        }
    };
    let id = request.id.clone().unwrap_or(Value::Null);
    let context = context.with_request_id(id.to_string());
    let Ok(_permit) = state.inflight.try_acquire() else {
        let method = McpMethod::from_method(&request.method);
        let handled = Handled::protocol_error(id, method, ProtocolError::Busy);
        return Some(finish(state, &context, bytes.len(), started, handled));
    };
    let handled = handle_request(state, request, &CancellationToken::new()).await;
    Some(finish(state, &context, bytes.len(), started, handled))
}

// ============================================================================
// SECTION: JSON-RPC Types
// ============================================================================

/// Incoming JSON-RPC message.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC protocol version.
    jsonrpc: String,
    /// Request identifier; absent for notifications.
    #[serde(default)]
    id: Option<Value>,
    /// Method name.
    method: String,
    /// Optional parameters payload.
    #[serde(default)]
    params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Builds a success response.
    const fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    const fn error(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
            }),
        }
    }
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// `initialize` parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    /// Protocol revision requested by the client.
    #[serde(default)]
    protocol_version: Option<String>,
}

/// `tools/call` parameters.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments.
    #[serde(default)]
    arguments: Value,
}

/// `notifications/cancelled` parameters.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledParams {
    /// Identifier of the request to cancel.
    request_id: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

// ============================================================================
// SECTION: Protocol Errors
// ============================================================================

/// Protocol faults answered with JSON-RPC errors.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ProtocolError {
    /// Body is not JSON.
    Parse,
    /// Body is JSON but not a valid JSON-RPC request.
    InvalidRequest(&'static str),
    /// Method is not supported.
    MethodNotFound,
    /// Method parameters are malformed.
    InvalidParams(String),
    /// Body exceeds `server.max_body_bytes`.
    TooLarge,
    /// Every in-flight permit is taken.
    Busy,
    /// Result could not be serialized.
    Serialization,
}

impl ProtocolError {
    /// Returns the JSON-RPC error code.
    const fn code(&self) -> i64 {
        match self {
            Self::Parse => -32700,
            Self::InvalidRequest(_) => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams(_) => -32602,
            Self::Serialization => -32603,
            Self::TooLarge => -32070,
            Self::Busy => -32072,
        }
    }

    /// Returns the HTTP status for the fault.
    const fn status(&self) -> StatusCode {
        match self {
            Self::Parse
            | Self::InvalidRequest(_)
            | Self::MethodNotFound
            | Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Busy => StatusCode::SERVICE_UNAVAILABLE,
            Self::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the stable error kind label.
    const fn kind(&self) -> &'static str {
        match self {
            Self::Parse => "parse_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::MethodNotFound => "method_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::TooLarge => "request_too_large",
            Self::Busy => "inflight_limit",
            Self::Serialization => "serialization",
        }
    }

    /// Returns the client-facing message.
    fn message(self) -> String {
        match self {
            Self::Parse => "parse error".to_string(),
            Self::InvalidRequest(reason) => format!("invalid request: {reason}"),
            Self::MethodNotFound => "method not found".to_string(),
            Self::InvalidParams(reason) => format!("invalid params: {reason}"),
            Self::TooLarge => "request body too large".to_string(),
            Self::Busy => "server busy: too many in-flight requests".to_string(),
            Self::Serialization => "serialization failed".to_string(),
        }
    }
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Decoded inbound message.
#[derive(Debug)]
enum Inbound {
    /// Request expecting a response.
    Request(JsonRpcRequest),
    /// Notification; never answered.
    Notification(JsonRpcRequest),
    /// Protocol fault answered without routing.
    Rejected(Handled),
}

/// Operation metadata recorded for a `tools/call`.
#[derive(Debug)]
struct CallRecord {
    /// Requested operation name.
    operation: String,
    /// Effect label when the operation resolved.
    effect: Option<&'static str>,
    /// Adapter attempts.
    attempts: u32,
}

/// A handled message and the metadata needed for telemetry.
#[derive(Debug)]
struct Handled {
    /// HTTP status for the HTTP transport.
    status: StatusCode,
    /// JSON-RPC response.
    response: JsonRpcResponse,
    /// Method classification.
    method: McpMethod,
    /// Gateway failure kind or protocol error label.
    error_kind: Option<&'static str>,
    /// Tool call metadata.
    call: Option<CallRecord>,
}

impl Handled {
    /// Successful JSON-RPC result.
    const fn ok(id: Value, method: McpMethod, result: Value) -> Self {
        Self {
            status: StatusCode::OK,
            response: JsonRpcResponse::result(id, result),
            method,
            error_kind: None,
            call: None,
        }
    }

    /// JSON-RPC error for a protocol fault.
    fn protocol_error(id: Value, method: McpMethod, error: ProtocolError) -> Self {
        Self {
            status: error.status(),
            error_kind: Some(error.kind()),
            response: JsonRpcResponse::error(id, error.code(), error.message()),
            method,
            call: None,
        }
    }
}

/// Decodes one message body.
fn decode(bytes: &[u8], max_body_bytes: usize) -> Inbound {
    if bytes.len() > max_body_bytes {
        return Inbound::Rejected(Handled::protocol_error(
            Value::Null,
            McpMethod::Invalid,
            ProtocolError::TooLarge,
        ));
    }
    let Ok(value) = serde_json::from_slice::<Value>(bytes) else {
        return Inbound::Rejected(Handled::protocol_error(
            Value::Null,
            McpMethod::Invalid,
            ProtocolError::Parse,
        ));
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    let id_valid = matches!(id, Value::Null | Value::String(_) | Value::Number(_));
    let Ok(request) = serde_json::from_value::<JsonRpcRequest>(value) else {
        let id = if id_valid { id } else { Value::Null };
        return Inbound::Rejected(Handled::protocol_error(
            id,
            McpMethod::Invalid,
            ProtocolError::InvalidRequest("not a json-rpc request object"),
        ));
    };
    if !id_valid {
        return Inbound::Rejected(Handled::protocol_error(
            Value::Null,
            McpMethod::Invalid,
            ProtocolError::InvalidRequest("id must be a string or number"),
        ));
    }
    if request.jsonrpc != JSONRPC_VERSION {
        return Inbound::Rejected(Handled::protocol_error(
            id,
            McpMethod::Invalid,
            ProtocolError::InvalidRequest("invalid json-rpc version"),
        ));
    }
    if request.id.is_some() { Inbound::Request(request) } else { Inbound::Notification(request) }
}

/// Dispatches a JSON-RPC request.
async fn handle_request(
    state: &ServerState,
    request: JsonRpcRequest,
    cancel: &CancellationToken,
) -> Handled {
    let id = request.id.unwrap_or(Value::Null);
    let method = McpMethod::from_method(&request.method);
    match method {
        McpMethod::Initialize => handle_initialize(id, request.params),
        McpMethod::Ping => Handled::ok(id, method, json!({})),
        McpMethod::ToolsList => match serde_json::to_value(ToolListResult {
            tools: state.router.list_tools(),
        }) {
            Ok(value) => Handled::ok(id, method, value),
            Err(_) => Handled::protocol_error(id, method, ProtocolError::Serialization),
        },
        McpMethod::ToolsCall => handle_tool_call(state, id, request.params, cancel).await,
        McpMethod::Notification | McpMethod::Invalid | McpMethod::Other => {
            Handled::protocol_error(id, method, ProtocolError::MethodNotFound)
        }
    }
}

/// Answers `initialize`.
fn handle_initialize(id: Value, params: Option<Value>) -> Handled {
    let params = match params {
        None => InitializeParams {
            protocol_version: None,
        },
        Some(value) => match serde_json::from_value::<InitializeParams>(value) {
            Ok(params) => params,
            Err(_) => {
                return Handled::protocol_error(
                    id,
                    McpMethod::Initialize,
                    ProtocolError::InvalidParams("malformed initialize params".to_string()),
                );
            }
        },
    };
    let protocol_version = params
        .protocol_version
        .filter(|version| SUPPORTED_PROTOCOL_VERSIONS.contains(&version.as_str()))
        .unwrap_or_else(|| MCP_PROTOCOL_VERSION.to_string());
    let result = json!({
        "protocolVersion": protocol_version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    });
    Handled::ok(id, McpMethod::Initialize, result)
}

/// Routes `tools/call` to the tool router.
async fn handle_tool_call(
    state: &ServerState,
    id: Value,
    params: Option<Value>,
    cancel: &CancellationToken,
) -> Handled {
    let method = McpMethod::ToolsCall;
    let params = params.unwrap_or(Value::Null);
    let Ok(call) = serde_json::from_value::<ToolCallParams>(params) else {
        return Handled::protocol_error(
            id,
            method,
            ProtocolError::InvalidParams("tools/call requires a tool name".to_string()),
        );
    };
    let report = state.router.call_tool(&call.name, call.arguments, cancel).await;
    let record = CallRecord {
        operation: report.operation.clone(),
        effect: report.effect.map(Effect::as_str),
        attempts: report.attempts,
    };
    let error_kind = report.failure_kind().map(FailureKind::as_str);
    let result = ToolCallResult::from_response(&report.response)
        .ok()
        .and_then(|result| serde_json::to_value(result).ok());
    let mut handled = match result {
        Some(value) => Handled::ok(id, method, value),
        None => Handled::protocol_error(id, method, ProtocolError::Serialization),
    };
    handled.error_kind = handled.error_kind.or(error_kind);
    handled.call = Some(record);
    handled
}

/// Applies a notification. Only `notifications/cancelled` has an effect.
fn handle_notification(
    state: &ServerState,
    context: &RequestContext,
    request: &JsonRpcRequest,
    pending: Option<&PendingCalls>,
    request_bytes: usize,
    started: Instant,
) {
    if request.method == "notifications/cancelled"
        && let Some(pending) = pending
        && let Some(params) = request.params.clone()
        && let Ok(params) = serde_json::from_value::<CancelledParams>(params)
    {
        pending.cancel(&params.request_id.to_string());
    }
    observe(
        state,
        context,
        &Observation {
            method: McpMethod::Notification,
            outcome: McpOutcome::Ok,
            error_code: None,
            error_kind: None,
            call: None,
            request_bytes,
            response_bytes: 0,
            latency: started.elapsed(),
        },
    );
}

/// Serializes a handled message and records telemetry.
fn finish(
    state: &ServerState,
    context: &RequestContext,
    request_bytes: usize,
    started: Instant,
    handled: Handled,
) -> (StatusCode, Vec<u8>) {
    let error_code = handled.response.error.as_ref().map(|error| error.code);
    let payload = serde_json::to_vec(&handled.response).unwrap_or_else(|_| FALLBACK_ERROR.to_vec());
    let outcome = if error_code.is_some() || handled.error_kind.is_some() {
        McpOutcome::Error
    } else {
        McpOutcome::Ok
    };
    observe(
        state,
        context,
        &Observation {
            method: handled.method,
            outcome,
            error_code,
            error_kind: handled.error_kind,
            call: handled.call.as_ref(),
            request_bytes,
            response_bytes: payload.len(),
            latency: started.elapsed(),
        },
    );
    (handled.status, payload)
}

// ============================================================================
// SECTION: Telemetry
// ============================================================================

/// Values recorded for one message.
struct Observation<'a> {
    /// Method classification.
    method: McpMethod,
    /// Outcome.
    outcome: McpOutcome,
    /// JSON-RPC error code.
    error_code: Option<i64>,
    /// Gateway failure kind or protocol error label.
    error_kind: Option<&'static str>,
    /// Tool call metadata.
    call: Option<&'a CallRecord>,
    /// Request size.
    request_bytes: usize,
    /// Response size.
    response_bytes: usize,
    /// Handling latency.
    latency: Duration,
}

/// Emits the metric and audit records for one message.
fn observe(state: &ServerState, context: &RequestContext, observation: &Observation<'_>) {
    let event = McpMetricEvent {
        transport: context.transport,
        method: observation.method,
        operation: observation.call.map(|call| call.operation.clone()),
        effect: observation.call.and_then(|call| call.effect),
        attempts: observation.call.map(|call| call.attempts),
        outcome: observation.outcome,
        error_code: observation.error_code,
        error_kind: observation.error_kind,
        request_bytes: observation.request_bytes,
        response_bytes: observation.response_bytes,
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, observation.latency);
    state.audit.record(&McpAuditEvent::new(McpAuditEventParams {
        request_id: context.request_id.clone(),
        transport: context.transport,
        peer_ip: context.peer_ip.map(|ip| ip.to_string()),
        method: observation.method,
        operation: observation.call.map(|call| call.operation.clone()),
        effect: observation.call.and_then(|call| call.effect),
        outcome: observation.outcome,
        error_code: observation.error_code,
        error_kind: observation.error_kind,
        attempts: observation.call.map(|call| call.attempts),
        latency_ms: observation.latency.as_millis(),
        request_bytes: observation.request_bytes,
        response_bytes: observation.response_bytes,
    }));
}

// ============================================================================
// SECTION: Framing Helpers
// ============================================================================

/// Reads the next stdio frame, skipping blank lines.
///
/// Returns `None` at end of input. A `Name: value` line opens a header
/// block; any other line is a newline-delimited message, so stray text
/// reaches the decoder and is answered with a parse error.
async fn read_frame<R>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<Frame>, McpServerError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(line) = read_line(reader, max_body_bytes.saturating_add(2)).await? else {
            return Ok(None);
        };
        let text = trim_line_ending(&line);
        let Some(first) = text.iter().find(|byte| !byte.is_ascii_whitespace()) else {
            continue;
        };
        if matches!(*first, b'{' | b'[') || !is_header_line(text) {
            if text.len() > max_body_bytes {
                return Err(McpServerError::Transport("payload too large".to_string()));
            }
            return Ok(Some(Frame {
                framing: Framing::Line,
                body: text.to_vec(),
            }));
        }
        if text.len() > MAX_HEADER_BYTES {
            return Err(McpServerError::Transport("frame header too large".to_string()));
        }
        let length = read_headers(reader, text.to_vec()).await?;
        if length > max_body_bytes {
            return Err(McpServerError::Transport("payload too large".to_string()));
        }
        let mut body = vec![0u8; length];
        reader
            .read_exact(&mut body)
            .await
            .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
        return Ok(Some(Frame {
            framing: Framing::ContentLength,
            body,
        }));
    }
}

/// Returns true when the line has the `Name: value` shape of a frame header.
fn is_header_line(line: &[u8]) -> bool {
    let Some(colon) = line.iter().position(|byte| *byte == b':') else {
        return false;
    };
    let name = &line[.. colon];
    !name.is_empty() && name.iter().all(|byte| byte.is_ascii_alphanumeric() || *byte == b'-')
}

/// Reads a header block starting at `first` and returns the content length.
async fn read_headers<R>(reader: &mut R, first: Vec<u8>) -> Result<usize, McpServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = first;
    let mut lines = 0usize;
    loop {
        let text = trim_line_ending(&line);
        if text.is_empty() {
            break;
        }
        lines += 1;
        if lines > MAX_HEADER_LINES {
            return Err(McpServerError::Transport("too many frame headers".to_string()));
        }
        let header = std::str::from_utf8(text)
            .map_err(|_| McpServerError::Transport("invalid frame header".to_string()))?;
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| McpServerError::Transport("invalid frame header".to_string()))?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            if content_length.is_some() {
                return Err(McpServerError::Transport("duplicate content length".to_string()));
            }
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| McpServerError::Transport("invalid content length".to_string()))?;
            content_length = Some(parsed);
        }
        line = read_line(reader, MAX_HEADER_BYTES.saturating_add(2))
            .await?
            .ok_or_else(|| McpServerError::Transport("stdio closed mid-frame".to_string()))?;
    }
    content_length.ok_or_else(|| McpServerError::Transport("missing content length".to_string()))
}

/// Reads one line of at most `limit` bytes, including the terminator.
async fn read_line<R>(reader: &mut R, limit: usize) -> Result<Option<Vec<u8>>, McpServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let limit_u64 = u64::try_from(limit).unwrap_or(u64::MAX);
    let read = (&mut *reader)
        .take(limit_u64)
        .read_until(b'\n', &mut line)
        .await
        .map_err(|_| McpServerError::Transport("stdio read failed".to_string()))?;
    if read == 0 {
        return Ok(None);
    }
    if line.last() != Some(&b'\n') && read >= limit {
        return Err(McpServerError::Transport("payload too large".to_string()));
    }
    Ok(Some(line))
}

/// Strips a trailing `\n` or `\r\n`.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Writes one frame in the given encoding.
async fn write_frame<W>(
    writer: &mut W,
    framing: Framing,
    payload: &[u8],
) -> Result<(), McpServerError>
where
    W: AsyncWrite + Unpin,
{
    let write_failed =
        |_: std::io::Error| McpServerError::Transport("stdio write failed".to_string());
    match framing {
        Framing::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", payload.len());
            writer.write_all(header.as_bytes()).await.map_err(write_failed)?;
            writer.write_all(payload).await.map_err(write_failed)?;
        }
        Framing::Line => {
            writer.write_all(payload).await.map_err(write_failed)?;
            writer.write_all(b"\n").await.map_err(write_failed)?;
        }
    }
    writer.flush().await.map_err(write_failed)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests;
