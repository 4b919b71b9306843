// crates/kube-gate-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Maps MCP tool calls onto the gateway dispatcher.
// Purpose: Keep protocol shaping out of the dispatch core.
// Dependencies: kube-gate-core, kube-gate-config, tokio-util
// ============================================================================

//! ## Overview
//! [`ToolRouter`] owns the dispatcher and the advertised tool list. A tool
//! call always yields a [`DispatchReport`]; gateway failures are reported in
//! the tool result with `isError: true` and never become JSON-RPC errors.
//!
//! Security posture: tool arguments are untrusted; the dispatcher validates
//! them before any cluster call is planned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use kube_gate_config::KubeGateConfig;
use kube_gate_core::Catalog;
use kube_gate_core::CatalogError;
use kube_gate_core::ClusterAdapter;
use kube_gate_core::DispatchReport;
use kube_gate_core::DispatchState;
use kube_gate_core::Dispatcher;
use kube_gate_core::Failure;
use kube_gate_core::Request;
use kube_gate_core::Response;
use kube_gate_core::ToolDefinition;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Tool router for MCP requests.
#[derive(Clone)]
pub struct ToolRouter {
    /// Dispatcher shared by all requests.
    dispatcher: Arc<Dispatcher>,
    /// Tool definitions advertised through `tools/list`.
    tools: Arc<Vec<ToolDefinition>>,
}

impl ToolRouter {
    /// Builds a router around a configured dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        let tools = dispatcher.catalog().tool_definitions();
        Self {
            dispatcher: Arc::new(dispatcher),
            tools: Arc::new(tools),
        }
    }

    /// Builds a router from configuration and a cluster adapter.
    ///
    /// The builtin catalog is restricted by `[catalog]` and the dispatcher is
    /// configured from `[dispatch]` and `[safety]`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog cannot be built.
    pub fn from_config(
        config: &KubeGateConfig,
        adapter: Arc<dyn ClusterAdapter>,
    ) -> Result<Self, CatalogError> {
        let catalog = Catalog::builtin()?.restrict(&config.catalog_filter())?;
        let dispatcher = Dispatcher::new(Arc::new(catalog), adapter)
            .with_policy(config.dispatch_policy())
            .with_validation(config.validation_policy());
        Ok(Self::new(dispatcher))
    }

    /// Returns the advertised tool definitions.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.as_ref().clone()
    }

    /// Returns the number of advertised tools.
    #[must_use]
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Dispatches one tool call to completion.
    ///
    /// Arguments that are not an object (or `null`) are rejected without
    /// reaching the dispatcher, after the operation name is resolved.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> DispatchReport {
        match Request::from_value(name, arguments) {
            Ok(request) => self.dispatcher.dispatch(request, cancel).await,
            Err(failure) => self.rejected(name, failure),
        }
    }

    /// Builds the report for a call rejected before dispatch.
    fn rejected(&self, name: &str, failure: Failure) -> DispatchReport {
        let operation = self.dispatcher.catalog().get(name);
        let mut trace = vec![DispatchState::Received];
        let failure = if operation.is_some() {
            trace.push(DispatchState::Resolved);
            failure
        } else {
            Failure::unknown_operation(name)
        };
        trace.push(DispatchState::Completed);
        DispatchReport {
            operation: name.to_string(),
            effect: operation.map(|operation| operation.effect),
            response: Response::failure(failure),
            trace,
            attempts: 0,
            elapsed: Duration::ZERO,
        }
    }
}

// ============================================================================
// SECTION: Tool Results
// ============================================================================

/// Tool call response payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Tool output content; one text block holding the envelope JSON.
    pub content: Vec<ToolContent>,
    /// The response envelope as structured JSON.
    pub structured_content: Value,
    /// True when the envelope status is `error`.
    pub is_error: bool,
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text tool output.
    Text {
        /// Serialized envelope.
        text: String,
    },
}

impl ToolCallResult {
    /// Shapes a gateway response as an MCP tool result.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Serialization`] when the envelope cannot be
    /// serialized.
    pub fn from_response(response: &Response) -> Result<Self, ToolError> {
        let envelope = serde_json::to_value(response).map_err(|_| ToolError::Serialization)?;
        let text = serde_json::to_string(&envelope).map_err(|_| ToolError::Serialization)?;
        Ok(Self {
            content: vec![ToolContent::Text {
                text,
            }],
            structured_content: envelope,
            is_error: !response.is_success(),
        })
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Protocol-level tool routing errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Result serialization failed.
    #[error("serialization failed")]
    Serialization,
}

#[cfg(test)]
mod tests;
