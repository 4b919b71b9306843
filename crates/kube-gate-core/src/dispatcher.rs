// crates/kube-gate-core/src/dispatcher.rs
// ============================================================================
// Module: Dispatcher
// Description: Per-request state machine from operation lookup to response.
// Purpose: Resolve, validate, execute, and map failures for every request.
// Dependencies: tokio, tokio-util, serde_json
// ============================================================================

//! ## Overview
//! Each request walks `Received -> Resolved -> Validated -> Executing ->
//! Completed`. Lookup and validation failures complete before any adapter
//! call is planned, so a rejected request has no cluster side effect. During
//! execution the planned calls run strictly in order under one deadline and
//! the caller's cancellation token.
//!
//! Retry policy: a read call that fails with a transient classification is
//! retried once after a fixed backoff; mutating calls are never retried.
//!
//! ## Invariants
//! - Exactly one [`Response`] is produced per request.
//! - Dropping the execution future on timeout or cancellation drops the
//!   in-flight adapter call.
//! - A failure after at least one successful call is reported as
//!   [`FailureKind::PartialResult`] carrying the completed call data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterCall;
use crate::adapter::CallKind;
use crate::adapter::CallOutput;
use crate::adapter::ClusterAdapter;
use crate::adapter::ClusterError;
use crate::adapter::ClusterErrorKind;
use crate::catalog::Catalog;
use crate::catalog::Effect;
use crate::catalog::Operation;
use crate::model::Failure;
use crate::model::FailureKind;
use crate::model::Request;
use crate::model::Response;
use crate::validator::ValidatedArgs;
use crate::validator::ValidationPolicy;
use crate::validator::validate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default deadline for read operations.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Default deadline for mutating operations.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(120);
/// Default delay before the single transient retry.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Deadline and retry settings applied to every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    /// Deadline for read operations.
    pub read_timeout: Duration,
    /// Deadline for mutating operations.
    pub write_timeout: Duration,
    /// Retry transient read failures once.
    pub transient_retry: bool,
    /// Delay before the retry.
    pub retry_backoff: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            transient_retry: true,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl DispatchPolicy {
    /// Returns the deadline for an operation effect.
    #[must_use]
    pub const fn timeout_for(&self, effect: Effect) -> Duration {
        match effect {
            Effect::Read => self.read_timeout,
            Effect::Mutate => self.write_timeout,
        }
    }
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Dispatch states in traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    /// Request accepted.
    Received,
    /// Operation found in the catalog.
    Resolved,
    /// Arguments accepted.
    Validated,
    /// Adapter calls running.
    Executing,
    /// Response produced.
    Completed,
}

/// Outcome of one dispatch plus the metadata needed for auditing.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    /// Requested operation name as supplied.
    pub operation: String,
    /// Effect of the resolved operation, if it resolved.
    pub effect: Option<Effect>,
    /// Response returned to the caller.
    pub response: Response,
    /// States traversed, ending in [`DispatchState::Completed`].
    pub trace: Vec<DispatchState>,
    /// Adapter invocations, including retries.
    pub attempts: u32,
    /// Wall time spent in dispatch.
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Returns true when the response is a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.response.is_success()
    }

    /// Returns the failure kind when the response is an error.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.response.failure_kind()
    }

    /// Returns true when execution was reached.
    #[must_use]
    pub fn executed(&self) -> bool {
        self.trace.contains(&DispatchState::Executing)
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Routes requests through the catalog to the cluster adapter.
///
/// # Invariants
/// - The catalog and policies are immutable after construction.
/// - The dispatcher holds no per-request state; concurrent dispatches share
///   only the adapter.
#[derive(Clone)]
pub struct Dispatcher {
    /// Reachable operations.
    catalog: Arc<Catalog>,
    /// Cluster adapter.
    adapter: Arc<dyn ClusterAdapter>,
    /// Deadline and retry settings.
    policy: DispatchPolicy,
    /// Constraint inputs for validation.
    validation: ValidationPolicy,
}

impl Dispatcher {
    /// Builds a dispatcher with default policies.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, adapter: Arc<dyn ClusterAdapter>) -> Self {
        Self {
            catalog,
            adapter,
            policy: DispatchPolicy::default(),
            validation: ValidationPolicy::default(),
        }
    }

    /// Returns a copy using the given dispatch policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns a copy using the given validation policy.
    #[must_use]
    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }

    /// Returns the catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the dispatch policy.
    #[must_use]
    pub const fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Dispatches one request to completion.
    ///
    /// Cancelling `cancel` before or during execution yields
    /// [`FailureKind::Cancelled`] and drops any in-flight adapter call.
    pub async fn dispatch(&self, request: Request, cancel: &CancellationToken) -> DispatchReport {
        let started = Instant::now();
        let mut trace = vec![DispatchState::Received];
        let attempts = AtomicU32::new(0);
        let (effect, result) = self.run(&request, cancel, &mut trace, &attempts).await;
        trace.push(DispatchState::Completed);
        DispatchReport {
            operation: request.operation,
            effect,
            response: Response::from(result),
            trace,
            attempts: attempts.load(Ordering::Relaxed),
            elapsed: started.elapsed(),
        }
    }

    /// Runs the state machine up to completion.
    async fn run(
        &self,
        request: &Request,
        cancel: &CancellationToken,
        trace: &mut Vec<DispatchState>,
        attempts: &AtomicU32,
    ) -> (Option<Effect>, Result<Value, Failure>) {
        if cancel.is_cancelled() {
            return (None, Err(Failure::cancelled()));
        }
        let Some(operation) = self.catalog.get(&request.operation) else {
            return (None, Err(Failure::unknown_operation(&request.operation)));
        };
        trace.push(DispatchState::Resolved);
        let effect = Some(operation.effect);
        let args = match validate(operation, &request.arguments, &self.validation) {
            Ok(args) => args,
            Err(failure) => return (effect, Err(failure)),
        };
        trace.push(DispatchState::Validated);
        let calls = match (operation.plan)(&args) {
            Ok(calls) => calls,
            Err(failure) => return (effect, Err(failure)),
        };
        trace.push(DispatchState::Executing);
        let deadline = self.policy.timeout_for(operation.effect);
        let execution = self.execute(operation, &args, &calls, attempts);
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Failure::cancelled()),
            outcome = tokio::time::timeout(deadline, execution) => {
                outcome.unwrap_or_else(|_| Err(Failure::timeout(deadline.as_millis())))
            }
        };
        (effect, result)
    }

    /// Executes planned calls in order and shapes the payload.
    async fn execute(
        &self,
        operation: &Operation,
        args: &ValidatedArgs,
        calls: &[AdapterCall],
        attempts: &AtomicU32,
    ) -> Result<Value, Failure> {
        let mut outputs: Vec<CallOutput> = Vec::with_capacity(calls.len());
        for call in calls {
            match self.invoke(operation.effect, call, attempts).await {
                Ok(output) => outputs.push(output),
                Err(error) => {
                    let failure = map_cluster_error(&error);
                    if outputs.is_empty() {
                        return Err(failure);
                    }
                    return Err(partial_failure(calls, &outputs, call.kind(), &failure));
                }
            }
        }
        (operation.shape)(args, outputs)
    }

    /// Invokes one call, retrying a transient read failure once.
    async fn invoke(
        &self,
        effect: Effect,
        call: &AdapterCall,
        attempts: &AtomicU32,
    ) -> Result<CallOutput, ClusterError> {
        let retry_allowed = self.policy.transient_retry && effect == Effect::Read;
        let mut retried = false;
        loop {
            attempts.fetch_add(1, Ordering::Relaxed);
            match call.invoke(self.adapter.as_ref()).await {
                Ok(output) => return Ok(output),
                Err(error) if error.is_transient() && retry_allowed && !retried => {
                    retried = true;
                    tokio::time::sleep(self.policy.retry_backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.catalog.len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Failure Mapping
// ============================================================================

/// Maps a classified cluster error to a response failure.
#[must_use]
pub fn map_cluster_error(error: &ClusterError) -> Failure {
    let kind = match error.kind {
        ClusterErrorKind::NotFound => FailureKind::NotFound,
        ClusterErrorKind::Forbidden => FailureKind::Forbidden,
        ClusterErrorKind::Transient => FailureKind::Unavailable,
        ClusterErrorKind::Conflict | ClusterErrorKind::Other => FailureKind::ClusterError,
    };
    let failure = Failure::new(kind, error.message.clone()).with_status_code(error.status_code);
    match &error.reason {
        Some(reason) => failure.with_details(json!({ "reason": reason })),
        None => failure,
    }
}

/// Builds a partial-result failure carrying the completed call data.
fn partial_failure(
    calls: &[AdapterCall],
    outputs: &[CallOutput],
    failed_call: CallKind,
    failure: &Failure,
) -> Failure {
    let completed: Vec<Value> = calls
        .iter()
        .zip(outputs)
        .map(|(call, output)| {
            json!({
                "call": call.kind(),
                "data": serde_json::to_value(output).unwrap_or(Value::Null),
            })
        })
        .collect();
    Failure::new(
        FailureKind::PartialResult,
        format!(
            "{failed_call} failed after {} successful call(s): {}",
            completed.len(),
            failure.message
        ),
    )
    .with_status_code(failure.status_code)
    .with_details(json!({
        "completed": completed,
        "failed_call": failed_call,
        "error": {
            "kind": failure.kind,
            "message": failure.message,
        },
    }))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
