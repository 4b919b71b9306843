// crates/kube-gate-core/src/model.rs
// ============================================================================
// Module: Gateway Data Model
// Description: Request, response, and failure envelopes for tool dispatch.
// Purpose: Give every dispatch outcome one tagged, serializable shape.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A [`Request`] names one catalog operation plus its raw arguments. Every
//! request produces exactly one [`Response`], which is either a success with a
//! payload or a [`Failure`] tagged with a [`FailureKind`].
//!
//! Security posture: failure messages are built from classified cluster
//! errors and validation reasons only; they never carry credentials or
//! internal backtraces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Request
// ============================================================================

/// Single tool invocation addressed to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Catalog operation name.
    pub operation: String,
    /// Raw argument mapping supplied by the caller.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: Map<String, Value>,
}

impl Request {
    /// Builds a request with no arguments.
    #[must_use]
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            arguments: Map::new(),
        }
    }

    /// Builds a request from an operation name and an arbitrary JSON value.
    ///
    /// `null` is treated as an empty mapping. Any other non-object value is
    /// rejected before the request reaches the validator.
    ///
    /// # Errors
    ///
    /// Returns [`Failure`] with [`FailureKind::InvalidArgument`] when the
    /// arguments are neither an object nor `null`.
    pub fn from_value(operation: impl Into<String>, arguments: Value) -> Result<Self, Failure> {
        let arguments = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => {
                return Err(Failure::invalid_argument("arguments", "arguments must be an object"));
            }
        };
        Ok(Self {
            operation: operation.into(),
            arguments,
        })
    }

    /// Returns a copy with one argument set.
    #[must_use]
    pub fn with_argument(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// Deserializes a missing or `null` argument map as empty.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Map<String, Value>>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Outcome of one dispatched request.
///
/// # Invariants
/// - Exactly one variant is produced per [`Request`].
/// - Serializes as `{"status":"success","payload":...}` or
///   `{"status":"error","error":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Operation completed and produced a payload.
    Success {
        /// Shaped cluster data.
        payload: Value,
    },
    /// Operation failed.
    Error {
        /// Failure description.
        error: Failure,
    },
}

impl Response {
    /// Wraps a payload as a success response.
    #[must_use]
    pub const fn success(payload: Value) -> Self {
        Self::Success {
            payload,
        }
    }

    /// Wraps a failure as an error response.
    #[must_use]
    pub const fn failure(error: Failure) -> Self {
        Self::Error {
            error,
        }
    }

    /// Returns true for success responses.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the payload when the response is a success.
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success {
                payload,
            } => Some(payload),
            Self::Error {
                ..
            } => None,
        }
    }

    /// Returns the failure when the response is an error.
    #[must_use]
    pub const fn error(&self) -> Option<&Failure> {
        match self {
            Self::Success {
                ..
            } => None,
            Self::Error {
                error,
            } => Some(error),
        }
    }

    /// Returns the failure kind when the response is an error.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.error().map(|error| error.kind)
    }
}

impl From<Result<Value, Failure>> for Response {
    fn from(result: Result<Value, Failure>) -> Self {
        match result {
            Ok(payload) => Self::success(payload),
            Err(error) => Self::failure(error),
        }
    }
}

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Failure taxonomy reported to the orchestrator.
///
/// # Invariants
/// - Variant names are part of the wire contract and never renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// No such catalog entry.
    UnknownOperation,
    /// Argument schema violation.
    InvalidArgument,
    /// Target resource does not exist.
    NotFound,
    /// Credential lacks permission.
    Forbidden,
    /// Any other cluster-reported condition.
    ClusterError,
    /// Multi-call operation partially succeeded.
    PartialResult,
    /// Transient connectivity failure after the retry budget.
    Unavailable,
    /// Deadline exceeded.
    Timeout,
    /// Caller cancelled the request.
    Cancelled,
}

impl FailureKind {
    /// Returns the stable wire label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownOperation => "UnknownOperation",
            Self::InvalidArgument => "InvalidArgument",
            Self::NotFound => "NotFound",
            Self::Forbidden => "Forbidden",
            Self::ClusterError => "ClusterError",
            Self::PartialResult => "PartialResult",
            Self::Unavailable => "Unavailable",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure carried by an error [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    /// Failure classification.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub message: String,
    /// Offending argument name for [`FailureKind::InvalidArgument`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// HTTP status reported by the cluster API when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Additional structured context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Failure {
    /// Builds a failure with only a kind and message.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            status_code: None,
            details: None,
        }
    }

    /// Failure for an operation name missing from the catalog.
    #[must_use]
    pub fn unknown_operation(name: &str) -> Self {
        Self::new(FailureKind::UnknownOperation, format!("unknown operation: {name}"))
    }

    /// Failure for an argument that violates its schema.
    #[must_use]
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut failure = Self::new(FailureKind::InvalidArgument, reason);
        failure.field = Some(field.into());
        failure
    }

    /// Failure for an exceeded deadline.
    #[must_use]
    pub fn timeout(deadline_ms: u128) -> Self {
        Self::new(FailureKind::Timeout, format!("operation exceeded {deadline_ms}ms deadline"))
    }

    /// Failure for a cancelled request.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "request cancelled")
    }

    /// Returns a copy carrying the cluster status code.
    #[must_use]
    pub const fn with_status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    /// Returns a copy carrying structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}
