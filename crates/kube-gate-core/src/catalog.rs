// crates/kube-gate-core/src/catalog.rs
// ============================================================================
// Module: Operation Catalog
// Description: Immutable registry of the operations the gateway exposes.
// Purpose: Define the complete, auditable surface of permitted cluster actions.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every reachable action is an [`Operation`] declared as a `const` in one of
//! the submodules and registered in [`BUILTIN_OPERATIONS`]. An operation
//! bundles its argument schema, a `plan` function that turns validated
//! arguments into ordered [`AdapterCall`]s, and a `shape` function that turns
//! the call outputs into the response payload. Adding an operation touches
//! this module only; validation and dispatch are generic over the descriptor.
//!
//! ## Invariants
//! - Operation names are unique within a [`Catalog`].
//! - A catalog is never mutated after construction.
//! - Names missing from the catalog are unreachable.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod deployments;
mod events;
mod manifests;
mod namespaces;
mod nodes;
mod pods;
mod services;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::adapter::AdapterCall;
use crate::adapter::CallOutput;
use crate::model::Failure;
use crate::model::FailureKind;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::schema::Constraint;
use crate::schema::DefaultValue;
use crate::schema::ToolDefinition;
use crate::validator::ValidatedArgs;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Side-effect class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Idempotent read; eligible for one transient retry.
    Read,
    /// Changes cluster state; never retried.
    Mutate,
}

impl Effect {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Mutate => "mutate",
        }
    }
}

/// Turns validated arguments into an ordered adapter call sequence.
pub type PlanFn = fn(&ValidatedArgs) -> Result<Vec<AdapterCall>, Failure>;
/// Turns the outputs of every planned call into the response payload.
pub type ShapeFn = fn(&ValidatedArgs, Vec<CallOutput>) -> Result<Value, Failure>;

/// Immutable catalog entry.
#[derive(Clone, Copy)]
pub struct Operation {
    /// Unique operation name.
    pub name: &'static str,
    /// Human-readable description for tool listings.
    pub description: &'static str,
    /// Side-effect class.
    pub effect: Effect,
    /// Whether the operation removes cluster state.
    pub destructive: bool,
    /// Ordered argument schema.
    pub arguments: &'static [ArgumentSpec],
    /// Cross-argument constraints.
    pub constraints: &'static [Constraint],
    /// Call planner.
    pub plan: PlanFn,
    /// Payload shaper.
    pub shape: ShapeFn,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("effect", &self.effect)
            .field("arguments", &self.arguments.len())
            .finish_non_exhaustive()
    }
}

/// Selection applied to the builtin catalog at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    /// Drop every mutating operation.
    pub read_only: bool,
    /// Operation names to drop.
    pub disabled: BTreeSet<String>,
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Name-indexed set of operations in declaration order.
#[derive(Debug, Clone)]
pub struct Catalog {
    /// Operations in declaration order.
    operations: Vec<&'static Operation>,
    /// Index by name into `operations`.
    index: BTreeMap<&'static str, usize>,
}

impl Catalog {
    /// Builds a catalog from operation descriptors.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateOperation`] when two descriptors share
    /// a name.
    pub fn from_operations(
        operations: impl IntoIterator<Item = &'static Operation>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self {
            operations: Vec::new(),
            index: BTreeMap::new(),
        };
        for operation in operations {
            if catalog.index.contains_key(operation.name) {
                return Err(CatalogError::DuplicateOperation(operation.name.to_string()));
            }
            catalog.index.insert(operation.name, catalog.operations.len());
            catalog.operations.push(operation);
        }
        Ok(catalog)
    }

    /// Builds the catalog of every builtin operation.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the builtin table is inconsistent.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_operations(BUILTIN_OPERATIONS.iter().copied())
    }

    /// Returns a catalog restricted by the filter.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownOperation`] when the filter disables a
    /// name this catalog does not contain.
    pub fn restrict(&self, filter: &CatalogFilter) -> Result<Self, CatalogError> {
        if let Some(name) = filter.disabled.iter().find(|name| !self.contains(name)) {
            return Err(CatalogError::UnknownOperation(name.clone()));
        }
        Self::from_operations(self.operations.iter().copied().filter(|operation| {
            !(filter.read_only && operation.effect == Effect::Mutate)
                && !filter.disabled.contains(operation.name)
        }))
    }

    /// Looks up an operation by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'static Operation> {
        self.index.get(name).and_then(|position| self.operations.get(*position)).copied()
    }

    /// Returns true when the name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates operations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'static Operation> + '_ {
        self.operations.iter().copied()
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true when no operations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Renders tool definitions in declaration order.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.iter().map(ToolDefinition::for_operation).collect()
    }
}

/// Catalog construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Two operations share a name.
    #[error("duplicate operation name: {0}")]
    DuplicateOperation(String),
    /// A referenced operation is not registered.
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
}

/// Names of every builtin operation in declaration order.
#[must_use]
pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_OPERATIONS.iter().map(|operation| operation.name).collect()
}

// ============================================================================
// SECTION: Builtin Table
// ============================================================================

/// Every builtin operation in declaration order.
pub static BUILTIN_OPERATIONS: &[&Operation] = &[
    &pods::LIST_PODS,
    &pods::GET_POD_LOGS,
    &pods::DESCRIBE_POD,
    &deployments::LIST_DEPLOYMENTS,
    &deployments::SCALE_DEPLOYMENT,
    &deployments::RESTART_DEPLOYMENT,
    &manifests::APPLY_YAML,
    &manifests::GET_YAML,
    &events::LIST_EVENTS,
    &services::LIST_SERVICES,
    &services::DESCRIBE_SERVICE,
    &namespaces::LIST_NAMESPACES,
    &namespaces::CREATE_NAMESPACE,
    &namespaces::DELETE_NAMESPACE,
    &nodes::LIST_NODES,
    &nodes::DESCRIBE_NODE,
    &nodes::CLUSTER_INFO,
    &nodes::LIST_PODS_BY_NODE,
];

// ============================================================================
// SECTION: Shared Argument Specs
// ============================================================================

/// Namespace argument defaulting to `default`.
pub(crate) const NAMESPACE_ARG: ArgumentSpec = ArgumentSpec::defaulted(
    "namespace",
    ArgType::DnsLabel,
    DefaultValue::Str("default"),
    "Target namespace.",
);

/// Namespace argument where absence means all namespaces.
pub(crate) const NAMESPACE_FILTER_ARG: ArgumentSpec = ArgumentSpec::optional(
    "namespace",
    ArgType::DnsLabel,
    "Namespace to restrict to; omit for all namespaces.",
);

// ============================================================================
// SECTION: Shaping Helpers
// ============================================================================

/// Failure for a call output that does not match the plan.
pub(crate) fn unexpected_output(operation: &str, output: Option<&CallOutput>) -> Failure {
    let found = output.map_or("nothing", CallOutput::label);
    Failure::new(
        FailureKind::ClusterError,
        format!("{operation}: unexpected adapter output ({found})"),
    )
}

/// Serializes a shaped payload.
pub(crate) fn to_payload<T: Serialize>(value: &T) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(|err| {
        Failure::new(FailureKind::ClusterError, format!("payload serialization failed: {err}"))
    })
}

/// Converts an integer argument to `i32`.
pub(crate) fn int_arg_i32(args: &ValidatedArgs, name: &str) -> Result<i32, Failure> {
    let value = args.int(name)?;
    i32::try_from(value).map_err(|_| Failure::invalid_argument(name, "value out of range"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
