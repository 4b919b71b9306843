// crates/kube-gate-core/src/catalog/namespaces.rs
// ============================================================================
// Module: Namespace Operations
// Description: Catalog entries for listing, creating, and deleting namespaces.
// Purpose: Declare namespace operations as immutable descriptors.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `list_namespaces` returns bare names in cluster order. `delete_namespace`
//! refuses protected namespaces during validation, before any call is made.

use serde_json::Value;

use super::Effect;
use super::Operation;
use super::to_payload;
use super::unexpected_output;
use crate::adapter::AdapterCall;
use crate::adapter::CallOutput;
use crate::model::Failure;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::schema::Constraint;
use crate::validator::ValidatedArgs;

/// Lists namespace names.
pub(crate) const LIST_NAMESPACES: Operation = Operation {
    name: "list_namespaces",
    description: "List namespace names.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[],
    constraints: &[],
    plan: plan_list_namespaces,
    shape: shape_list_namespaces,
};

/// Plans `list_namespaces`.
fn plan_list_namespaces(_args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ListNamespaces])
}

/// Shapes `list_namespaces`.
fn shape_list_namespaces(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Namespaces(namespaces)) => Ok(Value::Array(
            namespaces.into_iter().map(|namespace| Value::String(namespace.name)).collect(),
        )),
        other => Err(unexpected_output("list_namespaces", other.as_ref())),
    }
}

/// Creates a namespace.
pub(crate) const CREATE_NAMESPACE: Operation = Operation {
    name: "create_namespace",
    description: "Create a namespace with optional labels.",
    effect: Effect::Mutate,
    destructive: false,
    arguments: &[
        ArgumentSpec::required("name", ArgType::DnsLabel, "Namespace name."),
        ArgumentSpec::optional("labels", ArgType::LabelMap, "Labels to set on the namespace."),
    ],
    constraints: &[],
    plan: plan_create_namespace,
    shape: shape_create_namespace,
};

/// Plans `create_namespace`.
fn plan_create_namespace(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::CreateNamespace {
        name: args.str("name")?.to_string(),
        labels: args.labels("labels"),
    }])
}

/// Shapes `create_namespace`.
fn shape_create_namespace(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Namespace(namespace)) => to_payload(&namespace),
        other => Err(unexpected_output("create_namespace", other.as_ref())),
    }
}

/// Deletes a namespace and everything in it.
pub(crate) const DELETE_NAMESPACE: Operation = Operation {
    name: "delete_namespace",
    description: "Delete a namespace and every resource in it. Protected namespaces are refused.",
    effect: Effect::Mutate,
    destructive: true,
    arguments: &[ArgumentSpec::required("name", ArgType::DnsLabel, "Namespace name.")],
    constraints: &[Constraint::NotProtectedNamespace("name")],
    plan: plan_delete_namespace,
    shape: shape_delete_namespace,
};

/// Plans `delete_namespace`.
fn plan_delete_namespace(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::DeleteNamespace {
        name: args.str("name")?.to_string(),
    }])
}

/// Shapes `delete_namespace`.
fn shape_delete_namespace(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::NamespaceDeleted(deletion)) => to_payload(&deletion),
        other => Err(unexpected_output("delete_namespace", other.as_ref())),
    }
}
