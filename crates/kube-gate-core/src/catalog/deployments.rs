// crates/kube-gate-core/src/catalog/deployments.rs
// ============================================================================
// Module: Deployment Operations
// Description: Catalog entries for listing, scaling, and restarting deployments.
// Purpose: Declare deployment operations as immutable descriptors.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `restart_deployment` is a rollout restart: the adapter patches the pod
//! template annotation `kubectl.kubernetes.io/restartedAt` and the deployment
//! controller replaces pods under its normal rollout strategy. Nothing is
//! deleted and recreated by the gateway.

use serde_json::Value;

use super::Effect;
use super::NAMESPACE_ARG;
use super::Operation;
use super::int_arg_i32;
use super::to_payload;
use super::unexpected_output;
use crate::adapter::AdapterCall;
use crate::adapter::CallOutput;
use crate::model::Failure;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::validator::ValidatedArgs;

/// Maximum replica count accepted by `scale_deployment`.
pub const MAX_REPLICAS: i64 = 1_000;

/// Deployment name argument.
const DEPLOYMENT_NAME_ARG: ArgumentSpec =
    ArgumentSpec::required("name", ArgType::DnsSubdomain, "Deployment name.");

// ============================================================================
// SECTION: list_deployments
// ============================================================================

/// Lists deployments in a namespace.
pub(crate) const LIST_DEPLOYMENTS: Operation = Operation {
    name: "list_deployments",
    description: "List deployments with desired, ready, and available replica counts.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[NAMESPACE_ARG],
    constraints: &[],
    plan: plan_list_deployments,
    shape: shape_list_deployments,
};

/// Plans `list_deployments`.
fn plan_list_deployments(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ListDeployments {
        namespace: args.str("namespace")?.to_string(),
    }])
}

/// Shapes `list_deployments`.
fn shape_list_deployments(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Deployments(deployments)) => to_payload(&deployments),
        other => Err(unexpected_output("list_deployments", other.as_ref())),
    }
}

// ============================================================================
// SECTION: scale_deployment
// ============================================================================

/// Sets a deployment's replica count.
pub(crate) const SCALE_DEPLOYMENT: Operation = Operation {
    name: "scale_deployment",
    description: "Set the replica count of a deployment.",
    effect: Effect::Mutate,
    destructive: false,
    arguments: &[
        DEPLOYMENT_NAME_ARG,
        NAMESPACE_ARG,
        ArgumentSpec::required(
            "replicas",
            ArgType::Integer {
                min: 0,
                max: MAX_REPLICAS,
            },
            "Desired replica count.",
        ),
    ],
    constraints: &[],
    plan: plan_scale_deployment,
    shape: shape_single_deployment,
};

/// Plans `scale_deployment`.
fn plan_scale_deployment(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ScaleDeployment {
        namespace: args.str("namespace")?.to_string(),
        name: args.str("name")?.to_string(),
        replicas: int_arg_i32(args, "replicas")?,
    }])
}

/// Shapes a single deployment returned by a write.
fn shape_single_deployment(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Deployment(deployment)) => to_payload(&deployment),
        other => Err(unexpected_output("scale_deployment", other.as_ref())),
    }
}

// ============================================================================
// SECTION: restart_deployment
// ============================================================================

/// Triggers a rolling restart.
pub(crate) const RESTART_DEPLOYMENT: Operation = Operation {
    name: "restart_deployment",
    description: "Trigger a rolling restart of a deployment by bumping its pod template \
                  restartedAt annotation.",
    effect: Effect::Mutate,
    destructive: false,
    arguments: &[DEPLOYMENT_NAME_ARG, NAMESPACE_ARG],
    constraints: &[],
    plan: plan_restart_deployment,
    shape: shape_restart_deployment,
};

/// Plans `restart_deployment`.
fn plan_restart_deployment(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::RestartDeployment {
        namespace: args.str("namespace")?.to_string(),
        name: args.str("name")?.to_string(),
    }])
}

/// Shapes `restart_deployment`.
fn shape_restart_deployment(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Restarted(outcome)) => to_payload(&outcome),
        other => Err(unexpected_output("restart_deployment", other.as_ref())),
    }
}
