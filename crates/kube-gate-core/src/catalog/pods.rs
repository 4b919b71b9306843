// crates/kube-gate-core/src/catalog/pods.rs
// ============================================================================
// Module: Pod Operations
// Description: Catalog entries for listing, inspecting, and reading pod logs.
// Purpose: Declare pod operations as immutable descriptors.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `list_pods`, `get_pod_logs`, and `describe_pod`. The describe operation
//! issues a pod read followed by an event lookup for the same pod.

use serde_json::Value;
use serde_json::json;

use super::Effect;
use super::NAMESPACE_ARG;
use super::Operation;
use super::to_payload;
use super::unexpected_output;
use crate::adapter::AdapterCall;
use crate::adapter::CallOutput;
use crate::adapter::EventQuery;
use crate::adapter::LogOptions;
use crate::model::Failure;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::schema::Constraint;
use crate::schema::DefaultValue;
use crate::validator::ValidatedArgs;

/// Default number of trailing log lines.
pub const DEFAULT_TAIL_LINES: i64 = 100;
/// Maximum number of trailing log lines.
pub const MAX_TAIL_LINES: i64 = 10_000;

// ============================================================================
// SECTION: list_pods
// ============================================================================

/// Lists pods in a namespace or across the cluster.
pub(crate) const LIST_PODS: Operation = Operation {
    name: "list_pods",
    description: "List pods with phase, readiness, restarts, and node placement.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[
        NAMESPACE_ARG,
        ArgumentSpec::defaulted(
            "all_namespaces",
            ArgType::Boolean,
            DefaultValue::Bool(false),
            "List pods in every namespace.",
        ),
        ArgumentSpec::optional(
            "label_selector",
            ArgType::LabelSelector,
            "Label selector, e.g. app=web,tier!=cache.",
        ),
    ],
    constraints: &[Constraint::NotWithFlag("namespace", "all_namespaces")],
    plan: plan_list_pods,
    shape: shape_list_pods,
};

/// Plans `list_pods`.
fn plan_list_pods(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    let namespace =
        if args.flag("all_namespaces") { None } else { Some(args.str("namespace")?.to_string()) };
    Ok(vec![AdapterCall::ListPods {
        namespace,
        label_selector: args.opt_str("label_selector").map(str::to_string),
    }])
}

/// Shapes `list_pods`.
fn shape_list_pods(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Pods(pods)) => to_payload(&pods),
        other => Err(unexpected_output("list_pods", other.as_ref())),
    }
}

// ============================================================================
// SECTION: get_pod_logs
// ============================================================================

/// Reads trailing container logs.
pub(crate) const GET_POD_LOGS: Operation = Operation {
    name: "get_pod_logs",
    description: "Fetch the trailing log lines of a pod container.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[
        ArgumentSpec::required("name", ArgType::DnsSubdomain, "Pod name."),
        NAMESPACE_ARG,
        ArgumentSpec::optional(
            "container",
            ArgType::DnsLabel,
            "Container name; required for multi-container pods.",
        ),
        ArgumentSpec::defaulted(
            "tail_lines",
            ArgType::Integer {
                min: 1,
                max: MAX_TAIL_LINES,
            },
            DefaultValue::Int(DEFAULT_TAIL_LINES),
            "Number of trailing lines to return.",
        ),
        ArgumentSpec::defaulted(
            "previous",
            ArgType::Boolean,
            DefaultValue::Bool(false),
            "Read logs of the previous container instance.",
        ),
    ],
    constraints: &[],
    plan: plan_get_pod_logs,
    shape: shape_get_pod_logs,
};

/// Plans `get_pod_logs`.
fn plan_get_pod_logs(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::PodLogs {
        namespace: args.str("namespace")?.to_string(),
        name: args.str("name")?.to_string(),
        options: LogOptions {
            container: args.opt_str("container").map(str::to_string),
            tail_lines: args.opt_int("tail_lines"),
            previous: args.flag("previous"),
        },
    }])
}

/// Shapes `get_pod_logs`.
fn shape_get_pod_logs(args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Logs(logs)) => Ok(json!({
            "pod": args.str("name")?,
            "namespace": args.str("namespace")?,
            "container": args.opt_str("container"),
            "tail_lines": args.opt_int("tail_lines"),
            "previous": args.flag("previous"),
            "logs": logs,
        })),
        other => Err(unexpected_output("get_pod_logs", other.as_ref())),
    }
}

// ============================================================================
// SECTION: describe_pod
// ============================================================================

/// Reads a pod and the events that reference it.
pub(crate) const DESCRIBE_POD: Operation = Operation {
    name: "describe_pod",
    description: "Describe a pod: containers, resources, conditions, and recent events.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[ArgumentSpec::required("name", ArgType::DnsSubdomain, "Pod name."), NAMESPACE_ARG],
    constraints: &[],
    plan: plan_describe_pod,
    shape: shape_describe_pod,
};

/// Plans `describe_pod`.
fn plan_describe_pod(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    let namespace = args.str("namespace")?;
    let name = args.str("name")?;
    Ok(vec![
        AdapterCall::GetPod {
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        AdapterCall::ListEvents(EventQuery::about(Some(namespace), "Pod", name)),
    ])
}

/// Shapes `describe_pod`.
fn shape_describe_pod(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    let mut outputs = outputs.into_iter();
    match (outputs.next(), outputs.next()) {
        (Some(CallOutput::Pod(pod)), Some(CallOutput::Events(mut events))) => {
            crate::resources::sort_newest_first(&mut events);
            Ok(json!({ "pod": to_payload(&pod)?, "events": to_payload(&events)? }))
        }
        (first, _) => Err(unexpected_output("describe_pod", first.as_ref())),
    }
}
