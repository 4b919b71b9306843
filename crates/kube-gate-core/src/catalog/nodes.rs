// crates/kube-gate-core/src/catalog/nodes.rs
// ============================================================================
// Module: Node Operations
// Description: Catalog entries for nodes, cluster summary, and pod placement.
// Purpose: Declare node-centric operations as immutable descriptors.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `cluster_info` combines the server version with node and namespace counts;
//! a node is control plane when it carries a `control-plane` or `master`
//! role label. `list_pods_by_node` groups pods under every listed node
//! (including nodes with no pods) and reports unscheduled pods separately.

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;

use super::Effect;
use super::NAMESPACE_FILTER_ARG;
use super::Operation;
use super::to_payload;
use super::unexpected_output;
use crate::adapter::AdapterCall;
use crate::adapter::CallOutput;
use crate::adapter::EventQuery;
use crate::model::Failure;
use crate::resources::PodSummary;
use crate::resources::sort_newest_first;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::validator::ValidatedArgs;

// ============================================================================
// SECTION: list_nodes
// ============================================================================

/// Lists nodes.
pub(crate) const LIST_NODES: Operation = Operation {
    name: "list_nodes",
    description: "List nodes with readiness, roles, versions, and allocatable resources.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[],
    constraints: &[],
    plan: plan_list_nodes,
    shape: shape_list_nodes,
};

/// Plans `list_nodes`.
fn plan_list_nodes(_args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ListNodes])
}

/// Shapes `list_nodes`.
fn shape_list_nodes(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Nodes(nodes)) => to_payload(&nodes),
        other => Err(unexpected_output("list_nodes", other.as_ref())),
    }
}

// ============================================================================
// SECTION: describe_node
// ============================================================================

/// Reads a node and the events that reference it.
pub(crate) const DESCRIBE_NODE: Operation = Operation {
    name: "describe_node",
    description: "Describe a node: conditions, taints, capacity, and recent events.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[ArgumentSpec::required("name", ArgType::DnsSubdomain, "Node name.")],
    constraints: &[],
    plan: plan_describe_node,
    shape: shape_describe_node,
};

/// Plans `describe_node`.
fn plan_describe_node(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    let name = args.str("name")?;
    Ok(vec![
        AdapterCall::GetNode {
            name: name.to_string(),
        },
        AdapterCall::ListEvents(EventQuery::about(None, "Node", name)),
    ])
}

/// Shapes `describe_node`.
fn shape_describe_node(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    let mut outputs = outputs.into_iter();
    match (outputs.next(), outputs.next()) {
        (Some(CallOutput::Node(node)), Some(CallOutput::Events(mut events))) => {
            sort_newest_first(&mut events);
            Ok(json!({ "node": to_payload(&node)?, "events": to_payload(&events)? }))
        }
        (first, _) => Err(unexpected_output("describe_node", first.as_ref())),
    }
}

// ============================================================================
// SECTION: cluster_info
// ============================================================================

/// Summarizes the cluster.
pub(crate) const CLUSTER_INFO: Operation = Operation {
    name: "cluster_info",
    description: "Summarize the cluster: API server version, node counts by role, and \
                  namespace count.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[],
    constraints: &[],
    plan: plan_cluster_info,
    shape: shape_cluster_info,
};

/// Plans `cluster_info`.
fn plan_cluster_info(_args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ServerVersion, AdapterCall::ListNodes, AdapterCall::ListNamespaces])
}

/// Shapes `cluster_info`.
fn shape_cluster_info(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    let mut outputs = outputs.into_iter();
    match (outputs.next(), outputs.next(), outputs.next()) {
        (
            Some(CallOutput::Version(version)),
            Some(CallOutput::Nodes(nodes)),
            Some(CallOutput::Namespaces(namespaces)),
        ) => {
            let control_plane = nodes.iter().filter(|node| node.is_control_plane()).count();
            let ready = nodes.iter().filter(|node| node.ready).count();
            Ok(json!({
                "version": to_payload(&version)?,
                "nodes": {
                    "total": nodes.len(),
                    "ready": ready,
                    "control_plane": control_plane,
                    "workers": nodes.len() - control_plane,
                },
                "namespaces": namespaces.len(),
            }))
        }
        (first, _, _) => Err(unexpected_output("cluster_info", first.as_ref())),
    }
}

// ============================================================================
// SECTION: list_pods_by_node
// ============================================================================

/// Groups pods by the node they run on.
pub(crate) const LIST_PODS_BY_NODE: Operation = Operation {
    name: "list_pods_by_node",
    description: "Group pods by node, including empty nodes; unscheduled pods are listed \
                  separately.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[NAMESPACE_FILTER_ARG],
    constraints: &[],
    plan: plan_list_pods_by_node,
    shape: shape_list_pods_by_node,
};

/// Plans `list_pods_by_node`.
fn plan_list_pods_by_node(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![
        AdapterCall::ListNodes,
        AdapterCall::ListPods {
            namespace: args.opt_str("namespace").map(str::to_string),
            label_selector: None,
        },
    ])
}

/// Compact pod entry used inside a node group.
fn pod_entry(pod: &PodSummary) -> Value {
    json!({
        "name": pod.name,
        "namespace": pod.namespace,
        "phase": pod.phase,
        "restarts": pod.restarts,
    })
}

/// Sorts pods by namespace then name.
fn sort_pods(pods: &mut [PodSummary]) {
    pods.sort_by(|left, right| {
        (left.namespace.as_str(), left.name.as_str())
            .cmp(&(right.namespace.as_str(), right.name.as_str()))
    });
}

/// Shapes `list_pods_by_node`.
fn shape_list_pods_by_node(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    let mut outputs = outputs.into_iter();
    let (Some(CallOutput::Nodes(nodes)), Some(CallOutput::Pods(pods))) =
        (outputs.next(), outputs.next())
    else {
        return Err(unexpected_output("list_pods_by_node", None));
    };
    let mut by_node: BTreeMap<String, Vec<PodSummary>> = BTreeMap::new();
    let mut unscheduled = Vec::new();
    for pod in pods {
        match pod.node.clone() {
            Some(node) => by_node.entry(node).or_default().push(pod),
            None => unscheduled.push(pod),
        }
    }
    let mut readiness: BTreeMap<String, Option<bool>> =
        nodes.iter().map(|node| (node.name.clone(), Some(node.ready))).collect();
    for node in by_node.keys() {
        readiness.entry(node.clone()).or_insert(None);
    }
    let groups: Vec<Value> = readiness
        .into_iter()
        .map(|(node, ready)| {
            let mut pods = by_node.remove(&node).unwrap_or_default();
            sort_pods(&mut pods);
            json!({
                "node": node,
                "ready": ready,
                "pod_count": pods.len(),
                "pods": pods.iter().map(pod_entry).collect::<Vec<_>>(),
            })
        })
        .collect();
    sort_pods(&mut unscheduled);
    Ok(json!({
        "nodes": groups,
        "unscheduled": unscheduled.iter().map(pod_entry).collect::<Vec<_>>(),
    }))
}
