// crates/kube-gate-cluster/src/convert.rs
// ============================================================================
// Module: Resource Conversion
// Description: Converts Kubernetes API objects into core resource summaries.
// Purpose: Keep client library types out of the dispatch core.
// Dependencies: k8s-openapi, kube-gate-core
// ============================================================================

//! ## Overview
//! Every function here is pure: it reads an API object and produces the
//! backend-neutral summary. Missing optional fields become `None`, empty
//! collections, or zero counts; nothing here fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::ContainerStatus;
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::core::v1::ServicePort;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::apimachinery::pkg::version::Info;
use kube_gate_core::resources::ConditionSummary;
use kube_gate_core::resources::ContainerSummary;
use kube_gate_core::resources::DeploymentSummary;
use kube_gate_core::resources::EventSummary;
use kube_gate_core::resources::NamespaceSummary;
use kube_gate_core::resources::NodeDetail;
use kube_gate_core::resources::NodeSummary;
use kube_gate_core::resources::PodDetail;
use kube_gate_core::resources::PodSummary;
use kube_gate_core::resources::ServiceDetail;
use kube_gate_core::resources::ServicePortSummary;
use kube_gate_core::resources::ServiceSummary;
use kube_gate_core::resources::VersionInfo;
use kube_gate_core::resources::roles_from_labels;

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Renders an API timestamp as RFC 3339.
fn timestamp(time: Option<&Time>) -> Option<String> {
    time.map(|time| time.0.to_rfc3339())
}

/// Returns the object name, empty when the server omitted it.
fn name_of(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

/// Returns the object namespace, falling back to the queried namespace.
fn namespace_of(meta: &ObjectMeta, fallback: &str) -> String {
    meta.namespace.clone().unwrap_or_else(|| fallback.to_string())
}

/// Converts a signed count into an unsigned one, clamping negatives to zero.
fn count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

/// Converts a collection length into a `u32` count.
fn length(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

/// Flattens a quantity map into strings.
fn quantities(map: Option<&BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    map.map(|map| map.iter().map(|(key, value)| (key.clone(), value.0.clone())).collect())
        .unwrap_or_default()
}

/// Renders an int-or-string port reference.
fn int_or_string(value: &IntOrString) -> String {
    match value {
        IntOrString::Int(number) => number.to_string(),
        IntOrString::String(text) => text.clone(),
    }
}

// ============================================================================
// SECTION: Pods
// ============================================================================

/// Converts a pod into its list entry.
#[must_use]
pub fn pod_summary(pod: &Pod, fallback_namespace: &str) -> PodSummary {
    let statuses = pod
        .status
        .as_ref()
        .and_then(|status| status.container_statuses.as_deref())
        .unwrap_or_default();
    PodSummary {
        name: name_of(&pod.metadata),
        namespace: namespace_of(&pod.metadata, fallback_namespace),
        phase: pod
            .status
            .as_ref()
            .and_then(|status| status.phase.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        node: pod.spec.as_ref().and_then(|spec| spec.node_name.clone()),
        pod_ip: pod.status.as_ref().and_then(|status| status.pod_ip.clone()),
        ready_containers: length(statuses.iter().filter(|status| status.ready).count()),
        total_containers: length(pod.spec.as_ref().map_or(0, |spec| spec.containers.len())),
        restarts: statuses.iter().map(|status| count(status.restart_count)).sum(),
        labels: pod.metadata.labels.clone().unwrap_or_default(),
        created_at: timestamp(pod.metadata.creation_timestamp.as_ref()),
    }
}

/// Converts a pod into the detailed view.
#[must_use]
pub fn pod_detail(pod: &Pod, fallback_namespace: &str) -> PodDetail {
    let status = pod.status.as_ref();
    let statuses =
        status.and_then(|status| status.container_statuses.as_deref()).unwrap_or_default();
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .map(|container| {
                    let state = statuses.iter().find(|status| status.name == container.name);
                    container_summary(container, state)
                })
                .collect()
        })
        .unwrap_or_default();
    let conditions = status
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .map(|condition| ConditionSummary {
                    condition_type: condition.type_.clone(),
                    status: condition.status.clone(),
                    reason: condition.reason.clone(),
                    message: condition.message.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    PodDetail {
        summary: pod_summary(pod, fallback_namespace),
        host_ip: status.and_then(|status| status.host_ip.clone()),
        start_time: timestamp(status.and_then(|status| status.start_time.as_ref())),
        service_account: pod.spec.as_ref().and_then(|spec| spec.service_account_name.clone()),
        annotations: pod.metadata.annotations.clone().unwrap_or_default(),
        containers,
        conditions,
    }
}

/// Joins a container spec with its runtime status.
fn container_summary(container: &Container, status: Option<&ContainerStatus>) -> ContainerSummary {
    let state = status.and_then(|status| status.state.as_ref());
    let (state_label, state_reason) = match state {
        Some(state) if state.running.is_some() => ("running", None),
        Some(state) if state.waiting.is_some() => {
            ("waiting", state.waiting.as_ref().and_then(|waiting| waiting.reason.clone()))
        }
        Some(state) if state.terminated.is_some() => (
            "terminated",
            state.terminated.as_ref().and_then(|terminated| terminated.reason.clone()),
        ),
        _ => ("unknown", None),
    };
    let resources = container.resources.as_ref();
    ContainerSummary {
        name: container.name.clone(),
        image: container.image.clone(),
        ready: status.is_some_and(|status| status.ready),
        restart_count: status.map_or(0, |status| count(status.restart_count)),
        state: state_label.to_string(),
        state_reason,
        requests: quantities(resources.and_then(|resources| resources.requests.as_ref())),
        limits: quantities(resources.and_then(|resources| resources.limits.as_ref())),
        ports: container
            .ports
            .as_ref()
            .map(|ports| ports.iter().map(|port| port.container_port).collect())
            .unwrap_or_default(),
    }
}

// ============================================================================
// SECTION: Deployments
// ============================================================================

/// Converts a deployment into its summary.
#[must_use]
pub fn deployment_summary(deployment: &Deployment, fallback_namespace: &str) -> DeploymentSummary {
    let spec = deployment.spec.as_ref();
    let status = deployment.status.as_ref();
    DeploymentSummary {
        name: name_of(&deployment.metadata),
        namespace: namespace_of(&deployment.metadata, fallback_namespace),
        replicas: spec.and_then(|spec| spec.replicas).unwrap_or(1),
        ready_replicas: status.and_then(|status| status.ready_replicas).unwrap_or(0),
        updated_replicas: status.and_then(|status| status.updated_replicas).unwrap_or(0),
        available_replicas: status.and_then(|status| status.available_replicas).unwrap_or(0),
        images: spec
            .and_then(|spec| spec.template.spec.as_ref())
            .map(|pod_spec| {
                pod_spec.containers.iter().filter_map(|container| container.image.clone()).collect()
            })
            .unwrap_or_default(),
        selector: spec.and_then(|spec| spec.selector.match_labels.clone()).unwrap_or_default(),
        created_at: timestamp(deployment.metadata.creation_timestamp.as_ref()),
    }
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Converts a service port.
fn service_port(port: &ServicePort) -> ServicePortSummary {
    ServicePortSummary {
        name: port.name.clone(),
        port: port.port,
        target_port: port.target_port.as_ref().map(int_or_string),
        protocol: port.protocol.clone().unwrap_or_else(|| "TCP".to_string()),
        node_port: port.node_port,
    }
}

/// Converts a service into its summary.
#[must_use]
pub fn service_summary(service: &Service, fallback_namespace: &str) -> ServiceSummary {
    let spec = service.spec.as_ref();
    ServiceSummary {
        name: name_of(&service.metadata),
        namespace: namespace_of(&service.metadata, fallback_namespace),
        service_type: spec
            .and_then(|spec| spec.type_.clone())
            .unwrap_or_else(|| "ClusterIP".to_string()),
        cluster_ip: spec.and_then(|spec| spec.cluster_ip.clone()),
        external_ips: spec.and_then(|spec| spec.external_ips.clone()).unwrap_or_default(),
        ports: spec
            .and_then(|spec| spec.ports.as_ref())
            .map(|ports| ports.iter().map(service_port).collect())
            .unwrap_or_default(),
        selector: spec.and_then(|spec| spec.selector.clone()).unwrap_or_default(),
        created_at: timestamp(service.metadata.creation_timestamp.as_ref()),
    }
}

/// Converts a service into the detailed view.
#[must_use]
pub fn service_detail(service: &Service, fallback_namespace: &str) -> ServiceDetail {
    let ingress = service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|balancer| balancer.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|entry| entry.ip.clone().or_else(|| entry.hostname.clone()))
                .collect()
        })
        .unwrap_or_default();
    ServiceDetail {
        summary: service_summary(service, fallback_namespace),
        labels: service.metadata.labels.clone().unwrap_or_default(),
        annotations: service.metadata.annotations.clone().unwrap_or_default(),
        session_affinity: service.spec.as_ref().and_then(|spec| spec.session_affinity.clone()),
        load_balancer_ingress: ingress,
    }
}

// ============================================================================
// SECTION: Namespaces
// ============================================================================

/// Converts a namespace into its summary.
#[must_use]
pub fn namespace_summary(namespace: &Namespace) -> NamespaceSummary {
    NamespaceSummary {
        name: name_of(&namespace.metadata),
        phase: namespace.status.as_ref().and_then(|status| status.phase.clone()),
        labels: namespace.metadata.labels.clone().unwrap_or_default(),
        created_at: timestamp(namespace.metadata.creation_timestamp.as_ref()),
    }
}

// ============================================================================
// SECTION: Nodes
// ============================================================================

/// Converts a node into its summary.
#[must_use]
pub fn node_summary(node: &Node) -> NodeSummary {
    let labels = node.metadata.labels.clone().unwrap_or_default();
    let status = node.status.as_ref();
    let info = status.and_then(|status| status.node_info.as_ref());
    let allocatable = status.and_then(|status| status.allocatable.as_ref());
    NodeSummary {
        name: name_of(&node.metadata),
        ready: status
            .and_then(|status| status.conditions.as_ref())
            .is_some_and(|conditions| {
                conditions
                    .iter()
                    .any(|condition| condition.type_ == "Ready" && condition.status == "True")
            }),
        roles: roles_from_labels(&labels),
        unschedulable: node.spec.as_ref().and_then(|spec| spec.unschedulable).unwrap_or(false),
        kubelet_version: info.map(|info| info.kubelet_version.clone()),
        os_image: info.map(|info| info.os_image.clone()),
        container_runtime: info.map(|info| info.container_runtime_version.clone()),
        internal_ip: status.and_then(|status| status.addresses.as_ref()).and_then(|addresses| {
            addresses
                .iter()
                .find(|address| address.type_ == "InternalIP")
                .map(|address| address.address.clone())
        }),
        cpu_allocatable: allocatable.and_then(|map| map.get("cpu")).map(|value| value.0.clone()),
        memory_allocatable: allocatable
            .and_then(|map| map.get("memory"))
            .map(|value| value.0.clone()),
        created_at: timestamp(node.metadata.creation_timestamp.as_ref()),
    }
}

/// Converts a node into the detailed view.
#[must_use]
pub fn node_detail(node: &Node) -> NodeDetail {
    let status = node.status.as_ref();
    let info = status.and_then(|status| status.node_info.as_ref());
    let spec = node.spec.as_ref();
    NodeDetail {
        summary: node_summary(node),
        labels: node.metadata.labels.clone().unwrap_or_default(),
        taints: spec
            .and_then(|spec| spec.taints.as_ref())
            .map(|taints| {
                taints
                    .iter()
                    .map(|taint| match &taint.value {
                        Some(value) => format!("{}={value}:{}", taint.key, taint.effect),
                        None => format!("{}:{}", taint.key, taint.effect),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        conditions: status
            .and_then(|status| status.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .map(|condition| ConditionSummary {
                        condition_type: condition.type_.clone(),
                        status: condition.status.clone(),
                        reason: condition.reason.clone(),
                        message: condition.message.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
        capacity: quantities(status.and_then(|status| status.capacity.as_ref())),
        allocatable: quantities(status.and_then(|status| status.allocatable.as_ref())),
        kernel_version: info.map(|info| info.kernel_version.clone()),
        architecture: info.map(|info| info.architecture.clone()),
        pod_cidr: spec.and_then(|spec| spec.pod_cidr.clone()),
    }
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Converts an event into its summary.
///
/// `last_seen` prefers `lastTimestamp`, then `eventTime`, then
/// `firstTimestamp`, then the creation timestamp.
#[must_use]
pub fn event_summary(event: &Event) -> EventSummary {
    let last_seen = timestamp(event.last_timestamp.as_ref())
        .or_else(|| event.event_time.as_ref().map(|time| time.0.to_rfc3339()))
        .or_else(|| timestamp(event.first_timestamp.as_ref()))
        .or_else(|| timestamp(event.metadata.creation_timestamp.as_ref()));
    EventSummary {
        namespace: event.metadata.namespace.clone().unwrap_or_default(),
        involved_kind: event.involved_object.kind.clone().unwrap_or_default(),
        involved_name: event.involved_object.name.clone().unwrap_or_default(),
        event_type: event.type_.clone(),
        reason: event.reason.clone(),
        message: event.message.clone(),
        count: event.count.map_or(1, count),
        last_seen,
    }
}

// ============================================================================
// SECTION: Version
// ============================================================================

/// Converts the API server version response.
#[must_use]
pub fn version_info(info: &Info) -> VersionInfo {
    VersionInfo {
        git_version: info.git_version.clone(),
        major: info.major.clone(),
        minor: info.minor.clone(),
        platform: info.platform.clone(),
    }
}
