// crates/kube-gate-core/src/resources.rs
// ============================================================================
// Module: Resource Summaries
// Description: Backend-neutral views of cluster objects returned by adapters.
// Purpose: Keep payload shapes stable regardless of the client library.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Adapters convert cluster API objects into these summaries before they reach
//! the dispatcher. Payloads are built from them, so the orchestrator sees the
//! same shape whether the cluster is real or scripted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Label prefix carrying node roles.
pub const NODE_ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";
/// Role names treated as control plane.
pub const CONTROL_PLANE_ROLES: &[&str] = &["control-plane", "master"];

// ============================================================================
// SECTION: Resource Kinds
// ============================================================================

/// Kinds accepted by `get_yaml`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Core v1 Pod.
    Pod,
    /// apps/v1 Deployment.
    Deployment,
    /// Core v1 Service.
    Service,
    /// Core v1 `ConfigMap`.
    ConfigMap,
    /// Core v1 Secret.
    Secret,
}

impl ResourceKind {
    /// Returns the canonical kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
        }
    }

    /// Returns all supported kinds in stable order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Pod, Self::Deployment, Self::Service, Self::ConfigMap, Self::Secret]
    }

    /// Parses a kind name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::all().iter().copied().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Shared Pieces
// ============================================================================

/// Status condition of a pod or node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSummary {
    /// Condition type, e.g. `Ready`.
    #[serde(rename = "type")]
    pub condition_type: String,
    /// `True`, `False`, or `Unknown`.
    pub status: String,
    /// Machine-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================================================
// SECTION: Pods
// ============================================================================

/// Pod list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSummary {
    /// Pod name.
    pub name: String,
    /// Pod namespace.
    pub namespace: String,
    /// Lifecycle phase.
    pub phase: String,
    /// Node the pod is scheduled on.
    #[serde(default)]
    pub node: Option<String>,
    /// Pod IP address.
    #[serde(default)]
    pub pod_ip: Option<String>,
    /// Containers reporting ready.
    pub ready_containers: u32,
    /// Containers declared in the pod template.
    pub total_containers: u32,
    /// Sum of container restart counts.
    pub restarts: u32,
    /// Pod labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Per-container view used by `describe_pod`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: Option<String>,
    /// Readiness flag.
    pub ready: bool,
    /// Restart count.
    pub restart_count: u32,
    /// Current state: `running`, `waiting`, `terminated`, or `unknown`.
    pub state: String,
    /// Reason attached to a waiting or terminated state.
    #[serde(default)]
    pub state_reason: Option<String>,
    /// Resource requests.
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
    /// Resource limits.
    #[serde(default)]
    pub limits: BTreeMap<String, String>,
    /// Declared container ports.
    #[serde(default)]
    pub ports: Vec<i32>,
}

/// Full pod view used by `describe_pod`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodDetail {
    /// List-level fields.
    #[serde(flatten)]
    pub summary: PodSummary,
    /// Host IP of the node.
    #[serde(default)]
    pub host_ip: Option<String>,
    /// Start time (RFC 3339).
    #[serde(default)]
    pub start_time: Option<String>,
    /// Service account name.
    #[serde(default)]
    pub service_account: Option<String>,
    /// Pod annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Containers with status.
    #[serde(default)]
    pub containers: Vec<ContainerSummary>,
    /// Pod conditions.
    #[serde(default)]
    pub conditions: Vec<ConditionSummary>,
}

// ============================================================================
// SECTION: Deployments
// ============================================================================

/// Deployment list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    /// Deployment name.
    pub name: String,
    /// Deployment namespace.
    pub namespace: String,
    /// Desired replicas.
    pub replicas: i32,
    /// Ready replicas.
    pub ready_replicas: i32,
    /// Updated replicas.
    pub updated_replicas: i32,
    /// Available replicas.
    pub available_replicas: i32,
    /// Container images in the pod template.
    #[serde(default)]
    pub images: Vec<String>,
    /// Label selector match labels.
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Result of a rollout restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartOutcome {
    /// Deployment name.
    pub name: String,
    /// Deployment namespace.
    pub namespace: String,
    /// Annotation value written to the pod template.
    pub restarted_at: String,
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Service port mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePortSummary {
    /// Port name.
    #[serde(default)]
    pub name: Option<String>,
    /// Service port.
    pub port: i32,
    /// Target port (number or name).
    #[serde(default)]
    pub target_port: Option<String>,
    /// Protocol.
    pub protocol: String,
    /// Node port when allocated.
    #[serde(default)]
    pub node_port: Option<i32>,
}

/// Service list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSummary {
    /// Service name.
    pub name: String,
    /// Service namespace.
    pub namespace: String,
    /// Service type, e.g. `ClusterIP`.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Cluster IP.
    #[serde(default)]
    pub cluster_ip: Option<String>,
    /// External IPs.
    #[serde(default)]
    pub external_ips: Vec<String>,
    /// Port mappings.
    #[serde(default)]
    pub ports: Vec<ServicePortSummary>,
    /// Pod selector.
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Full service view used by `describe_service`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDetail {
    /// List-level fields.
    #[serde(flatten)]
    pub summary: ServiceSummary,
    /// Service labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Service annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Session affinity mode.
    #[serde(default)]
    pub session_affinity: Option<String>,
    /// Load balancer ingress addresses (IP or hostname).
    #[serde(default)]
    pub load_balancer_ingress: Vec<String>,
}

// ============================================================================
// SECTION: Namespaces
// ============================================================================

/// Namespace entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    /// Namespace name.
    pub name: String,
    /// Lifecycle phase.
    #[serde(default)]
    pub phase: Option<String>,
    /// Namespace labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Result of a namespace deletion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDeletion {
    /// Namespace name.
    pub name: String,
    /// Phase reported after the delete call, usually `Terminating`.
    pub phase: String,
}

// ============================================================================
// SECTION: Nodes
// ============================================================================

/// Node list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Node name.
    pub name: String,
    /// Ready condition is `True`.
    pub ready: bool,
    /// Roles from `node-role.kubernetes.io/*` labels.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Node is cordoned.
    #[serde(default)]
    pub unschedulable: bool,
    /// Kubelet version.
    #[serde(default)]
    pub kubelet_version: Option<String>,
    /// OS image.
    #[serde(default)]
    pub os_image: Option<String>,
    /// Container runtime version.
    #[serde(default)]
    pub container_runtime: Option<String>,
    /// Internal IP address.
    #[serde(default)]
    pub internal_ip: Option<String>,
    /// Allocatable CPU.
    #[serde(default)]
    pub cpu_allocatable: Option<String>,
    /// Allocatable memory.
    #[serde(default)]
    pub memory_allocatable: Option<String>,
    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,
}

impl NodeSummary {
    /// Returns true when the node carries a control-plane role.
    #[must_use]
    pub fn is_control_plane(&self) -> bool {
        self.roles.iter().any(|role| CONTROL_PLANE_ROLES.contains(&role.as_str()))
    }
}

/// Full node view used by `describe_node`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDetail {
    /// List-level fields.
    #[serde(flatten)]
    pub summary: NodeSummary,
    /// Node labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Taints rendered as `key=value:Effect`.
    #[serde(default)]
    pub taints: Vec<String>,
    /// Node conditions.
    #[serde(default)]
    pub conditions: Vec<ConditionSummary>,
    /// Capacity by resource.
    #[serde(default)]
    pub capacity: BTreeMap<String, String>,
    /// Allocatable by resource.
    #[serde(default)]
    pub allocatable: BTreeMap<String, String>,
    /// Kernel version.
    #[serde(default)]
    pub kernel_version: Option<String>,
    /// CPU architecture.
    #[serde(default)]
    pub architecture: Option<String>,
    /// Pod CIDR.
    #[serde(default)]
    pub pod_cidr: Option<String>,
}

/// Extracts role names from node labels.
#[must_use]
pub fn roles_from_labels(labels: &BTreeMap<String, String>) -> Vec<String> {
    labels
        .keys()
        .filter_map(|key| key.strip_prefix(NODE_ROLE_LABEL_PREFIX))
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Event entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Event namespace.
    pub namespace: String,
    /// Kind of the involved object.
    pub involved_kind: String,
    /// Name of the involved object.
    pub involved_name: String,
    /// `Normal` or `Warning`.
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Short reason.
    pub reason: Option<String>,
    /// Message text.
    pub message: Option<String>,
    /// Occurrence count.
    pub count: u32,
    /// Most recent occurrence (RFC 3339).
    #[serde(default)]
    pub last_seen: Option<String>,
}

impl EventSummary {
    /// Parses `last_seen` for ordering.
    #[must_use]
    pub fn last_seen_at(&self) -> Option<OffsetDateTime> {
        self.last_seen.as_deref().and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
    }
}

/// Sorts events newest first; events without a timestamp sort last.
pub fn sort_newest_first(events: &mut [EventSummary]) {
    events.sort_by(|left, right| right.last_seen_at().cmp(&left.last_seen_at()));
}

// ============================================================================
// SECTION: Cluster Info
// ============================================================================

/// API server version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Git version, e.g. `v1.32.1`.
    pub git_version: String,
    /// Major version.
    pub major: String,
    /// Minor version.
    pub minor: String,
    /// Platform string.
    pub platform: String,
}

/// Identity of a server-side applied object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedResource {
    /// `apiVersion` of the document.
    pub api_version: String,
    /// Kind of the document.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Namespace for namespaced kinds.
    #[serde(default)]
    pub namespace: Option<String>,
}
