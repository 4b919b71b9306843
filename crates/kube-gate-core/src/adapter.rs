// crates/kube-gate-core/src/adapter.rs
// ============================================================================
// Module: Cluster Client Adapter
// Description: Backend-agnostic interface for primitive cluster calls.
// Purpose: Decouple catalog execution from the concrete cluster client.
// Dependencies: async-trait, serde
// ============================================================================

//! ## Overview
//! [`ClusterAdapter`] exposes one async method per primitive cluster action
//! the catalog needs. Operations never call it directly; they emit a plan of
//! [`AdapterCall`] values which the dispatcher executes in order through
//! [`AdapterCall::invoke`].
//!
//! Adapters perform no retries. They classify each failure into a
//! [`ClusterErrorKind`] so the dispatcher can apply its retry policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::resources::AppliedResource;
use crate::resources::DeploymentSummary;
use crate::resources::EventSummary;
use crate::resources::NamespaceDeletion;
use crate::resources::NamespaceSummary;
use crate::resources::NodeDetail;
use crate::resources::NodeSummary;
use crate::resources::PodDetail;
use crate::resources::PodSummary;
use crate::resources::ResourceKind;
use crate::resources::RestartOutcome;
use crate::resources::ServiceDetail;
use crate::resources::ServiceSummary;
use crate::resources::VersionInfo;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Classification of a cluster failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterErrorKind {
    /// Resource does not exist.
    NotFound,
    /// Authentication or authorization rejected the call.
    Forbidden,
    /// Write conflicts with current state.
    Conflict,
    /// Connectivity or overload failure that may succeed on retry.
    Transient,
    /// Any other failure.
    Other,
}

/// Classified cluster failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClusterError {
    /// Failure classification.
    pub kind: ClusterErrorKind,
    /// HTTP status code from the API server, when one was received.
    pub status_code: Option<u16>,
    /// API reason string, e.g. `NotFound` or `AlreadyExists`.
    pub reason: Option<String>,
    /// API server message.
    pub message: String,
}

impl ClusterError {
    /// Builds a classified error without status metadata.
    #[must_use]
    pub fn new(kind: ClusterErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status_code: None,
            reason: None,
            message: message.into(),
        }
    }

    /// Builds a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::NotFound, message).with_status(404, "NotFound")
    }

    /// Builds a forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::Forbidden, message).with_status(403, "Forbidden")
    }

    /// Builds a conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::Conflict, message).with_status(409, "AlreadyExists")
    }

    /// Builds a transient connectivity error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ClusterErrorKind::Transient, message)
    }

    /// Returns a copy carrying status metadata.
    #[must_use]
    pub fn with_status(mut self, status_code: u16, reason: impl Into<String>) -> Self {
        self.status_code = Some(status_code);
        self.reason = Some(reason.into());
        self
    }

    /// Returns true when the failure is eligible for a bounded retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.kind == ClusterErrorKind::Transient
    }
}

// ============================================================================
// SECTION: Call Parameters
// ============================================================================

/// Options for a container log fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LogOptions {
    /// Container name; required by the API for multi-container pods.
    pub container: Option<String>,
    /// Number of trailing lines.
    pub tail_lines: Option<i64>,
    /// Fetch logs of the previous container instance.
    pub previous: bool,
}

/// Filter for an event listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EventQuery {
    /// Namespace scope; `None` lists cluster-wide.
    pub namespace: Option<String>,
    /// Kind of the involved object.
    pub involved_kind: Option<String>,
    /// Name of the involved object.
    pub involved_name: Option<String>,
}

impl EventQuery {
    /// Builds a query for events about one object.
    #[must_use]
    pub fn about(namespace: Option<&str>, kind: &str, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            involved_kind: Some(kind.to_string()),
            involved_name: Some(name.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Adapter Trait
// ============================================================================

/// Primitive cluster actions used by the catalog.
///
/// # Invariants
/// - Implementations are safe for concurrent use from many requests.
/// - Implementations never retry; they classify failures.
/// - Dropping a returned future abandons the underlying network call.
#[async_trait]
pub trait ClusterAdapter: Send + Sync {
    /// Lists pods in a namespace, or cluster-wide when `namespace` is `None`.
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<PodSummary>, ClusterError>;

    /// Reads a single pod.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodDetail, ClusterError>;

    /// Fetches container logs.
    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        options: &LogOptions,
    ) -> Result<String, ClusterError>;

    /// Lists deployments in a namespace.
    async fn list_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<DeploymentSummary>, ClusterError>;

    /// Sets the replica count of a deployment.
    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<DeploymentSummary, ClusterError>;

    /// Triggers a rolling restart by bumping the pod template annotation.
    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RestartOutcome, ClusterError>;

    /// Server-side applies one manifest document.
    async fn apply_document(
        &self,
        default_namespace: &str,
        document: &Value,
    ) -> Result<AppliedResource, ClusterError>;

    /// Reads a resource as its raw JSON representation.
    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Value, ClusterError>;

    /// Lists events matching the query.
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>, ClusterError>;

    /// Lists services in a namespace.
    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceSummary>, ClusterError>;

    /// Reads a single service.
    async fn get_service(&self, namespace: &str, name: &str)
    -> Result<ServiceDetail, ClusterError>;

    /// Lists namespaces in cluster order.
    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, ClusterError>;

    /// Creates a namespace with labels.
    async fn create_namespace(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<NamespaceSummary, ClusterError>;

    /// Deletes a namespace.
    async fn delete_namespace(&self, name: &str) -> Result<NamespaceDeletion, ClusterError>;

    /// Lists nodes.
    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ClusterError>;

    /// Reads a single node.
    async fn get_node(&self, name: &str) -> Result<NodeDetail, ClusterError>;

    /// Reads the API server version.
    async fn server_version(&self) -> Result<VersionInfo, ClusterError>;
}

// ============================================================================
// SECTION: Call Plan
// ============================================================================

/// Label for each primitive call, used in traces and failure details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// [`ClusterAdapter::list_pods`].
    ListPods,
    /// [`ClusterAdapter::get_pod`].
    GetPod,
    /// [`ClusterAdapter::pod_logs`].
    PodLogs,
    /// [`ClusterAdapter::list_deployments`].
    ListDeployments,
    /// [`ClusterAdapter::scale_deployment`].
    ScaleDeployment,
    /// [`ClusterAdapter::restart_deployment`].
    RestartDeployment,
    /// [`ClusterAdapter::apply_document`].
    ApplyDocument,
    /// [`ClusterAdapter::get_resource`].
    GetResource,
    /// [`ClusterAdapter::list_events`].
    ListEvents,
    /// [`ClusterAdapter::list_services`].
    ListServices,
    /// [`ClusterAdapter::get_service`].
    GetService,
    /// [`ClusterAdapter::list_namespaces`].
    ListNamespaces,
    /// [`ClusterAdapter::create_namespace`].
    CreateNamespace,
    /// [`ClusterAdapter::delete_namespace`].
    DeleteNamespace,
    /// [`ClusterAdapter::list_nodes`].
    ListNodes,
    /// [`ClusterAdapter::get_node`].
    GetNode,
    /// [`ClusterAdapter::server_version`].
    ServerVersion,
}

impl CallKind {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListPods => "list_pods",
            Self::GetPod => "get_pod",
            Self::PodLogs => "pod_logs",
            Self::ListDeployments => "list_deployments",
            Self::ScaleDeployment => "scale_deployment",
            Self::RestartDeployment => "restart_deployment",
            Self::ApplyDocument => "apply_document",
            Self::GetResource => "get_resource",
            Self::ListEvents => "list_events",
            Self::ListServices => "list_services",
            Self::GetService => "get_service",
            Self::ListNamespaces => "list_namespaces",
            Self::CreateNamespace => "create_namespace",
            Self::DeleteNamespace => "delete_namespace",
            Self::ListNodes => "list_nodes",
            Self::GetNode => "get_node",
            Self::ServerVersion => "server_version",
        }
    }
}

impl fmt::Display for CallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One planned adapter call with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    /// List pods.
    ListPods {
        /// Namespace scope.
        namespace: Option<String>,
        /// Label selector.
        label_selector: Option<String>,
    },
    /// Read a pod.
    GetPod {
        /// Namespace.
        namespace: String,
        /// Pod name.
        name: String,
    },
    /// Fetch logs.
    PodLogs {
        /// Namespace.
        namespace: String,
        /// Pod name.
        name: String,
        /// Log options.
        options: LogOptions,
    },
    /// List deployments.
    ListDeployments {
        /// Namespace.
        namespace: String,
    },
    /// Patch replica count.
    ScaleDeployment {
        /// Namespace.
        namespace: String,
        /// Deployment name.
        name: String,
        /// Desired replicas.
        replicas: i32,
    },
    /// Rolling restart.
    RestartDeployment {
        /// Namespace.
        namespace: String,
        /// Deployment name.
        name: String,
    },
    /// Server-side apply of one document.
    ApplyDocument {
        /// Namespace for namespaced documents that omit one.
        default_namespace: String,
        /// Parsed manifest document.
        document: Value,
    },
    /// Read a resource as raw JSON.
    GetResource {
        /// Resource kind.
        kind: ResourceKind,
        /// Namespace.
        namespace: String,
        /// Resource name.
        name: String,
    },
    /// List events.
    ListEvents(EventQuery),
    /// List services.
    ListServices {
        /// Namespace.
        namespace: String,
    },
    /// Read a service.
    GetService {
        /// Namespace.
        namespace: String,
        /// Service name.
        name: String,
    },
    /// List namespaces.
    ListNamespaces,
    /// Create a namespace.
    CreateNamespace {
        /// Namespace name.
        name: String,
        /// Labels to set.
        labels: BTreeMap<String, String>,
    },
    /// Delete a namespace.
    DeleteNamespace {
        /// Namespace name.
        name: String,
    },
    /// List nodes.
    ListNodes,
    /// Read a node.
    GetNode {
        /// Node name.
        name: String,
    },
    /// Read the API server version.
    ServerVersion,
}

impl AdapterCall {
    /// Returns the call label.
    #[must_use]
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::ListPods {
                ..
            } => CallKind::ListPods,
            Self::GetPod {
                ..
            } => CallKind::GetPod,
            Self::PodLogs {
                ..
            } => CallKind::PodLogs,
            Self::ListDeployments {
                ..
            } => CallKind::ListDeployments,
            Self::ScaleDeployment {
                ..
            } => CallKind::ScaleDeployment,
            Self::RestartDeployment {
                ..
            } => CallKind::RestartDeployment,
            Self::ApplyDocument {
                ..
            } => CallKind::ApplyDocument,
            Self::GetResource {
                ..
            } => CallKind::GetResource,
            Self::ListEvents(_) => CallKind::ListEvents,
            Self::ListServices {
                ..
            } => CallKind::ListServices,
            Self::GetService {
                ..
            } => CallKind::GetService,
            Self::ListNamespaces => CallKind::ListNamespaces,
            Self::CreateNamespace {
                ..
            } => CallKind::CreateNamespace,
            Self::DeleteNamespace {
                ..
            } => CallKind::DeleteNamespace,
            Self::ListNodes => CallKind::ListNodes,
            Self::GetNode {
                ..
            } => CallKind::GetNode,
            Self::ServerVersion => CallKind::ServerVersion,
        }
    }

    /// Executes the call against an adapter.
    ///
    /// # Errors
    ///
    /// Returns the adapter's classified [`ClusterError`].
    pub async fn invoke(&self, adapter: &dyn ClusterAdapter) -> Result<CallOutput, ClusterError> {
        let output = match self {
            Self::ListPods {
                namespace,
                label_selector,
            } => CallOutput::Pods(
                adapter.list_pods(namespace.as_deref(), label_selector.as_deref()).await?,
            ),
            Self::GetPod {
                namespace,
                name,
            } => CallOutput::Pod(Box::new(adapter.get_pod(namespace, name).await?)),
            Self::PodLogs {
                namespace,
                name,
                options,
            } => CallOutput::Logs(adapter.pod_logs(namespace, name, options).await?),
            Self::ListDeployments {
                namespace,
            } => CallOutput::Deployments(adapter.list_deployments(namespace).await?),
            Self::ScaleDeployment {
                namespace,
                name,
                replicas,
            } => {
                CallOutput::Deployment(adapter.scale_deployment(namespace, name, *replicas).await?)
            }
            Self::RestartDeployment {
                namespace,
                name,
            } => CallOutput::Restarted(adapter.restart_deployment(namespace, name).await?),
            Self::ApplyDocument {
                default_namespace,
                document,
            } => CallOutput::Applied(adapter.apply_document(default_namespace, document).await?),
            Self::GetResource {
                kind,
                namespace,
                name,
            } => CallOutput::Resource(adapter.get_resource(*kind, namespace, name).await?),
            Self::ListEvents(query) => CallOutput::Events(adapter.list_events(query).await?),
            Self::ListServices {
                namespace,
            } => CallOutput::Services(adapter.list_services(namespace).await?),
            Self::GetService {
                namespace,
                name,
            } => CallOutput::Service(Box::new(adapter.get_service(namespace, name).await?)),
            Self::ListNamespaces => CallOutput::Namespaces(adapter.list_namespaces().await?),
            Self::CreateNamespace {
                name,
                labels,
            } => CallOutput::Namespace(adapter.create_namespace(name, labels).await?),
            Self::DeleteNamespace {
                name,
            } => CallOutput::NamespaceDeleted(adapter.delete_namespace(name).await?),
            Self::ListNodes => CallOutput::Nodes(adapter.list_nodes().await?),
            Self::GetNode {
                name,
            } => CallOutput::Node(Box::new(adapter.get_node(name).await?)),
            Self::ServerVersion => CallOutput::Version(adapter.server_version().await?),
        };
        Ok(output)
    }
}

// ============================================================================
// SECTION: Call Output
// ============================================================================

/// Typed result of one adapter call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallOutput {
    /// Pod list.
    Pods(Vec<PodSummary>),
    /// Single pod.
    Pod(Box<PodDetail>),
    /// Log text.
    Logs(String),
    /// Deployment list.
    Deployments(Vec<DeploymentSummary>),
    /// Single deployment after a write.
    Deployment(DeploymentSummary),
    /// Restart result.
    Restarted(RestartOutcome),
    /// Applied object identity.
    Applied(AppliedResource),
    /// Raw resource JSON.
    Resource(Value),
    /// Event list.
    Events(Vec<EventSummary>),
    /// Service list.
    Services(Vec<ServiceSummary>),
    /// Single service.
    Service(Box<ServiceDetail>),
    /// Namespace list.
    Namespaces(Vec<NamespaceSummary>),
    /// Created namespace.
    Namespace(NamespaceSummary),
    /// Namespace deletion result.
    NamespaceDeleted(NamespaceDeletion),
    /// Node list.
    Nodes(Vec<NodeSummary>),
    /// Single node.
    Node(Box<NodeDetail>),
    /// API server version.
    Version(VersionInfo),
}

impl CallOutput {
    /// Returns the variant label for diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pods(_) => "pods",
            Self::Pod(_) => "pod",
            Self::Logs(_) => "logs",
            Self::Deployments(_) => "deployments",
            Self::Deployment(_) => "deployment",
            Self::Restarted(_) => "restarted",
            Self::Applied(_) => "applied",
            Self::Resource(_) => "resource",
            Self::Events(_) => "events",
            Self::Services(_) => "services",
            Self::Service(_) => "service",
            Self::Namespaces(_) => "namespaces",
            Self::Namespace(_) => "namespace",
            Self::NamespaceDeleted(_) => "namespace_deleted",
            Self::Nodes(_) => "nodes",
            Self::Node(_) => "node",
            Self::Version(_) => "version",
        }
    }
}
