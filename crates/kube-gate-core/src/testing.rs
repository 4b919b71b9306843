// crates/kube-gate-core/src/testing.rs
// ============================================================================
// Module: Scripted Cluster Adapter
// Description: In-memory cluster adapter with scripted failures for tests.
// Purpose: Exercise dispatch, transports, and tools without a live cluster.
// Dependencies: async-trait, tokio, time
// ============================================================================

//! ## Overview
//! [`ScriptedAdapter`] serves cluster state from memory and records every
//! call. Failures, delays, and calls that never complete can be queued per
//! [`CallKind`], so retry, timeout, and cancellation paths are reproducible.
//! The in-flight counter drops back when a pending call's future is dropped,
//! which is how tests observe that cancellation released the call.
//!
//! Available under `cfg(test)` and the `test-support` feature.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::adapter::CallKind;
use crate::adapter::ClusterAdapter;
use crate::adapter::ClusterError;
use crate::adapter::ClusterErrorKind;
use crate::adapter::EventQuery;
use crate::adapter::LogOptions;
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
// SECTION: State
// ============================================================================

/// Cluster contents served by the adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterState {
    /// Pods.
    pub pods: Vec<PodDetail>,
    /// Deployments.
    pub deployments: Vec<DeploymentSummary>,
    /// Services.
    pub services: Vec<ServiceDetail>,
    /// Namespaces in cluster order.
    pub namespaces: Vec<NamespaceSummary>,
    /// Nodes.
    pub nodes: Vec<NodeDetail>,
    /// Events.
    pub events: Vec<EventSummary>,
    /// Log text by `(namespace, pod)`.
    pub logs: BTreeMap<(String, String), String>,
    /// Raw objects by `(kind, namespace, name)`.
    pub resources: BTreeMap<(ResourceKind, String, String), Value>,
    /// Documents received by `apply_document`, with namespaces filled in.
    pub applied: Vec<Value>,
    /// Deployments restarted, as `(namespace, name)`.
    pub restarted: Vec<(String, String)>,
    /// API server version.
    pub version: VersionInfo,
}

impl Default for ClusterState {
    fn default() -> Self {
        Self {
            pods: Vec::new(),
            deployments: Vec::new(),
            services: Vec::new(),
            namespaces: Vec::new(),
            nodes: Vec::new(),
            events: Vec::new(),
            logs: BTreeMap::new(),
            resources: BTreeMap::new(),
            applied: Vec::new(),
            restarted: Vec::new(),
            version: fixtures::version("v1.32.1"),
        }
    }
}

/// Scripted behavior for the next call of a kind.
#[derive(Debug, Clone)]
enum Step {
    /// Fail with the error.
    Fail(ClusterError),
    /// Sleep before answering normally.
    Delay(Duration),
    /// Never complete.
    Hang,
}

/// Queued and permanent behaviors.
#[derive(Debug, Default)]
struct Script {
    /// One-shot steps by call kind, consumed in order.
    queued: BTreeMap<CallKind, VecDeque<Step>>,
    /// Failures returned on every call of a kind.
    always: BTreeMap<CallKind, ClusterError>,
}

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// In-memory [`ClusterAdapter`] with scripted behaviors and call recording.
#[derive(Debug, Default)]
pub struct ScriptedAdapter {
    /// Served cluster contents.
    state: Mutex<ClusterState>,
    /// Scripted behaviors.
    script: Mutex<Script>,
    /// Calls in arrival order.
    calls: Mutex<Vec<CallKind>>,
    /// Calls currently executing.
    in_flight: Arc<AtomicUsize>,
}

/// Decrements the in-flight counter on drop.
struct InFlightGuard {
    /// Shared counter.
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Locks a mutex, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedAdapter {
    /// Builds an adapter over an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an adapter over the given state.
    #[must_use]
    pub fn with_state(state: ClusterState) -> Self {
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Adds namespaces in order.
    #[must_use]
    pub fn with_namespaces(self, names: &[&str]) -> Self {
        lock(&self.state).namespaces.extend(names.iter().map(|name| fixtures::namespace(name)));
        self
    }

    /// Adds a pod.
    #[must_use]
    pub fn with_pod(self, pod: PodDetail) -> Self {
        lock(&self.state).pods.push(pod);
        self
    }

    /// Adds a deployment.
    #[must_use]
    pub fn with_deployment(self, deployment: DeploymentSummary) -> Self {
        lock(&self.state).deployments.push(deployment);
        self
    }

    /// Adds a service.
    #[must_use]
    pub fn with_service(self, service: ServiceDetail) -> Self {
        lock(&self.state).services.push(service);
        self
    }

    /// Adds a node.
    #[must_use]
    pub fn with_node(self, node: NodeDetail) -> Self {
        lock(&self.state).nodes.push(node);
        self
    }

    /// Adds an event.
    #[must_use]
    pub fn with_event(self, event: EventSummary) -> Self {
        lock(&self.state).events.push(event);
        self
    }

    /// Sets the log text of a pod.
    #[must_use]
    pub fn with_logs(self, namespace: &str, pod: &str, text: &str) -> Self {
        lock(&self.state).logs.insert((namespace.to_string(), pod.to_string()), text.to_string());
        self
    }

    /// Adds a raw object served by `get_resource`.
    #[must_use]
    pub fn with_resource(
        self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
        object: Value,
    ) -> Self {
        lock(&self.state).resources.insert((kind, namespace.to_string(), name.to_string()), object);
        self
    }

    /// Fails the next call of `kind` with `error`.
    pub fn fail_next(&self, kind: CallKind, error: ClusterError) {
        self.push_step(kind, Step::Fail(error));
    }

    /// Fails every call of `kind` with `error`.
    pub fn fail_always(&self, kind: CallKind, error: ClusterError) {
        lock(&self.script).always.insert(kind, error);
    }

    /// Delays the next call of `kind`.
    pub fn delay_next(&self, kind: CallKind, delay: Duration) {
        self.push_step(kind, Step::Delay(delay));
    }

    /// Makes the next call of `kind` never complete.
    pub fn hang_next(&self, kind: CallKind) {
        self.push_step(kind, Step::Hang);
    }

    /// Queues one step.
    fn push_step(&self, kind: CallKind, step: Step) {
        lock(&self.script).queued.entry(kind).or_default().push_back(step);
    }

    /// Returns every call in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<CallKind> {
        lock(&self.calls).clone()
    }

    /// Returns the total number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns the number of calls of one kind.
    #[must_use]
    pub fn calls_of(&self, kind: CallKind) -> usize {
        lock(&self.calls).iter().filter(|call| **call == kind).count()
    }

    /// Returns the number of calls currently executing.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the cluster state.
    #[must_use]
    pub fn state(&self) -> ClusterState {
        lock(&self.state).clone()
    }

    /// Records a call and applies scripted behavior.
    async fn enter(&self, kind: CallKind) -> Result<InFlightGuard, ClusterError> {
        lock(&self.calls).push(kind);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard {
            counter: Arc::clone(&self.in_flight),
        };
        let step = {
            let mut script = lock(&self.script);
            match script.queued.get_mut(&kind).and_then(VecDeque::pop_front) {
                Some(step) => Some(step),
                None => script.always.get(&kind).cloned().map(Step::Fail),
            }
        };
        match step {
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(guard)
            }
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                Ok(guard)
            }
            None => Ok(guard),
        }
    }
}

/// Returns true when every `key=value` or `key!=value` term matches.
fn selector_matches(selector: &str, labels: &BTreeMap<String, String>) -> bool {
    selector.split(',').map(str::trim).filter(|term| !term.is_empty()).all(|term| {
        if let Some((key, value)) = term.split_once("!=") {
            labels.get(key.trim()).map(String::as_str) != Some(value.trim())
        } else if let Some((key, value)) = term.split_once('=') {
            let value = value.trim_start_matches('=').trim();
            labels.get(key.trim()).map(String::as_str) == Some(value)
        } else {
            labels.contains_key(term)
        }
    })
}

/// Not-found error in the API server's wording.
fn missing(resource: &str, name: &str) -> ClusterError {
    ClusterError::not_found(format!("{resource} \"{name}\" not found"))
}

#[async_trait]
impl ClusterAdapter for ScriptedAdapter {
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<PodSummary>, ClusterError> {
        let _guard = self.enter(CallKind::ListPods).await?;
        Ok(lock(&self.state)
            .pods
            .iter()
            .map(|pod| &pod.summary)
            .filter(|pod| namespace.is_none_or(|ns| pod.namespace == ns))
            .filter(|pod| label_selector.is_none_or(|sel| selector_matches(sel, &pod.labels)))
            .cloned()
            .collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodDetail, ClusterError> {
        let _guard = self.enter(CallKind::GetPod).await?;
        lock(&self.state)
            .pods
            .iter()
            .find(|pod| pod.summary.namespace == namespace && pod.summary.name == name)
            .cloned()
            .ok_or_else(|| missing("pods", name))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        options: &LogOptions,
    ) -> Result<String, ClusterError> {
        let _guard = self.enter(CallKind::PodLogs).await?;
        let state = lock(&self.state);
        let text = state
            .logs
            .get(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| missing("pods", name))?;
        let lines: Vec<&str> = text.lines().collect();
        let keep = options
            .tail_lines
            .and_then(|tail| usize::try_from(tail).ok())
            .unwrap_or(lines.len())
            .min(lines.len());
        Ok(lines.iter().skip(lines.len() - keep).copied().collect::<Vec<_>>().join("\n"))
    }

    async fn list_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<DeploymentSummary>, ClusterError> {
        let _guard = self.enter(CallKind::ListDeployments).await?;
        Ok(lock(&self.state)
            .deployments
            .iter()
            .filter(|deployment| deployment.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<DeploymentSummary, ClusterError> {
        let _guard = self.enter(CallKind::ScaleDeployment).await?;
        let mut state = lock(&self.state);
        let deployment = state
            .deployments
            .iter_mut()
            .find(|deployment| deployment.namespace == namespace && deployment.name == name)
            .ok_or_else(|| missing("deployments.apps", name))?;
        deployment.replicas = replicas;
        Ok(deployment.clone())
    }

    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RestartOutcome, ClusterError> {
        let _guard = self.enter(CallKind::RestartDeployment).await?;
        let mut state = lock(&self.state);
        if !state.deployments.iter().any(|d| d.namespace == namespace && d.name == name) {
            return Err(missing("deployments.apps", name));
        }
        state.restarted.push((namespace.to_string(), name.to_string()));
        let restarted_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|err| ClusterError::new(ClusterErrorKind::Other, err.to_string()))?;
        Ok(RestartOutcome {
            name: name.to_string(),
            namespace: namespace.to_string(),
            restarted_at,
        })
    }

    async fn apply_document(
        &self,
        default_namespace: &str,
        document: &Value,
    ) -> Result<AppliedResource, ClusterError> {
        let _guard = self.enter(CallKind::ApplyDocument).await?;
        let field = |pointer: &str| {
            document.pointer(pointer).and_then(Value::as_str).unwrap_or_default().to_string()
        };
        let kind = field("/kind");
        let namespace = match kind.as_str() {
            "Namespace" | "Node" | "ClusterRole" | "ClusterRoleBinding" => None,
            _ => Some(
                document
                    .pointer("/metadata/namespace")
                    .and_then(Value::as_str)
                    .unwrap_or(default_namespace)
                    .to_string(),
            ),
        };
        let mut stored = document.clone();
        if let (Some(namespace), Some(metadata)) =
            (&namespace, stored.get_mut("metadata").and_then(Value::as_object_mut))
        {
            metadata.insert("namespace".to_string(), Value::String(namespace.clone()));
        }
        let applied = AppliedResource {
            api_version: field("/apiVersion"),
            kind,
            name: field("/metadata/name"),
            namespace,
        };
        let mut state = lock(&self.state);
        if applied.kind == "Namespace" && !state.namespaces.iter().any(|ns| ns.name == applied.name)
        {
            state.namespaces.push(fixtures::namespace(&applied.name));
        }
        state.applied.push(stored);
        Ok(applied)
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Value, ClusterError> {
        let _guard = self.enter(CallKind::GetResource).await?;
        lock(&self.state)
            .resources
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| missing(&kind.as_str().to_ascii_lowercase(), name))
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>, ClusterError> {
        let _guard = self.enter(CallKind::ListEvents).await?;
        Ok(lock(&self.state)
            .events
            .iter()
            .filter(|event| query.namespace.as_ref().is_none_or(|ns| &event.namespace == ns))
            .filter(|event| query.involved_kind.as_ref().is_none_or(|k| &event.involved_kind == k))
            .filter(|event| query.involved_name.as_ref().is_none_or(|n| &event.involved_name == n))
            .cloned()
            .collect())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceSummary>, ClusterError> {
        let _guard = self.enter(CallKind::ListServices).await?;
        Ok(lock(&self.state)
            .services
            .iter()
            .map(|service| &service.summary)
            .filter(|service| service.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceDetail, ClusterError> {
        let _guard = self.enter(CallKind::GetService).await?;
        lock(&self.state)
            .services
            .iter()
            .find(|svc| svc.summary.namespace == namespace && svc.summary.name == name)
            .cloned()
            .ok_or_else(|| missing("services", name))
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, ClusterError> {
        let _guard = self.enter(CallKind::ListNamespaces).await?;
        Ok(lock(&self.state).namespaces.clone())
    }

    async fn create_namespace(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<NamespaceSummary, ClusterError> {
        let _guard = self.enter(CallKind::CreateNamespace).await?;
        let mut state = lock(&self.state);
        if state.namespaces.iter().any(|namespace| namespace.name == name) {
            return Err(ClusterError::conflict(format!("namespaces \"{name}\" already exists")));
        }
        let mut namespace = fixtures::namespace(name);
        namespace.labels.clone_from(labels);
        state.namespaces.push(namespace.clone());
        Ok(namespace)
    }

    async fn delete_namespace(&self, name: &str) -> Result<NamespaceDeletion, ClusterError> {
        let _guard = self.enter(CallKind::DeleteNamespace).await?;
        let mut state = lock(&self.state);
        let position = state
            .namespaces
            .iter()
            .position(|namespace| namespace.name == name)
            .ok_or_else(|| missing("namespaces", name))?;
        state.namespaces.remove(position);
        Ok(NamespaceDeletion {
            name: name.to_string(),
            phase: "Terminating".to_string(),
        })
    }

    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ClusterError> {
        let _guard = self.enter(CallKind::ListNodes).await?;
        Ok(lock(&self.state).nodes.iter().map(|node| node.summary.clone()).collect())
    }

    async fn get_node(&self, name: &str) -> Result<NodeDetail, ClusterError> {
        let _guard = self.enter(CallKind::GetNode).await?;
        lock(&self.state)
            .nodes
            .iter()
            .find(|node| node.summary.name == name)
            .cloned()
            .ok_or_else(|| missing("nodes", name))
    }

    async fn server_version(&self) -> Result<VersionInfo, ClusterError> {
        let _guard = self.enter(CallKind::ServerVersion).await?;
        Ok(lock(&self.state).version.clone())
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builders for cluster objects used in tests.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::resources::DeploymentSummary;
    use crate::resources::EventSummary;
    use crate::resources::NODE_ROLE_LABEL_PREFIX;
    use crate::resources::NamespaceSummary;
    use crate::resources::NodeDetail;
    use crate::resources::NodeSummary;
    use crate::resources::PodDetail;
    use crate::resources::PodSummary;
    use crate::resources::ServiceDetail;
    use crate::resources::ServicePortSummary;
    use crate::resources::ServiceSummary;
    use crate::resources::VersionInfo;

    /// Active namespace.
    #[must_use]
    pub fn namespace(name: &str) -> NamespaceSummary {
        NamespaceSummary {
            name: name.to_string(),
            phase: Some("Active".to_string()),
            labels: BTreeMap::new(),
            created_at: Some("2026-01-01T00:00:00Z".to_string()),
        }
    }

    /// Running single-container pod, optionally scheduled on a node.
    #[must_use]
    pub fn pod(namespace: &str, name: &str, node: Option<&str>) -> PodDetail {
        let labels = BTreeMap::from([("app".to_string(), name.to_string())]);
        PodDetail {
            summary: PodSummary {
                name: name.to_string(),
                namespace: namespace.to_string(),
                phase: if node.is_some() { "Running" } else { "Pending" }.to_string(),
                node: node.map(str::to_string),
                pod_ip: node.map(|_| "10.0.0.10".to_string()),
                ready_containers: u32::from(node.is_some()),
                total_containers: 1,
                restarts: 0,
                labels,
                created_at: Some("2026-01-01T00:00:00Z".to_string()),
            },
            host_ip: None,
            start_time: None,
            service_account: Some("default".to_string()),
            annotations: BTreeMap::new(),
            containers: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Deployment with all replicas ready.
    #[must_use]
    pub fn deployment(namespace: &str, name: &str, replicas: i32) -> DeploymentSummary {
        DeploymentSummary {
            name: name.to_string(),
            namespace: namespace.to_string(),
            replicas,
            ready_replicas: replicas,
            updated_replicas: replicas,
            available_replicas: replicas,
            images: vec![format!("registry.local/{name}:1.0")],
            selector: BTreeMap::from([("app".to_string(), name.to_string())]),
            created_at: Some("2026-01-01T00:00:00Z".to_string()),
        }
    }

    /// `ClusterIP` service exposing port 80.
    #[must_use]
    pub fn service(namespace: &str, name: &str) -> ServiceDetail {
        ServiceDetail {
            summary: ServiceSummary {
                name: name.to_string(),
                namespace: namespace.to_string(),
                service_type: "ClusterIP".to_string(),
                cluster_ip: Some("10.96.0.20".to_string()),
                external_ips: Vec::new(),
                ports: vec![ServicePortSummary {
                    name: Some("http".to_string()),
                    port: 80,
                    target_port: Some("8080".to_string()),
                    protocol: "TCP".to_string(),
                    node_port: None,
                }],
                selector: BTreeMap::from([("app".to_string(), name.to_string())]),
                created_at: Some("2026-01-01T00:00:00Z".to_string()),
            },
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            session_affinity: Some("None".to_string()),
            load_balancer_ingress: Vec::new(),
        }
    }

    /// Node with the given roles and readiness.
    #[must_use]
    pub fn node(name: &str, roles: &[&str], ready: bool) -> NodeDetail {
        let labels: BTreeMap<String, String> = roles
            .iter()
            .map(|role| (format!("{NODE_ROLE_LABEL_PREFIX}{role}"), String::new()))
            .chain([("kubernetes.io/hostname".to_string(), name.to_string())])
            .collect();
        NodeDetail {
            summary: NodeSummary {
                name: name.to_string(),
                ready,
                roles: roles.iter().map(|role| (*role).to_string()).collect(),
                unschedulable: false,
                kubelet_version: Some("v1.32.1".to_string()),
                os_image: Some("Ubuntu 24.04 LTS".to_string()),
                container_runtime: Some("containerd://1.7.24".to_string()),
                internal_ip: Some("192.168.1.10".to_string()),
                cpu_allocatable: Some("4".to_string()),
                memory_allocatable: Some("16Gi".to_string()),
                created_at: Some("2026-01-01T00:00:00Z".to_string()),
            },
            labels,
            taints: Vec::new(),
            conditions: Vec::new(),
            capacity: BTreeMap::new(),
            allocatable: BTreeMap::new(),
            kernel_version: None,
            architecture: Some("amd64".to_string()),
            pod_cidr: None,
        }
    }

    /// Event about an object.
    #[must_use]
    pub fn event(
        namespace: &str,
        kind: &str,
        name: &str,
        reason: &str,
        last_seen: &str,
    ) -> EventSummary {
        EventSummary {
            namespace: namespace.to_string(),
            involved_kind: kind.to_string(),
            involved_name: name.to_string(),
            event_type: Some("Normal".to_string()),
            reason: Some(reason.to_string()),
            message: Some(format!("{reason} {kind}/{name}")),
            count: 1,
            last_seen: Some(last_seen.to_string()),
        }
    }

    /// Server version.
    #[must_use]
    pub fn version(git_version: &str) -> VersionInfo {
        let trimmed = git_version.trim_start_matches('v');
        let mut parts = trimmed.split('.');
        VersionInfo {
            git_version: git_version.to_string(),
            major: parts.next().unwrap_or_default().to_string(),
            minor: parts.next().unwrap_or_default().to_string(),
            platform: "linux/amd64".to_string(),
        }
    }
}
