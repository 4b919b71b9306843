// crates/kube-gate-cluster/src/adapter.rs
// ============================================================================
// Module: Kube Cluster Adapter
// Description: ClusterAdapter implementation backed by the kube client.
// Purpose: Execute primitive cluster calls and classify their failures.
// Dependencies: kube, k8s-openapi, kube-gate-core, time
// ============================================================================

//! ## Overview
//! [`KubeAdapter`] maps each primitive call onto one API request (manifest
//! application adds a discovery lookup). Responses are converted to core
//! summaries in [`crate::convert`]; failures are classified in
//! [`crate::errors`]. The adapter never retries.
//!
//! ## Invariants
//! - Every method issues at most one mutating request.
//! - Dropping a returned future drops the in-flight HTTP request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::core::v1::Event;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::Node;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube::Client;
use kube::api::DeleteParams;
use kube::api::DynamicObject;
use kube::api::ListParams;
use kube::api::LogParams;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::api::PostParams;
use kube::core::GroupVersionKind;
use kube::discovery;
use kube::discovery::Scope;
use kube_gate_core::ClusterAdapter;
use kube_gate_core::ClusterError;
use kube_gate_core::ClusterErrorKind;
use kube_gate_core::EventQuery;
use kube_gate_core::LogOptions;
use kube_gate_core::resources::AppliedResource;
use kube_gate_core::resources::DeploymentSummary;
use kube_gate_core::resources::EventSummary;
use kube_gate_core::resources::NamespaceDeletion;
use kube_gate_core::resources::NamespaceSummary;
use kube_gate_core::resources::NodeDetail;
use kube_gate_core::resources::NodeSummary;
use kube_gate_core::resources::PodDetail;
use kube_gate_core::resources::PodSummary;
use kube_gate_core::resources::ResourceKind;
use kube_gate_core::resources::RestartOutcome;
use kube_gate_core::resources::ServiceDetail;
use kube_gate_core::resources::ServiceSummary;
use kube_gate_core::resources::VersionInfo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::convert;
use crate::errors::classify;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Field manager recorded for server-side apply.
pub const FIELD_MANAGER: &str = "kube-gate";
/// Pod template annotation bumped by a rollout restart.
pub const RESTART_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
/// Phase reported for a namespace after a delete request.
const TERMINATING_PHASE: &str = "Terminating";

// ============================================================================
// SECTION: Adapter
// ============================================================================

/// Cluster adapter backed by a shared kube client.
#[derive(Clone)]
pub struct KubeAdapter {
    /// Pooled client.
    client: Client,
}

impl KubeAdapter {
    /// Wraps a client.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self {
            client,
        }
    }

    /// Returns a namespaced typed API, or the cluster-wide one.
    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    /// Reads a namespaced object and returns its JSON form.
    async fn get_json<K>(&self, namespace: &str, name: &str) -> Result<Value, ClusterError>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let object = api.get(name).await.map_err(|err| classify(&err))?;
        serde_json::to_value(&object).map_err(|err| {
            ClusterError::new(ClusterErrorKind::Other, format!("failed to encode resource: {err}"))
        })
    }
}

// ============================================================================
// SECTION: ClusterAdapter
// ============================================================================

#[async_trait]
impl ClusterAdapter for KubeAdapter {
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<PodSummary>, ClusterError> {
        let api: Api<Pod> = self.scoped(namespace);
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let pods = api.list(&params).await.map_err(|err| classify(&err))?;
        let fallback = namespace.unwrap_or_default();
        Ok(pods.items.iter().map(|pod| convert::pod_summary(pod, fallback)).collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<PodDetail, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod = api.get(name).await.map_err(|err| classify(&err))?;
        Ok(convert::pod_detail(&pod, namespace))
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        options: &LogOptions,
    ) -> Result<String, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: options.container.clone(),
            tail_lines: options.tail_lines,
            previous: options.previous,
            ..LogParams::default()
        };
        api.logs(name, &params).await.map_err(|err| classify(&err))
    }

    async fn list_deployments(
        &self,
        namespace: &str,
    ) -> Result<Vec<DeploymentSummary>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let deployments = api.list(&ListParams::default()).await.map_err(|err| classify(&err))?;
        Ok(deployments
            .items
            .iter()
            .map(|deployment| convert::deployment_summary(deployment, namespace))
            .collect())
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<DeploymentSummary, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "spec": { "replicas": replicas } });
        let deployment = api
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|err| classify(&err))?;
        Ok(convert::deployment_summary(&deployment, namespace))
    }

    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RestartOutcome, ClusterError> {
        let restarted_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|err| {
            ClusterError::new(ClusterErrorKind::Other, format!("failed to format time: {err}"))
        })?;
        let mut annotations = Map::new();
        annotations.insert(RESTART_ANNOTATION.to_string(), Value::String(restarted_at.clone()));
        let patch = json!({
            "spec": { "template": { "metadata": { "annotations": annotations } } }
        });
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &PatchParams::default(), &Patch::Strategic(&patch))
            .await
            .map_err(|err| classify(&err))?;
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
        let mut object: DynamicObject = serde_json::from_value(document.clone()).map_err(|err| {
            ClusterError::new(ClusterErrorKind::Other, format!("invalid manifest document: {err}"))
        })?;
        let (api_version, kind) = object
            .types
            .as_ref()
            .map(|types| (types.api_version.clone(), types.kind.clone()))
            .ok_or_else(|| {
                ClusterError::new(ClusterErrorKind::Other, "manifest document missing type")
            })?;
        let name = object.metadata.name.clone().unwrap_or_default();
        let gvk = group_version_kind(&api_version, &kind);
        let (resource, capabilities) =
            discovery::pinned_kind(&self.client, &gvk).await.map_err(|err| classify(&err))?;
        let (api, namespace) = if matches!(capabilities.scope, Scope::Namespaced) {
            let namespace =
                object.metadata.namespace.clone().unwrap_or_else(|| default_namespace.to_string());
            object.metadata.namespace = Some(namespace.clone());
            let api: Api<DynamicObject> =
                Api::namespaced_with(self.client.clone(), &namespace, &resource);
            (api, Some(namespace))
        } else {
            object.metadata.namespace = None;
            let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
            (api, None)
        };
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let applied =
            api.patch(&name, &params, &Patch::Apply(&object)).await.map_err(|err| classify(&err))?;
        Ok(AppliedResource {
            api_version,
            kind,
            name: applied.metadata.name.unwrap_or(name),
            namespace,
        })
    }

    async fn get_resource(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Value, ClusterError> {
        match kind {
            ResourceKind::Pod => self.get_json::<Pod>(namespace, name).await,
            ResourceKind::Deployment => self.get_json::<Deployment>(namespace, name).await,
            ResourceKind::Service => self.get_json::<Service>(namespace, name).await,
            ResourceKind::ConfigMap => self.get_json::<ConfigMap>(namespace, name).await,
            ResourceKind::Secret => self.get_json::<Secret>(namespace, name).await,
        }
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<EventSummary>, ClusterError> {
        let api: Api<Event> = self.scoped(query.namespace.as_deref());
        let mut params = ListParams::default();
        if let Some(selector) = event_field_selector(query) {
            params = params.fields(&selector);
        }
        let events = api.list(&params).await.map_err(|err| classify(&err))?;
        Ok(events.items.iter().map(convert::event_summary).collect())
    }

    async fn list_services(&self, namespace: &str) -> Result<Vec<ServiceSummary>, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let services = api.list(&ListParams::default()).await.map_err(|err| classify(&err))?;
        Ok(services
            .items
            .iter()
            .map(|service| convert::service_summary(service, namespace))
            .collect())
    }

    async fn get_service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ServiceDetail, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = api.get(name).await.map_err(|err| classify(&err))?;
        Ok(convert::service_detail(&service, namespace))
    }

    async fn list_namespaces(&self) -> Result<Vec<NamespaceSummary>, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api.list(&ListParams::default()).await.map_err(|err| classify(&err))?;
        Ok(namespaces.items.iter().map(convert::namespace_summary).collect())
    }

    async fn create_namespace(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<NamespaceSummary, ClusterError> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: (!labels.is_empty()).then(|| labels.clone()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        let api: Api<Namespace> = Api::all(self.client.clone());
        let created = api
            .create(&PostParams::default(), &namespace)
            .await
            .map_err(|err| classify(&err))?;
        Ok(convert::namespace_summary(&created))
    }

    async fn delete_namespace(&self, name: &str) -> Result<NamespaceDeletion, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let deleted =
            api.delete(name, &DeleteParams::default()).await.map_err(|err| classify(&err))?;
        let phase = deleted
            .left()
            .and_then(|namespace| namespace.status.and_then(|status| status.phase))
            .unwrap_or_else(|| TERMINATING_PHASE.to_string());
        Ok(NamespaceDeletion {
            name: name.to_string(),
            phase,
        })
    }

    async fn list_nodes(&self) -> Result<Vec<NodeSummary>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api.list(&ListParams::default()).await.map_err(|err| classify(&err))?;
        Ok(nodes.items.iter().map(convert::node_summary).collect())
    }

    async fn get_node(&self, name: &str) -> Result<NodeDetail, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        let node = api.get(name).await.map_err(|err| classify(&err))?;
        Ok(convert::node_detail(&node))
    }

    async fn server_version(&self) -> Result<VersionInfo, ClusterError> {
        let info = self.client.apiserver_version().await.map_err(|err| classify(&err))?;
        Ok(convert::version_info(&info))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Splits an `apiVersion` into group and version.
#[must_use]
pub fn group_version_kind(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

/// Builds the `involvedObject` field selector for an event query.
#[must_use]
pub fn event_field_selector(query: &EventQuery) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(kind) = &query.involved_kind {
        clauses.push(format!("involvedObject.kind={kind}"));
    }
    if let Some(name) = &query.involved_name {
        clauses.push(format!("involvedObject.name={name}"));
    }
    (!clauses.is_empty()).then(|| clauses.join(","))
}
