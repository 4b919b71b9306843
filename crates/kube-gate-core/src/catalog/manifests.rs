// crates/kube-gate-core/src/catalog/manifests.rs
// ============================================================================
// Module: Manifest Operations
// Description: Catalog entries for applying and exporting YAML manifests.
// Purpose: Declare manifest operations as immutable descriptors.
// Dependencies: serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! `apply_yaml` server-side applies each document of a manifest in order, one
//! adapter call per document; a failure after some documents were applied is
//! reported as a partial result listing them. `get_yaml` exports one object as
//! YAML with server bookkeeping removed and Secret values redacted.
//!
//! Security posture: exported Secrets never include `data`, `stringData`, or
//! the last-applied annotation that may embed them.

use serde_json::Value;
use serde_json::json;

use super::Effect;
use super::NAMESPACE_ARG;
use super::Operation;
use super::unexpected_output;
use crate::adapter::AdapterCall;
use crate::adapter::CallOutput;
use crate::model::Failure;
use crate::model::FailureKind;
use crate::resources::ResourceKind;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::validator::ValidatedArgs;

/// Maximum manifest size accepted by `apply_yaml`.
pub const MAX_MANIFEST_BYTES: usize = 1024 * 1024;
/// Placeholder written over redacted values.
pub const REDACTED: &str = "<redacted>";
/// Annotation written by client-side apply.
const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";
/// Kind names accepted by `get_yaml`.
const YAML_KINDS: &[&str] = &["Pod", "Deployment", "Service", "ConfigMap", "Secret"];

// ============================================================================
// SECTION: apply_yaml
// ============================================================================

/// Server-side applies a multi-document manifest.
pub(crate) const APPLY_YAML: Operation = Operation {
    name: "apply_yaml",
    description: "Server-side apply one or more YAML documents. Namespaced documents without \
                  metadata.namespace use the namespace argument.",
    effect: Effect::Mutate,
    destructive: false,
    arguments: &[
        ArgumentSpec::required(
            "manifest",
            ArgType::YamlDocuments {
                max_bytes: MAX_MANIFEST_BYTES,
            },
            "YAML manifest; separate documents with ---.",
        ),
        NAMESPACE_ARG,
    ],
    constraints: &[],
    plan: plan_apply_yaml,
    shape: shape_apply_yaml,
};

/// Plans `apply_yaml`.
fn plan_apply_yaml(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    let namespace = args.str("namespace")?;
    Ok(args
        .documents("manifest")?
        .iter()
        .map(|document| AdapterCall::ApplyDocument {
            default_namespace: namespace.to_string(),
            document: document.clone(),
        })
        .collect())
}

/// Shapes `apply_yaml`.
fn shape_apply_yaml(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    let mut applied = Vec::with_capacity(outputs.len());
    for output in outputs {
        match output {
            CallOutput::Applied(resource) => applied.push(resource),
            other => return Err(unexpected_output("apply_yaml", Some(&other))),
        }
    }
    Ok(json!({ "applied": applied }))
}

// ============================================================================
// SECTION: get_yaml
// ============================================================================

/// Exports one object as YAML.
pub(crate) const GET_YAML: Operation = Operation {
    name: "get_yaml",
    description: "Export a Pod, Deployment, Service, ConfigMap, or Secret as YAML. Secret values \
                  are redacted.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[
        ArgumentSpec::required("kind", ArgType::Enum(YAML_KINDS), "Resource kind."),
        ArgumentSpec::required("name", ArgType::DnsSubdomain, "Resource name."),
        NAMESPACE_ARG,
    ],
    constraints: &[],
    plan: plan_get_yaml,
    shape: shape_get_yaml,
};

/// Plans `get_yaml`.
fn plan_get_yaml(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    let kind = ResourceKind::parse(args.str("kind")?)
        .ok_or_else(|| Failure::invalid_argument("kind", "unsupported kind"))?;
    Ok(vec![AdapterCall::GetResource {
        kind,
        namespace: args.str("namespace")?.to_string(),
        name: args.str("name")?.to_string(),
    }])
}

/// Shapes `get_yaml`.
fn shape_get_yaml(args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    let Some(CallOutput::Resource(mut resource)) = outputs.into_iter().next() else {
        return Err(unexpected_output("get_yaml", None));
    };
    let kind = args.str("kind")?;
    sanitize_resource(&mut resource, kind == ResourceKind::Secret.as_str());
    let yaml = serde_yaml::to_string(&resource).map_err(|err| {
        Failure::new(FailureKind::ClusterError, format!("yaml rendering failed: {err}"))
    })?;
    Ok(json!({
        "kind": kind,
        "name": args.str("name")?,
        "namespace": args.str("namespace")?,
        "yaml": yaml,
    }))
}

/// Removes server bookkeeping and, for Secrets, every stored value.
pub(crate) fn sanitize_resource(resource: &mut Value, is_secret: bool) {
    if let Some(metadata) = resource.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.remove("managedFields");
        if is_secret
            && let Some(annotations) =
                metadata.get_mut("annotations").and_then(Value::as_object_mut)
        {
            annotations.remove(LAST_APPLIED_ANNOTATION);
        }
    }
    if !is_secret {
        return;
    }
    for field in ["data", "stringData"] {
        if let Some(values) = resource.get_mut(field).and_then(Value::as_object_mut) {
            for value in values.values_mut() {
                *value = Value::String(REDACTED.to_string());
            }
        }
    }
}
