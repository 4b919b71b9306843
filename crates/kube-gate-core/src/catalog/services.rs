// crates/kube-gate-core/src/catalog/services.rs
// ============================================================================
// Module: Service Operations
// Description: Catalog entries for listing and describing services.
// Purpose: Declare service operations as immutable descriptors.
// Dependencies: serde_json
// ============================================================================

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
use crate::model::Failure;
use crate::resources::sort_newest_first;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::validator::ValidatedArgs;

/// Lists services in a namespace.
pub(crate) const LIST_SERVICES: Operation = Operation {
    name: "list_services",
    description: "List services with type, cluster IP, ports, and selector.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[NAMESPACE_ARG],
    constraints: &[],
    plan: plan_list_services,
    shape: shape_list_services,
};

/// Plans `list_services`.
fn plan_list_services(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ListServices {
        namespace: args.str("namespace")?.to_string(),
    }])
}

/// Shapes `list_services`.
fn shape_list_services(_args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    match outputs.into_iter().next() {
        Some(CallOutput::Services(services)) => to_payload(&services),
        other => Err(unexpected_output("list_services", other.as_ref())),
    }
}

/// Reads a service and the events that reference it.
pub(crate) const DESCRIBE_SERVICE: Operation = Operation {
    name: "describe_service",
    description: "Describe a service: ports, selector, load balancer ingress, and recent events.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[
        ArgumentSpec::required("name", ArgType::DnsSubdomain, "Service name."),
        NAMESPACE_ARG,
    ],
    constraints: &[],
    plan: plan_describe_service,
    shape: shape_describe_service,
};

/// Plans `describe_service`.
fn plan_describe_service(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    let namespace = args.str("namespace")?;
    let name = args.str("name")?;
    Ok(vec![
        AdapterCall::GetService {
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        AdapterCall::ListEvents(EventQuery::about(Some(namespace), "Service", name)),
    ])
}

/// Shapes `describe_service`.
fn shape_describe_service(
    _args: &ValidatedArgs,
    outputs: Vec<CallOutput>,
) -> Result<Value, Failure> {
    let mut outputs = outputs.into_iter();
    match (outputs.next(), outputs.next()) {
        (Some(CallOutput::Service(service)), Some(CallOutput::Events(mut events))) => {
            sort_newest_first(&mut events);
            Ok(json!({ "service": to_payload(&service)?, "events": to_payload(&events)? }))
        }
        (first, _) => Err(unexpected_output("describe_service", first.as_ref())),
    }
}
