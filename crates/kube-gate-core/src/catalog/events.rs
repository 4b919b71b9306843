// crates/kube-gate-core/src/catalog/events.rs
// ============================================================================
// Module: Event Operations
// Description: Catalog entry for listing recent cluster events.
// Purpose: Declare the event listing as an immutable descriptor.
// Dependencies: serde_json
// ============================================================================

use serde_json::Value;

use super::Effect;
use super::NAMESPACE_FILTER_ARG;
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
use crate::schema::DefaultValue;
use crate::validator::ValidatedArgs;

/// Default number of events returned.
pub const DEFAULT_EVENT_LIMIT: i64 = 50;
/// Maximum number of events returned.
pub const MAX_EVENT_LIMIT: i64 = 1_000;

/// Lists recent events, newest first.
pub(crate) const LIST_EVENTS: Operation = Operation {
    name: "list_events",
    description: "List recent events, newest first.",
    effect: Effect::Read,
    destructive: false,
    arguments: &[
        NAMESPACE_FILTER_ARG,
        ArgumentSpec::defaulted(
            "limit",
            ArgType::Integer {
                min: 1,
                max: MAX_EVENT_LIMIT,
            },
            DefaultValue::Int(DEFAULT_EVENT_LIMIT),
            "Maximum number of events to return.",
        ),
    ],
    constraints: &[],
    plan: plan_list_events,
    shape: shape_list_events,
};

/// Plans `list_events`.
fn plan_list_events(args: &ValidatedArgs) -> Result<Vec<AdapterCall>, Failure> {
    Ok(vec![AdapterCall::ListEvents(EventQuery {
        namespace: args.opt_str("namespace").map(str::to_string),
        involved_kind: None,
        involved_name: None,
    })])
}

/// Shapes `list_events`.
fn shape_list_events(args: &ValidatedArgs, outputs: Vec<CallOutput>) -> Result<Value, Failure> {
    let Some(CallOutput::Events(mut events)) = outputs.into_iter().next() else {
        return Err(unexpected_output("list_events", None));
    };
    sort_newest_first(&mut events);
    let limit = usize::try_from(args.int("limit")?).unwrap_or(usize::MAX);
    events.truncate(limit);
    to_payload(&events)
}
