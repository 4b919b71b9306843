// crates/kube-gate-core/src/schema.rs
// ============================================================================
// Module: Argument Schema
// Description: Declarative argument types and JSON Schema rendering.
// Purpose: Single source for validation rules and tool input schemas.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Each operation declares an ordered list of [`ArgumentSpec`] entries. The
//! validator enforces them and [`input_schema`] renders the same rules as a
//! JSON Schema (draft 2020-12) for `tools/list`, so the advertised contract and
//! the enforced contract cannot drift apart.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::catalog::Effect;
use crate::catalog::Operation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of an RFC 1123 label.
pub const MAX_DNS_LABEL_LENGTH: usize = 63;
/// Maximum length of an RFC 1123 subdomain.
pub const MAX_DNS_SUBDOMAIN_LENGTH: usize = 253;
/// Maximum length of a label selector expression.
pub const MAX_SELECTOR_LENGTH: usize = 512;
/// Maximum number of entries in a label map.
pub const MAX_LABEL_ENTRIES: usize = 64;
/// JSON Schema dialect used for tool input schemas.
pub const SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

// ============================================================================
// SECTION: Argument Types
// ============================================================================

/// Declared type of an operation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Free-form string with a length cap.
    String {
        /// Maximum length in bytes.
        max_len: usize,
    },
    /// JSON integer within inclusive bounds.
    Integer {
        /// Minimum value.
        min: i64,
        /// Maximum value.
        max: i64,
    },
    /// JSON boolean.
    Boolean,
    /// One of a fixed set of strings.
    Enum(&'static [&'static str]),
    /// RFC 1123 label (namespace or container name).
    DnsLabel,
    /// RFC 1123 subdomain (resource or node name).
    DnsSubdomain,
    /// Kubernetes label selector expression.
    LabelSelector,
    /// Object of Kubernetes label keys to values.
    LabelMap,
    /// String holding one or more YAML manifest documents.
    YamlDocuments {
        /// Maximum manifest size in bytes.
        max_bytes: usize,
    },
}

/// Const-friendly default value for an optional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    /// String default.
    Str(&'static str),
    /// Integer default.
    Int(i64),
    /// Boolean default.
    Bool(bool),
}

impl DefaultValue {
    /// Converts the default into a JSON value.
    #[must_use]
    pub fn to_value(self) -> Value {
        match self {
            Self::Str(value) => Value::String(value.to_string()),
            Self::Int(value) => Value::from(value),
            Self::Bool(value) => Value::Bool(value),
        }
    }
}

/// One entry in an operation's ordered argument schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentSpec {
    /// Argument name.
    pub name: &'static str,
    /// Declared type.
    pub arg_type: ArgType,
    /// Whether the caller must supply the argument.
    pub required: bool,
    /// Default applied when an optional argument is absent.
    pub default: Option<DefaultValue>,
    /// Human-readable description for tool listings.
    pub description: &'static str,
}

impl ArgumentSpec {
    /// Declares a required argument.
    #[must_use]
    pub const fn required(
        name: &'static str,
        arg_type: ArgType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            arg_type,
            required: true,
            default: None,
            description,
        }
    }

    /// Declares an optional argument without a default.
    #[must_use]
    pub const fn optional(
        name: &'static str,
        arg_type: ArgType,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            arg_type,
            required: false,
            default: None,
            description,
        }
    }

    /// Declares an optional argument with a default.
    #[must_use]
    pub const fn defaulted(
        name: &'static str,
        arg_type: ArgType,
        default: DefaultValue,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            arg_type,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Cross-argument rule checked after per-argument validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// The named argument must not be a protected namespace.
    NotProtectedNamespace(&'static str),
    /// The first argument must not be supplied while the boolean second is true.
    NotWithFlag(&'static str, &'static str),
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Behavior hints advertised with each tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// Tool never changes cluster state.
    pub read_only_hint: bool,
    /// Tool may remove cluster state.
    pub destructive_hint: bool,
    /// Repeating the call has no additional effect.
    pub idempotent_hint: bool,
}

/// Tool definition advertised through `tools/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Operation name.
    pub name: String,
    /// Operation description.
    pub description: String,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
    /// Behavior hints.
    pub annotations: ToolAnnotations,
}

impl ToolDefinition {
    /// Builds the definition for one operation.
    #[must_use]
    pub fn for_operation(operation: &Operation) -> Self {
        let read_only = operation.effect == Effect::Read;
        Self {
            name: operation.name.to_string(),
            description: operation.description.to_string(),
            input_schema: input_schema(operation),
            annotations: ToolAnnotations {
                read_only_hint: read_only,
                destructive_hint: operation.destructive,
                idempotent_hint: read_only,
            },
        }
    }
}

// ============================================================================
// SECTION: Schema Rendering
// ============================================================================

/// Renders an operation's argument list as a JSON Schema object.
#[must_use]
pub fn input_schema(operation: &Operation) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for spec in operation.arguments {
        properties.insert(spec.name.to_string(), argument_schema(spec));
        if spec.required {
            required.push(Value::String(spec.name.to_string()));
        }
    }
    json!({
        "$schema": SCHEMA_DIALECT,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Renders the schema for one argument.
fn argument_schema(spec: &ArgumentSpec) -> Value {
    let mut schema = match spec.arg_type {
        ArgType::String {
            max_len,
        } => json!({ "type": "string", "maxLength": max_len }),
        ArgType::Integer {
            min,
            max,
        } => json!({ "type": "integer", "minimum": min, "maximum": max }),
        ArgType::Boolean => json!({ "type": "boolean" }),
        ArgType::Enum(values) => json!({ "type": "string", "enum": values }),
        ArgType::DnsLabel => json!({
            "type": "string",
            "minLength": 1,
            "maxLength": MAX_DNS_LABEL_LENGTH,
            "pattern": "^[a-z0-9]([-a-z0-9]*[a-z0-9])?$",
        }),
        ArgType::DnsSubdomain => json!({
            "type": "string",
            "minLength": 1,
            "maxLength": MAX_DNS_SUBDOMAIN_LENGTH,
            "pattern": "^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$",
        }),
        ArgType::LabelSelector => json!({
            "type": "string",
            "maxLength": MAX_SELECTOR_LENGTH,
        }),
        ArgType::LabelMap => json!({
            "type": "object",
            "maxProperties": MAX_LABEL_ENTRIES,
            "additionalProperties": { "type": "string", "maxLength": MAX_DNS_LABEL_LENGTH },
        }),
        ArgType::YamlDocuments {
            max_bytes,
        } => json!({ "type": "string", "minLength": 1, "maxLength": max_bytes }),
    };
    if let Value::Object(map) = &mut schema {
        map.insert("description".to_string(), Value::String(spec.description.to_string()));
        if let Some(default) = spec.default {
            map.insert("default".to_string(), default.to_value());
        }
    }
    schema
}
