// crates/kube-gate-core/src/validator.rs
// ============================================================================
// Module: Argument Validator
// Description: Strict validation of request arguments against operation schemas.
// Purpose: Reject malformed input before any cluster call is planned.
// Dependencies: serde_json, serde_yaml
// ============================================================================

//! ## Overview
//! [`validate`] checks a raw argument map against an operation's
//! [`ArgumentSpec`] list and constraints, returning normalized
//! [`ValidatedArgs`] or the first [`Failure`] with
//! [`FailureKind::InvalidArgument`](crate::model::FailureKind::InvalidArgument).
//!
//! Rules, in order: unknown names are rejected, required names must be
//! present (`null` counts as absent), values must match their declared type
//! without coercion, defaults fill absent optional arguments, and operation
//! constraints run last. YAML manifests are parsed here so planning works on
//! structured documents.
//!
//! Security posture: arguments come from a language model and are treated as
//! untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Map;
use serde_json::Value;

use crate::catalog::Operation;
use crate::model::Failure;
use crate::schema::ArgType;
use crate::schema::ArgumentSpec;
use crate::schema::Constraint;
use crate::schema::MAX_DNS_LABEL_LENGTH;
use crate::schema::MAX_DNS_SUBDOMAIN_LENGTH;
use crate::schema::MAX_LABEL_ENTRIES;
use crate::schema::MAX_SELECTOR_LENGTH;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of documents accepted in one manifest.
pub const MAX_MANIFEST_DOCUMENTS: usize = 100;
/// Namespaces that may never be deleted unless configured otherwise.
pub const DEFAULT_PROTECTED_NAMESPACES: &[&str] =
    &["default", "kube-system", "kube-public", "kube-node-lease"];

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Runtime inputs to constraint checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Namespaces guarded by [`Constraint::NotProtectedNamespace`].
    pub protected_namespaces: BTreeSet<String>,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            protected_namespaces: DEFAULT_PROTECTED_NAMESPACES
                .iter()
                .map(|name| (*name).to_string())
                .collect(),
        }
    }
}

impl ValidationPolicy {
    /// Builds a policy from a list of protected namespace names.
    #[must_use]
    pub fn with_protected<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected_namespaces: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true when the namespace is protected.
    #[must_use]
    pub fn is_protected(&self, namespace: &str) -> bool {
        self.protected_namespaces.contains(namespace)
    }
}

// ============================================================================
// SECTION: Validated Arguments
// ============================================================================

/// Normalized argument set produced by [`validate`].
///
/// # Invariants
/// - Every key is a declared argument of the operation.
/// - Every value matches its declared type.
/// - YAML manifests are stored as a JSON array of documents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatedArgs {
    /// Values by argument name, including defaults.
    values: BTreeMap<&'static str, Value>,
    /// Names the caller supplied explicitly.
    supplied: BTreeSet<&'static str>,
}

impl ValidatedArgs {
    /// Returns the raw value for an argument.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true when the caller supplied the argument.
    #[must_use]
    pub fn was_supplied(&self, name: &str) -> bool {
        self.supplied.contains(name)
    }

    /// Returns an optional string argument.
    #[must_use]
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns a string argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`Failure`] when the argument is absent.
    pub fn str(&self, name: &str) -> Result<&str, Failure> {
        self.opt_str(name)
            .ok_or_else(|| Failure::invalid_argument(name, "required argument missing"))
    }

    /// Returns an optional integer argument.
    #[must_use]
    pub fn opt_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    /// Returns an integer argument that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`Failure`] when the argument is absent.
    pub fn int(&self, name: &str) -> Result<i64, Failure> {
        self.opt_int(name)
            .ok_or_else(|| Failure::invalid_argument(name, "required argument missing"))
    }

    /// Returns a boolean argument, treating absence as `false`.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Returns a label map argument, treating absence as empty.
    #[must_use]
    pub fn labels(&self, name: &str) -> BTreeMap<String, String> {
        self.get(name)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the parsed documents of a manifest argument.
    ///
    /// # Errors
    ///
    /// Returns [`Failure`] when the argument is absent.
    pub fn documents(&self, name: &str) -> Result<&[Value], Failure> {
        self.get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| Failure::invalid_argument(name, "required argument missing"))
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates raw arguments against an operation.
///
/// # Errors
///
/// Returns [`Failure`] with kind `InvalidArgument` naming the first offending
/// field.
pub fn validate(
    operation: &Operation,
    arguments: &Map<String, Value>,
    policy: &ValidationPolicy,
) -> Result<ValidatedArgs, Failure> {
    for name in arguments.keys() {
        if !operation.arguments.iter().any(|spec| spec.name == name.as_str()) {
            return Err(Failure::invalid_argument(name.as_str(), "unknown argument"));
        }
    }
    let mut validated = ValidatedArgs::default();
    for spec in operation.arguments {
        match arguments.get(spec.name).filter(|value| !value.is_null()) {
            Some(value) => {
                let normalized = check_type(spec, value)
                    .map_err(|reason| Failure::invalid_argument(spec.name, reason))?;
                validated.values.insert(spec.name, normalized);
                validated.supplied.insert(spec.name);
            }
            None if spec.required => {
                return Err(Failure::invalid_argument(spec.name, "required argument missing"));
            }
            None => {
                if let Some(default) = spec.default {
                    validated.values.insert(spec.name, default.to_value());
                }
            }
        }
    }
    for constraint in operation.constraints {
        check_constraint(*constraint, &validated, policy)?;
    }
    Ok(validated)
}

/// Checks one value against its declared type and returns the normalized value.
fn check_type(spec: &ArgumentSpec, value: &Value) -> Result<Value, String> {
    match spec.arg_type {
        ArgType::String {
            max_len,
        } => {
            let text = expect_str(value)?;
            if text.len() > max_len {
                return Err(format!("must be at most {max_len} bytes"));
            }
            Ok(value.clone())
        }
        ArgType::Integer {
            min,
            max,
        } => {
            let number = match value {
                Value::Number(number) if number.is_i64() || number.is_u64() => number.as_i64(),
                _ => None,
            };
            let Some(number) = number else {
                return Err(format!("expected integer between {min} and {max}"));
            };
            if number < min || number > max {
                return Err(format!("must be between {min} and {max}"));
            }
            Ok(Value::from(number))
        }
        ArgType::Boolean => {
            value.as_bool().ok_or_else(|| "expected boolean".to_string())?;
            Ok(value.clone())
        }
        ArgType::Enum(allowed) => {
            let text = expect_str(value)?;
            if !allowed.contains(&text) {
                return Err(format!("must be one of: {}", allowed.join(", ")));
            }
            Ok(value.clone())
        }
        ArgType::DnsLabel => {
            let text = expect_str(value)?;
            if !is_dns_label(text) {
                return Err(format!(
                    "must be a lowercase RFC 1123 label of at most {MAX_DNS_LABEL_LENGTH} chars"
                ));
            }
            Ok(value.clone())
        }
        ArgType::DnsSubdomain => {
            let text = expect_str(value)?;
            if !is_dns_subdomain(text) {
                return Err(format!(
                    "must be a lowercase RFC 1123 subdomain of at most {MAX_DNS_SUBDOMAIN_LENGTH} \
                     characters"
                ));
            }
            Ok(value.clone())
        }
        ArgType::LabelSelector => {
            let text = expect_str(value)?;
            if !is_label_selector(text) {
                return Err("invalid label selector".to_string());
            }
            Ok(value.clone())
        }
        ArgType::LabelMap => check_label_map(value),
        ArgType::YamlDocuments {
            max_bytes,
        } => {
            let text = expect_str(value)?;
            if text.len() > max_bytes {
                return Err(format!("manifest exceeds {max_bytes} bytes"));
            }
            parse_manifest(text).map(Value::Array)
        }
    }
}

/// Checks one operation constraint.
fn check_constraint(
    constraint: Constraint,
    args: &ValidatedArgs,
    policy: &ValidationPolicy,
) -> Result<(), Failure> {
    match constraint {
        Constraint::NotProtectedNamespace(field) => {
            if let Some(namespace) = args.opt_str(field)
                && policy.is_protected(namespace)
            {
                return Err(Failure::invalid_argument(
                    field,
                    format!("namespace {namespace} is protected"),
                ));
            }
        }
        Constraint::NotWithFlag(field, flag) => {
            if args.was_supplied(field) && args.flag(flag) {
                return Err(Failure::invalid_argument(
                    field,
                    format!("{field} cannot be combined with {flag}=true"),
                ));
            }
        }
    }
    Ok(())
}

/// Returns the string content or a type error.
fn expect_str(value: &Value) -> Result<&str, String> {
    value.as_str().ok_or_else(|| "expected string".to_string())
}

// ============================================================================
// SECTION: Name Rules
// ============================================================================

/// Returns true for an RFC 1123 label.
#[must_use]
pub fn is_dns_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_DNS_LABEL_LENGTH {
        return false;
    }
    let edge_ok = |byte: u8| byte.is_ascii_lowercase() || byte.is_ascii_digit();
    bytes.iter().all(|byte| edge_ok(*byte) || *byte == b'-')
        && bytes.first().copied().is_some_and(edge_ok)
        && bytes.last().copied().is_some_and(edge_ok)
}

/// Returns true for an RFC 1123 subdomain.
#[must_use]
pub fn is_dns_subdomain(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_DNS_SUBDOMAIN_LENGTH
        && value.split('.').all(is_dns_label)
}

/// Returns true for a name usable as an API path segment.
///
/// Per-kind name formats are left to the API server: RBAC objects accept
/// names such as `system:aggregated-metrics-reader`.
fn is_object_name(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_DNS_SUBDOMAIN_LENGTH
        && value != "."
        && value != ".."
        && !value.chars().any(|ch| ch == '/' || ch == '%' || ch.is_control())
}

/// Returns true for a label selector expression in the accepted charset.
fn is_label_selector(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && value.len() <= MAX_SELECTOR_LENGTH
        && value.chars().all(|ch| {
            ch.is_ascii_alphanumeric()
                || matches!(ch, '-' | '_' | '.' | '/' | '=' | '!' | ',' | '(' | ')' | ' ')
        })
}

/// Returns true for a label name segment (the part after an optional prefix).
fn is_label_name(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.is_empty() || bytes.len() > MAX_DNS_LABEL_LENGTH {
        return false;
    }
    bytes.iter().all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.'))
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
}

/// Returns true for a label key with an optional DNS subdomain prefix.
#[must_use]
pub fn is_label_key(value: &str) -> bool {
    match value.split_once('/') {
        Some((prefix, name)) => is_dns_subdomain(prefix) && is_label_name(name),
        None => is_label_name(value),
    }
}

/// Returns true for a label value; empty values are allowed.
#[must_use]
pub fn is_label_value(value: &str) -> bool {
    value.is_empty() || is_label_name(value)
}

/// Validates a label map value.
fn check_label_map(value: &Value) -> Result<Value, String> {
    let map = value.as_object().ok_or_else(|| "expected object of labels".to_string())?;
    if map.len() > MAX_LABEL_ENTRIES {
        return Err(format!("at most {MAX_LABEL_ENTRIES} labels are allowed"));
    }
    for (key, label_value) in map {
        if !is_label_key(key) {
            return Err(format!("invalid label key: {key}"));
        }
        let text =
            label_value.as_str().ok_or_else(|| format!("label {key} must have a string value"))?;
        if !is_label_value(text) {
            return Err(format!("invalid value for label {key}"));
        }
    }
    Ok(value.clone())
}

// ============================================================================
// SECTION: Manifests
// ============================================================================

/// Parses a multi-document YAML manifest into JSON documents.
///
/// Empty documents (for example a trailing `---`) are skipped.
///
/// # Errors
///
/// Returns a reason string when the text is not YAML, a document is not a
/// mapping, or a document lacks `apiVersion`, `kind`, or `metadata.name`.
pub fn parse_manifest(text: &str) -> Result<Vec<Value>, String> {
    let mut documents = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let yaml = serde_yaml::Value::deserialize(document)
            .map_err(|err| format!("document {index}: invalid yaml: {err}"))?;
        if yaml.is_null() {
            continue;
        }
        let json = serde_json::to_value(&yaml)
            .map_err(|_| format!("document {index}: mapping keys must be strings"))?;
        check_document(index, &json)?;
        documents.push(json);
        if documents.len() > MAX_MANIFEST_DOCUMENTS {
            return Err(format!("manifest exceeds {MAX_MANIFEST_DOCUMENTS} documents"));
        }
    }
    if documents.is_empty() {
        return Err("manifest contains no documents".to_string());
    }
    Ok(documents)
}

/// Checks the identity fields of one manifest document.
fn check_document(index: usize, document: &Value) -> Result<(), String> {
    if !document.is_object() {
        return Err(format!("document {index}: must be a mapping"));
    }
    for field in ["apiVersion", "kind"] {
        let present = document.get(field).and_then(Value::as_str).is_some_and(|v| !v.is_empty());
        if !present {
            return Err(format!("document {index}: missing {field}"));
        }
    }
    let name = document.pointer("/metadata/name").and_then(Value::as_str).unwrap_or_default();
    if !is_object_name(name) {
        return Err(format!("document {index}: metadata.name must be a valid object name"));
    }
    if let Some(namespace) = document.pointer("/metadata/namespace")
        && !namespace.as_str().is_some_and(is_dns_label)
    {
        return Err(format!("document {index}: metadata.namespace must be an RFC 1123 label"));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
