// crates/kube-gate-config/src/config.rs
// ============================================================================
// Module: Kube Gate Configuration
// Description: Configuration loading and validation for Kube Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: kube-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing files fall back to built-in defaults only when no path was asked
//! for; an explicit path that cannot be read or validated fails closed.
//!
//! Security posture: config inputs are untrusted. The HTTP transport has no
//! authentication of its own, so it may only bind to loopback addresses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use kube_gate_core::CatalogFilter;
use kube_gate_core::DispatchPolicy;
use kube_gate_core::ValidationPolicy;
use kube_gate_core::builtin_names;
use kube_gate_core::validator::is_dns_label;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename looked up in the working directory.
pub const DEFAULT_CONFIG_NAME: &str = "kube-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "KUBE_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default maximum request body size in bytes.
pub(crate) const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Upper bound for `server.max_body_bytes`.
pub const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Default maximum inflight requests.
pub(crate) const DEFAULT_MAX_INFLIGHT: usize = 64;
/// Upper bound for `server.limits.max_inflight`.
pub const MAX_INFLIGHT_LIMIT: usize = 1024;
/// Default HTTP bind address.
pub(crate) const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
/// Minimum dispatch timeout in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum dispatch timeout in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 600_000;
/// Default read deadline in milliseconds.
pub(crate) const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;
/// Default mutation deadline in milliseconds.
pub(crate) const DEFAULT_WRITE_TIMEOUT_MS: u64 = 120_000;
/// Default delay before the transient retry in milliseconds.
pub(crate) const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;
/// Maximum delay before the transient retry in milliseconds.
pub const MAX_RETRY_BACKOFF_MS: u64 = 10_000;
/// Maximum number of protected namespace entries.
pub const MAX_PROTECTED_NAMESPACES: usize = 64;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Kube Gate configuration loaded from disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubeGateConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Cluster connection configuration.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Dispatch deadline and retry configuration.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Safety configuration for destructive operations.
    #[serde(default)]
    pub safety: SafetyConfig,
    /// Catalog exposure configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// File the configuration was read from, if any (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl KubeGateConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// Resolution order: the explicit `path`, then [`CONFIG_ENV_VAR`], then
    /// [`DEFAULT_CONFIG_NAME`] in the working directory when it exists, and
    /// finally built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env::var(CONFIG_ENV_VAR).ok();
        let fallback = Path::new(DEFAULT_CONFIG_NAME);
        match resolve_path(path, env_path, fallback.is_file().then_some(fallback))? {
            Some(resolved) => Self::load_file(&resolved),
            None => {
                let mut config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Loads and validates configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let mut config = Self::from_toml_str(content)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.cluster.validate()?;
        self.dispatch.validate()?;
        self.safety.validate()?;
        self.catalog.validate()?;
        Ok(())
    }

    /// Returns the dispatcher deadline and retry policy.
    #[must_use]
    pub const fn dispatch_policy(&self) -> DispatchPolicy {
        DispatchPolicy {
            read_timeout: Duration::from_millis(self.dispatch.read_timeout_ms),
            write_timeout: Duration::from_millis(self.dispatch.write_timeout_ms),
            transient_retry: self.dispatch.transient_retry,
            retry_backoff: Duration::from_millis(self.dispatch.retry_backoff_ms),
        }
    }

    /// Returns the argument validation policy.
    #[must_use]
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy::with_protected(self.safety.protected_namespaces.iter().cloned())
    }

    /// Returns the catalog exposure filter.
    #[must_use]
    pub fn catalog_filter(&self) -> CatalogFilter {
        CatalogFilter {
            read_only: self.catalog.read_only,
            disabled: self.catalog.disabled.iter().cloned().collect(),
        }
    }

    /// Returns a JSON summary of the effective configuration.
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "source": self.source.as_ref().map(|path| path.display().to_string()),
            "server": {
                "transport": self.server.transport,
                "bind": self.server.bind_address(),
                "max_body_bytes": self.server.max_body_bytes,
                "max_inflight": self.server.limits.max_inflight,
                "audit": {
                    "enabled": self.server.audit.enabled,
                    "path": self.server.audit.path,
                },
            },
            "cluster": {
                "kubeconfig": self.cluster.kubeconfig,
                "context": self.cluster.context,
            },
            "dispatch": {
                "read_timeout_ms": self.dispatch.read_timeout_ms,
                "write_timeout_ms": self.dispatch.write_timeout_ms,
                "transient_retry": self.dispatch.transient_retry,
                "retry_backoff_ms": self.dispatch.retry_backoff_ms,
            },
            "safety": {
                "protected_namespaces": self.safety.protected_namespaces,
            },
            "catalog": {
                "read_only": self.catalog.read_only,
                "disabled": self.catalog.disabled,
            },
        })
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Server configuration for MCP transports.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Transport type for MCP.
    #[serde(default)]
    pub transport: ServerTransport,
    /// Bind address for the HTTP transport.
    #[serde(default)]
    pub bind: Option<String>,
    /// Maximum request body or frame size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Request concurrency limits.
    #[serde(default)]
    pub limits: ServerLimitsConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: ServerAuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: ServerTransport::Stdio,
            bind: None,
            max_body_bytes: default_max_body_bytes(),
            limits: ServerLimitsConfig::default(),
            audit: ServerAuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the configured bind address, or the default for HTTP.
    #[must_use]
    pub fn bind_address(&self) -> Option<&str> {
        match self.transport {
            ServerTransport::Http => {
                Some(self.bind.as_deref().map_or(DEFAULT_HTTP_BIND, str::trim))
            }
            ServerTransport::Stdio => None,
        }
    }

    /// Validates server transport configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_body_bytes must not exceed {MAX_BODY_BYTES_LIMIT}"
            )));
        }
        self.limits.validate()?;
        self.audit.validate()?;
        match self.transport {
            ServerTransport::Http => {
                let bind = self.bind_address().unwrap_or(DEFAULT_HTTP_BIND);
                if bind.is_empty() {
                    return Err(ConfigError::Invalid(
                        "http transport requires bind address".to_string(),
                    ));
                }
                let addr: SocketAddr = bind
                    .parse()
                    .map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))?;
                if !addr.ip().is_loopback() {
                    return Err(ConfigError::Invalid(
                        "non-loopback bind disallowed: http transport has no auth".to_string(),
                    ));
                }
            }
            ServerTransport::Stdio => {
                if self.bind.is_some() {
                    return Err(ConfigError::Invalid(
                        "stdio transport does not accept a bind address".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Supported MCP transport types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerTransport {
    /// Use stdin/stdout transport.
    #[default]
    Stdio,
    /// Use HTTP JSON-RPC transport.
    Http,
}

impl ServerTransport {
    /// Returns the stable label used in logs and audit records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

/// Request limits for the MCP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerLimitsConfig {
    /// Maximum inflight requests.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

impl Default for ServerLimitsConfig {
    fn default() -> Self {
        Self {
            max_inflight: default_max_inflight(),
        }
    }
}

impl ServerLimitsConfig {
    /// Validates request limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_inflight == 0 {
            return Err(ConfigError::Invalid("max_inflight must be greater than zero".to_string()));
        }
        if self.max_inflight > MAX_INFLIGHT_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_inflight must not exceed {MAX_INFLIGHT_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Audit logging configuration for MCP server requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for ServerAuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl ServerAuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Cluster
// ============================================================================

/// Cluster connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterConfig {
    /// Kubeconfig file; the standard discovery rules apply when unset.
    #[serde(default)]
    pub kubeconfig: Option<String>,
    /// Kubeconfig context; the current context is used when unset.
    #[serde(default)]
    pub context: Option<String>,
}

impl ClusterConfig {
    /// Validates cluster connection settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.kubeconfig {
            validate_path_string("cluster.kubeconfig", path)?;
        }
        if let Some(context) = &self.context
            && context.trim().is_empty()
        {
            return Err(ConfigError::Invalid("cluster.context must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Dispatch deadlines and transient retry settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Deadline for read operations in milliseconds.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Deadline for mutating operations in milliseconds.
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Retry a transient read failure once.
    #[serde(default = "default_transient_retry")]
    pub transient_retry: bool,
    /// Delay before the retry in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            transient_retry: default_transient_retry(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl DispatchConfig {
    /// Validates deadline ordering and bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout_range(
            "dispatch.read_timeout_ms",
            self.read_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "dispatch.write_timeout_ms",
            self.write_timeout_ms,
            MIN_TIMEOUT_MS,
            MAX_TIMEOUT_MS,
        )?;
        if self.read_timeout_ms > self.write_timeout_ms {
            return Err(ConfigError::Invalid(
                "dispatch.read_timeout_ms must not exceed dispatch.write_timeout_ms".to_string(),
            ));
        }
        if self.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "dispatch.retry_backoff_ms must not exceed {MAX_RETRY_BACKOFF_MS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Safety
// ============================================================================

/// Guards for destructive operations.
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    /// Namespaces `delete_namespace` refuses to touch.
    #[serde(default = "default_protected_namespaces")]
    pub protected_namespaces: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            protected_namespaces: default_protected_namespaces(),
        }
    }
}

impl SafetyConfig {
    /// Validates protected namespace entries.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.protected_namespaces.len() > MAX_PROTECTED_NAMESPACES {
            return Err(ConfigError::Invalid(format!(
                "safety.protected_namespaces exceeds {MAX_PROTECTED_NAMESPACES} entries"
            )));
        }
        for name in &self.protected_namespaces {
            if !is_dns_label(name) {
                return Err(ConfigError::Invalid(format!(
                    "safety.protected_namespaces entry '{name}' is not a valid namespace name"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

/// Catalog exposure settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    /// Expose read operations only.
    #[serde(default)]
    pub read_only: bool,
    /// Operation names removed from the catalog.
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl CatalogConfig {
    /// Validates that disabled names refer to real operations.
    fn validate(&self) -> Result<(), ConfigError> {
        let known = builtin_names();
        let mut seen = BTreeSet::new();
        for name in &self.disabled {
            if !known.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "catalog.disabled entry '{name}' is not a known operation"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "catalog.disabled entry '{name}' is listed twice"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the CLI, the environment, or the fallback.
///
/// Returns `None` when no file applies and defaults should be used.
pub(crate) fn resolve_path(
    path: Option<&Path>,
    env_path: Option<String>,
    fallback: Option<&Path>,
) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = path {
        return Ok(Some(path.to_path_buf()));
    }
    if let Some(env_path) = env_path.filter(|value| !value.trim().is_empty()) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(Some(PathBuf::from(env_path)));
    }
    Ok(fallback.map(Path::to_path_buf))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a timeout value against bounds.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default maximum inflight requests.
const fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

/// Audit logging is on unless disabled.
const fn default_audit_enabled() -> bool {
    true
}

/// Default read deadline.
const fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// Default mutation deadline.
const fn default_write_timeout_ms() -> u64 {
    DEFAULT_WRITE_TIMEOUT_MS
}

/// Transient reads are retried once unless disabled.
const fn default_transient_retry() -> bool {
    true
}

/// Default retry backoff.
const fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

/// Default protected namespaces.
fn default_protected_namespaces() -> Vec<String> {
    kube_gate_core::DEFAULT_PROTECTED_NAMESPACES
        .iter()
        .map(|name| (*name).to_string())
        .collect()
}

#[cfg(test)]
mod tests;
