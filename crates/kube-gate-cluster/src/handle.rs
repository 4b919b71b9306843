// crates/kube-gate-cluster/src/handle.rs
// ============================================================================
// Module: Cluster Handle
// Description: Resolves cluster credentials and builds the shared client.
// Purpose: Produce one pooled client per process for the adapter.
// Dependencies: kube, kube-gate-config
// ============================================================================

//! ## Overview
//! [`ClusterHandle::connect`] resolves credentials once at startup. With no
//! kubeconfig path and no context it follows the standard inference rules
//! (`KUBECONFIG`, `~/.kube/config`, then in-cluster service account). An
//! explicit path or context always reads a kubeconfig file.
//!
//! Security posture: credentials stay inside the client; only the source
//! description and context name are exposed for diagnostics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use kube::Client;
use kube::Config;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube_gate_config::ClusterConfig;
use kube_gate_core::ClusterAdapter;
use thiserror::Error;

use crate::adapter::KubeAdapter;

// ============================================================================
// SECTION: Credential Source
// ============================================================================

/// Where the cluster credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Standard inference: `KUBECONFIG`, the default file, or in-cluster.
    Inferred,
    /// The default kubeconfig file, with an explicit context.
    DefaultKubeconfig,
    /// An explicit kubeconfig file.
    Kubeconfig(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inferred => f.write_str("inferred"),
            Self::DefaultKubeconfig => f.write_str("default kubeconfig"),
            Self::Kubeconfig(path) => write!(f, "kubeconfig {}", path.display()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Failures while resolving credentials or building the client.
#[derive(Debug, Error)]
pub enum HandleError {
    /// Kubeconfig file could not be read or parsed.
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),
    /// Credentials could not be resolved into a client configuration.
    #[error("cluster credentials unavailable: {0}")]
    Credentials(String),
    /// The HTTP client could not be built.
    #[error("cluster client error: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Shared, cloneable connection to one cluster.
#[derive(Clone)]
pub struct ClusterHandle {
    /// Pooled client; clones share connections.
    client: Client,
    /// Credential source used at startup.
    source: CredentialSource,
    /// Context name, when one was selected explicitly.
    context: Option<String>,
    /// API server URL.
    server: String,
}

impl fmt::Debug for ClusterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterHandle")
            .field("source", &self.source)
            .field("context", &self.context)
            .field("server", &self.server)
            .finish_non_exhaustive()
    }
}

impl ClusterHandle {
    /// Resolves credentials and builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] when no usable credentials are found or the
    /// client cannot be constructed.
    pub async fn connect(config: &ClusterConfig) -> Result<Self, HandleError> {
        let (kube_config, source) = resolve_config(config).await?;
        let server = kube_config.cluster_url.to_string();
        let client =
            Client::try_from(kube_config).map_err(|err| HandleError::Client(err.to_string()))?;
        Ok(Self {
            client,
            source,
            context: config.context.clone(),
            server,
        })
    }

    /// Returns the underlying client.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Returns the credential source.
    #[must_use]
    pub const fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Returns the explicitly selected context.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the API server URL.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Returns an adapter sharing this handle's client.
    #[must_use]
    pub fn adapter(&self) -> Arc<dyn ClusterAdapter> {
        Arc::new(KubeAdapter::new(self.client.clone()))
    }
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Builds the client configuration from the cluster settings.
async fn resolve_config(config: &ClusterConfig) -> Result<(Config, CredentialSource), HandleError> {
    let options = KubeConfigOptions {
        context: config.context.clone(),
        cluster: None,
        user: None,
    };
    match (&config.kubeconfig, &config.context) {
        (Some(path), _) => {
            let path = PathBuf::from(path.trim());
            let kubeconfig = Kubeconfig::read_from(&path)
                .map_err(|err| HandleError::Kubeconfig(format!("{}: {err}", path.display())))?;
            let kube_config = Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|err| HandleError::Credentials(err.to_string()))?;
            Ok((kube_config, CredentialSource::Kubeconfig(path)))
        }
        (None, Some(_)) => {
            let kube_config = Config::from_kubeconfig(&options)
                .await
                .map_err(|err| HandleError::Credentials(err.to_string()))?;
            Ok((kube_config, CredentialSource::DefaultKubeconfig))
        }
        (None, None) => {
            let kube_config =
                Config::infer().await.map_err(|err| HandleError::Credentials(err.to_string()))?;
            Ok((kube_config, CredentialSource::Inferred))
        }
    }
}

#[cfg(test)]
mod tests;
