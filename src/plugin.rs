use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::context::HostContext;

/// Interface names used for policy eligibility checks.
pub mod iface {
    /// Lifecycle callbacks (`start`/`stop`).
    pub const LIFECYCLE: &str = "plugin.lifecycle";
    /// Event callbacks.
    pub const EVENTS: &str = "plugin.events";
    /// Introspection surface (`describe`).
    pub const META: &str = "plugin.meta";
    /// Sub-dispatchable service surface.
    pub const SERVICE: &str = "plugin.service";
}

/// The single checked domain error kind of the plugin contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;

/// Contract every managed plugin implements.
///
/// Third-party implementations are arbitrary; the host never calls them
/// directly but through a policy wrapper produced by
/// [`crate::proxy::wrap_plugin`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable label identifying the plugin implementation type. Used as the
    /// wrap-time whitelist key and the metric target label.
    fn type_label(&self) -> &'static str;

    /// Capability probe making re-wrapping idempotent. Only policy wrappers
    /// return true.
    fn is_policy_wrapped(&self) -> bool {
        false
    }

    async fn start(&self, ctx: Arc<dyn HostContext>) -> HostResult<()>;

    /// Ends the plugin lifecycle. On a wrapped plugin this also tears the
    /// policy chain down after the underlying call completes.
    async fn stop(&self, ctx: Arc<dyn HostContext>) -> HostResult<()>;

    async fn on_event(&self, ctx: Arc<dyn HostContext>, event: Value) -> HostResult<()>;

    /// Human-readable status line. Declares no error kind; on a wrapped
    /// plugin a classified failure is logged and an empty string returned.
    async fn describe(&self) -> String;

    /// Optional sub-dispatchable service. A wrapped plugin re-wraps the
    /// returned service with the same policy chain.
    fn service(&self) -> Option<Arc<dyn PluginService>> {
        None
    }
}

/// Sub-dispatchable service a plugin may expose; calls made on it are
/// intercepted like any other callback.
#[async_trait]
pub trait PluginService: Send + Sync {
    fn type_label(&self) -> &'static str;

    fn is_policy_wrapped(&self) -> bool {
        false
    }

    async fn call(&self, method: &'static str, payload: Value) -> HostResult<Value>;
}
