use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::call::CallDescriptor;
use crate::context::HostContext;
use crate::errors::CallError;
use crate::handler::PolicyChain;
use crate::interceptor::Interceptor;
use crate::plugin::{iface, HostError, HostResult, Plugin, PluginService};

/// Wrap-time options supplied by the host installer.
#[derive(Debug, Clone)]
pub struct WrapOptions {
    /// Exact type labels that must never be wrapped.
    pub whitelist: Vec<String>,
    /// Interfaces subject to policies; calls declared elsewhere pass
    /// through untouched.
    pub ifaces: Vec<&'static str>,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            ifaces: vec![iface::LIFECYCLE, iface::EVENTS, iface::META, iface::SERVICE],
        }
    }
}

/// Wraps a plugin with a policy chain, to be substituted transparently for
/// the original. Whitelisted and already-wrapped plugins are returned
/// unchanged.
pub fn wrap_plugin(
    plugin: Arc<dyn Plugin>,
    chain: PolicyChain,
    options: &WrapOptions,
) -> Arc<dyn Plugin> {
    if plugin.is_policy_wrapped() {
        return plugin;
    }
    let label = plugin.type_label();
    if options.whitelist.iter().any(|entry| entry == label) {
        debug!(target = label, "plugin whitelisted, left unwrapped");
        return plugin;
    }
    let interceptor = Interceptor::new(Arc::from(label), chain, options.ifaces.iter().copied());
    Arc::new(WrappedPlugin {
        inner: plugin,
        interceptor,
    })
}

fn into_host_error(err: CallError<HostError>) -> HostError {
    match err {
        CallError::Domain(err) => err,
        other => HostError::new(other.to_string()),
    }
}

/// Forwarding adapter implementing the plugin contract on top of the
/// interceptor.
struct WrappedPlugin {
    inner: Arc<dyn Plugin>,
    interceptor: Interceptor,
}

impl WrappedPlugin {
    fn descriptor(
        &self,
        iface: &'static str,
        method: &'static str,
        ctx: Option<&Arc<dyn HostContext>>,
    ) -> CallDescriptor {
        let mut call = CallDescriptor::new(iface, Arc::clone(self.interceptor.target()), method);
        if let Some(ctx) = ctx {
            call = call.with_arg(ctx).with_scope(ctx.scope_label());
        }
        call
    }
}

#[async_trait]
impl Plugin for WrappedPlugin {
    fn type_label(&self) -> &'static str {
        self.inner.type_label()
    }

    fn is_policy_wrapped(&self) -> bool {
        true
    }

    async fn start(&self, ctx: Arc<dyn HostContext>) -> HostResult<()> {
        let ctx = self.interceptor.guard_context(iface::LIFECYCLE, ctx);
        let call = self.descriptor(iface::LIFECYCLE, "start", Some(&ctx));
        let inner = Arc::clone(&self.inner);
        self.interceptor
            .dispatch(call, async move { inner.start(ctx).await })
            .await
            .map_err(into_host_error)
    }

    async fn stop(&self, ctx: Arc<dyn HostContext>) -> HostResult<()> {
        // Lifecycle end is not itself subject to policies, but it tears the
        // chain down once the underlying call has completed, whatever its
        // outcome.
        let result = self.inner.stop(ctx).await;
        let closed = self
            .interceptor
            .close()
            .map_err(|cause| into_host_error(CallError::Teardown { cause }));
        result.and(closed)
    }

    async fn on_event(&self, ctx: Arc<dyn HostContext>, event: Value) -> HostResult<()> {
        let ctx = self.interceptor.guard_context(iface::EVENTS, ctx);
        let call = self
            .descriptor(iface::EVENTS, "on_event", Some(&ctx))
            .with_arg(&event);
        let inner = Arc::clone(&self.inner);
        self.interceptor
            .dispatch(call, async move { inner.on_event(ctx, event).await })
            .await
            .map_err(into_host_error)
    }

    async fn describe(&self) -> String {
        let call = self.descriptor(iface::META, "describe", None);
        let inner = Arc::clone(&self.inner);
        self.interceptor
            .dispatch_or_default::<String, HostError, _>(call, async move {
                Ok(inner.describe().await)
            })
            .await
    }

    fn service(&self) -> Option<Arc<dyn PluginService>> {
        let service = self.inner.service()?;
        if service.is_policy_wrapped() {
            return Some(service);
        }
        debug!(
            target = %self.interceptor.target(),
            service = service.type_label(),
            "re-wrapping sub-dispatchable service with the policy chain"
        );
        let interceptor = self
            .interceptor
            .for_sub_target(Arc::from(service.type_label()));
        Some(Arc::new(WrappedService {
            inner: service,
            interceptor,
        }))
    }
}

struct WrappedService {
    inner: Arc<dyn PluginService>,
    interceptor: Interceptor,
}

#[async_trait]
impl PluginService for WrappedService {
    fn type_label(&self) -> &'static str {
        self.inner.type_label()
    }

    fn is_policy_wrapped(&self) -> bool {
        true
    }

    async fn call(&self, method: &'static str, payload: Value) -> HostResult<Value> {
        let call =
            CallDescriptor::new(iface::SERVICE, Arc::clone(self.interceptor.target()), method)
                .with_arg(&payload);
        let inner = Arc::clone(&self.inner);
        self.interceptor
            .dispatch(call, async move { inner.call(method, payload).await })
            .await
            .map_err(into_host_error)
    }
}
