use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::call::CallDescriptor;
use crate::context::HostContext;
use crate::errors::{CallError, CallResult, PolicyError};
use crate::executor::PolicyExecutor;
use crate::handler::PolicyChain;

/// Single entry point through which every call on a wrapped target passes.
///
/// Classifies each invocation by its declaring interface, forwards
/// ineligible calls untouched, and routes eligible ones through the policy
/// executor. One interceptor lives as long as the target it wraps; nested
/// sub-services get their own interceptor sharing the same chain.
pub struct Interceptor {
    chain: PolicyChain,
    executor: PolicyExecutor,
    ifaces: Arc<HashSet<&'static str>>,
}

impl Interceptor {
    pub fn new(
        target: Arc<str>,
        chain: PolicyChain,
        ifaces: impl IntoIterator<Item = &'static str>,
    ) -> Self {
        Self {
            chain,
            executor: PolicyExecutor::new(target),
            ifaces: Arc::new(ifaces.into_iter().collect()),
        }
    }

    /// Sibling interceptor for a sub-dispatchable service: same chain, same
    /// eligible interfaces, its own execution slot.
    pub fn for_sub_target(&self, target: Arc<str>) -> Self {
        Self {
            chain: self.chain.clone(),
            executor: PolicyExecutor::new(target),
            ifaces: Arc::clone(&self.ifaces),
        }
    }

    pub fn target(&self) -> &Arc<str> {
        self.executor.target()
    }

    pub fn chain(&self) -> &PolicyChain {
        &self.chain
    }

    pub fn is_relevant(&self, iface: &str) -> bool {
        self.ifaces.contains(iface)
    }

    /// Argument-transform pass for a context-carrying argument. Runs only
    /// for calls declared on a policy-relevant interface; forwarding
    /// adapters opt in per call.
    pub fn guard_context(
        &self,
        iface: &'static str,
        ctx: Arc<dyn HostContext>,
    ) -> Arc<dyn HostContext> {
        if self.is_relevant(iface) {
            self.chain.apply_context(ctx)
        } else {
            ctx
        }
    }

    /// Routes one invocation. Calls declared on an interface outside the
    /// policy-relevant set are forwarded directly: no hooks, no error
    /// translation.
    pub async fn dispatch<R, E, F>(&self, call: CallDescriptor, work: F) -> CallResult<R, E>
    where
        R: fmt::Debug + Send + 'static,
        E: std::error::Error + Send + 'static,
        F: Future<Output = Result<R, E>> + Send + 'static,
    {
        if !self.is_relevant(call.iface) {
            return work.await.map_err(CallError::Domain);
        }
        self.executor.execute(&call, &self.chain, work).await
    }

    /// Dispatch for methods whose signature declares no checked error. The
    /// caller's contract cannot accept a classified error, so any failure is
    /// logged and a default result returned instead of propagated.
    pub async fn dispatch_or_default<R, E, F>(&self, call: CallDescriptor, work: F) -> R
    where
        R: fmt::Debug + Default + Send + 'static,
        E: std::error::Error + Send + 'static,
        F: Future<Output = Result<R, E>> + Send + 'static,
    {
        let method = call.method;
        let target = Arc::clone(&call.target);
        match self.dispatch(call, work).await {
            Ok(value) => value,
            Err(err @ CallError::Policy(PolicyError::RetriesExhausted { .. })) => {
                warn!(method, target = %target, error = %err, "swallowing classified error on infallible callback");
                R::default()
            }
            Err(err) => {
                info!(method, target = %target, error = %err, "swallowing classified error on infallible callback");
                R::default()
            }
        }
    }

    /// Chain teardown; runs after a lifecycle-ending call completes.
    pub fn close(&self) -> anyhow::Result<()> {
        self.chain.close()
    }
}
