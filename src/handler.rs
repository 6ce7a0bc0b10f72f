use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use crate::call::CallDescriptor;
use crate::context::HostContext;
use crate::errors::PolicyError;
use crate::executor::TaskHandle;

/// Hook bundle invoked at fixed points around every intercepted call.
///
/// All hooks default to no-ops so a policy only implements the points it
/// cares about. Hooks must be cheap and non-blocking; the actual call body
/// runs elsewhere.
pub trait PolicyHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pre-processing pass over context-carrying arguments, applied in chain
    /// order before dispatch. Each handler receives the previous handler's
    /// (possibly substituted) value. Not part of the run sequence; the
    /// forwarding adapters opt in per argument.
    fn on_argument(&self, ctx: Arc<dyn HostContext>) -> Arc<dyn HostContext> {
        ctx
    }

    /// Runs before the call body is submitted. Returning an error aborts the
    /// call: the body is never executed, `after_run` still fires.
    fn before_run(&self, _call: &CallDescriptor) -> Result<(), PolicyError> {
        Ok(())
    }

    /// Runs once the call body has been submitted, with a cancellable handle
    /// to the in-flight task.
    fn running(&self, _call: &CallDescriptor, _task: &TaskHandle) {}

    /// The call body returned its declared domain error.
    fn on_error(&self, _call: &CallDescriptor, _error: &(dyn std::error::Error + 'static)) {}

    /// The call failed outside its declared contract (panic, dispatch
    /// failure).
    fn on_unexpected(&self, _call: &CallDescriptor, _error: &anyhow::Error) {}

    /// Always runs last, success or failure, with the elapsed wall time.
    /// `result` is absent on any failure and for vetoed calls.
    fn after_run(&self, _call: &CallDescriptor, _result: Option<&dyn fmt::Debug>, _elapsed: Duration) {
    }

    /// Releases any state the policy owns. Called once at chain teardown.
    fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Ordered set of policy handlers, immutable after construction and shared
/// read-only across all concurrently executing calls on one wrapped target.
///
/// `before_run`, `running`, `on_error` and `after_run` all iterate the
/// configured order forward.
#[derive(Clone)]
pub struct PolicyChain {
    handlers: Arc<[Arc<dyn PolicyHandler>]>,
    closed: Arc<AtomicBool>,
}

impl PolicyChain {
    pub fn new(handlers: Vec<Arc<dyn PolicyHandler>>) -> Self {
        Self {
            handlers: handlers.into(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn handlers(&self) -> &[Arc<dyn PolicyHandler>] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the `on_argument` pass over a call context, in chain order.
    pub fn apply_context(&self, ctx: Arc<dyn HostContext>) -> Arc<dyn HostContext> {
        self.handlers
            .iter()
            .fold(ctx, |ctx, handler| handler.on_argument(ctx))
    }

    /// Closes every handler once. Every failure is logged; the first one is
    /// returned. Closing an already-closed chain is a no-op.
    pub fn close(&self) -> anyhow::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut first_failure = None;
        for handler in self.handlers.iter() {
            if let Err(err) = handler.close() {
                error!(policy = handler.name(), error = %err, "policy close failed");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use anyhow::anyhow;
    use std::sync::atomic::AtomicUsize;

    struct CountingClose {
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl PolicyHandler for CountingClose {
        fn name(&self) -> &'static str {
            "counting-close"
        }

        fn close(&self) -> anyhow::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(anyhow!("close failed"))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn close_runs_every_handler_and_returns_first_failure() {
        let closes = Arc::new(AtomicUsize::new(0));
        let chain = PolicyChain::new(vec![
            Arc::new(CountingClose {
                closes: closes.clone(),
                fail: true,
            }),
            Arc::new(CountingClose {
                closes: closes.clone(),
                fail: false,
            }),
        ]);

        assert!(chain.close().is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn close_is_idempotent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let chain = PolicyChain::new(vec![Arc::new(CountingClose {
            closes: closes.clone(),
            fail: false,
        })]);

        chain.close().unwrap();
        chain.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn apply_context_folds_in_chain_order() {
        struct Tagger(&'static str, Arc<parking_lot::Mutex<Vec<&'static str>>>);

        impl PolicyHandler for Tagger {
            fn name(&self) -> &'static str {
                self.0
            }

            fn on_argument(&self, ctx: Arc<dyn HostContext>) -> Arc<dyn HostContext> {
                self.1.lock().push(self.0);
                ctx
            }
        }

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let chain = PolicyChain::new(vec![
            Arc::new(Tagger("first", order.clone())),
            Arc::new(Tagger("second", order.clone())),
        ]);
        chain.apply_context(Arc::new(CallContext::new()));
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }
}
