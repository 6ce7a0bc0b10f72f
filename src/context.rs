use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::GuardViolation;

/// Mutable call context the host passes to plugin callbacks.
///
/// `bypass` and `complete` are the two escape hatches that alter the host's
/// own processing order; a misbehaving plugin calling them can break safety
/// checks performed by other plugins later in the same chain.
pub trait HostContext: Send + Sync {
    /// Skip the remaining plugins in the host chain.
    fn bypass(&self) -> Result<(), GuardViolation>;

    /// Mark the host chain complete.
    fn complete(&self) -> Result<(), GuardViolation>;

    fn is_bypassed(&self) -> bool;

    fn is_completed(&self) -> bool;

    /// Label of the sub-resource this context is scoped to, if any.
    fn scope_label(&self) -> Option<String> {
        None
    }
}

/// Plain host-owned context implementation.
#[derive(Debug, Default)]
pub struct CallContext {
    bypassed: AtomicBool,
    completed: AtomicBool,
    scope: Option<String>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scoped(scope: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            ..Self::default()
        }
    }
}

impl HostContext for CallContext {
    fn bypass(&self) -> Result<(), GuardViolation> {
        self.bypassed.store(true, Ordering::Release);
        Ok(())
    }

    fn complete(&self) -> Result<(), GuardViolation> {
        self.completed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire)
    }

    fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    fn scope_label(&self) -> Option<String> {
        self.scope.clone()
    }
}

/// Context wrapper that rejects the two escape hatches unconditionally.
///
/// Reads delegate to the wrapped context unchanged; `bypass` and `complete`
/// never reach it.
pub struct GuardedContext {
    inner: Arc<dyn HostContext>,
}

impl GuardedContext {
    pub fn wrap(inner: Arc<dyn HostContext>) -> Arc<dyn HostContext> {
        Arc::new(Self { inner })
    }
}

impl HostContext for GuardedContext {
    fn bypass(&self) -> Result<(), GuardViolation> {
        Err(GuardViolation::new("bypass"))
    }

    fn complete(&self) -> Result<(), GuardViolation> {
        Err(GuardViolation::new("complete"))
    }

    fn is_bypassed(&self) -> bool {
        self.inner.is_bypassed()
    }

    fn is_completed(&self) -> bool {
        self.inner.is_completed()
    }

    fn scope_label(&self) -> Option<String> {
        self.inner.scope_label()
    }
}
