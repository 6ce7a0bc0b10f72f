use std::sync::Arc;

use crate::context::{GuardedContext, HostContext};
use crate::handler::PolicyHandler;

/// Substitutes every call context argument with a [`GuardedContext`].
///
/// Installing this policy makes `bypass` and `complete` rejections
/// unconditional for the wrapped target; plugins cannot corrupt the host's
/// processing order or skip safety checks other plugins rely on.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextGuardPolicy;

impl ContextGuardPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyHandler for ContextGuardPolicy {
    fn name(&self) -> &'static str {
        "context-guard"
    }

    fn on_argument(&self, ctx: Arc<dyn HostContext>) -> Arc<dyn HostContext> {
        GuardedContext::wrap(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CallContext;
    use crate::handler::PolicyChain;

    #[test]
    fn chain_substitutes_a_guarded_context() {
        let chain = PolicyChain::new(vec![Arc::new(ContextGuardPolicy::new())]);
        let raw: Arc<dyn HostContext> = Arc::new(CallContext::new());
        let guarded = chain.apply_context(raw.clone());

        assert!(guarded.bypass().is_err());
        assert!(guarded.complete().is_err());
        assert!(!raw.is_bypassed());
        assert!(!raw.is_completed());
    }
}
