use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, trace, warn};

use crate::call::CallDescriptor;
use crate::context::HostContext;
use crate::handler::PolicyHandler;

/// Stateless structured-log policy: one entry per hook point.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPolicy;

impl LoggingPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyHandler for LoggingPolicy {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn on_argument(&self, ctx: Arc<dyn HostContext>) -> Arc<dyn HostContext> {
        trace!(scope = ?ctx.scope_label(), "applying policies on call context");
        ctx
    }

    fn before_run(&self, call: &CallDescriptor) -> Result<(), crate::errors::PolicyError> {
        trace!(
            method = call.method,
            target = %call.target,
            args = call.args.len(),
            "callback will be executed"
        );
        Ok(())
    }

    fn on_error(&self, call: &CallDescriptor, error: &(dyn std::error::Error + 'static)) {
        warn!(
            method = call.method,
            target = %call.target,
            error = %error,
            "callback returned its declared error"
        );
    }

    fn on_unexpected(&self, call: &CallDescriptor, error: &anyhow::Error) {
        error!(
            method = call.method,
            target = %call.target,
            error = %error,
            "callback failed with an unexpected error"
        );
    }

    fn after_run(&self, call: &CallDescriptor, result: Option<&dyn fmt::Debug>, elapsed: Duration) {
        info!(
            method = call.method,
            target = %call.target,
            elapsed_ms = elapsed.as_millis() as u64,
            result = ?result,
            "callback executed"
        );
    }
}
