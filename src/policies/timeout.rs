use std::time::Duration;

use tracing::info;

use crate::call::CallDescriptor;
use crate::executor::TaskHandle;
use crate::handler::PolicyHandler;

/// Cancels call bodies that outlive a fixed time budget.
///
/// One watcher is scheduled per call on the shared timer. A watcher that
/// fires after the body completed is a no-op; `TaskHandle::cancel` checks
/// completion before acting.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutPolicy {
    timeout: Duration,
}

impl TimeoutPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl PolicyHandler for TimeoutPolicy {
    fn name(&self) -> &'static str {
        "timeout"
    }

    fn running(&self, call: &CallDescriptor, task: &TaskHandle) {
        let timeout = self.timeout;
        let task = task.clone();
        let method = call.method;
        let target = call.target.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if task.cancel() {
                info!(
                    method,
                    target = %target,
                    timeout_ms = timeout.as_millis() as u64,
                    "callback cancelled after exceeding its time budget"
                );
            }
        });
    }
}
