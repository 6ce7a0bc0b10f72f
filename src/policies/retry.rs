use std::sync::Arc;

use tracing::debug;

use crate::call::CallDescriptor;
use crate::errors::PolicyError;
use crate::failure::FailureTracker;
use crate::handler::PolicyHandler;

/// Blocks call shapes that keep failing unexpectedly.
///
/// Only unexpected errors count as failures; a call returning its declared
/// domain error is the target doing its job, not the target misbehaving.
/// With a windowed tracker the block lifts once the recorded failures age
/// out; an unbounded tracker never forgets.
pub struct RetryLimitPolicy {
    threshold: u64,
    tracker: Arc<dyn FailureTracker>,
}

impl RetryLimitPolicy {
    pub fn new(threshold: u64, tracker: Arc<dyn FailureTracker>) -> Self {
        Self { threshold, tracker }
    }
}

impl PolicyHandler for RetryLimitPolicy {
    fn name(&self) -> &'static str {
        "retry-limit"
    }

    fn before_run(&self, call: &CallDescriptor) -> Result<(), PolicyError> {
        let failures = self.tracker.get(call.failure_key());
        if failures > self.threshold {
            return Err(PolicyError::RetriesExhausted {
                target: call.target.clone(),
                method: call.method,
                failures,
            });
        }
        Ok(())
    }

    fn on_unexpected(&self, call: &CallDescriptor, _error: &anyhow::Error) {
        let key = call.failure_key();
        debug!(method = call.method, key = key.0, "recording failed execution");
        self.tracker.add(key);
    }

    fn close(&self) -> anyhow::Result<()> {
        self.tracker.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{UnboundedTracker, WindowedTracker};
    use anyhow::anyhow;
    use std::time::Duration;

    fn call() -> CallDescriptor {
        CallDescriptor::new("plugin.events", Arc::from("demo"), "on_event").with_arg(&0u8)
    }

    #[test]
    fn rejects_once_threshold_is_exceeded() {
        let policy = RetryLimitPolicy::new(2, Arc::new(UnboundedTracker::new()));
        let call = call();
        let failure = anyhow!("kaput");

        for _ in 0..3 {
            policy.before_run(&call).unwrap();
            policy.on_unexpected(&call, &failure);
        }
        assert!(matches!(
            policy.before_run(&call),
            Err(PolicyError::RetriesExhausted { failures: 3, .. })
        ));
    }

    #[test]
    fn other_call_shapes_are_unaffected() {
        let policy = RetryLimitPolicy::new(0, Arc::new(UnboundedTracker::new()));
        let failing = call();
        let healthy =
            CallDescriptor::new("plugin.events", Arc::from("demo"), "start").with_arg(&0u8);

        policy.on_unexpected(&failing, &anyhow!("kaput"));
        assert!(policy.before_run(&failing).is_err());
        assert!(policy.before_run(&healthy).is_ok());
    }

    #[tokio::test]
    async fn windowed_tracker_readmits_after_expiry() {
        let tracker = Arc::new(WindowedTracker::new(Duration::from_millis(60)));
        let policy = RetryLimitPolicy::new(0, tracker);
        let call = call();

        policy.on_unexpected(&call, &anyhow!("kaput"));
        assert!(policy.before_run(&call).is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(policy.before_run(&call).is_ok());
    }

    #[test]
    fn close_clears_the_tracker() {
        let tracker = Arc::new(UnboundedTracker::new());
        let policy = RetryLimitPolicy::new(0, tracker.clone());
        let call = call();

        policy.on_unexpected(&call, &anyhow!("kaput"));
        policy.close().unwrap();
        assert!(policy.before_run(&call).is_ok());
    }
}
