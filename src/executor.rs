use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::call::CallDescriptor;
use crate::errors::{CallError, CallResult};
use crate::handler::PolicyChain;

/// Cancellable handle to one in-flight call body, handed to `running` hooks.
#[derive(Clone)]
pub struct TaskHandle {
    abort: AbortHandle,
    done: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    fn new(abort: AbortHandle, done: Arc<AtomicBool>) -> Self {
        Self {
            abort,
            done,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancels the in-flight body unless it already completed. Returns
    /// whether the cancellation was issued.
    ///
    /// The completion check runs first; a cancel that races an actual
    /// completion still marks the call cancelled, and the executor classifies
    /// that race as a timeout.
    pub fn cancel(&self) -> bool {
        if self.done.load(Ordering::Acquire) {
            return false;
        }
        self.cancelled.store(true, Ordering::Release);
        self.abort.abort();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Runs one call through the full hook sequence with bounded execution.
///
/// The call body runs on a spawned task behind a single-slot fair lock, so
/// calls through one wrapped target execute one at a time in submission
/// order and a cancellation never touches the caller's task. A body that
/// ignores cancellation may still be running after the caller observes a
/// timeout error; at most one result is ever observed.
pub struct PolicyExecutor {
    target: Arc<str>,
    slot: tokio::sync::Mutex<()>,
}

impl PolicyExecutor {
    pub fn new(target: Arc<str>) -> Self {
        Self {
            target,
            slot: tokio::sync::Mutex::new(()),
        }
    }

    pub fn target(&self) -> &Arc<str> {
        &self.target
    }

    pub async fn execute<R, E, F>(
        &self,
        call: &CallDescriptor,
        chain: &PolicyChain,
        work: F,
    ) -> CallResult<R, E>
    where
        R: fmt::Debug + Send + 'static,
        E: std::error::Error + Send + 'static,
        F: Future<Output = Result<R, E>> + Send + 'static,
    {
        let start = Instant::now();

        for handler in chain.handlers() {
            if let Err(veto) = handler.before_run(call) {
                // No body is submitted for a vetoed call, but after hooks
                // still observe it.
                let elapsed = start.elapsed();
                for handler in chain.handlers() {
                    handler.after_run(call, None, elapsed);
                }
                return Err(CallError::Policy(veto));
            }
        }

        let done = Arc::new(AtomicBool::new(false));
        let slot = self.slot.lock().await;
        let task = tokio::spawn({
            let done = Arc::clone(&done);
            async move {
                let out = work.await;
                done.store(true, Ordering::Release);
                out
            }
        });
        let handle = TaskHandle::new(task.abort_handle(), done);

        for handler in chain.handlers() {
            handler.running(call, &handle);
        }

        let joined = task.await;
        drop(slot);
        let elapsed = start.elapsed();

        let outcome: CallResult<R, E> = match joined {
            Ok(Ok(value)) => {
                if handle.was_cancelled() {
                    // Cancel raced the completion; the caller already counts
                    // this call as timed out.
                    Err(CallError::Timeout {
                        target: call.target.clone(),
                        method: call.method,
                        elapsed,
                    })
                } else {
                    Ok(value)
                }
            }
            Ok(Err(domain)) => {
                trace!(
                    method = call.method,
                    target = %call.target,
                    error = %domain,
                    "call returned its declared error"
                );
                for handler in chain.handlers() {
                    handler.on_error(call, &domain);
                }
                Err(CallError::Domain(domain))
            }
            Err(join_err) if join_err.is_cancelled() => Err(CallError::Timeout {
                target: call.target.clone(),
                method: call.method,
                elapsed,
            }),
            Err(join_err) => {
                let cause = match join_err.try_into_panic() {
                    Ok(panic) => anyhow!("callback panicked: {}", describe_panic(&*panic)),
                    Err(join_err) => anyhow!(join_err),
                };
                for handler in chain.handlers() {
                    handler.on_unexpected(call, &cause);
                }
                handle.cancel();
                Err(CallError::Unexpected {
                    target: call.target.clone(),
                    method: call.method,
                    cause,
                })
            }
        };

        match &outcome {
            Ok(value) => {
                for handler in chain.handlers() {
                    handler.after_run(call, Some(value as &dyn fmt::Debug), elapsed);
                }
            }
            Err(_) => {
                for handler in chain.handlers() {
                    handler.after_run(call, None, elapsed);
                }
            }
        }
        outcome
    }
}

fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        panic
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_else(|| "opaque panic payload".to_string())
    }
}
