use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Error raised by a policy handler before the call is attempted.
///
/// Handlers are trait objects and cannot name the target's domain error
/// type, so the executor lifts these into [`CallError`].
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("retries exhausted: `{method}` has already failed {failures} times on `{target}`")]
    RetriesExhausted {
        target: Arc<str>,
        method: &'static str,
        failures: u64,
    },
    #[error("policy rejected `{method}` on `{target}`: {reason}")]
    Rejected {
        target: Arc<str>,
        method: &'static str,
        reason: String,
    },
}

/// Classified outcome of one intercepted call.
///
/// `E` is the checked domain error kind the target method declares. Domain
/// errors pass through transparently; everything else the engine produced
/// itself.
#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error(transparent)]
    Domain(E),
    /// The call exceeded its time budget and was cancelled. The underlying
    /// body may still be running on the worker; at most one result is ever
    /// observed, exactly-once execution is not guaranteed.
    #[error("`{method}` on `{target}` was cancelled after {elapsed:?}")]
    Timeout {
        target: Arc<str>,
        method: &'static str,
        elapsed: Duration,
    },
    #[error(transparent)]
    Policy(PolicyError),
    #[error("unexpected failure in `{method}` on `{target}`")]
    Unexpected {
        target: Arc<str>,
        method: &'static str,
        #[source]
        cause: anyhow::Error,
    },
    #[error("policy teardown failed")]
    Teardown {
        #[source]
        cause: anyhow::Error,
    },
}

impl<E> CallError<E> {
    /// Terminal errors the caller must not retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            CallError::Timeout { .. } | CallError::Policy(PolicyError::RetriesExhausted { .. })
        )
    }

    pub fn domain(&self) -> Option<&E> {
        match self {
            CallError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// Rejection of a forbidden operation on a guarded call context.
///
/// Always a programming-contract violation on the plugin side; never
/// swallowed and never retried.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("`{operation}` is disallowed on a guarded context")]
pub struct GuardViolation {
    pub operation: &'static str,
}

impl GuardViolation {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

pub type CallResult<T, E> = Result<T, CallError<E>>;
