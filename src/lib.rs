//! Policy-based interception for plugin callback contracts.
//!
//! The host wraps each third-party plugin once via [`proxy::wrap_plugin`];
//! every callback invocation then runs through an ordered [`PolicyChain`]
//! enforcing bounded execution time, structured logging, per-call-shape
//! metrics, bounded-retry failure containment and protection of the mutable
//! call context.
//!
//! Cancellation is cooperative-with-force: a call body that ignores it may
//! still be running after the caller observes a timeout error. At most one
//! result is ever observed per call; exactly-once execution is not
//! guaranteed.

pub mod call;
pub mod config;
pub mod context;
pub mod errors;
pub mod executor;
pub mod failure;
pub mod handler;
pub mod interceptor;
pub mod metrics;
pub mod plugin;
pub mod policies;
pub mod proxy;

pub use call::{ArgFingerprint, CallDescriptor, FailureKey};
pub use config::{MetricsConfig, PolicyConfig, RetryConfig};
pub use context::{CallContext, GuardedContext, HostContext};
pub use errors::{CallError, CallResult, GuardViolation, PolicyError};
pub use executor::{PolicyExecutor, TaskHandle};
pub use failure::{FailureTracker, UnboundedTracker, WindowedTracker};
pub use handler::{PolicyChain, PolicyHandler};
pub use interceptor::Interceptor;
pub use metrics::{MetricAggregator, MetricRecord, MetricSnapshot};
pub use plugin::{HostError, HostResult, Plugin, PluginService};
pub use policies::{
    ContextGuardPolicy, LoggingPolicy, MetricLabels, MetricsPolicy, RetryLimitPolicy, TimeoutPolicy,
};
pub use proxy::{wrap_plugin, WrapOptions};
