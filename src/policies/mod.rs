pub mod guard;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod timeout;

pub use guard::ContextGuardPolicy;
pub use logging::LoggingPolicy;
pub use metrics::{MetricLabels, MetricsPolicy};
pub use retry::RetryLimitPolicy;
pub use timeout::TimeoutPolicy;
