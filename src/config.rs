use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::failure::{FailureTracker, UnboundedTracker, WindowedTracker};
use crate::handler::{PolicyChain, PolicyHandler};
use crate::metrics::MetricAggregator;
use crate::policies::{
    ContextGuardPolicy, LoggingPolicy, MetricLabels, MetricsPolicy, RetryLimitPolicy, TimeoutPolicy,
};

/// Primitive-parameter surface a host feeds the engine with.
///
/// The defaults match a conservative production profile: a 2s budget per
/// call, at most 2 tolerated unexpected failures per call shape over a
/// trailing 10 minute window, logging and context guarding on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub timeout_ms: Option<u64>,
    pub retry: Option<RetryConfig>,
    pub metrics: Option<MetricsConfig>,
    pub logging: bool,
    pub guard_context: bool,
    pub whitelist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub threshold: u64,
    /// Trailing window for failure counting; `None` keeps failures forever.
    pub window_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            window_ms: Some(10 * 60 * 1000),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub namespace: String,
    /// Split metric records per sub-resource label instead of folding all
    /// scopes of one call shape together.
    pub per_scope: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "plugins".to_string(),
            per_scope: false,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Some(2_000),
            retry: Some(RetryConfig::default()),
            metrics: Some(MetricsConfig::default()),
            logging: true,
            guard_context: true,
            whitelist: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Builds the ordered chain this configuration describes. The windowed
    /// retry tracker spawns its sweep task, so this must run inside a tokio
    /// runtime when a retry window is configured.
    pub fn build_chain(&self, aggregator: Arc<MetricAggregator>) -> PolicyChain {
        let mut handlers: Vec<Arc<dyn PolicyHandler>> = Vec::new();
        if let Some(timeout_ms) = self.timeout_ms {
            handlers.push(Arc::new(TimeoutPolicy::new(Duration::from_millis(
                timeout_ms,
            ))));
        }
        if self.logging {
            handlers.push(Arc::new(LoggingPolicy::new()));
        }
        if let Some(metrics) = &self.metrics {
            let labels = if metrics.per_scope {
                MetricLabels::PerScope
            } else {
                MetricLabels::PerTarget
            };
            handlers.push(Arc::new(
                MetricsPolicy::new(aggregator, metrics.namespace.clone()).with_labels(labels),
            ));
        }
        if let Some(retry) = &self.retry {
            let tracker: Arc<dyn FailureTracker> = match retry.window_ms {
                Some(window_ms) => {
                    Arc::new(WindowedTracker::new(Duration::from_millis(window_ms)))
                }
                None => Arc::new(UnboundedTracker::new()),
            };
            handlers.push(Arc::new(RetryLimitPolicy::new(retry.threshold, tracker)));
        }
        if self.guard_context {
            handlers.push(Arc::new(ContextGuardPolicy::new()));
        }
        PolicyChain::new(handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_builds_the_full_chain() {
        let config = PolicyConfig::default();
        let chain = config.build_chain(Arc::new(MetricAggregator::new()));
        let names: Vec<_> = chain
            .handlers()
            .iter()
            .map(|handler| handler.name())
            .collect();
        assert_eq!(
            names,
            vec!["timeout", "logging", "metrics", "retry-limit", "context-guard"]
        );
        chain.close().unwrap();
    }

    #[test]
    fn disabled_policies_are_omitted() {
        let config = PolicyConfig {
            timeout_ms: None,
            retry: None,
            metrics: None,
            logging: false,
            guard_context: false,
            whitelist: Vec::new(),
        };
        let chain = config.build_chain(Arc::new(MetricAggregator::new()));
        assert!(chain.is_empty());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PolicyConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PolicyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.timeout_ms, Some(2_000));
        assert_eq!(parsed.retry.unwrap().threshold, 2);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let parsed: PolicyConfig = serde_json::from_str(r#"{"timeout_ms": 50}"#).unwrap();
        assert_eq!(parsed.timeout_ms, Some(50));
        assert!(parsed.logging);
        assert!(parsed.guard_context);
    }
}
