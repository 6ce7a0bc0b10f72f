use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::call::CallDescriptor;
use crate::errors::PolicyError;
use crate::handler::PolicyHandler;
use crate::metrics::MetricAggregator;

/// Which labels make up a metric name.
///
/// Grouping by sub-resource gives one record per scope a call touches;
/// grouping by target folds all scopes of one call shape together. Neither
/// is inherently correct, so the choice is configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricLabels {
    #[default]
    PerTarget,
    PerScope,
}

/// Per-call-shape running statistics, accumulated into a shared
/// [`MetricAggregator`]. Records register lazily on first observation.
pub struct MetricsPolicy {
    aggregator: Arc<MetricAggregator>,
    namespace: String,
    labels: MetricLabels,
}

impl MetricsPolicy {
    pub fn new(aggregator: Arc<MetricAggregator>, namespace: impl Into<String>) -> Self {
        Self {
            aggregator,
            namespace: namespace.into(),
            labels: MetricLabels::default(),
        }
    }

    pub fn with_labels(mut self, labels: MetricLabels) -> Self {
        self.labels = labels;
        self
    }

    fn metric_name(&self, call: &CallDescriptor) -> String {
        let mut name = format!(
            "{},sub={},target={}",
            call.method, self.namespace, call.target
        );
        if self.labels == MetricLabels::PerScope {
            if let Some(scope) = &call.scope {
                name.push_str(",on=");
                name.push_str(scope);
            }
        }
        name
    }
}

impl PolicyHandler for MetricsPolicy {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn before_run(&self, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.aggregator.register(&self.metric_name(call));
        Ok(())
    }

    fn on_error(&self, call: &CallDescriptor, _error: &(dyn std::error::Error + 'static)) {
        self.aggregator.record_error(&self.metric_name(call));
    }

    fn on_unexpected(&self, call: &CallDescriptor, _error: &anyhow::Error) {
        self.aggregator.record_unexpected(&self.metric_name(call));
    }

    fn after_run(&self, call: &CallDescriptor, _result: Option<&dyn fmt::Debug>, elapsed: Duration) {
        self.aggregator
            .observe(&self.metric_name(call), elapsed.as_secs_f64() * 1000.0);
    }
}
