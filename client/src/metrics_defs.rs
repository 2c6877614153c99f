use shared::metrics_defs::{MetricDef, MetricType};

pub const STRATEGY_FAILURES: MetricDef = MetricDef {
    name: "client.strategy.failures",
    metric_type: MetricType::Counter,
    description: "API client attempts that failed. Tagged with strategy.",
};

pub const ALL_METRICS: &[MetricDef] = &[STRATEGY_FAILURES];
