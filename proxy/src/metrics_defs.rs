use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "proxy.request.duration",
    metric_type: MetricType::Histogram,
    description: "Proxy request duration in seconds. Tagged with status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "proxy.requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of proxy requests currently being processed",
};

pub const UPSTREAM_ERRORS: MetricDef = MetricDef {
    name: "proxy.upstream.errors",
    metric_type: MetricType::Counter,
    description: "Upstream calls that failed before a response was received",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUEST_DURATION, REQUESTS_INFLIGHT, UPSTREAM_ERRORS];
