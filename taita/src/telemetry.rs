use crate::config::CommonConfig;
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe_all;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const METRICS_PREFIX: &str = "taita";

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid sentry DSN: {0}")]
    InvalidDsn(#[from] sentry::types::ParseDsnError),
    #[error("could not install log subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("could not build statsd recorder: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}

/// Keeps the sentry client alive until the process exits.
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Installs logging, error reporting and the metrics recorder.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`). Sentry and
/// statsd are only set up when their config sections are present.
pub fn init(common: &CommonConfig) -> Result<TelemetryGuard, TelemetryError> {
    let sentry_guard = match &common.logging {
        Some(logging) => {
            let dsn: sentry::types::Dsn = logging.sentry_dsn.parse()?;
            Some(sentry::init(sentry::ClientOptions {
                dsn: Some(dsn),
                release: sentry::release_name!(),
                ..Default::default()
            }))
        }
        None => None,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()?;

    if let Some(metrics) = &common.metrics {
        let recorder =
            StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
                .build(Some(METRICS_PREFIX))?;
        metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderInstalled)?;

        describe_all(proxy::metrics_defs::ALL_METRICS);
        describe_all(client::metrics_defs::ALL_METRICS);
        tracing::info!(
            host = %metrics.statsd_host,
            port = metrics.statsd_port,
            "statsd metrics enabled"
        );
    }

    Ok(TelemetryGuard {
        _sentry: sentry_guard,
    })
}
