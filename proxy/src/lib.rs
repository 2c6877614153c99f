pub mod config;
mod errors;
pub mod metrics_defs;
mod proxy_service;
mod request;
mod upstream;

pub use errors::ProxyError;
pub use proxy_service::ProxyService;
pub use upstream::Upstream;

use shared::admin_service::AdminService;
use shared::http::run_http_service;

/// Serves the proxy endpoint and the admin listener until either fails.
pub async fn run(config: config::Config, upstream: Upstream) -> Result<(), ProxyError> {
    config.validate()?;

    tracing::info!(
        path = %config.path,
        port = config.listener.port,
        "starting proxy"
    );

    let proxy_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        ProxyService::new(&config.path, upstream),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::new(|| true),
    );

    tokio::try_join!(proxy_task, admin_task)?;
    Ok(())
}
