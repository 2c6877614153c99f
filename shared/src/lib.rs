pub mod admin_service;
pub mod api;
pub mod config;
pub mod http;
pub mod metrics_defs;
pub mod site;
#[cfg(any(test, feature = "testutils"))]
pub mod testutils;
