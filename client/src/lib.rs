mod api_client;
pub mod config;
mod direct;
mod error;
pub mod metrics_defs;

pub use api_client::{ApiClient, FetchOptions, HostInfo, Strategy};
pub use direct::DirectApi;
pub use error::ClientError;
