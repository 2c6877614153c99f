pub mod config;
mod resolver;

pub use resolver::{TenantInfo, TenantResolver, subdomain_from_host};
