mod comment_prompt;
mod config;
mod telemetry;

use clap::{Parser, Subcommand};
use client::{ApiClient, ClientError, DirectApi, FetchOptions};
use comments::{CommentForm, FileStore, HttpCommentApi};
use config::{Config, ConfigError};
use proxy::{ProxyError, Upstream};
use serde_json::Value;
use shared::api::{HttpMethod, UnsupportedMethod};
use std::path::PathBuf;
use std::process::ExitCode;
use telemetry::TelemetryError;
use tenant::TenantResolver;

#[derive(Parser)]
#[command(name = "taita", version, about = "Multi-tenant blog edge")]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the same-origin API proxy and the admin listener
    Proxy,
    /// Print the tenant a request resolves to
    Resolve {
        host: String,
        #[arg(long, default_value = "/")]
        url: String,
    },
    /// Call the content API, falling back to the proxy
    Fetch {
        endpoint: String,
        /// Host the client runs on; empty means server side
        #[arg(long, default_value = "")]
        host: String,
        #[arg(long, default_value = "GET")]
        method: String,
        /// Request body, sent as JSON when it parses as JSON
        #[arg(long)]
        body: Option<String>,
    },
    /// Public posts of a tenant
    Posts {
        #[arg(long, default_value = "")]
        subdomain: String,
    },
    /// Public menu of a tenant
    Menu {
        #[arg(long, default_value = "")]
        subdomain: String,
    },
    /// Public categories of a tenant
    Categories {
        #[arg(long, default_value = "")]
        subdomain: String,
    },
    /// Resolve the tenant of a request and load one endpoint for it
    Page {
        host: String,
        #[arg(long, default_value = "/")]
        url: String,
        #[arg(long, default_value = "/settings/public")]
        endpoint: String,
    },
    /// Leave a comment on a post from the terminal
    Comment {
        #[arg(long)]
        post_id: String,
        /// Comment API base; defaults to the upstream API URL
        #[arg(long)]
        api_base: Option<String>,
        /// File keeping the verified token and author name between runs
        #[arg(long, default_value = ".taita-comments.json")]
        store: PathBuf,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Method(#[from] UnsupportedMethod),
    #[error("output error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli_main(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cli_main(cli: Cli) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let _telemetry = telemetry::init(&config.common)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute(cli.command, config))
}

async fn execute(command: CliCommand, config: Config) -> Result<(), CliError> {
    match command {
        CliCommand::Proxy => {
            let upstream = Upstream::new(config.upstream, config.site);
            proxy::run(config.proxy, upstream).await?;
        }
        CliCommand::Resolve { host, url } => {
            let info = TenantResolver::new(&config.tenant).resolve(&host, &url);
            print_json(&serde_json::to_value(info)?)?;
        }
        CliCommand::Fetch {
            endpoint,
            host,
            method,
            body,
        } => {
            let client = ApiClient::new(config.upstream, config.client, config.site, &host);
            let options = FetchOptions {
                method: method.parse::<HttpMethod>()?,
                body: body.map(parse_body),
                ..Default::default()
            };
            let payload = client.fetch(&endpoint, options).await?;
            println!("{payload}");
        }
        CliCommand::Posts { subdomain } => {
            let api = DirectApi::new(config.upstream, config.site);
            print_json(&Value::Array(api.public_posts(&subdomain).await))?;
        }
        CliCommand::Menu { subdomain } => {
            let api = DirectApi::new(config.upstream, config.site);
            print_json(&Value::Array(api.public_menu(&subdomain).await))?;
        }
        CliCommand::Categories { subdomain } => {
            let api = DirectApi::new(config.upstream, config.site);
            print_json(&Value::Array(api.public_categories(&subdomain).await))?;
        }
        CliCommand::Page {
            host,
            url,
            endpoint,
        } => {
            let tenant = TenantResolver::new(&config.tenant).resolve(&host, &url);
            let api = DirectApi::new(config.upstream, config.site);
            let data = api.fetch_tenant_data(&endpoint, &tenant).await;
            print_json(&serde_json::json!({
                "tenant": tenant,
                "data": data,
            }))?;
        }
        CliCommand::Comment {
            post_id,
            api_base,
            store,
        } => {
            let api_base = api_base.unwrap_or_else(|| config.upstream.api_url.to_string());
            let form = CommentForm::new(
                HttpCommentApi::new(&api_base),
                FileStore::new(store),
                &post_id,
            );
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            comment_prompt::run(&form, stdin, tokio::io::stdout()).await?;
        }
    }

    Ok(())
}

/// JSON when it parses, otherwise the raw string.
fn parse_body(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
