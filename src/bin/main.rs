use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

use acme_mcp_server::auth::mint::DEFAULT_LIFETIME_MINUTES;
use acme_mcp_server::internal_api::stub;
use acme_mcp_server::{AppConfig, MintRequest, TokenMinter, create_server, load_app_config};

// rmcp imports for MCP stdio server mode
use rmcp::service::ServiceExt;
use rmcp::transport::stdio;

#[derive(Parser)]
#[command(name = "acme-mcp-server")]
#[command(about = "MCP tool server acting on behalf of a JWT-authenticated caller")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Expected JWT issuer (overrides Jwt.Issuer)
    #[arg(long, env = "ACME_JWT_ISSUER", global = true)]
    jwt_issuer: Option<String>,
    /// Expected JWT audience (overrides Jwt.Audience)
    #[arg(long, env = "ACME_JWT_AUDIENCE", global = true)]
    jwt_audience: Option<String>,
    /// HMAC signing key (overrides Jwt.SigningKey)
    #[arg(long, env = "ACME_JWT_SIGNING_KEY", global = true, hide_env_values = true)]
    jwt_signing_key: Option<String>,
    /// Internal API base URL (overrides InternalApi.BaseUrl)
    #[arg(long, env = "ACME_INTERNAL_API_URL", global = true)]
    internal_api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as an MCP stdio server (default; token from MCP_BEARER_TOKEN)
    Stdio,
    /// Run as an MCP HTTP server (token from the Authorization header)
    Http {
        /// Bind address, e.g. 0.0.0.0:3004
        #[arg(long, default_value = "127.0.0.1:3004")]
        bind: String,
    },
    /// Run the development stand-in for the internal API
    StubApi {
        #[arg(long, default_value = "127.0.0.1:5080")]
        bind: String,
    },
    /// Mint a development token signed with the configured key
    MintToken {
        #[arg(long, default_value = "dev-user-123")]
        user_id: String,
        #[arg(long, default_value = "org-abc")]
        org_id: String,
        /// Comma-separated list of roles
        #[arg(long)]
        roles: Option<String>,
        #[arg(long, default_value_t = DEFAULT_LIFETIME_MINUTES)]
        lifetime_minutes: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries JSON-RPC in stdio mode; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_timer(ChronoUtc::rfc_3339())
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("acme_mcp_server=info".parse()?)
                .add_directive("rmcp=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::Stdio) {
        Commands::Stdio => {
            info!("Starting MCP stdio server");

            let factory = create_server(config)?;

            let service = factory
                .stdio_session()
                .serve(stdio())
                .await
                .inspect_err(|e| tracing::error!("serving error: {:?}", e))?;

            // Block until the MCP session ends.
            service.waiting().await?;
            info!("MCP stdio server session ended");
        }
        Commands::Http { bind } => {
            info!("Starting MCP HTTP server on {}", bind);

            let factory = create_server(config)?;
            acme_mcp_server::start_mcp_http(factory, &bind).await?;
        }
        Commands::StubApi { bind } => {
            stub::serve(&bind).await?;
        }
        Commands::MintToken {
            user_id,
            org_id,
            roles,
            lifetime_minutes,
        } => {
            config.jwt.validate()?;

            let roles = roles
                .map(|r| {
                    r.split(',')
                        .map(|role| role.trim().to_string())
                        .filter(|role| !role.is_empty())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();

            let lifetime = chrono::Duration::try_minutes(lifetime_minutes).ok_or_else(|| {
                anyhow::anyhow!("--lifetime-minutes {} is out of range", lifetime_minutes)
            })?;
            let request = MintRequest::new(user_id, org_id)
                .with_roles(roles)
                .with_lifetime(lifetime);

            let token = TokenMinter::new(&config.jwt).mint(&request)?;

            // Token only on stdout so it can be captured with $(...).
            println!("{}", token);
        }
    }

    Ok(())
}

/// Settings file, then CLI/environment overrides on top.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = load_app_config()?;

    if let Some(issuer) = &cli.jwt_issuer {
        config.jwt.issuer = issuer.clone();
    }
    if let Some(audience) = &cli.jwt_audience {
        config.jwt.audience = audience.clone();
    }
    if let Some(key) = &cli.jwt_signing_key {
        config.jwt.signing_key = key.clone();
    }
    if let Some(url) = &cli.internal_api_url {
        config.internal_api.base_url = url.clone();
    }

    info!(
        issuer = %config.jwt.issuer,
        audience = %config.jwt.audience,
        internal_api = %config.internal_api.base_url,
        "Configuration loaded"
    );

    Ok(config)
}
