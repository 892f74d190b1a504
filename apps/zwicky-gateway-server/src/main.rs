use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use zwicky_gateway::{DEFAULT_BIND, DEFAULT_PATH, GatewayConfig, UpstreamFlavor, router};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Credential-holding proxy for the model API", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Path the proxy answers on
    #[arg(long, default_value = DEFAULT_PATH)]
    path: String,

    /// Upstream API: chat-completions or anthropic-messages
    #[arg(long, default_value_t = UpstreamFlavor::ChatCompletions)]
    flavor: UpstreamFlavor,

    /// Upstream URL (overrides ZWICKY_UPSTREAM_URL)
    #[arg(long)]
    upstream_url: Option<String>,

    /// Enable debug mode
    #[arg(long)]
    debug: bool,
}

fn setup_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("info,zwicky_gateway=debug,zwicky_gateway_server=debug,tower_http=debug")
    } else {
        EnvFilter::new("warn,zwicky_gateway=info,zwicky_gateway_server=info,tower_http=info")
    };

    fmt::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug);

    let mut config = GatewayConfig::from_env(args.flavor).with_path(args.path.clone());
    if let Some(url) = &args.upstream_url {
        config = config.with_upstream_url(url.clone());
    }
    if config.credential.is_none() {
        warn!(
            "no credential configured; requests will fail. {}",
            args.flavor.missing_credential_hint()
        );
    }
    info!(?config, "gateway configuration");

    let app = router(config);

    info!("Starting gateway on {}{}", args.bind, args.path);
    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    axum::serve(listener, app).await.context("Gateway server failed")?;

    Ok(())
}
