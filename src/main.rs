use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travfood_relay::config::config_search_paths;
use travfood_relay::credentials::CredentialDiagnostics;
use travfood_relay::{build_router, AppState, Credentials, RelayConfig, SharedLogger};

#[derive(Parser)]
#[command(
    name = "travfood-relay",
    about = "Relay for translation and chat-completion APIs with server-held keys",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Diagnostic log file path
    #[arg(long, default_value = "travfood-relay.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is normal in production.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "travfood_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = RelayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let credentials = Credentials::from_env(&config);
    let logger = SharedLogger::new(&cli.log_file, config.environment.clone())?;

    info!("travfood-relay v{}", env!("CARGO_PKG_VERSION"));
    info!("  Environment:  {}", config.environment);
    info!("  Translation:  {}", config.translation.endpoint);
    info!("  Chat:         {} (model {})", config.chat.endpoint, config.chat.default_model);
    info!(
        "  Rate limit:   {} requests / {}s per client",
        config.rate_limit.max_requests, config.rate_limit.window_secs
    );
    info!("  Log file:     {}", cli.log_file.display());

    for (name, credential) in [
        (&config.translation.api_key_env, &credentials.translation),
        (&config.chat.api_key_env, &credentials.chat),
    ] {
        let diag = CredentialDiagnostics::of(credential.as_ref());
        if diag.configured {
            info!(key = %name, length = diag.length, prefix = %diag.prefix, "Credential loaded");
        } else {
            tracing::warn!(key = %name, "Credential not configured");
        }
    }

    logger.info(
        "startup",
        format!(
            "Starting travfood-relay port={} environment={}",
            config.port, config.environment
        ),
    );

    let mut client = reqwest::Client::builder();
    if let Some(secs) = config.upstream_timeout_secs {
        client = client.timeout(std::time::Duration::from_secs(secs));
    }
    let client = client.build()?;

    let port = config.port;
    let state = Arc::new(AppState::new(config, credentials, client, logger));

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
