use bounce_core::BounceConfig;
use bounce_gateway::{demo, shutdown_signal, Gateway};
use bounce_router::Dispatcher;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "bounce-gateway", version, about = "Event-routed WebSocket server")]
struct Cli {
    /// Config file (default: $BOUNCE_CONFIG, then ~/.bounce/bounce.toml)
    #[arg(long)]
    config: Option<String>,
    /// Override gateway.bind
    #[arg(long)]
    bind: Option<String>,
    /// Override gateway.port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "bounce_gateway=info,bounce_router=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config > BOUNCE_CONFIG env > ~/.bounce/bounce.toml
    let config_path = cli.config.or_else(|| std::env::var("BOUNCE_CONFIG").ok());
    let mut config = BounceConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        BounceConfig::default()
    });
    if let Some(bind) = cli.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }

    let dispatcher = Arc::new(Dispatcher::new());
    if config.demo.enabled {
        demo::install(&dispatcher, &config.demo)?;
        info!("ping demo installed");
    }

    let gateway = Gateway::new(config, dispatcher);
    let listener = gateway.bind().await?;
    gateway.serve(listener, shutdown_signal()).await?;
    Ok(())
}
