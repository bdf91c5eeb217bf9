use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use {
    clap::Parser,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    url::Url,
};

use {
    botdesk_gateway::{GatewayState, StaticTokenVerifier, WsEventSink},
    botdesk_registry::BotRegistry,
    botdesk_store::SqliteStore,
    botdesk_telegram::TelegramAdapterFactory,
};

#[derive(Parser)]
#[command(name = "botdesk", about = "Botdesk — multi-bot Telegram support dashboard backend")]
struct Cli {
    /// Address to bind to.
    #[arg(long, default_value = "127.0.0.1", env = "BOTDESK_BIND")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "BOTDESK_PORT")]
    port: u16,

    /// SQLite database URL.
    #[arg(long, default_value = "sqlite://botdesk.db", env = "BOTDESK_DATABASE_URL")]
    database_url: String,

    /// Directory for uploaded and downloaded images.
    #[arg(long, default_value = "uploads", env = "BOTDESK_UPLOADS_DIR")]
    uploads_dir: std::path::PathBuf,

    /// Publicly reachable base URL, used for Telegram webhook registration.
    #[arg(long, env = "BOTDESK_PUBLIC_URL")]
    public_url: Url,

    /// API tokens as `token:username` pairs, comma separated.
    #[arg(long, env = "BOTDESK_API_TOKENS", value_delimiter = ',')]
    api_tokens: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// `token:username` pairs into a lookup table; malformed entries are
/// skipped with a warning.
fn parse_tokens(entries: &[String]) -> HashMap<String, String> {
    let mut tokens = HashMap::new();
    for entry in entries {
        match entry.split_once(':') {
            Some((token, username)) if !token.is_empty() && !username.is_empty() => {
                tokens.insert(token.to_string(), username.to_string());
            }
            _ => warn!(%entry, "ignoring malformed api token entry"),
        }
    }
    tokens
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let store = Arc::new(SqliteStore::connect(&cli.database_url).await?);
    info!(url = %cli.database_url, "store ready");

    let factory = Arc::new(TelegramAdapterFactory::new(
        cli.uploads_dir.clone(),
        cli.public_url.clone(),
    ));
    let sink = Arc::new(WsEventSink::new());
    let registry = Arc::new(BotRegistry::new(
        factory,
        Arc::clone(&store) as Arc<dyn botdesk_store::ConversationStore>,
        Arc::clone(&sink) as Arc<dyn botdesk_registry::EventSink>,
    ));

    let tokens = parse_tokens(&cli.api_tokens);
    if tokens.is_empty() {
        warn!("no api tokens configured, the dashboard api will reject every request");
    }
    let auth = Arc::new(StaticTokenVerifier::new(
        Arc::clone(&store) as Arc<dyn botdesk_store::ConversationStore>,
        tokens,
    ));

    let state = Arc::new(GatewayState::new(
        store,
        Arc::clone(&registry),
        auth,
        cli.uploads_dir.clone(),
    ));
    sink.bind(Arc::clone(&state));

    registry.reconcile().await?;

    let addr: SocketAddr = format!("{}:{}", cli.bind, cli.port).parse()?;
    botdesk_gateway::serve(addr, state).await?;
    Ok(())
}
