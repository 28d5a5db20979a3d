use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use asana_deck::app_config::{AppConfig, ConfigManager, DECK_CONFIG_FILE};
use asana_deck::presentation_handlers::{configure, cors, AppState};

/// Yoga slide-deck generator backend
#[derive(Parser, Debug)]
#[command(name = "asana-deck", version)]
struct Args {
    /// JSON config file; a missing file means built-in defaults
    #[arg(long, default_value = DECK_CONFIG_FILE)]
    config: PathBuf,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Directory holding index.html
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Also write daily rolling log files here
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(static_dir) = self.static_dir {
            config.static_dir = static_dir;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = Some(log_dir);
        }
    }
}

// The returned guard flushes the file writer on drop
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "asana-deck.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry.with(fmt::layer().with_ansi(false).with_writer(writer)).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let dotenv_result = dotenv::dotenv();
    let args = Args::parse();

    // Defaults, then the config file, then the environment, then flags
    // A missing file means defaults; a malformed or invalid one stops startup
    let mut config = ConfigManager::new(&args.config).load_config().map_err(|e| {
        eprintln!("Failed to load {}: {}", args.config.display(), e);
        e
    })?;
    config.apply_env(|key| std::env::var(key).ok());
    args.apply(&mut config);

    let _log_guard = init_tracing(config.log_dir.as_deref());

    if dotenv_result.is_err() {
        info!("No .env file found, reading credentials from the environment only");
    }
    if config.openrouter_api_key.is_none() {
        warn!("OPENROUTER_API_KEY is not set; every deck will use the built-in content");
    }
    if config.unsplash_api_key.is_none() {
        warn!("UNSPLASH_API_KEY is not set; slides will use curated images");
    }

    let bind_addr = (config.host.clone(), config.port);
    let state = AppState::from_config(config).map_err(|e| {
        error!("Failed to build HTTP clients: {}", e);
        io::Error::other(e.to_string())
    })?;
    let state = web::Data::new(state);

    info!("Starting server at http://{}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(bind_addr)?
    .run()
    .await
}
