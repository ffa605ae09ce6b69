//! # webvm — sandboxed SSR host
//!
//! Serves server-rendered SPA HTML by executing a JS app bundle inside a
//! pooled, sandboxed `deno_core` VM.

use actix_web::{web, App, HttpServer};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use webvm::config::AppHandlerConfig;
use webvm::handler::{self, AppHandler};
use webvm::handlers::{self, AuxiliaryHandlers};
use webvm::store::InMemoryStore;

/// webvm SSR server
#[derive(Parser, Debug)]
#[command(name = "webvmd")]
#[command(author, version, about = "Sandboxed SSR host", long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Path to the app handler's TOML configuration file
    #[arg(short, long, env = "WEBVM_CONFIG")]
    config: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let bind_addr = format!("{}:{}", cli.host, cli.port);

    let config = AppHandlerConfig::from_file(&cli.config)
        .and_then(AppHandlerConfig::validate)
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        });

    let cache_ttl_s = config.cache_ttl_s;
    let cache_max_items = config.cache_max_items;

    let app_handler = AppHandler::init(config, Arc::new(InMemoryStore::new()));
    if let Err(err) = app_handler.start() {
        tracing::error!(error = %err, "failed initial index/bundle read");
        std::process::exit(1);
    }

    let auxiliary = AuxiliaryHandlers::new(cache_ttl_s, cache_max_items);

    tracing::info!(address = %bind_addr, "starting webvm");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&app_handler)))
            .app_data(web::Data::new(Arc::clone(&auxiliary)))
            .service(handlers::robots)
            .service(handlers::sitemap)
            .service(handlers::file)
            .service(handler::app)
    })
    .bind(&bind_addr)?
    .shutdown_timeout(15)
    .run()
    .await
}
