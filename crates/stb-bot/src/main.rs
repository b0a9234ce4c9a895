//! stb-bot entry point.
//!
//! Thin: sets up tracing, loads config and secrets, builds the services and
//! shared state, wires middleware, and serves HTTP until Ctrl-C. Command
//! handling lives in `commands.rs`; routes in `routes.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use stb_bot::{discord::DiscordRest, routes, state};
use stb_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, BotConfig, SecretsMode,
    UnusedKeyPolicy,
};
use stb_roster::{SheetsCredential, SheetsRosterSource};
use stb_store::FsBlobStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const DEFAULT_CONFIG_PATH: &str = "config/starbot.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&path_refs)
        .with_context(|| format!("load config {:?}", paths))?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for pointer in &unused.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not read by anything");
    }

    let config = BotConfig::from_config_json(&loaded.config_json)?;
    let secrets = resolve_secrets(&loaded.config_json, SecretsMode::Daemon)?;
    let token = secrets
        .discord_token
        .clone()
        .context("discord token missing after resolve")?;

    let discord = Arc::new(DiscordRest::new_with_base_url(
        token,
        config.discord_api_base.clone(),
    ));
    let sheets = Arc::new(SheetsRosterSource::new_with_base_url(
        SheetsCredential::from_secrets(&secrets),
        config.roster.api_base.clone(),
    ));
    let store = Arc::new(
        FsBlobStore::open(&config.storage.data_dir)
            .with_context(|| format!("open data dir {:?}", config.storage.data_dir))?,
    );

    let services = state::Services {
        directory: discord.clone(),
        channel: discord,
        roster_source: sheets,
        store,
    };
    let shared = Arc::new(state::AppState::new(config, services)?);

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8898)));
    info!("stb-bot listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("stb-bot exited gracefully");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `STARBOT_CONFIG` holds a comma-separated list of YAML layers.
fn config_paths_from_env() -> Vec<String> {
    match std::env::var("STARBOT_CONFIG") {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect(),
        _ => vec![DEFAULT_CONFIG_PATH.to_string()],
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("STARBOT_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; shutting down");
    }
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
