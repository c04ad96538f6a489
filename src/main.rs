// SUI faucet API server entry point

mod cache;
mod chain;
mod config;
mod db;
mod entity;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderValue;
use axum::routing::{get, post, put, Router};
use http::{header, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache::CacheService;
use chain::FaucetDispatcher;
use config::FaucetConfig;
use db::Storage;
use handlers::{
    admin_activities, admin_bulk_settings, admin_cache_flush, admin_config, admin_dashboard,
    admin_deactivate_client, admin_list_clients, admin_list_settings, admin_login, admin_logout,
    admin_regenerate_client, admin_test_transaction, admin_transactions, admin_update_setting,
    faucet_mode, faucet_status, get_client, health_check, health_live, health_ready, keepalive,
    register_client, request_tokens, status_page, AppState,
};
use services::admission::AdmissionPipeline;
use services::clients::ClientRegistry;
use services::session::SessionService;
use services::settings::{setting_defaults, SettingsService};

fn load_env() {
    dotenv::dotenv().ok();
}

#[tokio::main]
async fn main() {
    load_env();
    // Configure logging with tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .or_else(|_| std::env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load and validate configuration; bad config is fatal
    let config = match FaucetConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(network = config.network.as_str(), "Configuration loaded");

    // Durable store; degrades to no-op persistence when unavailable
    let storage = Storage::connect(config.db_url.as_deref()).await;

    // Seed the bootstrap super admin and the recognized settings
    let admin_password = config.admin_password.clone();
    match tokio::task::spawn_blocking(move || bcrypt::hash(admin_password, bcrypt::DEFAULT_COST))
        .await
    {
        Ok(Ok(password_hash)) => {
            if let Err(e) = storage
                .ensure_bootstrap_admin(&config.admin_username, &password_hash)
                .await
            {
                tracing::warn!("Failed to seed bootstrap admin: {}", e);
            }
        }
        Ok(Err(e)) => tracing::error!("Failed to hash bootstrap admin password: {}", e),
        Err(e) => tracing::error!("Failed to hash bootstrap admin password: {}", e),
    }
    if let Err(e) = storage.seed_settings(&setting_defaults()).await {
        tracing::warn!("Failed to seed rate-limit settings: {}", e);
    }

    // Cache / rate store with in-memory fallback
    let cache = Arc::new(CacheService::new(config.cache_url.as_deref(), &config.cache_prefix).await);

    // Shared HTTP client for chain RPC and the upstream faucet; every
    // outbound call is bounded by the 10s deadline
    let http_client = reqwest::Client::builder()
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(10))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("Failed to build HTTP client");

    // Chain dispatcher; an unparseable key is fatal, an unreachable RPC is
    // not (readiness reports it)
    let dispatcher = match FaucetDispatcher::new(&config, http_client) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            tracing::error!("Failed to initialize chain dispatcher: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = dispatcher.initialize().await {
        tracing::warn!("Chain RPC not reachable at startup: {}", e);
    }

    let settings = Arc::new(SettingsService::new(config.clone(), storage.clone()));
    let sessions = Arc::new(SessionService::new(&config.jwt_secret));
    let registry = Arc::new(ClientRegistry::new(storage.clone()));
    let admission = Arc::new(AdmissionPipeline::new(
        config.clone(),
        cache.clone(),
        storage.clone(),
        settings.clone(),
        dispatcher.clone(),
    ));

    let state = AppState {
        config: config.clone(),
        cache: cache.clone(),
        storage: storage.clone(),
        settings,
        dispatcher: dispatcher.clone(),
        sessions: sessions.clone(),
        registry,
        admission,
        started_at: Instant::now(),
    };

    spawn_background_tasks(cache.clone(), dispatcher.clone(), sessions.clone(), &config);

    // Configure CORS policy
    let cors = match &config.cors_origin {
        Some(origin) if origin != "*" => CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>().expect("Invalid CORS_ORIGIN"))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                header::AUTHORIZATION,
                header::HeaderName::from_static("x-api-key"),
                header::HeaderName::from_static("x-request-id"),
            ]),
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
            .allow_headers(Any),
    };

    // ── API routes ──
    let api_routes = Router::new()
        // Faucet
        .route("/faucet/request", post(request_tokens))
        .route("/faucet/status", get(faucet_status))
        .route("/faucet/mode", get(faucet_mode))
        // Probes
        .route("/health", get(health_check))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/keepalive", get(keepalive))
        .route("/status", get(status_page))
        // Client registry
        .route("/clients/register", post(register_client))
        .route("/clients/{client_id}", get(get_client))
        // Admin
        .route("/admin/login", post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/admin/dashboard", get(admin_dashboard))
        .route("/admin/transactions", get(admin_transactions))
        .route("/admin/activities", get(admin_activities))
        .route("/admin/rate-limits", get(admin_list_settings))
        .route("/admin/rate-limits/bulk", put(admin_bulk_settings))
        .route("/admin/rate-limits/{name}", put(admin_update_setting))
        .route("/admin/config", get(admin_config))
        .route("/admin/cache/flush", post(admin_cache_flush))
        .route("/admin/test-transaction", post(admin_test_transaction))
        .route("/admin/clients", get(admin_list_clients))
        .route("/admin/clients/{client_id}/deactivate", post(admin_deactivate_client))
        .route("/admin/clients/{client_id}/regenerate", post(admin_regenerate_client));

    let app = Router::new()
        .nest("/api/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::request_context))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Parse server address from config
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    // On signal: stop accepting connections, reject new persistence writes,
    // and give in-flight requests a bounded grace period to drain
    let drain_grace = Duration::from_secs(30);
    let drain_started = Arc::new(tokio::sync::Notify::new());
    let drain_notify = drain_started.clone();
    let drain_storage = storage.clone();
    let server = async {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            drain_storage.begin_drain();
            drain_notify.notify_one();
        })
        .await
    };

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = async {
            drain_started.notified().await;
            tokio::time::sleep(drain_grace).await;
        } => {
            tracing::warn!(
                grace_secs = drain_grace.as_secs(),
                "Drain grace period elapsed, abandoning remaining connections"
            );
        }
    }

    // Drain is over: release the cache and database pools before exit
    cache.close().await;
    storage.close().await;
    tracing::info!("Server stopped");
}

/// Periodic work: in-memory cache sweeping, remote cache probing, wallet
/// balance monitoring, session pruning
fn spawn_background_tasks(
    cache: Arc<CacheService>,
    dispatcher: Arc<FaucetDispatcher>,
    sessions: Arc<SessionService>,
    config: &FaucetConfig,
) {
    let sweeper_cache = cache.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            sweeper_cache.sweep_memory().await;
        }
    });

    let probe_cache = cache;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(15));
        loop {
            ticker.tick().await;
            probe_cache.probe_remote().await;
        }
    });

    let min_balance = config.min_wallet_balance;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            if !dispatcher.has_wallet() {
                continue;
            }
            match dispatcher.wallet_balance().await {
                Ok(balance) if balance < min_balance => {
                    tracing::warn!(balance, min_balance, "Faucet wallet balance low");
                }
                Ok(balance) => {
                    tracing::info!(balance, "Faucet wallet balance");
                }
                Err(e) => {
                    tracing::warn!("Wallet balance probe failed: {}", e);
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            sessions.prune_expired().await;
        }
    });
}

/// Resolves when the process receives SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining in-flight requests");
}
