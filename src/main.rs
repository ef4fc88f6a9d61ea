// Blockchain scraper service entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{header, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blockchain_scraper::chains::build_adapters;
use blockchain_scraper::config::AppConfig;
use blockchain_scraper::db::DbPool;
use blockchain_scraper::handlers::AppContext;
use blockchain_scraper::routes::create_router;
use blockchain_scraper::services::{scheduler, CoinGeckoSource, PriceResolver, RunCoordinator};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    // Configure logging with tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env();
    tracing::info!("Configuration loaded");

    // Establish database connection pool
    let db_pool = DbPool::new(&config.database)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");
    let repositories = db_pool.repositories();

    // One HTTP client shared by explorers and the price source
    let http_client = reqwest::Client::builder()
        .timeout(config.run.adapter_timeout)
        .connect_timeout(Duration::from_secs(5))
        .user_agent(concat!("blockchain-scraper/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client");

    let adapters = build_adapters(&config.explorers, http_client.clone());
    let prices = Arc::new(PriceResolver::new(
        Arc::new(CoinGeckoSource::new(http_client, &config.prices)),
        config.prices.cache_ttl,
    ));
    let coordinator = Arc::new(RunCoordinator::new(
        repositories.clone(),
        adapters,
        prices,
        config.run.clone(),
    ));

    scheduler::spawn(coordinator.clone(), config.schedule.clone());

    let app_state = Arc::new(AppContext {
        repositories,
        coordinator,
    });

    // Configure CORS policy
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::ORIGIN,
            header::AUTHORIZATION,
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(3600));

    let app = create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Parse server address from config
    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");

    // Start HTTP server
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
