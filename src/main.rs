use axum::serve;
use dotenvy::dotenv;
use secure_link_shortener::config::Config;
use secure_link_shortener::routes::{create_router, AppState};
use secure_link_shortener::safety::GoogleSafeBrowsing;
use secure_link_shortener::storage::UrlCoreService;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACING_LEVEL: &str = "secure_link_shortener=debug,tower_http=debug";

#[tokio::main]
async fn main() {
    _ = dotenv();
    configure_tracing();
    let Config {
        database_url,
        server_address,
        database_max_connections,
        crypto,
        safe_browsing,
    } = Config::from_env().expect("Loading configuration failed");
    let db_connection_pool = create_db_connection_pool(&database_url, database_max_connections).await;
    let mut core = UrlCoreService::new(db_connection_pool, crypto);
    match safe_browsing {
        Some(safe_browsing) => {
            let safety_check =
                GoogleSafeBrowsing::new(safe_browsing).expect("Creating safety check client failed");
            core = core.with_safety_check(Arc::new(safety_check));
        }
        None => tracing::info!("GOOGLE_SAFETY_API_KEY not set, urls are stored without safety verdict"),
    }
    let listener = create_listener(&server_address).await;
    let router = create_router(AppState::new(core));
    serve(listener, router)
        .await
        .expect("Server failed to start");
}

fn configure_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or(DEFAULT_TRACING_LEVEL.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn create_db_connection_pool(database_url: &str, max_connections: u32) -> Pool<Postgres> {
    let db_connection_pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .expect("Creating database connection pool failed");
    sqlx::migrate!()
        .run(&db_connection_pool)
        .await
        .expect("Running database migrations failed");
    db_connection_pool
}

async fn create_listener(server_address: &str) -> TcpListener {
    let listener = TcpListener::bind(&server_address)
        .await
        .expect("Creating tcp listener failed");
    tracing::info!("Listening on address: {}", server_address);
    listener
}
