#![allow(dead_code)]

use secure_link_shortener::crypto::UrlCrypto;
use secure_link_shortener::storage::UrlCoreService;
use secure_link_shortener::utils::generate_path;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::time::Duration;

pub const TEST_KEY: [u8; 32] = [42; 32];

/// Connects to `TEST_DATABASE_URL` (or `DATABASE_URL`) and applies the
/// migrations. `None` means no database is configured and the test should be
/// skipped; a configured but unreachable database fails the test.
pub async fn test_pool() -> Option<PgPool> {
    _ = dotenvy::dotenv();
    let Ok(database_url) = env::var("TEST_DATABASE_URL").or_else(|_| env::var("DATABASE_URL")) else {
        eprintln!("TEST_DATABASE_URL is not set, skipping database test");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await
        .expect("Test database is configured but unreachable");
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Running database migrations failed");
    Some(pool)
}

pub fn test_crypto() -> UrlCrypto {
    UrlCrypto::new(&TEST_KEY).unwrap()
}

pub fn core_service(pool: PgPool) -> UrlCoreService {
    UrlCoreService::new(pool, test_crypto())
}

/// Paths are shared across parallel tests, so each test picks its own.
pub fn unique_path(prefix: &str) -> String {
    format!("{prefix}-{}", generate_path())
}

pub async fn insert_raw(
    pool: &PgPool,
    path: &str,
    crypto_seed: &str,
    encrypted_endpoint: &str,
    hashed_password: Option<&str>,
    visits: i64,
) {
    sqlx::query(
        "insert into urls(path, crypto_seed, encrypted_endpoint, hashed_password, visits) values ($1, $2, $3, $4, $5)",
    )
    .bind(path)
    .bind(crypto_seed)
    .bind(encrypted_endpoint)
    .bind(hashed_password)
    .bind(visits)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn visits_of(pool: &PgPool, path: &str) -> i64 {
    sqlx::query_scalar("select visits from urls where path = $1")
        .bind(path)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[derive(sqlx::FromRow)]
pub struct StoredSecrets {
    pub crypto_seed: String,
    pub encrypted_endpoint: String,
    pub hashed_password: Option<String>,
}

pub async fn stored_secrets(pool: &PgPool, path: &str) -> StoredSecrets {
    sqlx::query_as("select crypto_seed, encrypted_endpoint, hashed_password from urls where path = $1")
        .bind(path)
        .fetch_one(pool)
        .await
        .unwrap()
}
