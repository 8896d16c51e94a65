use crate::model::{LoggedVisit, NewUrl, PasswordMaterial, ShortenUrlResult, ShortenedUrl};
use sqlx::{Error, PgConnection, PgPool};

pub(crate) async fn save(db_connection_pool: &PgPool, url: &NewUrl) -> Result<ShortenUrlResult, Error> {
    sqlx::query_as(
        r#"
              insert into urls(path, encrypted_endpoint, crypto_seed, hashed_password, expiration, once, secure)
              values ($1, $2, $3, $4, $5, $6, $7)
              returning path, secure
            "#,
    )
    .bind(&url.path)
    .bind(&url.encrypted_endpoint)
    .bind(&url.crypto_seed)
    .bind(&url.hashed_password)
    .bind(url.expiration)
    .bind(url.once)
    .bind(url.secure)
    .fetch_one(db_connection_pool)
    .await
}

pub(crate) async fn get_by_path(db_connection_pool: &PgPool, path: &str) -> Result<Option<ShortenedUrl>, Error> {
    sqlx::query_as(
        r#"
              select id, path, expiration, visits, once, disabled, secure, created_at, updated_at,
                     hashed_password is not null as has_password
              from urls where path = $1 limit 1
            "#,
    )
    .bind(path)
    .fetch_optional(db_connection_pool)
    .await
}

pub(crate) async fn get_password_material(
    db_connection_pool: &PgPool,
    path: &str,
) -> Result<Option<PasswordMaterial>, Error> {
    sqlx::query_as("select hashed_password, crypto_seed from urls where path = $1 limit 1")
        .bind(path)
        .fetch_optional(db_connection_pool)
        .await
}

/// Must run inside the caller's transaction: the row stays locked until it
/// commits or rolls back.
pub(crate) async fn increment_visits(connection: &mut PgConnection, path: &str) -> Result<Option<LoggedVisit>, Error> {
    sqlx::query_as(
        r#"
              update urls set visits = visits + 1, updated_at = now() where path = $1
              returning crypto_seed, encrypted_endpoint, visits
            "#,
    )
    .bind(path)
    .fetch_optional(connection)
    .await
}
