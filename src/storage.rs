use crate::crypto::{Seed, UrlCrypto};
use crate::dao;
use crate::error::UrlError;
use crate::model::{NewUrl, ShortenUrlData, ShortenUrlResult, ShortenedUrl};
use crate::safety::UrlSafetyCheck;
use crate::utils::{generate_path, is_valid_path, parse_url};
use chrono::{DateTime, TimeDelta, Utc};
use sqlx::error::ErrorKind;
use sqlx::{Error, PgPool};
use std::sync::Arc;
use std::time::Duration;

const MAX_ENDPOINT_LENGTH: usize = 2048;
const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_PATH_LENGTH: usize = 32;
const PATH_GENERATION_ATTEMPTS: usize = 5;
/// Has to stay well below the request timeout of the create handler.
pub const SAFETY_CHECK_TIMEOUT: Duration = Duration::from_millis(1500);

/// Owns the url records: creation, the public projection and password checks.
pub struct UrlCoreService {
    db_connection_pool: PgPool,
    crypto: UrlCrypto,
    safety_check: Option<Arc<dyn UrlSafetyCheck>>,
    path_generator: fn() -> String,
}

impl UrlCoreService {
    pub fn new(db_connection_pool: PgPool, crypto: UrlCrypto) -> Self {
        Self {
            db_connection_pool,
            crypto,
            safety_check: None,
            path_generator: generate_path,
        }
    }

    /// Replaces the generator used for paths the caller did not choose.
    pub fn with_path_generator(mut self, path_generator: fn() -> String) -> Self {
        self.path_generator = path_generator;
        self
    }

    pub fn with_safety_check(mut self, safety_check: Arc<dyn UrlSafetyCheck>) -> Self {
        self.safety_check = Some(safety_check);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.db_connection_pool
    }

    pub fn crypto(&self) -> &UrlCrypto {
        &self.crypto
    }

    /// Encrypts the endpoint, hashes the optional password with the same seed
    /// and inserts the record.
    ///
    /// A caller supplied path that is already taken fails with
    /// [`UrlError::PathConflict`]; generated paths are retried.
    pub async fn shorten_url(&self, data: ShortenUrlData) -> Result<ShortenUrlResult, UrlError> {
        let data = validate(data)?;
        let expiration = expiration_from(data.expire_in, Utc::now())?;
        let seed = self.crypto.generate_seed();
        let mut new_url = NewUrl {
            path: data.path.clone().unwrap_or_else(self.path_generator),
            encrypted_endpoint: self.crypto.encrypt_url(&data.endpoint, &seed),
            crypto_seed: seed.encode(),
            hashed_password: data
                .password
                .as_deref()
                .map(|password| self.crypto.hash_password(password, &seed)),
            expiration,
            once: data.once,
            secure: self.check_safety(&data.endpoint).await,
        };
        for _ in 1..=PATH_GENERATION_ATTEMPTS {
            match dao::save(&self.db_connection_pool, &new_url).await {
                Ok(result) => {
                    tracing::info!(path = %result.path, once = new_url.once, "Url shortened");
                    return Ok(result);
                }
                Err(Error::Database(db_err)) if db_err.kind() == ErrorKind::UniqueViolation => {
                    if data.path.is_some() {
                        return Err(UrlError::PathConflict);
                    }
                    new_url.path = (self.path_generator)();
                }
                Err(err) => return Err(err.into()),
            }
        }
        tracing::error!("Could not persist new url. Exhausted all retries of generating a unique path");
        Err(UrlError::PathExhausted)
    }

    pub async fn resolve(&self, path: &str) -> Result<Option<ShortenedUrl>, UrlError> {
        Ok(dao::get_by_path(&self.db_connection_pool, path).await?)
    }

    /// False when the path is unknown or has no password.
    pub async fn matches_password(&self, path: &str, password: &str) -> Result<bool, UrlError> {
        let Some(material) = dao::get_password_material(&self.db_connection_pool, path).await? else {
            return Ok(false);
        };
        let Some(hashed_password) = material.hashed_password else {
            return Ok(false);
        };
        let salt = Seed::decode(&material.crypto_seed)?;
        // plain string equality, not constant time
        Ok(self.crypto.hash_password(password, &salt) == hashed_password)
    }

    async fn check_safety(&self, endpoint: &str) -> Option<bool> {
        let safety_check = self.safety_check.as_ref()?;
        match tokio::time::timeout(SAFETY_CHECK_TIMEOUT, safety_check.is_url_safe(endpoint)).await {
            Ok(Ok(secure)) => Some(secure),
            Ok(Err(err)) => {
                tracing::warn!("Safety check unavailable, storing url without verdict: {}", err);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Safety check timed out after {}ms, storing url without verdict",
                    SAFETY_CHECK_TIMEOUT.as_millis()
                );
                None
            }
        }
    }
}

fn validate(data: ShortenUrlData) -> Result<ShortenUrlData, UrlError> {
    if data.endpoint.chars().count() > MAX_ENDPOINT_LENGTH {
        return Err(UrlError::validation(
            "endpoint",
            format!("must be at most {MAX_ENDPOINT_LENGTH} characters"),
        ));
    }
    parse_url(&data.endpoint)?;
    let password = data.password.filter(|password| !password.is_empty());
    if password
        .as_ref()
        .is_some_and(|password| password.chars().count() > MAX_PASSWORD_LENGTH)
    {
        return Err(UrlError::validation(
            "password",
            format!("must be at most {MAX_PASSWORD_LENGTH} characters"),
        ));
    }
    let path = data.path.filter(|path| !path.is_empty());
    if let Some(path) = &path {
        if path.len() > MAX_PATH_LENGTH {
            return Err(UrlError::validation(
                "path",
                format!("must be at most {MAX_PATH_LENGTH} characters"),
            ));
        }
        if !is_valid_path(path) {
            return Err(UrlError::validation(
                "path",
                "may only contain letters, digits, '_' and '-'",
            ));
        }
    }
    Ok(ShortenUrlData {
        password,
        path,
        ..data
    })
}

/// Absent or non-positive durations mean the url never expires.
fn expiration_from(expire_in: Option<i64>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, UrlError> {
    match expire_in {
        Some(minutes) if minutes > 0 => TimeDelta::try_minutes(minutes)
            .and_then(|delta| now.checked_add_signed(delta))
            .map(Some)
            .ok_or_else(|| UrlError::validation("expireIn", "is out of range")),
        _ => Ok(None),
    }
}
