use crate::crypto::{CryptoError, UrlCrypto};
use crate::safety::SafeBrowsingConfig;
use std::env;
use std::fmt;
use thiserror::Error;

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),
    #[error("Environment variable {0} is invalid: {1}")]
    Invalid(&'static str, String),
    #[error("Environment variable URL_ENCRYPTION_KEY is invalid: {0}")]
    EncryptionKey(#[from] CryptoError),
}

pub struct Config {
    pub database_url: String,
    pub server_address: String,
    pub database_max_connections: u32,
    /// Built from `URL_ENCRYPTION_KEY`; the base64 text is dropped once decoded.
    pub crypto: UrlCrypto,
    pub safe_browsing: Option<SafeBrowsingConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_max_connections = match get_optional_env("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .map_err(|_| ConfigError::Invalid("DATABASE_MAX_CONNECTIONS", value))?,
            None => DEFAULT_DATABASE_MAX_CONNECTIONS,
        };
        let safe_browsing = get_optional_env("GOOGLE_SAFETY_API_KEY").map(|api_key| SafeBrowsingConfig {
            api_key,
            client_id: get_optional_env("GOOGLE_SAFETY_CLIENT_ID")
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").into()),
            client_version: get_optional_env("GOOGLE_SAFETY_CLIENT_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").into()),
        });
        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            server_address: get_env("SERVER_ADDRESS")?,
            database_max_connections,
            crypto: load_crypto()?,
            safe_browsing,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_address", &self.server_address)
            .field("database_max_connections", &self.database_max_connections)
            .field("safe_browsing", &self.safe_browsing.is_some())
            .finish_non_exhaustive()
    }
}

fn load_crypto() -> Result<UrlCrypto, ConfigError> {
    let encoded_key = get_env("URL_ENCRYPTION_KEY")?;
    Ok(UrlCrypto::from_base64(&encoded_key)?)
}

pub fn get_env(name: &'static str) -> Result<String, ConfigError> {
    get_optional_env(name).ok_or(ConfigError::Missing(name))
}

fn get_optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
